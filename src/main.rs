use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use feed2md::config::{Config, Overrides};
use feed2md::feed::build_client;
use feed2md::pipeline;

#[derive(Parser, Debug)]
#[command(
    name = "feed2md",
    version,
    about = "Render each item of one or more RSS/Atom feeds into a Markdown file"
)]
struct Args {
    /// TOML config file; command-line values take precedence
    #[arg(long, value_name = "FILE", env = "FEED2MD_CONFIG")]
    config: Option<PathBuf>,

    /// Feed URL to process (first, before any listed in --feed-urls-file)
    #[arg(long, value_name = "URL", env = "INPUT_FEED_URL")]
    feed_url: Option<String>,

    /// File with one feed URL per line, or an OPML subscription list
    #[arg(long, value_name = "FILE", env = "INPUT_FEED_URLS_FILE")]
    feed_urls_file: Option<PathBuf>,

    /// Template with [TITLE], [DESCRIPTION], [THUMBNAIL], [LINK] and [DATE] placeholders
    #[arg(long, value_name = "FILE", env = "INPUT_TEMPLATE_FILE")]
    template_file: Option<PathBuf>,

    /// Directory for the generated files (created if missing)
    #[arg(long, value_name = "DIR", env = "INPUT_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// chrono strftime format for publish dates [default: %Y-%m-%d]
    #[arg(long, value_name = "FORMAT", env = "INPUT_DATE_FORMAT")]
    date_format: Option<String>,

    /// Per-request timeout in seconds [default: 30]
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Retries for rate-limited, 5xx or truncated responses [default: 0]
    #[arg(long, value_name = "N")]
    max_retries: Option<u32>,

    /// Number of feeds fetched concurrently [default: 1]
    #[arg(long, value_name = "N")]
    concurrency: Option<usize>,

    /// Fail the run if any feed or item fails
    #[arg(long)]
    strict: bool,

    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            feed_url: self.feed_url.clone(),
            feed_urls_file: self.feed_urls_file.clone(),
            template_file: self.template_file.clone(),
            output_dir: self.output_dir.clone(),
            date_format: self.date_format.clone(),
            timeout_secs: self.timeout,
            max_retries: self.max_retries,
            concurrency: self.concurrency,
            strict: self.strict,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout carries only the run summary
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config file '{}'", path.display()))?,
        None => Config::default(),
    }
    .apply(args.overrides());

    // All configuration-level checks happen here, before any request or write
    let run_config = match config.validate().await {
        Ok(run_config) => run_config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        feeds = run_config.sources.len(),
        output_dir = %run_config.output_dir.display(),
        "Starting run"
    );

    let client = build_client(&run_config.fetch).context("Failed to build HTTP client")?;
    let report = pipeline::run(&client, &run_config).await?;

    if args.json {
        let json = serde_json::to_string_pretty(&report.summary())
            .context("Failed to serialize run summary")?;
        println!("{json}");
    } else {
        print!("{report}");
    }

    if !report.is_success() {
        match report.failures.first() {
            Some(first) => eprintln!(
                "Error: run failed with {} failure(s); first: {first}",
                report.failures.len()
            ),
            None => eprintln!("Error: run failed"),
        }
        std::process::exit(1);
    }

    Ok(())
}
