//! The feed-to-file run: fetch, parse, normalize, render and write.
//!
//! Failures below the configuration level never abort the run. A feed that
//! cannot be fetched or parsed is recorded and skipped; an item that cannot be
//! written is recorded and the next item is attempted. The [`RunReport`]
//! carries every failure with enough context (source URL, item index, title)
//! to diagnose it afterwards.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;

use crate::config::RunConfig;
use crate::feed::{fetch_feed, parse_feed, FeedSource, FetchError, ParseError, RawFeedItem};
use crate::item::normalize;
use crate::output::{ensure_output_dir, write_document, WriteError};
use crate::slug::{make_slug, SlugRegistry};

/// How recorded failures affect the overall outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunPolicy {
    /// Fail only when nothing was written and at least one failure was
    /// recorded, which includes every feed failing.
    #[default]
    Lenient,
    /// Any recorded failure fails the run.
    Strict,
}

/// A recovered failure, tagged with where it happened.
#[derive(Debug, thiserror::Error)]
pub enum RunFailure {
    #[error("{url}: fetch failed: {error}")]
    Fetch { url: String, error: FetchError },

    #[error("{url}: parse failed: {error}")]
    Parse { url: String, error: ParseError },

    #[error("{url}: item #{index} ({title:?}): {error}")]
    Write {
        url: String,
        index: usize,
        title: String,
        error: WriteError,
    },
}

impl RunFailure {
    pub fn url(&self) -> &str {
        match self {
            RunFailure::Fetch { url, .. }
            | RunFailure::Parse { url, .. }
            | RunFailure::Write { url, .. } => url,
        }
    }
}

/// One file produced by the run.
#[derive(Debug, Clone, Serialize)]
pub struct WrittenItem {
    pub url: String,
    pub index: usize,
    pub title: String,
    pub path: PathBuf,
}

/// Outcome of a whole run.
#[derive(Debug, Default)]
pub struct RunReport {
    pub policy: RunPolicy,
    pub feeds_attempted: usize,
    pub feeds_succeeded: usize,
    pub written: Vec<WrittenItem>,
    pub failures: Vec<RunFailure>,
}

impl RunReport {
    /// Applies the run policy to what was recorded.
    pub fn is_success(&self) -> bool {
        match self.policy {
            RunPolicy::Strict => self.failures.is_empty(),
            RunPolicy::Lenient => !self.written.is_empty() || self.failures.is_empty(),
        }
    }

    /// Serializable view used for `--json` output.
    pub fn summary(&self) -> RunSummary<'_> {
        RunSummary {
            success: self.is_success(),
            policy: self.policy,
            feeds_attempted: self.feeds_attempted,
            feeds_succeeded: self.feeds_succeeded,
            written: &self.written,
            failures: self
                .failures
                .iter()
                .map(|f| FailureSummary {
                    url: f.url(),
                    message: f.to_string(),
                })
                .collect(),
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} of {} feeds processed, {} files written, {} failures",
            self.feeds_succeeded,
            self.feeds_attempted,
            self.written.len(),
            self.failures.len()
        )?;
        for failure in &self.failures {
            writeln!(f, "  failed: {failure}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct RunSummary<'a> {
    pub success: bool,
    pub policy: RunPolicy,
    pub feeds_attempted: usize,
    pub feeds_succeeded: usize,
    pub written: &'a [WrittenItem],
    pub failures: Vec<FailureSummary<'a>>,
}

#[derive(Debug, Serialize)]
pub struct FailureSummary<'a> {
    pub url: &'a str,
    pub message: String,
}

/// Runs the pipeline over every configured feed.
///
/// Feeds are fetched in source order, up to `config.concurrency` at a time,
/// and their results are consumed in source order either way. Items are rendered and written one at a time in document order, and
/// slugs are claimed through a single [`SlugRegistry`] so no two items of a
/// run share a path.
///
/// # Errors
///
/// Returns [`WriteError::CreateDir`] only when the output directory cannot be
/// created at all; every other failure is collected in the report.
pub async fn run(client: &reqwest::Client, config: &RunConfig) -> Result<RunReport, WriteError> {
    ensure_output_dir(&config.output_dir).await?;

    let mut report = RunReport {
        policy: config.policy,
        feeds_attempted: config.sources.len(),
        ..RunReport::default()
    };
    let mut registry = SlugRegistry::new();

    let mut fetches = spawn_fetches(client, config);

    while let Some((source, task)) = fetches.recv().await {
        // Held until this feed's items are written
        let (body, _permit) = match task.await {
            Ok((body, permit)) => (body, Some(permit)),
            Err(e) => (Err(FetchError::Aborted(e.to_string())), None),
        };
        let source = &source;

        let body = match body {
            Ok(body) => body,
            Err(error) => {
                tracing::warn!(url = %source, error = %error, "Failed to fetch feed");
                report.failures.push(RunFailure::Fetch {
                    url: source.to_string(),
                    error,
                });
                continue;
            }
        };

        let items = match parse_feed(&body) {
            Ok(items) => items,
            Err(error) => {
                tracing::warn!(url = %source, error = %error, "Failed to parse feed");
                report.failures.push(RunFailure::Parse {
                    url: source.to_string(),
                    error,
                });
                continue;
            }
        };

        tracing::info!(url = %source, items = items.len(), "Processing feed");
        report.feeds_succeeded += 1;

        for (index, raw) in items.iter().enumerate() {
            process_item(config, source, index, raw, &mut registry, &mut report).await;
        }
    }

    tracing::info!(
        feeds = report.feeds_attempted,
        succeeded = report.feeds_succeeded,
        written = report.written.len(),
        failures = report.failures.len(),
        "Run complete"
    );

    Ok(report)
}

type FetchTask = JoinHandle<(Result<String, FetchError>, OwnedSemaphorePermit)>;

/// Starts the fetches in source order with at most `config.concurrency`
/// outstanding, and hands them to the caller in that same order.
///
/// Every fetch runs in its own task, so its timeout measures only the request
/// and not the time the caller spends writing earlier feeds. A fetch holds its
/// permit until the caller drops it after processing the feed; with a limit of
/// 1 the next feed is requested only once the previous one is done.
fn spawn_fetches(
    client: &reqwest::Client,
    config: &RunConfig,
) -> mpsc::Receiver<(FeedSource, FetchTask)> {
    let concurrency = config.concurrency.max(1);
    let (tx, rx) = mpsc::channel(concurrency);
    let limit = Arc::new(Semaphore::new(concurrency));
    let client = client.clone();
    let sources = config.sources.clone();
    let policy = config.fetch.clone();

    tokio::spawn(async move {
        for source in sources {
            let Ok(permit) = Arc::clone(&limit).acquire_owned().await else {
                break;
            };
            let client = client.clone();
            let policy = policy.clone();
            let url = source.as_str().to_string();
            let task = tokio::spawn(async move {
                let body = fetch_feed(&client, &url, &policy).await;
                (body, permit)
            });
            if tx.send((source, task)).await.is_err() {
                tracing::debug!("Run stopped, no further feeds fetched");
                break;
            }
        }
    });

    rx
}

async fn process_item(
    config: &RunConfig,
    source: &FeedSource,
    index: usize,
    raw: &RawFeedItem,
    registry: &mut SlugRegistry,
    report: &mut RunReport,
) {
    let item = normalize(raw, &config.date_format);
    let slug = registry.claim(&make_slug(&item.publish_date, &item.title));
    let document = config.template.render(&item);

    match write_document(&config.output_dir, &slug, &document).await {
        Ok(path) => {
            tracing::info!(path = %path.display(), "Markdown file created");
            report.written.push(WrittenItem {
                url: source.to_string(),
                index,
                title: item.title,
                path,
            });
        }
        Err(error) => {
            tracing::warn!(url = %source, index, title = %item.title, error = %error, "Failed to write item");
            report.failures.push(RunFailure::Write {
                url: source.to_string(),
                index,
                title: item.title,
                error,
            });
        }
    }
}
