//! Run configuration: an optional TOML file, overridden by CLI flags and the
//! automation host's `INPUT_*` environment variables.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are silently ignored by serde (with `deny_unknown_fields` off),
//! though we log a warning when the file contains potential typos.
//!
//! [`Config::validate`] turns the merged values into a [`RunConfig`] before any
//! network or output activity, so every configuration-level failure surfaces
//! up front.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::feed::{resolve_sources, FeedSource, FetchPolicy, SourceError};
use crate::item::{DateFormat, InvalidDateFormat};
use crate::pipeline::RunPolicy;
use crate::template::Template;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("No template file configured")]
    MissingTemplate,

    #[error("Template file '{}' does not exist.", .0.display())]
    TemplateNotFound(PathBuf),

    #[error("Failed to read template file '{}': {source}", .path.display())]
    TemplateUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No output directory configured")]
    MissingOutputDir,

    #[error(transparent)]
    DateFormat(#[from] InvalidDateFormat),

    #[error(transparent)]
    Sources(#[from] SourceError),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Values read from the config file, before CLI overrides.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Missing keys fall back to `Default::default()`. Empty strings count as
/// unset, matching how automation hosts pass inputs the user left blank.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Single feed URL, processed first.
    pub feed_url: Option<String>,

    /// File with one feed URL per line (or an OPML subscription list).
    pub feed_urls_file: Option<PathBuf>,

    /// Template containing `[TITLE]`, `[DATE]`, ... placeholders.
    pub template_file: Option<PathBuf>,

    /// Directory the Markdown files are written to.
    pub output_dir: Option<PathBuf>,

    /// chrono strftime format for `[DATE]` and the slug (default `%Y-%m-%d`).
    pub date_format: Option<String>,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,

    /// Retries after a 429, 5xx or truncated response. 0 = no retries.
    pub max_retries: u32,

    /// Base backoff between retries in milliseconds (doubles each attempt).
    pub retry_backoff_ms: u64,

    /// Feeds fetched at the same time. Writes stay sequential.
    pub concurrency: usize,

    /// Fail the run on any feed or item failure.
    pub strict: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feed_url: None,
            feed_urls_file: None,
            template_file: None,
            output_dir: None,
            date_format: None,
            timeout_secs: 30,
            max_retries: 0,
            retry_backoff_ms: 1000,
            concurrency: 1,
            strict: false,
        }
    }
}

/// Values supplied on the command line or through the environment.
/// `Some` replaces the config file value.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub feed_url: Option<String>,
    pub feed_urls_file: Option<PathBuf>,
    pub template_file: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub date_format: Option<String>,
    pub timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
    pub concurrency: Option<usize>,
    pub strict: bool,
}

/// Everything a run needs, validated.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub sources: Vec<FeedSource>,
    pub template: Template,
    pub output_dir: PathBuf,
    pub date_format: DateFormat,
    pub fetch: FetchPolicy,
    pub concurrency: usize,
    pub policy: RunPolicy,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn non_empty_path(value: Option<PathBuf>) -> Option<PathBuf> {
    value.filter(|p| !p.as_os_str().is_empty())
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 10] = [
        "feed_url",
        "feed_urls_file",
        "template_file",
        "output_dir",
        "date_format",
        "timeout_secs",
        "max_retries",
        "retry_backoff_ms",
        "concurrency",
        "strict",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → silently accepted (serde default behavior), logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check file size before reading to prevent memory exhaustion
        // from a maliciously large or corrupted config file.
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {} // Size is within limits, proceed
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race condition: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        // Parse the TOML content first as a raw table to detect unknown keys
        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Applies CLI/environment overrides on top of the file values.
    pub fn apply(mut self, overrides: Overrides) -> Self {
        if let Some(v) = non_empty(overrides.feed_url) {
            self.feed_url = Some(v);
        }
        if let Some(v) = non_empty_path(overrides.feed_urls_file) {
            self.feed_urls_file = Some(v);
        }
        if let Some(v) = non_empty_path(overrides.template_file) {
            self.template_file = Some(v);
        }
        if let Some(v) = non_empty_path(overrides.output_dir) {
            self.output_dir = Some(v);
        }
        if let Some(v) = non_empty(overrides.date_format) {
            self.date_format = Some(v);
        }
        if let Some(v) = overrides.timeout_secs {
            self.timeout_secs = v;
        }
        if let Some(v) = overrides.max_retries {
            self.max_retries = v;
        }
        if let Some(v) = overrides.concurrency {
            self.concurrency = v;
        }
        self.strict |= overrides.strict;
        self
    }

    pub fn fetch_policy(&self) -> FetchPolicy {
        FetchPolicy {
            timeout: Duration::from_secs(self.timeout_secs.max(1)),
            max_retries: self.max_retries,
            backoff: Duration::from_millis(self.retry_backoff_ms),
            ..FetchPolicy::default()
        }
    }

    /// Checks every configuration-level precondition and loads the template.
    ///
    /// Checked in order: template file, output directory, date format, feed
    /// sources. No request is made and nothing is written.
    pub async fn validate(&self) -> Result<RunConfig, ConfigError> {
        let template_path = non_empty_path(self.template_file.clone())
            .ok_or(ConfigError::MissingTemplate)?;
        let template_text = match tokio::fs::read_to_string(&template_path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::TemplateNotFound(template_path));
            }
            Err(source) => {
                return Err(ConfigError::TemplateUnreadable {
                    path: template_path,
                    source,
                });
            }
        };
        let template = Template::new(template_text);
        if template.placeholders().is_empty() {
            tracing::warn!(
                path = %template_path.display(),
                "Template contains no placeholders; every file will have the same content"
            );
        }

        let output_dir =
            non_empty_path(self.output_dir.clone()).ok_or(ConfigError::MissingOutputDir)?;

        let date_format = match non_empty(self.date_format.clone()) {
            Some(format) => DateFormat::parse(&format)?,
            None => DateFormat::default(),
        };

        let feed_url = non_empty(self.feed_url.clone());
        let list_file = non_empty_path(self.feed_urls_file.clone());
        let sources = resolve_sources(feed_url.as_deref(), list_file.as_deref()).await?;

        Ok(RunConfig {
            sources,
            template,
            output_dir,
            date_format,
            fetch: self.fetch_policy(),
            concurrency: self.concurrency.max(1),
            policy: if self.strict {
                RunPolicy::Strict
            } else {
                RunPolicy::Lenient
            },
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("feed2md_config_test_{name}"));
        std::fs::remove_dir_all(&dir).ok();
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.feed_url.is_none());
        assert!(config.template_file.is_none());
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.max_retries, 0);
        assert_eq!(config.concurrency, 1);
        assert!(!config.strict);
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/feed2md_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn test_whitespace_only_file_returns_default() {
        let dir = test_dir("whitespace");
        let path = dir.join("config.toml");
        std::fs::write(&path, "   \n  \n  ").unwrap();

        let config = Config::load(&path).unwrap();
        assert!(config.output_dir.is_none());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_full_config() {
        let dir = test_dir("full");
        let path = dir.join("config.toml");

        let content = r#"
feed_url = "https://example.com/feed.xml"
feed_urls_file = "feeds.txt"
template_file = "template.md"
output_dir = "posts"
date_format = "%d-%m-%Y"
timeout_secs = 10
max_retries = 2
retry_backoff_ms = 250
concurrency = 4
strict = true
"#;
        std::fs::write(&path, content).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(
            config.feed_url.as_deref(),
            Some("https://example.com/feed.xml")
        );
        assert_eq!(config.feed_urls_file, Some(PathBuf::from("feeds.txt")));
        assert_eq!(config.template_file, Some(PathBuf::from("template.md")));
        assert_eq!(config.output_dir, Some(PathBuf::from("posts")));
        assert_eq!(config.date_format.as_deref(), Some("%d-%m-%Y"));
        assert_eq!(config.timeout_secs, 10);
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.retry_backoff_ms, 250);
        assert_eq!(config.concurrency, 4);
        assert!(config.strict);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let dir = test_dir("invalid");
        let path = dir.join("config.toml");
        std::fs::write(&path, "this is not [valid toml").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let dir = test_dir("unknown");
        let path = dir.join("config.toml");
        std::fs::write(&path, "output_dir = \"out\"\ntotally_fake_key = 42\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.output_dir, Some(PathBuf::from("out")));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_wrong_type_returns_error() {
        let dir = test_dir("wrongtype");
        let path = dir.join("config.toml");
        std::fs::write(&path, "timeout_secs = \"soon\"\n").unwrap();

        assert!(Config::load(&path).is_err());

        std::fs::remove_dir_all(&dir).ok();
    }

    // size limit
    #[test]
    fn test_too_large_file_rejected() {
        let dir = test_dir("too_large");
        let path = dir.join("config.toml");
        std::fs::write(&path, "a".repeat(1_048_577)).unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_overrides_replace_file_values() {
        let config = Config {
            feed_url: Some("https://file/feed".into()),
            output_dir: Some(PathBuf::from("file-out")),
            ..Config::default()
        }
        .apply(Overrides {
            feed_url: Some("https://cli/feed".into()),
            max_retries: Some(3),
            strict: true,
            ..Overrides::default()
        });

        assert_eq!(config.feed_url.as_deref(), Some("https://cli/feed"));
        assert_eq!(config.output_dir, Some(PathBuf::from("file-out")));
        assert_eq!(config.max_retries, 3);
        assert!(config.strict);
    }

    #[test]
    fn test_empty_overrides_are_ignored() {
        let config = Config {
            feed_url: Some("https://file/feed".into()),
            ..Config::default()
        }
        .apply(Overrides {
            feed_url: Some(String::new()),
            template_file: Some(PathBuf::new()),
            ..Overrides::default()
        });

        assert_eq!(config.feed_url.as_deref(), Some("https://file/feed"));
        assert!(config.template_file.is_none());
    }

    #[tokio::test]
    async fn test_validate_missing_template() {
        let config = Config {
            feed_url: Some("https://a/feed".into()),
            template_file: Some(PathBuf::from("/tmp/feed2md_no_such_template.md")),
            output_dir: Some(PathBuf::from("out")),
            ..Config::default()
        };
        let err = config.validate().await.unwrap_err();
        assert!(matches!(err, ConfigError::TemplateNotFound(_)));
        assert!(err
            .to_string()
            .contains("Template file '/tmp/feed2md_no_such_template.md' does not exist."));

        let err = Config::default().validate().await.unwrap_err();
        assert!(matches!(err, ConfigError::MissingTemplate));
    }

    #[tokio::test]
    async fn test_validate_requires_output_dir() {
        let dir = test_dir("no_output");
        let template = dir.join("template.md");
        std::fs::write(&template, "[TITLE]").unwrap();

        let config = Config {
            feed_url: Some("https://a/feed".into()),
            template_file: Some(template),
            ..Config::default()
        };
        assert!(matches!(
            config.validate().await,
            Err(ConfigError::MissingOutputDir)
        ));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_validate_no_feed_urls() {
        let dir = test_dir("no_urls");
        let template = dir.join("template.md");
        std::fs::write(&template, "[TITLE]").unwrap();

        let config = Config {
            template_file: Some(template),
            output_dir: Some(dir.join("out")),
            ..Config::default()
        };
        let err = config.validate().await.unwrap_err();
        assert!(matches!(err, ConfigError::Sources(SourceError::NoFeedUrls)));
        assert_eq!(err.to_string(), "no feed URLs provided");
        assert!(!dir.join("out").exists());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_validate_bad_date_format() {
        let dir = test_dir("bad_date");
        let template = dir.join("template.md");
        std::fs::write(&template, "[DATE]").unwrap();

        let config = Config {
            feed_url: Some("https://a/feed".into()),
            template_file: Some(template),
            output_dir: Some(dir.join("out")),
            date_format: Some("%Q".into()),
            ..Config::default()
        };
        assert!(matches!(
            config.validate().await,
            Err(ConfigError::DateFormat(_))
        ));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_validate_success() {
        let dir = test_dir("valid");
        let template = dir.join("template.md");
        std::fs::write(&template, "# [TITLE]").unwrap();

        let config = Config {
            feed_url: Some("https://a/feed".into()),
            template_file: Some(template),
            output_dir: Some(dir.join("out")),
            concurrency: 0,
            strict: true,
            ..Config::default()
        };
        let run = config.validate().await.unwrap();
        assert_eq!(run.sources, vec![FeedSource::new("https://a/feed")]);
        assert_eq!(run.template.as_str(), "# [TITLE]");
        assert_eq!(run.date_format, DateFormat::default());
        assert_eq!(run.concurrency, 1);
        assert_eq!(run.policy, RunPolicy::Strict);
        assert_eq!(run.fetch.timeout, Duration::from_secs(30));

        std::fs::remove_dir_all(&dir).ok();
    }
}
