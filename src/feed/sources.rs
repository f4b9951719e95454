use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use thiserror::Error;

use super::opml::{looks_like_opml, parse_opml_urls, OpmlError};

/// Errors raised while building the list of feeds to process.
///
/// All of these are configuration-level: they stop the run before any feed is
/// requested.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Neither a single URL nor a non-empty list file was supplied
    #[error("no feed URLs provided")]
    NoFeedUrls,

    /// The list file exists but could not be read
    #[error("Failed to read feed URL list '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The list file is OPML but not well-formed
    #[error("Invalid OPML in feed URL list '{path}': {source}")]
    Opml {
        path: String,
        #[source]
        source: OpmlError,
    },
}

/// A feed URL to process, exactly as configured.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeedSource(String);

impl FeedSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FeedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Builds the ordered, de-duplicated list of feeds for a run.
///
/// The single `feed_url` comes first, followed by the entries of
/// `list_file` in file order. Duplicates (byte-identical after trimming) keep
/// their first position. A configured list file that does not exist is
/// skipped with a warning.
///
/// # Errors
///
/// - [`SourceError::NoFeedUrls`] - Nothing was resolved
/// - [`SourceError::Io`] - The list file exists but is unreadable
/// - [`SourceError::Opml`] - The list file is malformed OPML
pub async fn resolve_sources(
    feed_url: Option<&str>,
    list_file: Option<&Path>,
) -> Result<Vec<FeedSource>, SourceError> {
    let mut candidates: Vec<String> = Vec::new();

    if let Some(url) = feed_url.map(str::trim).filter(|u| !u.is_empty()) {
        candidates.push(url.to_string());
    }

    if let Some(path) = list_file {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => {
                let listed = parse_url_list(&content).map_err(|source| SourceError::Opml {
                    path: path.display().to_string(),
                    source,
                })?;
                tracing::debug!(path = %path.display(), count = listed.len(), "Read feed URL list");
                candidates.extend(listed);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "Feed URL list not found, skipping");
            }
            Err(source) => {
                return Err(SourceError::Io {
                    path: path.display().to_string(),
                    source,
                });
            }
        }
    }

    let mut seen = HashSet::new();
    let sources: Vec<FeedSource> = candidates
        .into_iter()
        .filter(|url| seen.insert(url.clone()))
        .map(FeedSource)
        .collect();

    if sources.is_empty() {
        return Err(SourceError::NoFeedUrls);
    }

    Ok(sources)
}

/// Splits a feed list file into URLs.
///
/// Plain text lists hold one URL per line; blank lines and `#` comments are
/// ignored. OPML documents contribute each outline's `xmlUrl`.
pub fn parse_url_list(content: &str) -> Result<Vec<String>, OpmlError> {
    if looks_like_opml(content) {
        return parse_opml_urls(content);
    }

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_list(name: &str, content: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("feed2md_sources_{name}"));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("feeds.txt");
        std::fs::write(&path, content).unwrap();
        path
    }

    fn urls(sources: &[FeedSource]) -> Vec<&str> {
        sources.iter().map(FeedSource::as_str).collect()
    }

    #[tokio::test]
    async fn test_single_url_only() {
        let sources = resolve_sources(Some("https://a/feed"), None).await.unwrap();
        assert_eq!(urls(&sources), vec!["https://a/feed"]);
    }

    #[tokio::test]
    async fn test_single_url_first_then_file_order() {
        let path = temp_list("order", "https://b/feed\n\n  https://c/feed  \n");
        let sources = resolve_sources(Some("https://a/feed"), Some(&path))
            .await
            .unwrap();
        assert_eq!(
            urls(&sources),
            vec!["https://a/feed", "https://b/feed", "https://c/feed"]
        );
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[tokio::test]
    async fn test_duplicates_keep_first_occurrence() {
        let path = temp_list(
            "dedup",
            "https://b/feed\nhttps://a/feed\nhttps://b/feed\nhttps://c/feed\n",
        );
        let sources = resolve_sources(Some("https://a/feed"), Some(&path))
            .await
            .unwrap();
        assert_eq!(
            urls(&sources),
            vec!["https://a/feed", "https://b/feed", "https://c/feed"]
        );
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[tokio::test]
    async fn test_comments_ignored() {
        let path = temp_list("comments", "# my feeds\nhttps://a/feed\n   # old\n");
        let sources = resolve_sources(None, Some(&path)).await.unwrap();
        assert_eq!(urls(&sources), vec!["https://a/feed"]);
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[tokio::test]
    async fn test_opml_list_file() {
        let path = temp_list(
            "opml",
            r#"<?xml version="1.0"?><opml version="2.0"><body>
                <outline text="A" xmlUrl="https://a/feed"/>
                <outline text="B" xmlUrl="https://b/feed"/>
            </body></opml>"#,
        );
        let sources = resolve_sources(None, Some(&path)).await.unwrap();
        assert_eq!(urls(&sources), vec!["https://a/feed", "https://b/feed"]);
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[tokio::test]
    async fn test_nothing_configured_is_error() {
        assert!(matches!(
            resolve_sources(None, None).await,
            Err(SourceError::NoFeedUrls)
        ));
        assert!(matches!(
            resolve_sources(Some("   "), None).await,
            Err(SourceError::NoFeedUrls)
        ));
    }

    #[tokio::test]
    async fn test_empty_or_missing_list_file_is_error() {
        let path = temp_list("empty", "\n   \n");
        assert!(matches!(
            resolve_sources(None, Some(&path)).await,
            Err(SourceError::NoFeedUrls)
        ));
        std::fs::remove_dir_all(path.parent().unwrap()).ok();

        let missing = Path::new("/tmp/feed2md_no_such_dir/feeds.txt");
        assert!(matches!(
            resolve_sources(None, Some(missing)).await,
            Err(SourceError::NoFeedUrls)
        ));
    }

    #[tokio::test]
    async fn test_missing_list_file_keeps_single_url() {
        let missing = Path::new("/tmp/feed2md_no_such_dir/feeds.txt");
        let sources = resolve_sources(Some("https://a/feed"), Some(missing))
            .await
            .unwrap();
        assert_eq!(urls(&sources), vec!["https://a/feed"]);
    }
}
