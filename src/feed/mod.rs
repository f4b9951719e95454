//! Feed acquisition: which feeds to read, how to fetch them, how to parse them.
//!
//! - `sources` - Resolve the configured URL and URL list file into an ordered,
//!   de-duplicated list of [`FeedSource`]s
//! - `fetcher` - HTTP retrieval with timeout, size limit and a retry seam
//! - `parser` - RSS/RDF via `quick-xml`, Atom via `feed-rs`, both into [`RawFeedItem`]
//! - `opml` - OPML subscription lists accepted as a URL list file
//!
//! # Example
//!
//! ```ignore
//! use feed2md::feed::{build_client, fetch_feed, parse_feed, resolve_sources, FetchPolicy};
//!
//! let sources = resolve_sources(Some("https://example.com/feed.xml"), None).await?;
//! let policy = FetchPolicy::default();
//! let client = build_client(&policy)?;
//! for source in &sources {
//!     let body = fetch_feed(&client, source.as_str(), &policy).await?;
//!     let items = parse_feed(&body)?;
//! }
//! ```

mod fetcher;
mod opml;
mod parser;
mod sources;

pub use fetcher::{build_client, fetch_feed, FetchError, FetchPolicy};
pub use opml::OpmlError;
pub use parser::{parse_feed, ParseError, RawFeedItem};
pub use sources::{parse_url_list, resolve_sources, FeedSource, SourceError};
