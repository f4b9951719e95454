//! Utility functions for common operations.
//!
//! This module provides reusable utilities for:
//!
//! - **URL validation**: Scheme and host checks before a feed is requested
//! - **File names**: Cross-platform file name sanitizing and char-safe truncation
//!
//! # Examples
//!
//! ```
//! use feed2md::util::{sanitize_filename, truncate_chars, validate_feed_url};
//!
//! // Validate a feed URL
//! let url = validate_feed_url("https://example.com/feed.xml").unwrap();
//!
//! // Make a string safe to use as a file name
//! let name = sanitize_filename("2024-01-05-what/now?");
//! assert_eq!(name, "2024-01-05-whatnow");
//!
//! // Bound its length without splitting a character
//! assert_eq!(truncate_chars(&name, 10), "2024-01-05");
//! ```

mod filename;
mod url_validator;

pub use filename::{is_reserved_name, sanitize_filename, truncate_chars};
pub use url_validator::{validate_feed_url, UrlValidationError};
