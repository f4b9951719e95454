//! File base names derived from an item's date and title.

use std::collections::HashSet;

use crate::util::{is_reserved_name, sanitize_filename, truncate_chars};

/// Longest slug produced, in characters.
pub const MAX_SLUG_LEN: usize = 50;

/// Slug used when date and title leave nothing usable.
pub const FALLBACK_SLUG: &str = "untitled";

/// Characters never left at the end of a slug.
const TRAILING_TRIM: [char; 3] = ['-', '.', ' '];

/// Builds `{date}-{title}` as a file-name-safe base name of at most
/// [`MAX_SLUG_LEN`] characters.
///
/// The title is lowercased and each whitespace run becomes a single `-`. When
/// only one of date and title is non-empty it is used alone, and when both
/// are empty (or the result is a reserved device name) the slug is
/// [`FALLBACK_SLUG`]. Same inputs always give the same slug.
///
/// ```
/// use feed2md::slug::make_slug;
///
/// assert_eq!(make_slug("2024-01-05", "Hello World"), "2024-01-05-hello-world");
/// assert_eq!(make_slug("", "Hello World"), "hello-world");
/// assert_eq!(make_slug("", ""), "untitled");
/// ```
pub fn make_slug(publish_date: &str, title: &str) -> String {
    let title_part = title
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-");
    let title_part = title_part.trim_matches('-');
    let date_part = publish_date.trim();

    let base = match (date_part.is_empty(), title_part.is_empty()) {
        (false, false) => format!("{date_part}-{title_part}"),
        (false, true) => date_part.to_string(),
        (true, false) => title_part.to_string(),
        (true, true) => String::new(),
    };

    let sanitized = sanitize_filename(&base);
    let slug = truncate_chars(&sanitized, MAX_SLUG_LEN)
        .trim_end_matches(TRAILING_TRIM)
        .trim_start_matches(['-', '.']);

    if slug.is_empty() || is_reserved_name(slug) {
        return FALLBACK_SLUG.to_string();
    }
    slug.to_string()
}

/// Tracks slugs handed out during one run so two items never share a file.
///
/// The first claim of a slug gets it unchanged; later claims get `-2`, `-3`,
/// ... with the base shortened so the result still fits [`MAX_SLUG_LEN`].
/// Comparison is case-insensitive to stay safe on case-folding filesystems.
#[derive(Debug, Default)]
pub struct SlugRegistry {
    used: HashSet<String>,
}

impl SlugRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a slug no earlier claim in this registry has received.
    pub fn claim(&mut self, slug: &str) -> String {
        if self.used.insert(slug.to_lowercase()) {
            return slug.to_string();
        }

        let mut n: usize = 2;
        loop {
            let suffix = format!("-{n}");
            let room = MAX_SLUG_LEN.saturating_sub(suffix.len());
            let base = truncate_chars(slug, room).trim_end_matches(TRAILING_TRIM);
            let candidate = format!("{base}{suffix}");
            if self.used.insert(candidate.to_lowercase()) {
                tracing::debug!(slug = %slug, assigned = %candidate, "Slug collision, added suffix");
                return candidate;
            }
            n += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.used.len()
    }

    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }
}
