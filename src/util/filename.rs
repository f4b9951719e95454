use std::borrow::Cow;

/// Characters that are illegal in a file name on at least one supported platform.
const ILLEGAL_CHARS: &[char] = &['/', '\\', '?', '<', '>', ':', '*', '|', '"'];

/// Device names Windows reserves regardless of extension.
const RESERVED_NAMES: &[&str] = &[
    "con", "prn", "aux", "nul", "com0", "com1", "com2", "com3", "com4", "com5", "com6", "com7",
    "com8", "com9", "lpt0", "lpt1", "lpt2", "lpt3", "lpt4", "lpt5", "lpt6", "lpt7", "lpt8",
    "lpt9",
];

/// Strips characters that cannot appear in a file name.
///
/// Removes path separators, the Windows-reserved punctuation set, C0/C1
/// control characters and DEL, then drops trailing dots and spaces (Windows
/// silently discards them, so two names differing only there would collide).
///
/// Returns `Cow::Borrowed` when nothing needs to change.
///
/// Reserved names are *not* rewritten here since the right replacement depends
/// on the caller; use [`is_reserved_name`] to check.
///
/// # Examples
///
/// ```
/// use feed2md::util::sanitize_filename;
///
/// assert_eq!(sanitize_filename("a/b:c"), "abc");
/// assert_eq!(sanitize_filename("notes. "), "notes");
/// assert_eq!(sanitize_filename("plain-name"), "plain-name");
/// ```
pub fn sanitize_filename(name: &str) -> Cow<'_, str> {
    let needs_strip = name
        .chars()
        .any(|c| ILLEGAL_CHARS.contains(&c) || c.is_control())
        || name.ends_with(['.', ' ']);

    if !needs_strip {
        return Cow::Borrowed(name);
    }

    let cleaned: String = name
        .chars()
        .filter(|c| !ILLEGAL_CHARS.contains(c) && !c.is_control())
        .collect();

    Cow::Owned(cleaned.trim_end_matches(['.', ' ']).to_string())
}

/// Returns true for names no platform will accept as a regular file name:
/// `.`, `..`, and Windows device names (`CON`, `COM1.txt`, ...) in any case.
pub fn is_reserved_name(name: &str) -> bool {
    if name == "." || name == ".." {
        return true;
    }
    let stem = name.split('.').next().unwrap_or(name).to_ascii_lowercase();
    RESERVED_NAMES.contains(&stem.as_str())
}

/// Truncates to at most `max_chars` characters, never splitting a code point.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
