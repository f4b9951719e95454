//! Placeholder substitution over a user-supplied template.

use crate::item::NormalizedItem;

/// The fixed set of tokens a template may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    Title,
    Description,
    Thumbnail,
    Link,
    Date,
}

impl Placeholder {
    pub const ALL: [Placeholder; 5] = [
        Placeholder::Title,
        Placeholder::Description,
        Placeholder::Thumbnail,
        Placeholder::Link,
        Placeholder::Date,
    ];

    pub fn token(self) -> &'static str {
        match self {
            Placeholder::Title => "[TITLE]",
            Placeholder::Description => "[DESCRIPTION]",
            Placeholder::Thumbnail => "[THUMBNAIL]",
            Placeholder::Link => "[LINK]",
            Placeholder::Date => "[DATE]",
        }
    }

    fn value(self, item: &NormalizedItem) -> &str {
        match self {
            Placeholder::Title => &item.title,
            Placeholder::Description => &item.description,
            Placeholder::Thumbnail => &item.thumbnail,
            Placeholder::Link => &item.link,
            Placeholder::Date => &item.publish_date,
        }
    }
}

/// Template text loaded once per run and rendered for every item.
#[derive(Debug, Clone)]
pub struct Template {
    text: String,
}

impl Template {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Placeholders that occur at least once in the template.
    pub fn placeholders(&self) -> Vec<Placeholder> {
        Placeholder::ALL
            .into_iter()
            .filter(|p| self.text.contains(p.token()))
            .collect()
    }

    /// Replaces every occurrence of every placeholder with the item's field.
    ///
    /// The scan runs once over the template, so values are inserted verbatim:
    /// a description that itself contains `[LINK]` is not substituted again.
    /// Bracketed text that is not a known token is left untouched.
    pub fn render(&self, item: &NormalizedItem) -> String {
        let mut out = String::with_capacity(self.text.len());
        let mut rest = self.text.as_str();

        while let Some(pos) = rest.find('[') {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos..];
            match Placeholder::ALL
                .into_iter()
                .find(|p| tail.starts_with(p.token()))
            {
                Some(p) => {
                    out.push_str(p.value(item));
                    rest = &tail[p.token().len()..];
                }
                None => {
                    out.push('[');
                    rest = &tail[1..];
                }
            }
        }
        out.push_str(rest);

        out
    }
}
