//! Property tests for the pure stages: normalization, slugs and rendering.

use feed2md::feed::RawFeedItem;
use feed2md::item::{normalize, normalize_title, DateFormat, NormalizedItem};
use feed2md::slug::{make_slug, SlugRegistry, MAX_SLUG_LEN};
use feed2md::template::Template;
use proptest::prelude::*;

fn raw_item() -> impl Strategy<Value = RawFeedItem> {
    (
        proptest::option::of(".*"),
        proptest::option::of(".*"),
        proptest::option::of(".*"),
        proptest::option::of(prop_oneof![
            Just("2024-01-05T00:00:00Z".to_string()),
            Just("Fri, 05 Jan 2024 00:00:00 GMT".to_string()),
            ".*",
        ]),
        proptest::option::of(".*"),
    )
        .prop_map(|(title, description, link, published, enclosure)| RawFeedItem {
            title,
            description,
            link,
            published,
            enclosure,
        })
}

proptest! {
    #[test]
    fn normalized_title_has_only_allowed_chars(raw in raw_item()) {
        let item = normalize(&raw, &DateFormat::default());
        prop_assert!(item
            .title
            .chars()
            .all(|c| c.is_alphanumeric() || c.is_whitespace() || c == '-'));
    }

    #[test]
    fn missing_fields_become_empty_strings(raw in raw_item()) {
        let item = normalize(&raw, &DateFormat::default());
        if raw.description.is_none() {
            prop_assert_eq!(item.description, "");
        }
        if raw.link.is_none() {
            prop_assert_eq!(item.link, "");
        }
        if raw.enclosure.is_none() {
            prop_assert_eq!(item.thumbnail, "");
        }
        if raw.published.is_none() {
            prop_assert_eq!(item.publish_date, "");
        }
    }

    #[test]
    fn publish_date_is_iso_or_empty(raw in raw_item()) {
        let item = normalize(&raw, &DateFormat::default());
        let d = item.publish_date.as_bytes();
        let n = d.len();
        prop_assert!(
            n == 0 || (n >= 10 && d[n - 3] == b'-' && d[n - 6] == b'-'),
            "unexpected date {:?}", item.publish_date
        );
    }

    #[test]
    fn title_normalization_is_idempotent(title in ".*") {
        let once = normalize_title(&title);
        prop_assert_eq!(normalize_title(&once), once);
    }

    #[test]
    fn slug_is_bounded_and_deterministic(date in ".{0,30}", title in ".{0,200}") {
        let slug = make_slug(&date, &title);
        prop_assert!(!slug.is_empty());
        prop_assert!(slug.chars().count() <= MAX_SLUG_LEN);
        prop_assert!(!slug.contains(['/', '\\', ':', '*', '?', '"', '<', '>', '|']));
        prop_assert!(!slug.chars().any(char::is_control));
        prop_assert_eq!(make_slug(&date, &title), slug);
    }

    #[test]
    fn registry_never_repeats_and_stays_bounded(titles in proptest::collection::vec("[a-c ]{0,60}", 1..20)) {
        let mut registry = SlugRegistry::new();
        let mut seen = std::collections::HashSet::new();
        for title in &titles {
            let slug = registry.claim(&make_slug("2024-01-05", title));
            prop_assert!(slug.chars().count() <= MAX_SLUG_LEN);
            prop_assert!(seen.insert(slug.to_lowercase()));
        }
    }

    #[test]
    fn rendering_empty_item_removes_all_tokens(prefix in "[^\\[]*", suffix in "[^\\[]*") {
        let text = format!("{prefix}[TITLE][DESCRIPTION][THUMBNAIL][LINK][DATE]{suffix}");
        let rendered = Template::new(text).render(&NormalizedItem::default());
        prop_assert_eq!(rendered, format!("{prefix}{suffix}"));
    }
}

#[test]
fn slug_for_title_of_only_disallowed_chars() {
    let item = normalize(
        &RawFeedItem {
            title: Some("!!! ??? ***".into()),
            ..Default::default()
        },
        &DateFormat::default(),
    );
    assert_eq!(make_slug(&item.publish_date, &item.title), "untitled");
}

#[test]
fn slug_for_title_longer_than_limit() {
    let title = "word ".repeat(40);
    let slug = make_slug("2024-01-05", &title);
    assert!(slug.chars().count() <= MAX_SLUG_LEN);
    assert!(slug.starts_with("2024-01-05-word-word"));
}
