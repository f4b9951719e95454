use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

/// Errors produced while turning a feed body into items.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The body is not well-formed XML
    #[error("XML parse error: {0}")]
    Xml(String),
    /// The root element is neither RSS, RDF nor Atom
    #[error("not a feed: unexpected root element <{0}>")]
    NotAFeed(String),
    /// The body contained no root element at all
    #[error("not a feed: document is empty")]
    Empty,
    /// RSS root without a `<channel>` container
    #[error("RSS document has no <channel> element")]
    MissingChannel,
    /// Atom document rejected by `feed-rs`
    #[error("Atom parse error: {0}")]
    Atom(String),
}

/// One feed entry as it appears in the document, before normalization.
///
/// Every field holds the text of the first matching element, or `None` when
/// the item does not carry that element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFeedItem {
    pub title: Option<String>,
    pub description: Option<String>,
    pub link: Option<String>,
    pub published: Option<String>,
    pub enclosure: Option<String>,
}

/// Field of [`RawFeedItem`] a child element maps onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Description,
    /// `content:encoded`, used only when the item has no `<description>`
    Content,
    Link,
    Published,
}

impl Field {
    fn from_tag(name: &[u8]) -> Option<Self> {
        match name {
            b"title" => Some(Field::Title),
            b"description" => Some(Field::Description),
            b"content:encoded" => Some(Field::Content),
            b"link" => Some(Field::Link),
            b"pubDate" | b"dc:date" | b"published" | b"updated" => Some(Field::Published),
            _ => None,
        }
    }
}

/// Parses a feed body into items in document order.
///
/// RSS 2.0 and RSS 1.0 (RDF) are read directly with `quick-xml`; Atom
/// documents are handed to `feed-rs` and mapped onto the same shape.
///
/// # Errors
///
/// Returns [`ParseError`] when the body is not XML, has an unknown root
/// element, or is RSS without a `<channel>`. Missing tags on an item are never
/// an error.
pub fn parse_feed(xml: &str) -> Result<Vec<RawFeedItem>, ParseError> {
    match root_element(xml)?.as_str() {
        "rss" | "rdf:RDF" | "RDF" => parse_rss(xml),
        "feed" => parse_atom(xml),
        other => Err(ParseError::NotAFeed(other.to_string())),
    }
}

/// Name of the first element in the document.
fn root_element(xml: &str) -> Result<String, ParseError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                return Ok(String::from_utf8_lossy(e.name().as_ref()).into_owned());
            }
            Ok(Event::Eof) => return Err(ParseError::Empty),
            Err(e) => return Err(ParseError::Xml(e.to_string())),
            _ => {}
        }
    }
}

/// In-progress state for the item currently being read.
#[derive(Default)]
struct ItemBuilder {
    item: RawFeedItem,
    content: Option<String>,
    /// Fallback thumbnail from `media:thumbnail` / `media:content`
    media: Option<String>,
    /// Field being captured and the text gathered so far
    capture: Option<(Field, usize, String)>,
}

impl ItemBuilder {
    fn finish(mut self) -> RawFeedItem {
        if self.item.description.is_none() {
            self.item.description = self.content;
        }
        if self.item.enclosure.is_none() {
            self.item.enclosure = self.media;
        }
        self.item
    }

    fn store(&mut self, field: Field, text: String) {
        let (slot, trim) = match field {
            Field::Title => (&mut self.item.title, true),
            Field::Description => (&mut self.item.description, false),
            Field::Content => (&mut self.content, false),
            Field::Link => (&mut self.item.link, false),
            Field::Published => (&mut self.item.published, true),
        };
        // First value wins
        if slot.is_none() {
            *slot = Some(if trim { text.trim().to_string() } else { text });
        }
    }

    fn push_text(&mut self, text: &str) {
        if let Some((_, _, buf)) = self.capture.as_mut() {
            buf.push_str(text);
        }
    }

    fn media_element(&mut self, e: &BytesStart<'_>, reader: &Reader<&[u8]>) {
        match e.name().as_ref() {
            b"enclosure" => {
                if self.item.enclosure.is_none() {
                    self.item.enclosure = url_attribute(e, reader);
                }
            }
            b"media:thumbnail" | b"media:content" => {
                if self.media.is_none() {
                    self.media = url_attribute(e, reader);
                }
            }
            _ => {}
        }
    }
}

fn parse_rss(xml: &str) -> Result<Vec<RawFeedItem>, ParseError> {
    // quick-xml (0.37) never expands <!ENTITY> declarations, only the
    // five XML builtins. The version pin in Cargo.toml keeps it that way.
    // Text is not trimmed per event so markup nested inside a field keeps its
    // spacing. Only title and date are trimmed, once on store.
    let mut reader = Reader::from_str(xml);

    let mut items = Vec::new();
    let mut depth: usize = 0;
    let mut saw_channel = false;
    // Depth of the open <item> element, if any
    let mut item_depth: Option<usize> = None;
    let mut current = ItemBuilder::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                depth += 1;
                let name = e.name();
                match item_depth {
                    None if name.as_ref() == b"channel" => saw_channel = true,
                    None if name.as_ref() == b"item" => {
                        item_depth = Some(depth);
                        current = ItemBuilder::default();
                    }
                    Some(d) if depth == d + 1 && current.capture.is_none() => {
                        current.media_element(&e, &reader);
                        if let Some(field) = Field::from_tag(name.as_ref()) {
                            current.capture = Some((field, depth, String::new()));
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Empty(e)) => match item_depth {
                Some(d) if depth == d && current.capture.is_none() => {
                    current.media_element(&e, &reader);
                    if let Some(field) = Field::from_tag(e.name().as_ref()) {
                        current.store(field, String::new());
                    }
                }
                None if e.name().as_ref() == b"channel" => saw_channel = true,
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if item_depth.is_some() {
                    let text = e
                        .unescape()
                        .map(|t| t.into_owned())
                        .unwrap_or_else(|_| String::from_utf8_lossy(&e).into_owned());
                    current.push_text(&text);
                }
            }
            Ok(Event::CData(e)) => {
                if item_depth.is_some() {
                    current.push_text(&String::from_utf8_lossy(&e));
                }
            }
            Ok(Event::End(e)) => {
                let closes_capture = matches!(current.capture, Some((_, d, _)) if d == depth);
                if closes_capture {
                    if let Some((field, _, text)) = current.capture.take() {
                        current.store(field, text);
                    }
                } else if item_depth == Some(depth) && e.name().as_ref() == b"item" {
                    items.push(std::mem::take(&mut current).finish());
                    item_depth = None;
                }
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ParseError::Xml(e.to_string())),
            _ => {}
        }
    }

    if !saw_channel {
        return Err(ParseError::MissingChannel);
    }

    Ok(items)
}

fn url_attribute(e: &BytesStart<'_>, reader: &Reader<&[u8]>) -> Option<String> {
    for attr_result in e.attributes() {
        let attr = match attr_result {
            Ok(attr) => attr,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed feed attribute");
                continue;
            }
        };
        if attr.key.as_ref() == b"url" {
            return attr
                .decode_and_unescape_value(reader.decoder())
                .ok()
                .map(|v| v.into_owned());
        }
    }
    None
}

fn parse_atom(xml: &str) -> Result<Vec<RawFeedItem>, ParseError> {
    let feed =
        feed_rs::parser::parse(xml.as_bytes()).map_err(|e| ParseError::Atom(e.to_string()))?;

    let items = feed
        .entries
        .into_iter()
        .map(|entry| {
            let link = entry
                .links
                .iter()
                .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
                .or_else(|| entry.links.first())
                .map(|l| l.href.clone());
            let enclosure = entry
                .links
                .iter()
                .find(|l| l.rel.as_deref() == Some("enclosure"))
                .map(|l| l.href.clone())
                .or_else(|| {
                    entry
                        .media
                        .iter()
                        .flat_map(|m| m.thumbnails.iter())
                        .map(|t| t.image.uri.clone())
                        .next()
                });
            let description = entry
                .summary
                .map(|s| s.content)
                .or_else(|| entry.content.and_then(|c| c.body));

            RawFeedItem {
                title: entry.title.map(|t| t.content),
                description,
                link,
                published: entry.published.or(entry.updated).map(|dt| dt.to_rfc3339()),
                enclosure,
            }
        })
        .collect();

    Ok(items)
}
