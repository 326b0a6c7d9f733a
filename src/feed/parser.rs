use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

use super::types::{Project, NOT_AVAILABLE, UNKNOWN};
use crate::util::{base_url, sanitize_url};

/// Errors that can occur while reading a CCTray document.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The XML is malformed or an attribute value could not be decoded.
    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// The document has no root element.
    #[error("No root element found")]
    NoRootElement,

    /// A second element follows the root element.
    #[error("Multiple root elements")]
    MultipleRoots,

    /// Non-whitespace text appears outside the root element.
    #[error("Text outside the root element")]
    TextOutsideRoot,

    /// The document ended with unclosed elements.
    #[error("Document ended with {0} unclosed element(s)")]
    Truncated(usize),
}

/// Attributes of one `<Project>` element as they appear in the document.
///
/// Missing attributes stay `None` until [`ProjectAttributes::into_project`]
/// substitutes the CCTray defaults.
#[derive(Debug, Default)]
struct ProjectAttributes {
    name: Option<String>,
    activity: Option<String>,
    last_build_status: Option<String>,
    last_build_label: Option<String>,
    last_build_time: Option<String>,
    web_url: Option<String>,
    category: Option<String>,
}

impl ProjectAttributes {
    fn read(e: &BytesStart<'_>, reader: &Reader<&[u8]>) -> Result<Self, ParseError> {
        let mut attrs = Self::default();
        let decoder = reader.decoder();

        for attr_result in e.attributes() {
            let attr = match attr_result {
                Ok(attr) => attr,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping malformed Project attribute");
                    continue;
                }
            };
            let slot = match attr.key.as_ref() {
                b"name" => &mut attrs.name,
                b"activity" => &mut attrs.activity,
                b"lastBuildStatus" => &mut attrs.last_build_status,
                b"lastBuildLabel" => &mut attrs.last_build_label,
                b"lastBuildTime" => &mut attrs.last_build_time,
                b"webUrl" => &mut attrs.web_url,
                b"category" => &mut attrs.category,
                _ => continue,
            };
            *slot = Some(attr.decode_and_unescape_value(decoder)?.into_owned());
        }

        Ok(attrs)
    }

    fn into_project(self, feed: &FeedContext<'_>) -> Project {
        let web_url = match self.web_url.as_deref() {
            Some(url) if !url.is_empty() => sanitize_url(url, feed.feed_url, feed.main_url),
            _ => String::new(),
        };

        Project {
            name: self.name.unwrap_or_else(|| UNKNOWN.to_string()),
            activity: self.activity.unwrap_or_else(|| UNKNOWN.to_string()),
            last_build_status: self.last_build_status.unwrap_or_else(|| UNKNOWN.to_string()),
            last_build_label: self
                .last_build_label
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            last_build_time: self
                .last_build_time
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            web_url,
            category: self.category.unwrap_or_default(),
            feed_name: feed.name.to_string(),
            feed_base_url: feed.base_url.clone(),
        }
    }
}

/// Per-feed values shared by every project of one document.
struct FeedContext<'a> {
    name: &'a str,
    feed_url: &'a str,
    main_url: &'a str,
    base_url: String,
}

/// Parses a CCTray document into projects, in document order.
///
/// Only `<Project>` elements that are direct children of the root element
/// are read. Each project's `webUrl` is sanitized against `feed_url` and
/// `main_url`, and every project carries the same `feedBaseUrl`: the base of
/// `main_url` when it is non-empty, otherwise the base of `feed_url`.
///
/// # Returns
///
/// An empty `Vec` for empty input.
///
/// # Errors
///
/// Returns [`ParseError`] for malformed XML, a missing or repeated root
/// element, stray text outside the root, or a truncated document. No partial project list is returned on error.
pub fn parse_cctray(
    xml: &str,
    feed_name: &str,
    feed_url: &str,
    main_url: &str,
) -> Result<Vec<Project>, ParseError> {
    if xml.is_empty() {
        return Ok(Vec::new());
    }

    let feed = FeedContext {
        name: feed_name,
        feed_url,
        main_url,
        base_url: if main_url.is_empty() {
            base_url(feed_url)
        } else {
            base_url(main_url)
        },
    };

    // quick-xml (0.37) never expands <!ENTITY> declarations; custom entities
    // fail in decode_and_unescape_value() instead of resolving.
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut projects = Vec::new();
    let mut buf = Vec::new();
    let mut depth: usize = 0;
    let mut saw_root = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                if depth == 0 && saw_root {
                    return Err(ParseError::MultipleRoots);
                }
                if depth == 1 && e.name().as_ref() == b"Project" {
                    projects.push(ProjectAttributes::read(&e, &reader)?.into_project(&feed));
                }
                saw_root = true;
                depth += 1;
            }
            Event::Empty(e) => {
                if depth == 0 && saw_root {
                    return Err(ParseError::MultipleRoots);
                }
                if depth == 1 && e.name().as_ref() == b"Project" {
                    projects.push(ProjectAttributes::read(&e, &reader)?.into_project(&feed));
                }
                saw_root = true;
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
            }
            // Whitespace-only text is already dropped by trim_text
            Event::Text(_) | Event::CData(_) if depth == 0 => {
                return Err(ParseError::TextOutsideRoot);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if depth > 0 {
        return Err(ParseError::Truncated(depth));
    }
    if !saw_root {
        return Err(ParseError::NoRootElement);
    }

    Ok(projects)
}
