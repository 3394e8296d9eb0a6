//! # pmodidl - DIDL-Lite Parser
//!
//! Parser for the DIDL-Lite documents a ContentDirectory returns in the
//! `Result` argument of `Browse`.
//!
//! Containers and items are returned as one sequence, in document order: the
//! server's ordering (possibly the one requested through `SortCriteria`) is
//! what a browser has to show, so the two kinds are never split apart.
//!
//! Entries are parsed leniently: a missing `id` or title is reported as
//! `None` and left for the caller to judge. Only XML that cannot be read at all
//! is an error.

use std::io::BufReader;

use thiserror::Error;
use xmltree::{Element, XMLNode};

#[derive(Debug, Error)]
pub enum DidlError {
    #[error("Invalid DIDL-Lite XML: {0}")]
    Xml(#[from] xmltree::ParseError),

    #[error("Root element is <{0}>, expected <DIDL-Lite>")]
    NotDidl(String),
}

/// Kind of a top-level DIDL-Lite entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DidlKind {
    Container,
    Item,
}

/// One `<res>` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DidlResource {
    pub uri: String,
    pub protocol_info: Option<String>,
}

impl DidlResource {
    /// True when the protocolInfo advertises an audio or video MIME type.
    pub fn is_media(&self) -> bool {
        self.protocol_info
            .as_deref()
            .and_then(|info| info.split(':').nth(2))
            .map(|mime| {
                let mime = mime.to_ascii_lowercase();
                mime.starts_with("audio/") || mime.starts_with("video/")
            })
            .unwrap_or(false)
    }
}

/// A container or item, as listed by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DidlEntry {
    pub kind: DidlKind,
    pub id: Option<String>,
    pub title: Option<String>,
    pub resources: Vec<DidlResource>,
}

impl DidlEntry {
    pub fn is_container(&self) -> bool {
        self.kind == DidlKind::Container
    }

    /// The resource a player should open: the first audio or video one,
    /// else the first carrying a non-empty URI.
    pub fn primary_resource(&self) -> Option<&DidlResource> {
        let mut usable = self.resources.iter().filter(|res| !res.uri.trim().is_empty());
        let first = usable.clone().next();
        usable.find(|res| res.is_media()).or(first)
    }
}

/// Parses a DIDL-Lite listing.
///
/// An empty (or whitespace-only) payload is a valid empty listing; some
/// servers answer that way for empty containers.
pub fn parse_didl(xml: &str) -> Result<Vec<DidlEntry>, DidlError> {
    let trimmed = xml.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let root = Element::parse(BufReader::new(trimmed.as_bytes()))?;
    if root.name != "DIDL-Lite" {
        return Err(DidlError::NotDidl(root.name));
    }

    let entries = root
        .children
        .iter()
        .filter_map(XMLNode::as_element)
        .filter_map(|elem| {
            let kind = match elem.name.as_str() {
                "container" => DidlKind::Container,
                "item" => DidlKind::Item,
                // <desc> and vendor extensions at top level
                _ => return None,
            };
            Some(parse_entry(kind, elem))
        })
        .collect();

    Ok(entries)
}

fn parse_entry(kind: DidlKind, elem: &Element) -> DidlEntry {
    let mut entry = DidlEntry {
        kind,
        id: non_empty_attribute(elem, "id"),
        title: None,
        resources: Vec::new(),
    };

    for child in elem.children.iter().filter_map(XMLNode::as_element) {
        match child.name.as_str() {
            "title" => entry.title = element_text(child),
            "res" => entry.resources.push(DidlResource {
                uri: element_text(child).unwrap_or_default(),
                protocol_info: non_empty_attribute(child, "protocolInfo"),
            }),
            _ => {}
        }
    }

    entry
}

fn non_empty_attribute(elem: &Element, name: &str) -> Option<String> {
    elem.attributes
        .get(name)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn element_text(elem: &Element) -> Option<String> {
    elem.get_text()
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}
