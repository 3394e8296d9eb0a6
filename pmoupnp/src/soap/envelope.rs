//! Lecture des enveloppes SOAP renvoyées par un device

use std::io::BufReader;

use thiserror::Error;
use xmltree::{Element, XMLNode};

use super::fault::UpnpFault;

/// Erreur de parsing SOAP
#[derive(Debug, Error)]
pub enum SoapParseError {
    #[error("XML parse error: {0}")]
    Xml(#[from] xmltree::ParseError),

    #[error("Missing SOAP Envelope")]
    MissingEnvelope,

    #[error("Missing SOAP Body")]
    MissingBody,
}

/// Parsed SOAP envelope. Only the body is kept: UPnP never uses SOAP headers
/// on the response path.
#[derive(Debug, Clone)]
pub struct SoapEnvelope {
    pub body: Element,
}

impl SoapEnvelope {
    /// Returns the `<u:{action}Response>` element, if the body carries one.
    pub fn response(&self, action: &str) -> Option<&Element> {
        let expected = format!("{}Response", action);
        child_element(&self.body, &expected)
    }

    /// Text of one output argument of `<u:{action}Response>`.
    ///
    /// A present but empty argument yields `Some("")`.
    pub fn response_value(&self, action: &str, argument: &str) -> Option<String> {
        let response = self.response(action)?;
        let value = child_element(response, argument)?;
        Some(
            value
                .get_text()
                .map(|text| text.into_owned())
                .unwrap_or_default(),
        )
    }

    /// The UPnP error carried by a `<s:Fault>`, if any.
    pub fn fault(&self) -> Option<UpnpFault> {
        UpnpFault::from_body(&self.body)
    }
}

/// Parse une enveloppe SOAP complète
pub fn parse_soap_envelope(xml: &[u8]) -> Result<SoapEnvelope, SoapParseError> {
    let root = Element::parse(BufReader::new(xml))?;

    if root.name != "Envelope" {
        return Err(SoapParseError::MissingEnvelope);
    }

    let body = child_element(&root, "Body")
        .cloned()
        .ok_or(SoapParseError::MissingBody)?;

    Ok(SoapEnvelope { body })
}

/// Child lookup on the local name, ignoring namespace prefixes.
pub(crate) fn child_element<'a>(parent: &'a Element, name: &str) -> Option<&'a Element> {
    parent.children.iter().find_map(|node| match node {
        XMLNode::Element(elem) if elem.name == name => Some(elem),
        _ => None,
    })
}
