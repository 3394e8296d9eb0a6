//! Construction des requêtes SOAP

use thiserror::Error;
use xmltree::{Element, EmitterConfig, XMLNode};

const ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
const ENCODING_STYLE: &str = "http://schemas.xmlsoap.org/soap/encoding/";

#[derive(Debug, Error)]
pub enum SoapBuildError {
    #[error("Cannot serialize SOAP envelope: {0}")]
    Emit(#[from] xmltree::Error),

    #[error("SOAP envelope is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Builds the XML body of a UPnP action invocation.
///
/// Arguments are emitted in the given order, which matters for some devices
/// that read them positionally.
pub fn build_soap_request(
    service_urn: &str,
    action: &str,
    args: &[(&str, &str)],
) -> Result<String, SoapBuildError> {
    let mut action_elem = Element::new(&format!("u:{}", action));
    action_elem
        .attributes
        .insert("xmlns:u".to_string(), service_urn.to_string());

    for (name, value) in args {
        let mut arg = Element::new(*name);
        arg.children.push(XMLNode::Text((*value).to_string()));
        action_elem.children.push(XMLNode::Element(arg));
    }

    let mut body = Element::new("s:Body");
    body.children.push(XMLNode::Element(action_elem));

    let mut envelope = Element::new("s:Envelope");
    envelope
        .attributes
        .insert("xmlns:s".to_string(), ENVELOPE_NS.to_string());
    envelope
        .attributes
        .insert("s:encodingStyle".to_string(), ENCODING_STYLE.to_string());
    envelope.children.push(XMLNode::Element(body));

    let mut buf = Vec::new();
    let config = EmitterConfig::new()
        .write_document_declaration(true)
        .perform_indent(false);
    envelope.write_with_config(&mut buf, config)?;

    Ok(String::from_utf8(buf)?)
}

/// Value of the `SOAPACTION` HTTP header, quotes included.
pub fn soap_action_header(service_urn: &str, action: &str) -> String {
    format!(r#""{}#{}""#, service_urn, action)
}
