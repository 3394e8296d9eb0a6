//! # Module SOAP
//!
//! Control-point side of UPnP SOAP: building an action request, reading the
//! `<u:ActionResponse>` returned by the device and decoding `UPnPError` faults.
//!
//! ## Example
//!
//! ```
//! use pmoupnp::soap::{build_soap_request, parse_soap_envelope};
//!
//! let request = build_soap_request(
//!     "urn:schemas-upnp-org:service:ContentDirectory:1",
//!     "GetSortCapabilities",
//!     &[],
//! )
//! .unwrap();
//! assert!(request.contains("GetSortCapabilities"));
//!
//! let response = r#"<?xml version="1.0"?>
//! <s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
//!   <s:Body>
//!     <u:GetSortCapabilitiesResponse xmlns:u="urn:schemas-upnp-org:service:ContentDirectory:1">
//!       <SortCaps>dc:title,upnp:artist</SortCaps>
//!     </u:GetSortCapabilitiesResponse>
//!   </s:Body>
//! </s:Envelope>"#;
//!
//! let envelope = parse_soap_envelope(response.as_bytes()).unwrap();
//! assert_eq!(
//!     envelope.response_value("GetSortCapabilities", "SortCaps").as_deref(),
//!     Some("dc:title,upnp:artist")
//! );
//! ```

mod envelope;
mod fault;
mod request;

pub use envelope::{SoapEnvelope, SoapParseError, parse_soap_envelope};
pub use fault::UpnpFault;
pub use request::{SoapBuildError, build_soap_request, soap_action_header};

/// Codes d'erreur UPnP standards
pub mod error_codes {
    /// Action invalide
    pub const INVALID_ACTION: u32 = 401;

    /// Arguments invalides
    pub const INVALID_ARGS: u32 = 402;

    /// Action échouée
    pub const ACTION_FAILED: u32 = 501;

    /// Action optionnelle non implémentée
    pub const OPTIONAL_ACTION_NOT_IMPLEMENTED: u32 = 602;

    /// ContentDirectory : l'objet demandé n'existe pas
    pub const NO_SUCH_OBJECT: u32 = 701;

    /// ContentDirectory : critère de tri non supporté
    pub const UNSUPPORTED_SORT_CRITERIA: u32 = 709;

    /// ContentDirectory : le container demandé n'existe pas
    pub const NO_SUCH_CONTAINER: u32 = 710;
}
