//! SOAP Faults pour UPnP

use xmltree::Element;

use super::envelope::child_element;

/// `UPnPError` detail of a SOAP fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpnpFault {
    /// Code d'erreur UPnP (ex: 401, 701)
    pub error_code: u32,

    /// Description de l'erreur, vide si le device n'en fournit pas
    pub error_description: String,
}

impl UpnpFault {
    /// Extracts `Fault/detail/UPnPError` from a SOAP body.
    pub(crate) fn from_body(body: &Element) -> Option<Self> {
        let fault = child_element(body, "Fault")?;
        let detail = child_element(fault, "detail")?;
        let upnp_error = child_element(detail, "UPnPError")?;

        let error_code = child_element(upnp_error, "errorCode")?
            .get_text()?
            .trim()
            .parse::<u32>()
            .ok()?;

        let error_description = child_element(upnp_error, "errorDescription")
            .and_then(|elem| elem.get_text())
            .map(|text| text.trim().to_string())
            .unwrap_or_default();

        Some(Self {
            error_code,
            error_description,
        })
    }
}
