use std::time::Duration;

use anyhow::{Context, Result};
use pmoupnp::soap::{SoapEnvelope, UpnpFault, build_soap_request, parse_soap_envelope, soap_action_header};
use ureq::Agent;

/// Result of a SOAP call: HTTP status plus the envelope when the body parsed.
pub(crate) struct SoapCallResult {
    pub status: ureq::http::StatusCode,
    pub raw_body: String,
    pub envelope: Option<SoapEnvelope>,
}

impl SoapCallResult {
    pub fn fault(&self) -> Option<UpnpFault> {
        self.envelope.as_ref().and_then(SoapEnvelope::fault)
    }
}

/// Agent that does NOT turn 4xx/5xx into errors: SOAP faults come back as
/// HTTP 500 and their body must stay readable.
pub(crate) fn soap_agent(timeout: Duration) -> Agent {
    Agent::config_builder()
        .http_status_as_error(false)
        .timeout_global(Some(timeout))
        .build()
        .into()
}

/// Invoke a UPnP SOAP action on a control URL.
pub(crate) fn invoke_upnp_action(
    agent: &Agent,
    control_url: &str,
    service_type: &str,
    action: &str,
    args: &[(&str, &str)],
) -> Result<SoapCallResult> {
    let body_xml = build_soap_request(service_type, action, args)
        .context("Failed to build SOAP request body")?;

    let mut response = agent
        .post(control_url)
        .header("Content-Type", r#"text/xml; charset="utf-8""#)
        .header("SOAPAction", &soap_action_header(service_type, action))
        .send(body_xml)
        .with_context(|| format!("HTTP error when sending {} to {}", action, control_url))?;

    let status = response.status();
    let raw_body = response
        .body_mut()
        .read_to_string()
        .context("Failed to read SOAP response body")?;

    // Une réponse non SOAP n'est pas fatale ici, l'appelant décide
    let envelope = parse_soap_envelope(raw_body.as_bytes()).ok();

    Ok(SoapCallResult {
        status,
        raw_body,
        envelope,
    })
}
