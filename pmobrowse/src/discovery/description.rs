use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
use ureq::Agent;

use crate::device::{ContentDirectoryEndpoint, MediaDevice, resolve_control_url};

#[derive(Debug, Error)]
pub enum DescriptionError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] ureq::Error),

    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::DeError),

    #[error("Missing required device element: {0}")]
    MissingField(&'static str),
}

#[derive(Debug, Deserialize)]
struct DescriptionRoot {
    #[serde(rename = "URLBase", default)]
    url_base: Option<String>,
    device: DeviceElement,
}

#[derive(Debug, Deserialize)]
struct DeviceElement {
    #[serde(rename = "deviceType", default)]
    device_type: String,
    #[serde(rename = "friendlyName", default)]
    friendly_name: String,
    #[serde(rename = "UDN", default)]
    udn: String,
    #[serde(default)]
    manufacturer: String,
    #[serde(rename = "modelName", default)]
    model_name: String,
    #[serde(rename = "serviceList", default)]
    service_list: Option<ServiceList>,
}

#[derive(Debug, Deserialize)]
struct ServiceList {
    #[serde(rename = "service", default)]
    services: Vec<ServiceElement>,
}

#[derive(Debug, Deserialize)]
struct ServiceElement {
    #[serde(rename = "serviceType", default)]
    service_type: String,
    #[serde(rename = "controlURL", default)]
    control_url: String,
}

/// Reads the root `<device>` of a description document.
///
/// Relative control URLs are resolved against `URLBase` when present, else
/// against `location`. Embedded devices are ignored.
pub fn parse_description(xml: &str, location: &str) -> Result<MediaDevice, DescriptionError> {
    let root: DescriptionRoot = quick_xml::de::from_str(xml)?;
    let device = root.device;

    let udn = device.udn.trim();
    if udn.is_empty() {
        return Err(DescriptionError::MissingField("UDN"));
    }
    let device_type = device.device_type.trim();
    if device_type.is_empty() {
        return Err(DescriptionError::MissingField("deviceType"));
    }
    let friendly_name = match device.friendly_name.trim() {
        "" => udn,
        name => name,
    };

    let base = root
        .url_base
        .as_deref()
        .map(str::trim)
        .filter(|base| !base.is_empty())
        .unwrap_or(location);

    let mut media_device = MediaDevice::new(udn, friendly_name, device_type)
        .with_location(location)
        .with_model(device.manufacturer.trim(), device.model_name.trim());

    let content_directory = device
        .service_list
        .iter()
        .flat_map(|list| list.services.iter())
        .find(|service| {
            ContentDirectoryEndpoint::is_content_directory(service.service_type.trim())
                && !service.control_url.trim().is_empty()
        });

    if let Some(service) = content_directory {
        let control_url = resolve_control_url(base, service.control_url.trim());
        debug!(udn, control_url = %control_url, "Found ContentDirectory service");
        media_device = media_device.with_content_directory(ContentDirectoryEndpoint::new(
            service.service_type.trim(),
            control_url,
        ));
    }

    Ok(media_device)
}

/// GETs and parses the description at `location`.
pub fn fetch_description(agent: &Agent, location: &str) -> Result<MediaDevice, DescriptionError> {
    debug!(location, "Fetching device description");
    let mut response = agent.get(location).call()?;
    let xml = response.body_mut().read_to_string()?;
    parse_description(&xml, location)
}
