use std::fmt;

/// Device type the browser lists at its root level.
pub const MEDIA_SERVER_URN: &str = "urn:schemas-upnp-org:device:MediaServer:1";

const CONTENT_DIRECTORY_PREFIX: &str = "urn:schemas-upnp-org:service:contentdirectory:";

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DeviceId(pub String);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// ContentDirectory endpoint of a media server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentDirectoryEndpoint {
    /// Service URN, e.g. `urn:schemas-upnp-org:service:ContentDirectory:1`
    pub service_type: String,
    /// Absolute control URL
    pub control_url: String,
}

impl ContentDirectoryEndpoint {
    pub fn new(service_type: impl Into<String>, control_url: impl Into<String>) -> Self {
        Self {
            service_type: service_type.into(),
            control_url: control_url.into(),
        }
    }

    pub fn is_content_directory(service_type: &str) -> bool {
        service_type
            .to_ascii_lowercase()
            .starts_with(CONTENT_DIRECTORY_PREFIX)
    }
}

/// Snapshot of a root device as reported by discovery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaDevice {
    id: DeviceId,
    udn: String,
    friendly_name: String,
    device_type: String,
    location: String,
    manufacturer: String,
    model_name: String,
    content_directory: Option<ContentDirectoryEndpoint>,
}

impl MediaDevice {
    pub fn new(udn: &str, friendly_name: &str, device_type: &str) -> Self {
        Self {
            id: DeviceId(udn.trim().to_ascii_lowercase()),
            udn: udn.trim().to_string(),
            friendly_name: friendly_name.to_string(),
            device_type: device_type.to_string(),
            location: String::new(),
            manufacturer: String::new(),
            model_name: String::new(),
            content_directory: None,
        }
    }

    pub fn with_location(mut self, location: &str) -> Self {
        self.location = location.to_string();
        self
    }

    pub fn with_model(mut self, manufacturer: &str, model_name: &str) -> Self {
        self.manufacturer = manufacturer.to_string();
        self.model_name = model_name.to_string();
        self
    }

    pub fn with_content_directory(mut self, endpoint: ContentDirectoryEndpoint) -> Self {
        self.content_directory = Some(endpoint);
        self
    }

    pub fn id(&self) -> &DeviceId {
        &self.id
    }

    pub fn udn(&self) -> &str {
        &self.udn
    }

    pub fn friendly_name(&self) -> &str {
        &self.friendly_name
    }

    pub fn device_type(&self) -> &str {
        &self.device_type
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn manufacturer(&self) -> &str {
        &self.manufacturer
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn content_directory(&self) -> Option<&ContentDirectoryEndpoint> {
        self.content_directory.as_ref()
    }

    /// True when the device exposes a ContentDirectory service.
    pub fn supports_browsing(&self) -> bool {
        self.content_directory.is_some()
    }

    pub fn has_type(&self, urn: &str) -> bool {
        self.device_type == urn
    }
}

/// Resolves a possibly relative control URL against the description location.
pub fn resolve_control_url(description_url: &str, control_url: &str) -> String {
    if control_url.starts_with("http://") || control_url.starts_with("https://") {
        return control_url.to_string();
    }

    match url::Url::parse(description_url).and_then(|base| base.join(control_url)) {
        Ok(resolved) => resolved.to_string(),
        // Unparsable location, hand back what the device gave us
        Err(_) => control_url.to_string(),
    }
}
