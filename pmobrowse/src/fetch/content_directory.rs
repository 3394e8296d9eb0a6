use std::time::Duration;

use pmodidl::{DidlEntry, parse_didl};
use tracing::{debug, warn};
use ureq::Agent;

use super::soap_client::{SoapCallResult, invoke_upnp_action, soap_agent};
use super::{DirectoryFetchClient, ROOT_OBJECT_ID, SortSpec, sort_caps_allow_title};
use crate::descriptor::Descriptor;
use crate::device::{ContentDirectoryEndpoint, MediaDevice};
use crate::errors::BrowseError;

/// [`DirectoryFetchClient`] speaking ContentDirectory over SOAP/HTTP.
#[derive(Clone)]
pub struct ContentDirectoryClient {
    agent: Agent,
    page_size: u32,
}

impl ContentDirectoryClient {
    /// `page_size == 0` asks the server for everything in a single call.
    pub fn new(timeout: Duration, page_size: u32) -> Self {
        Self {
            agent: soap_agent(timeout),
            page_size,
        }
    }

    fn endpoint<'a>(&self, server: &'a MediaDevice) -> Result<&'a ContentDirectoryEndpoint, BrowseError> {
        server
            .content_directory()
            .ok_or_else(|| BrowseError::NotBrowsable(server.friendly_name().to_string()))
    }

    fn call(
        &self,
        endpoint: &ContentDirectoryEndpoint,
        object_id: &str,
        action: &str,
        args: &[(&str, &str)],
    ) -> Result<SoapCallResult, BrowseError> {
        let result = invoke_upnp_action(
            &self.agent,
            &endpoint.control_url,
            &endpoint.service_type,
            action,
            args,
        )
        .map_err(|err| BrowseError::fetch_failed(object_id, format!("{:#}", err)))?;

        if let Some(fault) = result.fault() {
            return Err(BrowseError::fetch_failed(
                object_id,
                format!(
                    "{} failed with UPnP error {} ({})",
                    action, fault.error_code, fault.error_description
                ),
            ));
        }
        if !result.status.is_success() {
            return Err(BrowseError::fetch_failed(
                object_id,
                format!("{} failed with HTTP status {}", action, result.status),
            ));
        }
        if result.envelope.is_none() {
            debug!(body = %result.raw_body, "Unreadable SOAP response");
            return Err(BrowseError::fetch_failed(
                object_id,
                format!("{} returned an invalid SOAP envelope", action),
            ));
        }

        Ok(result)
    }

    fn browse_page(
        &self,
        endpoint: &ContentDirectoryEndpoint,
        object_id: &str,
        sort: &SortSpec,
        start: u32,
    ) -> Result<BrowsePage, BrowseError> {
        let start_str = start.to_string();
        let count_str = self.page_size.to_string();
        let args = [
            ("ObjectID", object_id),
            ("BrowseFlag", "BrowseDirectChildren"),
            ("Filter", "*"),
            ("StartingIndex", start_str.as_str()),
            ("RequestedCount", count_str.as_str()),
            ("SortCriteria", sort.as_criteria()),
        ];

        let result = self.call(endpoint, object_id, "Browse", &args)?;
        let value = |name: &str| {
            result
                .envelope
                .as_ref()
                .and_then(|envelope| envelope.response_value("Browse", name))
        };

        let didl = value("Result").ok_or_else(|| {
            BrowseError::fetch_failed(object_id, "BrowseResponse has no Result argument")
        })?;
        let total_matches = value("TotalMatches")
            .and_then(|total| total.trim().parse::<u32>().ok())
            .unwrap_or(0);

        let entries = parse_didl(&didl)
            .map_err(|err| BrowseError::fetch_failed(object_id, err.to_string()))?;

        Ok(BrowsePage {
            entries,
            total_matches,
        })
    }
}

struct BrowsePage {
    entries: Vec<DidlEntry>,
    total_matches: u32,
}

impl DirectoryFetchClient for ContentDirectoryClient {
    fn browse(
        &self,
        server: &MediaDevice,
        container_id: &str,
        sort: &SortSpec,
    ) -> Result<Vec<Descriptor>, BrowseError> {
        let endpoint = self.endpoint(server)?;
        let mut descriptors = Vec::new();
        let mut start = 0u32;

        loop {
            let page = self.browse_page(endpoint, container_id, sort, start)?;
            let returned = page.entries.len() as u32;
            descriptors.extend(page.entries.into_iter().map(descriptor_from_entry));
            start += returned;

            let complete = if page.total_matches > 0 {
                start >= page.total_matches
            } else {
                // TotalMatches inconnu : une page incomplète termine la liste
                returned < self.page_size
            };
            if self.page_size == 0 || returned == 0 || complete {
                break;
            }
        }

        debug!(
            server = server.friendly_name(),
            object_id = container_id,
            entries = descriptors.len(),
            "Browse complete"
        );
        Ok(descriptors)
    }

    fn supports_title_sort(&self, server: &MediaDevice) -> Result<bool, BrowseError> {
        let endpoint = self.endpoint(server)?;
        let result = self.call(endpoint, ROOT_OBJECT_ID, "GetSortCapabilities", &[])?;
        let sort_caps = result
            .envelope
            .as_ref()
            .and_then(|envelope| envelope.response_value("GetSortCapabilities", "SortCaps"))
            .unwrap_or_default();

        debug!(server = server.friendly_name(), sort_caps = %sort_caps, "Sort capabilities");
        Ok(sort_caps_allow_title(&sort_caps))
    }
}

/// Entries lacking an id or a title are kept with an empty field and rejected
/// when the listing is materialised.
fn descriptor_from_entry(entry: DidlEntry) -> Descriptor {
    let leaf_locator = if entry.is_container() {
        None
    } else {
        let locator = entry.primary_resource().map(|res| res.uri.trim().to_string());
        if locator.is_none() {
            warn!(item = ?entry.id, "Item without any resource");
        }
        locator
    };

    let is_container = entry.is_container();
    Descriptor {
        id: entry.id.unwrap_or_default(),
        title: entry.title.unwrap_or_default(),
        is_container,
        leaf_locator,
    }
}
