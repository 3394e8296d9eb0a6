#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use pmobrowse::{
    BrowseConfig, BrowseError, ContentDirectoryEndpoint, Descriptor, DirectoryFetchClient,
    MEDIA_SERVER_URN, ManualDiscovery, MediaDevice, NetworkBrowser, SortSpec,
};

pub const WAIT: Duration = Duration::from_secs(5);

pub fn media_server(udn: &str, name: &str) -> MediaDevice {
    MediaDevice::new(udn, name, MEDIA_SERVER_URN).with_content_directory(
        ContentDirectoryEndpoint::new(
            "urn:schemas-upnp-org:service:ContentDirectory:1",
            format!("http://127.0.0.1:1/{}/ctl", udn),
        ),
    )
}

pub fn browser(
    discovery: &Arc<ManualDiscovery>,
    fetcher: Arc<dyn DirectoryFetchClient>,
) -> NetworkBrowser {
    let mut config = BrowseConfig::default();
    config.fetch.worker_threads = 4;
    NetworkBrowser::new(discovery.clone(), fetcher, &config).unwrap()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BrowseCall {
    pub server: String,
    pub object_id: String,
    pub sort: SortSpec,
}

/// Answers from canned listings and records every call.
pub struct RecordingFetcher {
    sort_caps: Result<bool, BrowseError>,
    listings: HashMap<String, Result<Vec<Descriptor>, BrowseError>>,
    calls: Mutex<Vec<BrowseCall>>,
    sort_queries: AtomicUsize,
}

impl RecordingFetcher {
    pub fn new(title_sort: bool) -> Self {
        Self {
            sort_caps: Ok(title_sort),
            listings: HashMap::new(),
            calls: Mutex::new(Vec::new()),
            sort_queries: AtomicUsize::new(0),
        }
    }

    pub fn with_listing(mut self, object_id: &str, descriptors: Vec<Descriptor>) -> Self {
        self.listings.insert(object_id.to_string(), Ok(descriptors));
        self
    }

    /// Makes the sort capability query fail.
    pub fn with_sort_caps_failure(mut self, err: BrowseError) -> Self {
        self.sort_caps = Err(err);
        self
    }

    pub fn with_failure(mut self, object_id: &str, err: BrowseError) -> Self {
        self.listings.insert(object_id.to_string(), Err(err));
        self
    }

    pub fn calls(&self) -> Vec<BrowseCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn sort_queries(&self) -> usize {
        self.sort_queries.load(Ordering::SeqCst)
    }
}

impl DirectoryFetchClient for RecordingFetcher {
    fn browse(
        &self,
        server: &MediaDevice,
        container_id: &str,
        sort: &SortSpec,
    ) -> Result<Vec<Descriptor>, BrowseError> {
        self.calls.lock().unwrap().push(BrowseCall {
            server: server.friendly_name().to_string(),
            object_id: container_id.to_string(),
            sort: sort.clone(),
        });
        self.listings
            .get(container_id)
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    fn supports_title_sort(&self, _server: &MediaDevice) -> Result<bool, BrowseError> {
        self.sort_queries.fetch_add(1, Ordering::SeqCst);
        self.sort_caps.clone()
    }
}

/// A browse call held until the test answers it.
pub struct PendingBrowse {
    pub object_id: String,
    pub sort: SortSpec,
    reply: Sender<Result<Vec<Descriptor>, BrowseError>>,
}

impl PendingBrowse {
    pub fn reply(self, result: Result<Vec<Descriptor>, BrowseError>) {
        let _ = self.reply.send(result);
    }
}

/// Every browse call blocks until the test replies to its [`PendingBrowse`].
pub struct GatedFetcher {
    started: Sender<PendingBrowse>,
}

impl GatedFetcher {
    pub fn new() -> (Self, Receiver<PendingBrowse>) {
        let (started, pending) = unbounded();
        (Self { started }, pending)
    }
}

impl DirectoryFetchClient for GatedFetcher {
    fn browse(
        &self,
        _server: &MediaDevice,
        container_id: &str,
        sort: &SortSpec,
    ) -> Result<Vec<Descriptor>, BrowseError> {
        let (reply, answer) = bounded(1);
        self.started
            .send(PendingBrowse {
                object_id: container_id.to_string(),
                sort: sort.clone(),
                reply,
            })
            .map_err(|_| BrowseError::fetch_failed(container_id, "test gone"))?;
        answer
            .recv()
            .unwrap_or_else(|_| Err(BrowseError::fetch_failed(container_id, "gate dropped")))
    }

    fn supports_title_sort(&self, _server: &MediaDevice) -> Result<bool, BrowseError> {
        Ok(true)
    }
}
