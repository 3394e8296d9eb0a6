use std::sync::Arc;
use std::time::Duration;

use tracing::warn;
use ureq::Agent;

use super::registry::DeviceRegistry;
use super::{DeviceDiscovery, DiscoverySubscription, SubscriptionId, fetch_description};
use crate::device::{DeviceId, MediaDevice};

/// Discovery over a caller-maintained device list.
#[derive(Default)]
pub struct ManualDiscovery {
    registry: DeviceRegistry,
}

impl ManualDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_devices(devices: impl IntoIterator<Item = MediaDevice>) -> Self {
        let discovery = Self::new();
        for device in devices {
            discovery.add_device(device);
        }
        discovery
    }

    /// Builds the list from description URLs. Unreachable or unreadable
    /// descriptions are logged and skipped.
    pub fn from_locations<S: AsRef<str>>(locations: &[S], timeout: Duration) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();

        let discovery = Self::new();
        for location in locations {
            let location = location.as_ref();
            match fetch_description(&agent, location) {
                Ok(device) => discovery.add_device(device),
                Err(err) => warn!(location, error = %err, "Skipping device description"),
            }
        }
        discovery
    }

    /// Adds a device, or refreshes the one with the same UDN.
    pub fn add_device(&self, device: MediaDevice) {
        self.registry.upsert(device);
    }

    pub fn remove_device(&self, id: &DeviceId) -> bool {
        self.registry.remove(id)
    }

    /// Replaces the whole list, order included.
    pub fn set_devices(&self, devices: Vec<MediaDevice>) {
        self.registry.replace_all(devices);
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.subscriber_count()
    }
}

impl DeviceDiscovery for ManualDiscovery {
    fn root_devices(&self) -> Vec<Arc<MediaDevice>> {
        self.registry.snapshot()
    }

    fn subscribe(&self) -> DiscoverySubscription {
        self.registry.subscribe()
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.registry.unsubscribe(id);
    }
}
