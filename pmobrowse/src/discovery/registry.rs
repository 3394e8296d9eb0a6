use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

use super::{DiscoveryBus, DiscoveryEvent, DiscoverySubscription, SubscriptionId};
use crate::device::{DeviceId, MediaDevice};

/// Ordered device list plus the subscribers to notify when it changes.
#[derive(Default)]
pub(crate) struct DeviceRegistry {
    devices: Mutex<Vec<Arc<MediaDevice>>>,
    bus: DiscoveryBus,
}

impl DeviceRegistry {
    pub(crate) fn snapshot(&self) -> Vec<Arc<MediaDevice>> {
        self.devices.lock().clone()
    }

    pub(crate) fn contains(&self, id: &DeviceId) -> bool {
        self.devices.lock().iter().any(|device| device.id() == id)
    }

    /// Adds the device, or replaces the entry with the same id in place.
    /// Nothing is broadcast when an identical snapshot is already listed.
    pub(crate) fn upsert(&self, device: MediaDevice) {
        let id = device.id().clone();
        let event = {
            let mut devices = self.devices.lock();
            match devices.iter_mut().find(|known| known.id() == &id) {
                Some(known) if **known == device => return,
                Some(known) => {
                    *known = Arc::new(device);
                    DiscoveryEvent::DeviceUpdated(id)
                }
                None => {
                    info!(udn = %id, name = device.friendly_name(), "📡 Device online");
                    devices.push(Arc::new(device));
                    DiscoveryEvent::DeviceAdded(id)
                }
            }
        };
        self.bus.broadcast(event);
    }

    /// Replaces the whole list, in the given order.
    pub(crate) fn replace_all(&self, devices: Vec<MediaDevice>) {
        let events = {
            let mut current = self.devices.lock();
            let mut events: Vec<DiscoveryEvent> = current
                .iter()
                .filter(|known| !devices.iter().any(|device| device.id() == known.id()))
                .map(|known| DiscoveryEvent::DeviceRemoved(known.id().clone()))
                .collect();

            let next: Vec<Arc<MediaDevice>> = devices
                .into_iter()
                .map(|device| match current.iter().find(|known| known.id() == device.id()) {
                    Some(known) if **known == device => known.clone(),
                    Some(_) => {
                        events.push(DiscoveryEvent::DeviceUpdated(device.id().clone()));
                        Arc::new(device)
                    }
                    None => {
                        events.push(DiscoveryEvent::DeviceAdded(device.id().clone()));
                        Arc::new(device)
                    }
                })
                .collect();

            *current = next;
            events
        };

        for event in events {
            self.bus.broadcast(event);
        }
    }

    pub(crate) fn remove(&self, id: &DeviceId) -> bool {
        let removed = {
            let mut devices = self.devices.lock();
            let before = devices.len();
            devices.retain(|device| device.id() != id);
            devices.len() != before
        };
        if removed {
            info!(udn = %id, "📴 Device gone");
            self.bus.broadcast(DiscoveryEvent::DeviceRemoved(id.clone()));
        }
        removed
    }

    pub(crate) fn subscribe(&self) -> DiscoverySubscription {
        self.bus.subscribe()
    }

    pub(crate) fn unsubscribe(&self, id: SubscriptionId) {
        self.bus.unsubscribe(id);
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.bus.subscriber_count()
    }
}
