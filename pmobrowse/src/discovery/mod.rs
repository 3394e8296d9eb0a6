//! Device discovery: where the root level of the tree comes from.
//!
//! A [`DeviceDiscovery`] is injected into the browser. It keeps the list of
//! root devices currently visible on the network and notifies subscribers when
//! that list changes. Two implementations ship:
//!
//! - [`SsdpDiscovery`] searches the LAN with SSDP and reads device descriptions
//! - [`ManualDiscovery`] holds a list pushed by the caller (fixed servers, tests)

mod description;
mod manual;
mod registry;
mod ssdp;

pub use description::{DescriptionError, fetch_description, parse_description};
pub use manual::ManualDiscovery;
pub use ssdp::SsdpDiscovery;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::Mutex;

use crate::device::{DeviceId, MediaDevice};

pub type SubscriptionId = u64;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiscoveryEvent {
    DeviceAdded(DeviceId),
    DeviceUpdated(DeviceId),
    DeviceRemoved(DeviceId),
}

/// Handle returned by [`DeviceDiscovery::subscribe`].
pub struct DiscoverySubscription {
    pub id: SubscriptionId,
    pub receiver: Receiver<DiscoveryEvent>,
}

pub trait DeviceDiscovery: Send + Sync {
    /// Root devices currently known, in discovery order.
    fn root_devices(&self) -> Vec<Arc<MediaDevice>>;

    fn subscribe(&self) -> DiscoverySubscription;

    fn unsubscribe(&self, id: SubscriptionId);
}

/// Subscribers keyed by id, so that one can leave without the others noticing.
#[derive(Default)]
pub(crate) struct DiscoveryBus {
    next_id: AtomicU64,
    subscribers: Mutex<HashMap<SubscriptionId, Sender<DiscoveryEvent>>>,
}

impl DiscoveryBus {
    pub(crate) fn subscribe(&self) -> DiscoverySubscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, receiver) = unbounded();
        self.subscribers.lock().insert(id, tx);
        DiscoverySubscription { id, receiver }
    }

    pub(crate) fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.lock().remove(&id);
    }

    pub(crate) fn broadcast(&self, event: DiscoveryEvent) {
        self.subscribers
            .lock()
            .retain(|_, tx| tx.send(event.clone()).is_ok());
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}
