use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use pmoupnp::ssdp::{SsdpClient, SsdpEvent, udn_from_usn};
use tracing::{debug, info, warn};
use ureq::Agent;

use super::registry::DeviceRegistry;
use super::{
    DescriptionError, DeviceDiscovery, DiscoverySubscription, SubscriptionId, fetch_description,
};
use crate::config::DiscoveryConfig;
use crate::device::{DeviceId, MediaDevice};

const USER_AGENT: &str = "Linux/1.0 UPnP/1.1 pmobrowse/0.1";
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// SSDP search running on a background thread for the lifetime of the handle.
pub struct SsdpDiscovery {
    registry: Arc<DeviceRegistry>,
    stop: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl SsdpDiscovery {
    /// Opens the SSDP socket and starts searching.
    pub fn spawn(config: &DiscoveryConfig) -> io::Result<Self> {
        let client = SsdpClient::new(USER_AGENT, POLL_INTERVAL)?;
        let registry = Arc::new(DeviceRegistry::default());
        let stop = Arc::new(AtomicBool::new(false));

        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(config.description_timeout()))
            .build()
            .into();
        let search_interval = Duration::from_secs(config.search_interval_secs.max(1));

        let mut worker = SearchLoop {
            client,
            mx: config.mx,
            search_interval,
            tracker: DeviceTracker::new(
                registry.clone(),
                config.search_targets.clone(),
                search_interval,
                Box::new(move |location: &str| fetch_description(&agent, location)),
            ),
        };
        let thread_stop = stop.clone();
        let handle = thread::Builder::new()
            .name("pmobrowse-ssdp".into())
            .spawn(move || worker.run(&thread_stop))?;

        Ok(Self {
            registry,
            stop,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Stops the search thread and waits for it.
    pub fn shutdown(&self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.lock().take() {
            if handle.join().is_err() {
                warn!("SSDP discovery thread panicked");
            }
        }
    }
}

impl Drop for SsdpDiscovery {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl DeviceDiscovery for SsdpDiscovery {
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

/// Reads a description URL into a device snapshot.
type Describe = Box<dyn Fn(&str) -> Result<MediaDevice, DescriptionError> + Send>;

/// Socket side: periodic M-SEARCH and datagram reception.
struct SearchLoop {
    client: SsdpClient,
    mx: u32,
    search_interval: Duration,
    tracker: DeviceTracker,
}

impl SearchLoop {
    fn run(&mut self, stop: &AtomicBool) {
        info!(targets = ?self.tracker.targets, "🔍 SSDP discovery started");
        let mut last_search: Option<Instant> = None;

        while !stop.load(Ordering::Relaxed) {
            if last_search.is_none_or(|at| at.elapsed() >= self.search_interval) {
                self.search();
                last_search = Some(Instant::now());
            }

            match self.client.next_event() {
                Ok(Some(event)) => self.tracker.handle_event(event, Instant::now()),
                Ok(None) => {}
                Err(err) => {
                    warn!(error = %err, "SSDP receive failed");
                    thread::sleep(POLL_INTERVAL);
                }
            }

            self.tracker.expire(Instant::now());
        }
        debug!("SSDP discovery stopped");
    }

    fn search(&self) {
        for target in &self.tracker.targets {
            if let Err(err) = self.client.send_msearch(target, self.mx) {
                warn!(target = %target, error = %err, "M-SEARCH failed");
            }
        }
    }
}

/// Turns SSDP announcements into registry changes.
struct DeviceTracker {
    registry: Arc<DeviceRegistry>,
    targets: Vec<String>,
    retry_delay: Duration,
    describe: Describe,
    /// Announced validity of every listed device
    expiries: HashMap<DeviceId, Instant>,
    /// Devices whose description failed, not retried before the deadline
    retry_after: HashMap<DeviceId, Instant>,
}

impl DeviceTracker {
    fn new(
        registry: Arc<DeviceRegistry>,
        targets: Vec<String>,
        retry_delay: Duration,
        describe: Describe,
    ) -> Self {
        Self {
            registry,
            targets,
            retry_delay,
            describe,
            expiries: HashMap::new(),
            retry_after: HashMap::new(),
        }
    }

    fn is_wanted(&self, kind: &str) -> bool {
        self.targets.iter().any(|target| target.eq_ignore_ascii_case(kind))
    }

    fn handle_event(&mut self, event: SsdpEvent, now: Instant) {
        match event {
            SsdpEvent::Alive {
                usn,
                nt: kind,
                location,
                max_age,
                ..
            }
            | SsdpEvent::SearchResponse {
                usn,
                st: kind,
                location,
                max_age,
                ..
            } => {
                if !self.is_wanted(&kind) {
                    return;
                }
                if let Some(udn) = udn_from_usn(&usn) {
                    self.device_alive(DeviceId(udn), &location, max_age, now);
                }
            }
            SsdpEvent::ByeBye { usn, .. } => {
                if let Some(udn) = udn_from_usn(&usn) {
                    let id = DeviceId(udn);
                    self.expiries.remove(&id);
                    self.registry.remove(&id);
                }
            }
        }
    }

    fn device_alive(&mut self, id: DeviceId, location: &str, max_age: u32, now: Instant) {
        let expiry = now + Duration::from_secs(u64::from(max_age));

        if self.registry.contains(&id) {
            self.expiries.insert(id, expiry);
            return;
        }
        if self
            .retry_after
            .get(&id)
            .is_some_and(|deadline| now < *deadline)
        {
            return;
        }

        match (self.describe)(location) {
            Ok(device) if device.id() == &id => {
                self.retry_after.remove(&id);
                self.expiries.insert(id, expiry);
                self.registry.upsert(device);
            }
            Ok(device) => {
                warn!(
                    announced = %id,
                    described = %device.id(),
                    location,
                    "Description UDN does not match the announcement"
                );
                self.retry_after.insert(id, now + self.retry_delay);
            }
            Err(err) => {
                warn!(udn = %id, location, error = %err, "Cannot read device description");
                self.retry_after.insert(id, now + self.retry_delay);
            }
        }
    }

    fn expire(&mut self, now: Instant) {
        let expired: Vec<DeviceId> = self
            .expiries
            .iter()
            .filter(|(_, expiry)| **expiry <= now)
            .map(|(id, _)| id.clone())
            .collect();

        for id in expired {
            debug!(udn = %id, "SSDP announcement expired");
            self.expiries.remove(&id);
            self.registry.remove(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::device::MEDIA_SERVER_URN;

    const LOCATION: &str = "http://192.168.1.20:8200/rootDesc.xml";

    fn from() -> SocketAddr {
        "192.168.1.20:1900".parse().unwrap()
    }

    fn alive(udn: &str, kind: &str, max_age: u32) -> SsdpEvent {
        SsdpEvent::Alive {
            usn: format!("{}::{}", udn, kind),
            nt: kind.to_string(),
            location: LOCATION.to_string(),
            server: "Linux UPnP/1.0 MiniDLNA/1.3".to_string(),
            max_age,
            from: from(),
        }
    }

    fn byebye(udn: &str) -> SsdpEvent {
        SsdpEvent::ByeBye {
            usn: format!("{}::{}", udn, MEDIA_SERVER_URN),
            nt: MEDIA_SERVER_URN.to_string(),
            from: from(),
        }
    }

    /// Tracker whose descriptions always describe `described_udn`.
    fn tracker(described_udn: &'static str) -> (DeviceTracker, Arc<DeviceRegistry>, Arc<AtomicUsize>) {
        let registry = Arc::new(DeviceRegistry::default());
        let fetches = Arc::new(AtomicUsize::new(0));
        let counter = fetches.clone();
        let tracker = DeviceTracker::new(
            registry.clone(),
            vec![MEDIA_SERVER_URN.to_string()],
            Duration::from_secs(60),
            Box::new(move |location: &str| -> Result<MediaDevice, DescriptionError> {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(MediaDevice::new(described_udn, "MiniDLNA", MEDIA_SERVER_URN)
                    .with_location(location))
            }),
        );
        (tracker, registry, fetches)
    }

    #[test]
    fn test_alive_lists_the_device_once() {
        let (mut tracker, registry, fetches) = tracker("uuid:NAS-1");
        let now = Instant::now();

        tracker.handle_event(alive("uuid:NAS-1", MEDIA_SERVER_URN, 1800), now);
        tracker.handle_event(alive("uuid:NAS-1", MEDIA_SERVER_URN, 1800), now);

        let devices = registry.snapshot();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].location(), LOCATION);
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unwanted_type_is_ignored() {
        let (mut tracker, registry, fetches) = tracker("uuid:tv");

        tracker.handle_event(
            alive("uuid:tv", "urn:schemas-upnp-org:device:MediaRenderer:1", 1800),
            Instant::now(),
        );

        assert!(registry.snapshot().is_empty());
        assert_eq!(fetches.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_byebye_removes_the_device() {
        let (mut tracker, registry, _) = tracker("uuid:nas-1");
        let now = Instant::now();

        tracker.handle_event(alive("uuid:nas-1", MEDIA_SERVER_URN, 1800), now);
        assert!(registry.contains(&DeviceId("uuid:nas-1".into())));

        tracker.handle_event(byebye("uuid:nas-1"), now);
        assert!(registry.snapshot().is_empty());
        assert!(tracker.expiries.is_empty());
    }

    #[test]
    fn test_expired_announcement_removes_the_device() {
        let (mut tracker, registry, _) = tracker("uuid:nas-1");
        let now = Instant::now();
        tracker.handle_event(alive("uuid:nas-1", MEDIA_SERVER_URN, 30), now);

        tracker.expire(now + Duration::from_secs(29));
        assert_eq!(registry.snapshot().len(), 1);

        // Une nouvelle annonce repousse l'échéance
        tracker.handle_event(alive("uuid:nas-1", MEDIA_SERVER_URN, 30), now + Duration::from_secs(20));
        tracker.expire(now + Duration::from_secs(31));
        assert_eq!(registry.snapshot().len(), 1);

        tracker.expire(now + Duration::from_secs(50));
        assert!(registry.snapshot().is_empty());
    }

    #[test]
    fn test_mismatched_description_is_not_retried_before_deadline() {
        let (mut tracker, registry, fetches) = tracker("uuid:someone-else");
        let now = Instant::now();

        tracker.handle_event(alive("uuid:nas-1", MEDIA_SERVER_URN, 1800), now);
        tracker.handle_event(alive("uuid:nas-1", MEDIA_SERVER_URN, 1800), now + Duration::from_secs(59));
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        assert!(registry.snapshot().is_empty());

        tracker.handle_event(alive("uuid:nas-1", MEDIA_SERVER_URN, 1800), now + Duration::from_secs(60));
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unreadable_description_is_not_retried_before_deadline() {
        let registry = Arc::new(DeviceRegistry::default());
        let fetches = Arc::new(AtomicUsize::new(0));
        let counter = fetches.clone();
        let mut tracker = DeviceTracker::new(
            registry.clone(),
            vec![MEDIA_SERVER_URN.to_string()],
            Duration::from_secs(60),
            Box::new(move |_: &str| -> Result<MediaDevice, DescriptionError> {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(DescriptionError::MissingField("UDN"))
            }),
        );
        let now = Instant::now();

        tracker.handle_event(alive("uuid:nas-1", MEDIA_SERVER_URN, 1800), now);
        tracker.handle_event(alive("uuid:nas-1", MEDIA_SERVER_URN, 1800), now + Duration::from_secs(10));

        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        assert!(registry.snapshot().is_empty());
    }
}
