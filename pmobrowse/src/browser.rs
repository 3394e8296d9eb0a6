//! The browse session: owns the tree and is its only writer.
//!
//! Navigation starts fetches on the worker pool; their results come back over
//! a channel and are installed when the owning thread calls
//! [`NetworkBrowser::process_pending`] or [`NetworkBrowser::wait_for_completion`].
//! Each navigation stamps the node with a fresh generation, and a result whose
//! generation no longer matches the node is dropped.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::BrowseConfig;
use crate::descriptor::materialize;
use crate::device::{DeviceId, MediaDevice};
use crate::discovery::{DeviceDiscovery, DiscoverySubscription};
use crate::errors::BrowseError;
use crate::events::{InvalidationBus, TreeInvalidation};
use crate::fetch::{DirectoryFetchClient, SortSpec};
use crate::pool::FetchPool;
use crate::selection::SelectionTracker;
use crate::tree::{Children, Generation, NodePath, NodeStatus, TreeModel, TreeNode, TreeQuery};

/// What a navigation request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    /// A fetch was submitted; its result will carry this generation.
    Started { generation: Generation },
    /// The device is already the expanded one.
    AlreadyExpanded,
    /// Nothing to navigate into (a leaf).
    Ignored,
}

/// Node a fetch was issued for. The device is named by id so that a reordered
/// device list does not misroute the result.
#[derive(Debug, Clone)]
struct FetchTarget {
    device: DeviceId,
    relative: Vec<usize>,
}

impl FetchTarget {
    fn resolve(&self, tree: &TreeModel) -> Option<NodePath> {
        let device_index = tree.device_index(&self.device)?;
        let mut indices = Vec::with_capacity(self.relative.len() + 1);
        indices.push(device_index);
        indices.extend_from_slice(&self.relative);
        Some(NodePath::from_indices(indices))
    }
}

enum SortMode {
    /// Ask the server for its sort capabilities first (device navigation).
    Negotiate,
    Known(SortSpec),
}

struct Fetched {
    nodes: Vec<TreeNode>,
    title_sort: Option<bool>,
}

struct FetchCompletion {
    target: FetchTarget,
    generation: Generation,
    outcome: Result<Fetched, BrowseError>,
}

pub struct NetworkBrowser {
    discovery: Arc<dyn DeviceDiscovery>,
    fetcher: Arc<dyn DirectoryFetchClient>,
    pool: FetchPool,
    media_server_urn: String,
    tree: TreeModel,
    expanded: Option<DeviceId>,
    selection: SelectionTracker,
    invalidations: InvalidationBus,
    last_generation: Generation,
    completion_tx: Sender<FetchCompletion>,
    completion_rx: Receiver<FetchCompletion>,
    subscription: Option<DiscoverySubscription>,
}

impl NetworkBrowser {
    /// Creates an open browser: subscribed to discovery, root level filled.
    pub fn new(
        discovery: Arc<dyn DeviceDiscovery>,
        fetcher: Arc<dyn DirectoryFetchClient>,
        config: &BrowseConfig,
    ) -> io::Result<Self> {
        let pool = FetchPool::new("pmobrowse-fetch", config.fetch.worker_threads)?;
        let (completion_tx, completion_rx) = unbounded();

        let mut browser = Self {
            discovery,
            fetcher,
            pool,
            media_server_urn: config.media_server_urn.clone(),
            tree: TreeModel::new(),
            expanded: None,
            selection: SelectionTracker::new(),
            invalidations: InvalidationBus::new(),
            last_generation: 0,
            completion_tx,
            completion_rx,
            subscription: None,
        };
        browser.open();
        Ok(browser)
    }

    /// Subscribes to discovery and loads the device list. No-op when open.
    pub fn open(&mut self) {
        if self.subscription.is_some() {
            return;
        }
        self.subscription = Some(self.discovery.subscribe());
        self.reload_devices();
        info!(
            devices = self.tree.root_count(),
            workers = self.pool.size(),
            "🌐 Network browser opened"
        );
    }

    /// Unsubscribes and forgets everything. In-flight fetches are discarded
    /// when they complete.
    pub fn close(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            self.discovery.unsubscribe(subscription.id);
        }
        self.tree.clear();
        self.expanded = None;
        self.selection.clear();
        self.invalidations.broadcast(TreeInvalidation::Roots);
        info!("Network browser closed");
    }

    pub fn is_open(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn tree(&self) -> &TreeModel {
        &self.tree
    }

    pub fn expanded_device(&self) -> Option<&DeviceId> {
        self.expanded.as_ref()
    }

    pub fn subscribe_invalidations(&self) -> Receiver<TreeInvalidation> {
        self.invalidations.subscribe()
    }

    /// Installs every completion and discovery change already delivered.
    ///
    /// Returns the number of tree changes (installed fetch results plus
    /// device list reloads). Never blocks.
    pub fn process_pending(&mut self) -> usize {
        let mut changes = 0;

        let mut devices_changed = false;
        if let Some(subscription) = &self.subscription {
            while let Ok(event) = subscription.receiver.try_recv() {
                debug!(?event, "Discovery change");
                devices_changed = true;
            }
        }
        if devices_changed {
            self.reload_devices();
            changes += 1;
        }

        while let Ok(completion) = self.completion_rx.try_recv() {
            if self.apply_completion(completion) {
                changes += 1;
            }
        }
        changes
    }

    /// Waits up to `timeout` for one fetch result, then drains what else is
    /// pending. Returns false on timeout.
    pub fn wait_for_completion(&mut self, timeout: Duration) -> bool {
        match self.completion_rx.recv_timeout(timeout) {
            Ok(completion) => {
                self.apply_completion(completion);
                self.process_pending();
                true
            }
            Err(RecvTimeoutError::Timeout) => false,
            // Impossible tant que le browser garde son propre Sender
            Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    /// Starts loading the children of a device root or container.
    ///
    /// Known children are dropped at once: until the fetch completes the node
    /// reports zero children. Navigating into another device tears down the
    /// subtree of the previously expanded one.
    pub fn navigate_into(&mut self, path: &NodePath) -> Result<Navigation, BrowseError> {
        self.navigate(path, false)
    }

    /// Like [`NetworkBrowser::navigate_into`], but refetches an already
    /// expanded device.
    pub fn refresh(&mut self, path: &NodePath) -> Result<Navigation, BrowseError> {
        self.navigate(path, true)
    }

    /// Navigation event from the display. Clears the selection; a leaf is
    /// ignored.
    pub fn on_user_navigate(&mut self, path: &NodePath) -> Result<Navigation, BrowseError> {
        self.selection.clear();
        if self.tree.is_leaf(path) {
            return Ok(Navigation::Ignored);
        }
        self.navigate_into(path)
    }

    /// Selection event from the display.
    pub fn on_selection_changed(&mut self, selected: &[NodePath]) {
        self.selection.recompute(&self.tree, selected);
        debug!(
            selected = selected.len(),
            playable = self.selection.playable_locators().len(),
            "Selection changed"
        );
    }

    pub fn has_playable_selection(&self) -> bool {
        self.selection.has_playable_selection()
    }

    pub fn playable_locators(&self) -> &[Url] {
        self.selection.playable_locators()
    }

    /// The locators to hand to a player.
    pub fn open_selection(&self) -> Result<Vec<Url>, BrowseError> {
        if !self.selection.has_playable_selection() {
            return Err(BrowseError::NoPlayableSelection);
        }
        let locators = self.selection.playable_locators().to_vec();
        info!(count = locators.len(), "▶️ Opening selection");
        Ok(locators)
    }

    fn navigate(&mut self, path: &NodePath, force: bool) -> Result<Navigation, BrowseError> {
        let node = self
            .tree
            .node(path)
            .ok_or_else(|| BrowseError::UnknownNode(path.to_string()))?;

        match node {
            TreeNode::Leaf(_) => Err(BrowseError::NotNavigable(path.to_string())),
            TreeNode::Device(root) => {
                let device = root.device().clone();
                if !device.supports_browsing() {
                    return Err(BrowseError::NotBrowsable(device.friendly_name().to_string()));
                }
                if !force && self.expanded.as_ref() == Some(device.id()) {
                    debug!(path = %path, "Device already expanded");
                    return Ok(Navigation::AlreadyExpanded);
                }
                self.switch_device(&device);
                let generation = self.start_fetch(path, device, SortMode::Negotiate);
                Ok(Navigation::Started { generation })
            }
            TreeNode::Container(_) => {
                let root = path
                    .device_index()
                    .and_then(|index| self.tree.node(&NodePath::device(index)))
                    .and_then(TreeNode::as_device)
                    .ok_or_else(|| BrowseError::UnknownNode(path.to_string()))?;
                let device = root.device().clone();
                let sort = SortSpec::for_title_sort(root.title_sort());
                let generation = self.start_fetch(path, device, SortMode::Known(sort));
                Ok(Navigation::Started { generation })
            }
        }
    }

    /// Collapses the previously expanded device, if any other.
    fn switch_device(&mut self, device: &MediaDevice) {
        if let Some(previous) = self.expanded.replace(device.id().clone()) {
            if &previous == device.id() {
                return;
            }
            if let Some(index) = self.tree.device_index(&previous) {
                let path = NodePath::device(index);
                if let Some(root) = self.tree.node_mut(&path).and_then(TreeNode::as_device_mut) {
                    root.collapse();
                }
                info!(from = %previous, to = %device.id(), "Switching device");
                self.invalidations
                    .broadcast(TreeInvalidation::children_of(&path));
            }
        }
    }

    fn start_fetch(&mut self, path: &NodePath, device: Arc<MediaDevice>, sort: SortMode) -> Generation {
        self.last_generation += 1;
        let generation = self.last_generation;

        let (object_id, depth) = match self.tree.node_mut(path) {
            Some(node) => {
                let object_id = node.object_id().to_string();
                let depth = node.depth() + 1;
                if let Some(children) = node.children_mut() {
                    *children = Children::Loading { generation };
                }
                (object_id, depth)
            }
            None => return generation,
        };
        self.invalidations
            .broadcast(TreeInvalidation::children_of(path));

        debug!(path = %path, generation, object_id = %object_id, "Fetch submitted");

        let target = FetchTarget {
            device: device.id().clone(),
            relative: path.indices().get(1..).unwrap_or_default().to_vec(),
        };
        let fetcher = self.fetcher.clone();
        let completions = self.completion_tx.clone();
        self.pool.execute(move || {
            let outcome = fetch_children(fetcher.as_ref(), &device, &object_id, sort, depth);
            // Le browser a disparu : plus personne pour recevoir
            let _ = completions.send(FetchCompletion {
                target,
                generation,
                outcome,
            });
        });

        generation
    }

    fn apply_completion(&mut self, completion: FetchCompletion) -> bool {
        let FetchCompletion {
            target,
            generation,
            outcome,
        } = completion;

        let Some(path) = target.resolve(&self.tree) else {
            debug!(device = %target.device, generation, "Dropping result for a vanished device");
            return false;
        };
        let Some(node) = self.tree.node_mut(&path) else {
            debug!(path = %path, generation, "Dropping result for a vanished node");
            return false;
        };
        let current = node.children().and_then(Children::loading_generation);
        if current != Some(generation) {
            debug!(path = %path, generation, ?current, "Dropping stale result");
            return false;
        }

        let state = match outcome {
            Ok(fetched) => {
                if let (Some(title_sort), Some(root)) = (fetched.title_sort, node.as_device_mut()) {
                    root.set_title_sort(title_sort);
                }
                debug!(path = %path, generation, children = fetched.nodes.len(), "Children installed");
                Children::from_nodes(fetched.nodes)
            }
            Err(err) => {
                warn!(path = %path, generation, error = %err, "Browse failed");
                Children::Failed(err)
            }
        };
        if let Some(children) = node.children_mut() {
            *children = state;
        }

        self.invalidations
            .broadcast(TreeInvalidation::children_of(&path));
        true
    }

    /// Rebuilds the root level from discovery, keeping the expanded subtree
    /// when its device is still there.
    fn reload_devices(&mut self) {
        let devices: Vec<Arc<MediaDevice>> = self
            .discovery
            .root_devices()
            .into_iter()
            .filter(|device| device.has_type(&self.media_server_urn))
            .collect();

        let previous_index = self
            .expanded
            .as_ref()
            .and_then(|id| self.tree.device_index(id));
        let kept = self.tree.replace_devices(devices, self.expanded.as_ref());

        if let Some(expanded) = &self.expanded {
            if !kept {
                info!(device = %expanded, "Expanded device disappeared");
                self.expanded = None;
                self.selection.clear();
            } else if self.tree.device_index(expanded) != previous_index {
                // Les chemins sélectionnés ne désignent plus les mêmes nœuds
                self.selection.clear();
            }
        }

        debug!(devices = self.tree.root_count(), "Device list reloaded");
        self.invalidations.broadcast(TreeInvalidation::Roots);
    }
}

fn fetch_children(
    fetcher: &dyn DirectoryFetchClient,
    device: &MediaDevice,
    object_id: &str,
    sort: SortMode,
    depth: usize,
) -> Result<Fetched, BrowseError> {
    let (sort, title_sort) = match sort {
        SortMode::Negotiate => {
            let supported = fetcher.supports_title_sort(device).unwrap_or_else(|err| {
                warn!(device = device.friendly_name(), error = %err, "Sort capabilities unavailable");
                false
            });
            (SortSpec::for_title_sort(supported), Some(supported))
        }
        SortMode::Known(sort) => (sort, None),
    };

    let descriptors = fetcher.browse(device, object_id, &sort)?;
    let nodes = materialize(object_id, descriptors, depth)?;
    Ok(Fetched { nodes, title_sort })
}

impl Drop for NetworkBrowser {
    fn drop(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            self.discovery.unsubscribe(subscription.id);
        }
    }
}

impl TreeQuery for NetworkBrowser {
    fn root_count(&self) -> usize {
        self.tree.root_count()
    }

    fn root_child(&self, index: usize) -> Result<NodePath, BrowseError> {
        self.tree.root_child(index)
    }

    fn child_count(&self, path: &NodePath) -> usize {
        self.tree.child_count(path)
    }

    fn child(&self, path: &NodePath, index: usize) -> Result<NodePath, BrowseError> {
        self.tree.child(path, index)
    }

    fn is_leaf(&self, path: &NodePath) -> bool {
        self.tree.is_leaf(path)
    }

    fn display_label(&self, path: &NodePath) -> Option<&str> {
        self.tree.display_label(path)
    }

    fn node_status(&self, path: &NodePath) -> Option<NodeStatus> {
        self.tree.node_status(path)
    }

    fn node_error(&self, path: &NodePath) -> Option<&BrowseError> {
        self.tree.node_error(path)
    }
}
