//! In-memory browse tree.
//!
//! The tree only ever holds what fetches have returned. Every node owns its
//! children outright; a display consumer designates nodes with a [`NodePath`]
//! (index path from the root level) and reads them through [`TreeQuery`].
//!
//! Nothing in this module performs I/O or mutates on its own: the
//! [`NetworkBrowser`](crate::NetworkBrowser) is the only writer.

use std::fmt;
use std::sync::Arc;

use crate::device::{DeviceId, MediaDevice};
use crate::errors::BrowseError;
use crate::fetch::ROOT_OBJECT_ID;

/// Stamp of one navigation. Values are never reused within a browser.
pub type Generation = u64;

/// Position of a node: `[device, child, grandchild, ...]`.
///
/// The empty path designates the root level (the device list).
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct NodePath(Vec<usize>);

impl NodePath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn device(index: usize) -> Self {
        Self(vec![index])
    }

    pub fn from_indices(indices: impl Into<Vec<usize>>) -> Self {
        Self(indices.into())
    }

    pub fn child(&self, index: usize) -> Self {
        let mut indices = self.0.clone();
        indices.push(index);
        Self(indices)
    }

    pub fn parent(&self) -> Option<Self> {
        let (_, parent) = self.0.split_last()?;
        Some(Self(parent.to_vec()))
    }

    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of indices; also the display column of this node's children.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn device_index(&self) -> Option<usize> {
        self.0.first().copied()
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        for index in &self.0 {
            write!(f, "/{}", index)?;
        }
        Ok(())
    }
}

/// What is known about the children of a device root or container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Children {
    /// Never navigated into (or torn down since).
    Unexplored,
    /// A fetch is in flight; only its completion may fill the node.
    Loading { generation: Generation },
    /// The server confirmed the directory is empty.
    Empty,
    /// The last fetch failed.
    Failed(BrowseError),
    Populated(Vec<TreeNode>),
}

impl Children {
    pub fn from_nodes(nodes: Vec<TreeNode>) -> Self {
        if nodes.is_empty() {
            Children::Empty
        } else {
            Children::Populated(nodes)
        }
    }

    /// True once a fetch completed successfully.
    pub fn is_known(&self) -> bool {
        matches!(self, Children::Empty | Children::Populated(_))
    }

    /// Known children, empty for every other state.
    pub fn known(&self) -> &[TreeNode] {
        match self {
            Children::Populated(nodes) => nodes,
            _ => &[],
        }
    }

    pub fn loading_generation(&self) -> Option<Generation> {
        match self {
            Children::Loading { generation } => Some(*generation),
            _ => None,
        }
    }

    pub fn status(&self) -> NodeStatus {
        match self {
            Children::Unexplored => NodeStatus::Unexplored,
            Children::Loading { .. } => NodeStatus::Loading,
            Children::Empty => NodeStatus::Empty,
            Children::Failed(_) => NodeStatus::Failed,
            Children::Populated(nodes) => NodeStatus::Populated(nodes.len()),
        }
    }
}

/// Load state of a node, as shown to a consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    Leaf,
    Unexplored,
    Loading,
    Empty,
    Failed,
    Populated(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRoot {
    device: Arc<MediaDevice>,
    children: Children,
    title_sort: bool,
}

impl DeviceRoot {
    pub fn new(device: Arc<MediaDevice>) -> Self {
        Self {
            device,
            children: Children::Unexplored,
            title_sort: false,
        }
    }

    pub fn device(&self) -> &Arc<MediaDevice> {
        &self.device
    }

    pub fn children(&self) -> &Children {
        &self.children
    }

    /// Whether the server advertised title sorting when it was expanded.
    pub fn title_sort(&self) -> bool {
        self.title_sort
    }

    pub(crate) fn set_title_sort(&mut self, title_sort: bool) {
        self.title_sort = title_sort;
    }

    /// Drops the whole subtree.
    pub(crate) fn collapse(&mut self) {
        self.children = Children::Unexplored;
        self.title_sort = false;
    }

    pub(crate) fn refresh_device(&mut self, device: Arc<MediaDevice>) {
        self.device = device;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerNode {
    id: String,
    title: String,
    depth: usize,
    children: Children,
}

impl ContainerNode {
    pub fn new(id: String, title: String, depth: usize) -> Self {
        Self {
            id,
            title,
            depth,
            children: Children::Unexplored,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn children(&self) -> &Children {
        &self.children
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafNode {
    id: String,
    title: String,
    locator: Option<String>,
    depth: usize,
}

impl LeafNode {
    pub fn new(id: String, title: String, locator: Option<String>, depth: usize) -> Self {
        Self {
            id,
            title,
            locator,
            depth,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn locator(&self) -> Option<&str> {
        self.locator.as_deref()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeNode {
    Device(DeviceRoot),
    Container(ContainerNode),
    Leaf(LeafNode),
}

impl TreeNode {
    pub fn label(&self) -> &str {
        match self {
            TreeNode::Device(root) => root.device.friendly_name(),
            TreeNode::Container(container) => &container.title,
            TreeNode::Leaf(leaf) => &leaf.title,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, TreeNode::Leaf(_))
    }

    /// 0 for a device root, 1 for its listing, and so on.
    pub fn depth(&self) -> usize {
        match self {
            TreeNode::Device(_) => 0,
            TreeNode::Container(container) => container.depth,
            TreeNode::Leaf(leaf) => leaf.depth,
        }
    }

    /// Identifier passed to the directory fetch for this node.
    pub fn object_id(&self) -> &str {
        match self {
            TreeNode::Device(_) => ROOT_OBJECT_ID,
            TreeNode::Container(container) => &container.id,
            TreeNode::Leaf(leaf) => &leaf.id,
        }
    }

    pub fn children(&self) -> Option<&Children> {
        match self {
            TreeNode::Device(root) => Some(&root.children),
            TreeNode::Container(container) => Some(&container.children),
            TreeNode::Leaf(_) => None,
        }
    }

    pub(crate) fn children_mut(&mut self) -> Option<&mut Children> {
        match self {
            TreeNode::Device(root) => Some(&mut root.children),
            TreeNode::Container(container) => Some(&mut container.children),
            TreeNode::Leaf(_) => None,
        }
    }

    /// Number of known children; 0 while loading, failed or unexplored.
    pub fn child_count(&self) -> usize {
        self.children().map_or(0, |children| children.known().len())
    }

    pub fn child(&self, index: usize) -> Option<&TreeNode> {
        self.children()?.known().get(index)
    }

    pub fn status(&self) -> NodeStatus {
        self.children()
            .map_or(NodeStatus::Leaf, |children| children.status())
    }

    pub fn error(&self) -> Option<&BrowseError> {
        match self.children()? {
            Children::Failed(err) => Some(err),
            _ => None,
        }
    }

    pub fn as_device(&self) -> Option<&DeviceRoot> {
        match self {
            TreeNode::Device(root) => Some(root),
            _ => None,
        }
    }

    pub(crate) fn as_device_mut(&mut self) -> Option<&mut DeviceRoot> {
        match self {
            TreeNode::Device(root) => Some(root),
            _ => None,
        }
    }

    pub fn as_leaf(&self) -> Option<&LeafNode> {
        match self {
            TreeNode::Leaf(leaf) => Some(leaf),
            _ => None,
        }
    }
}

/// Read surface of the tree for a display consumer.
///
/// Every call is synchronous and answers from what is currently known; none of
/// them ever starts a fetch. Paths that do not resolve (stale positions) read
/// as empty.
pub trait TreeQuery {
    /// Number of media servers at the root level.
    fn root_count(&self) -> usize;

    fn root_child(&self, index: usize) -> Result<NodePath, BrowseError>;

    /// Known children of `path`; the root path answers [`TreeQuery::root_count`].
    fn child_count(&self, path: &NodePath) -> usize;

    /// Fails with `IndexOutOfRange` when `index >= child_count(path)`.
    fn child(&self, path: &NodePath, index: usize) -> Result<NodePath, BrowseError>;

    fn is_leaf(&self, path: &NodePath) -> bool;

    fn display_label(&self, path: &NodePath) -> Option<&str>;

    fn node_status(&self, path: &NodePath) -> Option<NodeStatus>;

    fn node_error(&self, path: &NodePath) -> Option<&BrowseError>;
}

/// The device list and everything fetched below the expanded device.
#[derive(Debug, Default)]
pub struct TreeModel {
    roots: Vec<TreeNode>,
}

impl TreeModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, path: &NodePath) -> Option<&TreeNode> {
        let (first, rest) = path.indices().split_first()?;
        let mut node = self.roots.get(*first)?;
        for index in rest {
            node = node.child(*index)?;
        }
        Some(node)
    }

    pub(crate) fn node_mut(&mut self, path: &NodePath) -> Option<&mut TreeNode> {
        let (first, rest) = path.indices().split_first()?;
        let mut node = self.roots.get_mut(*first)?;
        for index in rest {
            node = match node.children_mut()? {
                Children::Populated(nodes) => nodes.get_mut(*index)?,
                _ => return None,
            };
        }
        Some(node)
    }

    pub fn devices(&self) -> impl Iterator<Item = &DeviceRoot> {
        self.roots.iter().filter_map(TreeNode::as_device)
    }

    pub fn device_index(&self, id: &DeviceId) -> Option<usize> {
        self.devices().position(|root| root.device.id() == id)
    }

    /// Replaces the device list.
    ///
    /// The root of `expanded` keeps its subtree when the device is still
    /// listed; returns false when it disappeared (its subtree is dropped).
    pub(crate) fn replace_devices(
        &mut self,
        devices: Vec<Arc<MediaDevice>>,
        expanded: Option<&DeviceId>,
    ) -> bool {
        let mut previous = expanded.and_then(|id| {
            let index = self.device_index(id)?;
            match self.roots.swap_remove(index) {
                TreeNode::Device(root) => Some(root),
                _ => None,
            }
        });

        let mut kept = false;
        self.roots = devices
            .into_iter()
            .map(|device| match previous.take_if(|root| root.device.id() == device.id()) {
                Some(mut root) => {
                    kept = true;
                    root.refresh_device(device);
                    TreeNode::Device(root)
                }
                None => TreeNode::Device(DeviceRoot::new(device)),
            })
            .collect();

        kept
    }

    pub(crate) fn clear(&mut self) {
        self.roots.clear();
    }
}

impl TreeQuery for TreeModel {
    fn root_count(&self) -> usize {
        self.roots.len()
    }

    fn root_child(&self, index: usize) -> Result<NodePath, BrowseError> {
        if index >= self.roots.len() {
            return Err(BrowseError::IndexOutOfRange {
                index,
                count: self.roots.len(),
            });
        }
        Ok(NodePath::device(index))
    }

    fn child_count(&self, path: &NodePath) -> usize {
        if path.is_root() {
            return self.root_count();
        }
        self.node(path).map_or(0, TreeNode::child_count)
    }

    fn child(&self, path: &NodePath, index: usize) -> Result<NodePath, BrowseError> {
        if path.is_root() {
            return self.root_child(index);
        }
        let node = self
            .node(path)
            .ok_or_else(|| BrowseError::UnknownNode(path.to_string()))?;
        let count = node.child_count();
        if index >= count {
            return Err(BrowseError::IndexOutOfRange { index, count });
        }
        Ok(path.child(index))
    }

    fn is_leaf(&self, path: &NodePath) -> bool {
        self.node(path).is_some_and(TreeNode::is_leaf)
    }

    fn display_label(&self, path: &NodePath) -> Option<&str> {
        self.node(path).map(TreeNode::label)
    }

    fn node_status(&self, path: &NodePath) -> Option<NodeStatus> {
        self.node(path).map(TreeNode::status)
    }

    fn node_error(&self, path: &NodePath) -> Option<&BrowseError> {
        self.node(path)?.error()
    }
}
