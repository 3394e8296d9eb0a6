//! # pmobrowse - Lazy browse tree over UPnP media servers
//!
//! The tree starts with the media servers found by discovery and grows one
//! directory level at a time, only where the user navigates. Fetches run on a
//! worker pool; their results are installed on the thread that owns the
//! [`NetworkBrowser`], which a display reads synchronously through
//! [`TreeQuery`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use pmobrowse::{
//!     BrowseConfig, ContentDirectoryClient, NetworkBrowser, SsdpDiscovery, TreeQuery,
//! };
//!
//! let config = BrowseConfig::load("").unwrap();
//! let discovery = Arc::new(SsdpDiscovery::spawn(&config.discovery).unwrap());
//! let fetcher = Arc::new(ContentDirectoryClient::new(
//!     config.fetch.http_timeout(),
//!     config.fetch.page_size,
//! ));
//! let mut browser = NetworkBrowser::new(discovery, fetcher, &config).unwrap();
//!
//! std::thread::sleep(Duration::from_secs(3));
//! browser.process_pending();
//! if browser.root_count() > 0 {
//!     let server = browser.root_child(0).unwrap();
//!     browser.navigate_into(&server).unwrap();
//!     browser.wait_for_completion(Duration::from_secs(10));
//!     println!("{} entries", browser.child_count(&server));
//! }
//! ```

mod browser;
pub mod config;
mod descriptor;
mod device;
pub mod discovery;
mod errors;
mod events;
pub mod fetch;
mod pool;
mod selection;
mod tree;

pub use browser::{Navigation, NetworkBrowser};
pub use config::BrowseConfig;
pub use descriptor::{Descriptor, materialize};
pub use device::{ContentDirectoryEndpoint, DeviceId, MEDIA_SERVER_URN, MediaDevice, resolve_control_url};
pub use discovery::{DeviceDiscovery, DiscoveryEvent, DiscoverySubscription, ManualDiscovery, SsdpDiscovery};
pub use errors::BrowseError;
pub use events::{InvalidationBus, TreeInvalidation};
pub use fetch::{ContentDirectoryClient, DirectoryFetchClient, SortSpec};
pub use pool::FetchPool;
pub use selection::SelectionTracker;
pub use tree::{
    Children, ContainerNode, DeviceRoot, Generation, LeafNode, NodePath, NodeStatus, TreeModel,
    TreeNode, TreeQuery,
};
