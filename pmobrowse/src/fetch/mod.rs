//! Directory fetching: the collaborator boundary and its ContentDirectory
//! implementation.

mod content_directory;
mod soap_client;

pub use content_directory::ContentDirectoryClient;

use crate::descriptor::Descriptor;
use crate::device::MediaDevice;
use crate::errors::BrowseError;

/// Object id of the root container of every ContentDirectory.
pub const ROOT_OBJECT_ID: &str = "0";

/// Sort criteria requested when the server can sort on titles.
pub const TITLE_SORT_CRITERIA: &str = "+dc:title";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SortSpec {
    #[default]
    Unsorted,
    Criteria(String),
}

impl SortSpec {
    pub fn title() -> Self {
        SortSpec::Criteria(TITLE_SORT_CRITERIA.to_string())
    }

    pub fn for_title_sort(supported: bool) -> Self {
        if supported {
            Self::title()
        } else {
            SortSpec::Unsorted
        }
    }

    /// Value of the `SortCriteria` argument; empty when unsorted.
    pub fn as_criteria(&self) -> &str {
        match self {
            SortSpec::Unsorted => "",
            SortSpec::Criteria(criteria) => criteria,
        }
    }
}

/// One directory listing per call.
///
/// Implementations are called from fetch worker threads and may block.
pub trait DirectoryFetchClient: Send + Sync {
    /// Direct children of `container_id`, in server order.
    fn browse(
        &self,
        server: &MediaDevice,
        container_id: &str,
        sort: &SortSpec,
    ) -> Result<Vec<Descriptor>, BrowseError>;

    /// Whether the server can sort listings on `dc:title`.
    fn supports_title_sort(&self, server: &MediaDevice) -> Result<bool, BrowseError>;
}

/// Reads a `SortCaps` value: a comma separated list, or `*` for everything.
pub fn sort_caps_allow_title(sort_caps: &str) -> bool {
    sort_caps
        .split(',')
        .map(str::trim)
        .any(|cap| cap == "dc:title" || cap == "*")
}
