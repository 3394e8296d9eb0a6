use thiserror::Error;

/// Errors surfaced by the browse core.
///
/// `FetchFailed` and `MalformedDescriptor` never escape a navigation: they are
/// stored on the node that was being loaded and read back through
/// [`TreeQuery::node_error`](crate::TreeQuery::node_error).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrowseError {
    #[error("Browse of '{object_id}' failed: {reason}")]
    FetchFailed { object_id: String, reason: String },
    #[error("Malformed entry in '{object_id}': {reason}")]
    MalformedDescriptor { object_id: String, reason: String },
    #[error("{0} does not expose a ContentDirectory service")]
    NotBrowsable(String),
    #[error("Node {0} cannot be navigated into")]
    NotNavigable(String),
    #[error("No node at {0}")]
    UnknownNode(String),
    #[error("Child index {index} out of range ({count} known children)")]
    IndexOutOfRange { index: usize, count: usize },
    #[error("Selection contains no playable item")]
    NoPlayableSelection,
}

impl BrowseError {
    pub fn fetch_failed(object_id: &str, reason: impl Into<String>) -> Self {
        BrowseError::FetchFailed {
            object_id: object_id.to_string(),
            reason: reason.into(),
        }
    }

    pub fn malformed(object_id: &str, reason: impl Into<String>) -> Self {
        BrowseError::MalformedDescriptor {
            object_id: object_id.to_string(),
            reason: reason.into(),
        }
    }
}
