use crate::errors::BrowseError;
use crate::tree::{ContainerNode, LeafNode, TreeNode};

/// One entry of a directory listing, before it becomes a [`TreeNode`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Descriptor {
    pub id: String,
    pub title: String,
    pub is_container: bool,
    pub leaf_locator: Option<String>,
}

impl Descriptor {
    pub fn container(id: &str, title: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            is_container: true,
            leaf_locator: None,
        }
    }

    pub fn leaf(id: &str, title: &str, locator: Option<&str>) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            is_container: false,
            leaf_locator: locator.map(str::to_string),
        }
    }

    /// Turns the descriptor into a node at `depth`.
    ///
    /// `parent_id` only serves error reporting.
    pub fn into_node(self, parent_id: &str, depth: usize) -> Result<TreeNode, BrowseError> {
        if self.id.trim().is_empty() {
            return Err(BrowseError::malformed(
                parent_id,
                format!("entry '{}' has no identifier", self.title),
            ));
        }
        if self.title.trim().is_empty() {
            return Err(BrowseError::malformed(
                parent_id,
                format!("entry '{}' has no title", self.id),
            ));
        }

        Ok(if self.is_container {
            TreeNode::Container(ContainerNode::new(self.id, self.title, depth))
        } else {
            TreeNode::Leaf(LeafNode::new(self.id, self.title, self.leaf_locator, depth))
        })
    }
}

/// Materialises a whole listing. One bad entry fails the listing.
pub fn materialize(
    parent_id: &str,
    descriptors: Vec<Descriptor>,
    depth: usize,
) -> Result<Vec<TreeNode>, BrowseError> {
    descriptors
        .into_iter()
        .map(|descriptor| descriptor.into_node(parent_id, depth))
        .collect()
}
