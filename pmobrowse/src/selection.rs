use tracing::warn;
use url::Url;

use crate::tree::{NodePath, TreeModel};

/// Playable part of the consumer's current selection.
///
/// Rebuilt from scratch on every selection change; it never tracks nodes across
/// tree mutations.
#[derive(Debug, Default)]
pub struct SelectionTracker {
    selected: Vec<NodePath>,
    locators: Vec<Url>,
}

impl SelectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps the locators of the selected leaves, in selection order.
    ///
    /// Containers, device roots and stale paths are ignored. Leaves without a
    /// usable locator are skipped.
    pub fn recompute(&mut self, tree: &TreeModel, selected: &[NodePath]) {
        self.selected = selected.to_vec();
        self.locators = selected
            .iter()
            .filter_map(|path| {
                let leaf = tree.node(path)?.as_leaf()?;
                let Some(locator) = leaf.locator() else {
                    warn!(path = %path, item = leaf.id(), "Selected item has no resource");
                    return None;
                };
                match Url::parse(locator) {
                    Ok(url) => Some(url),
                    Err(err) => {
                        warn!(path = %path, locator, error = %err, "Ignoring unparsable resource URI");
                        None
                    }
                }
            })
            .collect();
    }

    pub fn clear(&mut self) {
        self.selected.clear();
        self.locators.clear();
    }

    pub fn selected(&self) -> &[NodePath] {
        &self.selected
    }

    pub fn has_playable_selection(&self) -> bool {
        !self.locators.is_empty()
    }

    pub fn playable_locators(&self) -> &[Url] {
        &self.locators
    }
}
