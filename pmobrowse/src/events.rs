use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::Mutex;

use crate::tree::NodePath;

/// Tells a display consumer which part of the tree must be re-read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TreeInvalidation {
    /// The device list changed.
    Roots,
    /// The children of `parent` changed; `level` is the display column
    /// showing them (`parent.len()`).
    Children { parent: NodePath, level: usize },
}

impl TreeInvalidation {
    pub fn children_of(parent: &NodePath) -> Self {
        TreeInvalidation::Children {
            parent: parent.clone(),
            level: parent.len(),
        }
    }
}

#[derive(Clone, Default)]
pub struct InvalidationBus {
    subscribers: Arc<Mutex<Vec<Sender<TreeInvalidation>>>>,
}

impl InvalidationBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Receiver<TreeInvalidation> {
        let (tx, rx) = unbounded::<TreeInvalidation>();
        self.subscribers.lock().push(tx);
        rx
    }

    pub(crate) fn broadcast(&self, event: TreeInvalidation) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
