//! Observable list of import items.
//!
//! Every stage of the pipeline mutates items through [`ImportList`], always
//! as a function of the current snapshot, keyed by `uuid`. Observers (a UI,
//! a progress printer) follow changes through [`ImportList::subscribe`].

use std::sync::Arc;

use tokio::sync::watch;
use tracing::warn;
use uuid::Uuid;

use crate::item::{DisplayText, ImportItem, ItemStatus};

#[derive(Clone)]
pub struct ImportList {
    tx: Arc<watch::Sender<Vec<ImportItem>>>,
}

impl Default for ImportList {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportList {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Vec::new());
        Self { tx: Arc::new(tx) }
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<ImportItem>> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> Vec<ImportItem> {
        self.tx.borrow().clone()
    }

    pub fn get(&self, uuid: Uuid) -> Option<ImportItem> {
        self.tx.borrow().iter().find(|i| i.uuid == uuid).cloned()
    }

    pub fn len(&self) -> usize {
        self.tx.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.borrow().is_empty()
    }

    /// Append items, returning their uuids in order.
    pub fn push(&self, new_items: Vec<ImportItem>) -> Vec<Uuid> {
        let uuids = new_items.iter().map(|i| i.uuid).collect();
        self.tx.send_modify(|items| items.extend(new_items));
        uuids
    }

    /// Apply `f` to the item with `uuid`. Returns `false` if it is gone.
    pub fn update<F>(&self, uuid: Uuid, f: F) -> bool
    where
        F: FnOnce(&mut ImportItem),
    {
        self.tx.send_if_modified(|items| match items.iter_mut().find(|i| i.uuid == uuid) {
            Some(item) => {
                f(item);
                true
            }
            None => false,
        })
    }

    /// Apply `f` to every item.
    pub fn update_all<F>(&self, mut f: F)
    where
        F: FnMut(&mut ImportItem),
    {
        self.tx.send_modify(|items| items.iter_mut().for_each(&mut f));
    }

    /// Move an item to `status`, optionally replacing its display text.
    ///
    /// Moves outside the allowed transition table are logged and ignored;
    /// returns whether the move was applied.
    pub fn transition(&self, uuid: Uuid, status: ItemStatus, display: Option<DisplayText>) -> bool {
        self.tx.send_if_modified(|items| {
            let Some(item) = items.iter_mut().find(|i| i.uuid == uuid) else {
                return false;
            };
            if !item.status.can_transition_to(status) {
                warn!(
                    uuid = %uuid,
                    from = ?item.status,
                    to = ?status,
                    "Rejected invalid item status transition"
                );
                return false;
            }
            item.status = status;
            if let Some(display) = display {
                item.display = display;
            }
            true
        })
    }

    /// Replace the item with `uuid` by `replacement`, in place.
    pub fn replace(&self, uuid: Uuid, replacement: Vec<ImportItem>) -> bool {
        self.tx.send_if_modified(|items| match items.iter().position(|i| i.uuid == uuid) {
            Some(index) => {
                items.splice(index..=index, replacement);
                true
            }
            None => false,
        })
    }

    /// Drop every item, as when an import session is closed.
    pub fn clear(&self) {
        self.tx.send_modify(|items| items.clear());
    }

    pub fn with_status(&self, status: ItemStatus) -> Vec<ImportItem> {
        self.tx
            .borrow()
            .iter()
            .filter(|i| i.status == status)
            .cloned()
            .collect()
    }
}

impl std::fmt::Debug for ImportList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportList").field("items", &*self.tx.borrow()).finish()
    }
}
