//! Subscriber registry.
//!
//! Tracks which query keys are being watched, the loader each watcher uses,
//! and the channel that delivers entry updates to them. Invalidation only
//! refetches eagerly for keys that appear here.

use std::collections::HashMap;
use std::sync::RwLock;

use tokio::sync::watch;

use super::entry::CacheEntry;
use super::keys::QueryKey;
use super::loader::Loader;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::registry";

pub(crate) type EntryReceiver<T> = watch::Receiver<Option<CacheEntry<T>>>;

struct Slot<T> {
    subscribers: usize,
    loader: Loader<T>,
    sender: watch::Sender<Option<CacheEntry<T>>>,
}

/// Maps query keys to their active subscribers.
pub struct SubscriberRegistry<T> {
    slots: RwLock<HashMap<QueryKey, Slot<T>>>,
}

impl<T: Clone> SubscriberRegistry<T> {
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
        }
    }

    /// Add a subscriber for `key` and return its update channel.
    ///
    /// The first subscriber's loader is kept; later subscribers share it.
    pub(crate) fn subscribe(
        &self,
        key: QueryKey,
        loader: Loader<T>,
        current: Option<CacheEntry<T>>,
    ) -> EntryReceiver<T> {
        let mut slots = rw_write(&self.slots, SOURCE, "subscribe");
        let slot = slots.entry(key).or_insert_with(|| Slot {
            subscribers: 0,
            loader,
            sender: watch::Sender::new(current),
        });
        slot.subscribers += 1;
        slot.sender.subscribe()
    }

    /// Drop one subscriber; the slot disappears with the last one.
    pub(crate) fn unsubscribe(&self, key: &QueryKey) {
        let mut slots = rw_write(&self.slots, SOURCE, "unsubscribe");
        if let Some(slot) = slots.get_mut(key) {
            slot.subscribers = slot.subscribers.saturating_sub(1);
            if slot.subscribers == 0 {
                slots.remove(key);
            }
        }
    }

    /// Push a new entry state to everyone watching `key`.
    pub(crate) fn publish(&self, key: &QueryKey, entry: &CacheEntry<T>) {
        if let Some(slot) = rw_read(&self.slots, SOURCE, "publish").get(key) {
            slot.sender.send_replace(Some(entry.clone()));
        }
    }

    /// Loaders for the subscribed subset of `keys`.
    pub(crate) fn loaders_for(&self, keys: &[QueryKey]) -> Vec<(QueryKey, Loader<T>)> {
        let slots = rw_read(&self.slots, SOURCE, "loaders_for");
        keys.iter()
            .filter_map(|key| {
                slots
                    .get(key)
                    .map(|slot| (key.clone(), slot.loader.clone()))
            })
            .collect()
    }

    pub fn subscriber_count(&self, key: &QueryKey) -> usize {
        rw_read(&self.slots, SOURCE, "subscriber_count")
            .get(key)
            .map_or(0, |slot| slot.subscribers)
    }
}

impl<T: Clone> Default for SubscriberRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}
