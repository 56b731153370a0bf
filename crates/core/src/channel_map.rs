//! Registry of live channels keyed by identity.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, PoisonError, RwLock};

use crate::channel::Channel;
use crate::conn::Conn;
use crate::constants::DEFAULT_CHANNEL_CAPACITY;

/// Tracks which identities currently have a live channel.
pub trait ChannelMap<C: Conn>: Send + Sync + 'static {
    /// Inserts `channel`, replacing any entry with the same id.
    fn add(&self, channel: Arc<Channel<C>>);

    /// Inserts `channel` only if its id is absent. Returns `false` otherwise.
    fn try_add(&self, channel: Arc<Channel<C>>) -> bool;

    fn remove(&self, id: &str) -> Option<Arc<Channel<C>>>;

    fn get(&self, id: &str) -> Option<Arc<Channel<C>>>;

    /// Snapshot of every registered channel.
    fn all(&self) -> Vec<Arc<Channel<C>>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Lock-protected map; the default registry.
pub struct Channels<C: Conn> {
    inner: RwLock<HashMap<String, Arc<Channel<C>>>>,
}

impl<C: Conn> Channels<C> {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(HashMap::with_capacity(capacity)),
        }
    }
}

impl<C: Conn> Default for Channels<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Conn> ChannelMap<C> for Channels<C> {
    fn add(&self, channel: Arc<Channel<C>>) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(channel.id().to_string(), channel);
    }

    fn try_add(&self, channel: Arc<Channel<C>>) -> bool {
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        match map.entry(channel.id().to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(channel);
                true
            }
        }
    }

    fn remove(&self, id: &str) -> Option<Arc<Channel<C>>> {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
    }

    fn get(&self, id: &str) -> Option<Arc<Channel<C>>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    fn all(&self) -> Vec<Arc<Channel<C>>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}
