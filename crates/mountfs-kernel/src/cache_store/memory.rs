//! In-process cache store.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use super::{CacheStore, TTL_FOREVER};
use crate::vfs::error::FsResult;

#[derive(Debug, Clone)]
struct Slot {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Slot {
    fn is_fresh(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

/// Cache store held in a `DashMap`.
///
/// Expiry uses tokio's clock, so paused-time tests can step past a TTL
/// without sleeping. Expired slots are dropped lazily on access.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    slots: DashMap<String, Slot>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored slots, expired ones included.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Drop every slot.
    pub fn clear(&self) {
        self.slots.clear();
    }

    fn fresh(&self, key: &str) -> Option<Vec<u8>> {
        let now = Instant::now();
        let expired = match self.slots.get(key) {
            Some(slot) if slot.is_fresh(now) => return Some(slot.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.slots.remove_if(key, |_, slot| !slot.is_fresh(now));
        }
        None
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn contains(&self, key: &str) -> FsResult<bool> {
        Ok(self.fresh(key).is_some())
    }

    async fn fetch(&self, key: &str) -> FsResult<Option<Vec<u8>>> {
        Ok(self.fresh(key))
    }

    async fn save(&self, key: &str, value: Vec<u8>, ttl: u64) -> FsResult<()> {
        let expires_at = if ttl == TTL_FOREVER {
            None
        } else {
            Some(Instant::now() + Duration::from_secs(ttl))
        };
        self.slots.insert(key.to_string(), Slot { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> FsResult<()> {
        self.slots.remove(key);
        Ok(())
    }
}
