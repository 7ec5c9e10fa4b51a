//! Per-character serialization of load-check-mutate-save sequences.
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::character::CharacterId;

/// Idle entries are pruned once the registry grows past this size.
const PRUNE_THRESHOLD: usize = 1_024;

/// Registry of async mutexes keyed by character.
///
/// Holding the guard returned by [`CharacterLocks::acquire`] across the whole
/// read-modify-write keeps two concurrent actions for the same character from
/// both passing the cooldown check.
#[derive(Debug, Default)]
pub struct CharacterLocks {
    entries: Mutex<HashMap<CharacterId, Arc<AsyncMutex<()>>>>,
}

impl CharacterLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, id: CharacterId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            if entries.len() >= PRUNE_THRESHOLD {
                entries.retain(|key, lock| *key == id || Arc::strong_count(lock) > 1);
            }
            Arc::clone(entries.entry(id).or_default())
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
