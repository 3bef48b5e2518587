//! Per-key serialization of read-modify-write cycles.
//!
//! The Ledger has no compare-and-swap, so two concurrent mutations of the
//! same account or request would race. Every such cycle holds the lock for
//! its key from the read until the write.
//!
//! Lock keys in use:
//!
//! - `account:<public id>` - account record and everything it owns
//! - `request:<request id>` - one share request
//! - `pair:<requester>:<recipient>` - duplicate check plus insert

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// A table of async mutexes created on demand and dropped when unused.
#[derive(Default)]
pub(crate) struct KeyedLocks {
    slots: Mutex<HashMap<String, Weak<AsyncMutex<()>>>>,
}

impl KeyedLocks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Wait for and take the lock for `key`.
    pub(crate) async fn lock(&self, key: String) -> OwnedMutexGuard<()> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots.retain(|_, slot| slot.strong_count() > 0);

            match slots.get(&key).and_then(Weak::upgrade) {
                Some(slot) => slot,
                None => {
                    let slot = Arc::new(AsyncMutex::new(()));
                    slots.insert(key, Arc::downgrade(&slot));
                    slot
                }
            }
        };
        slot.lock_owned().await
    }

    #[cfg(test)]
    fn live(&self) -> usize {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.values().filter(|slot| slot.strong_count() > 0).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_is_exclusive() {
        let locks = KeyedLocks::new();
        let guard = locks.lock("account:a".into()).await;

        let waiting = tokio::time::timeout(Duration::from_millis(20), locks.lock("account:a".into()));
        assert!(waiting.await.is_err());

        drop(guard);
        let _again = locks.lock("account:a".into()).await;
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_block() {
        let locks = KeyedLocks::new();
        let _a = locks.lock("account:a".into()).await;
        let b = tokio::time::timeout(Duration::from_millis(200), locks.lock("account:b".into()));
        assert!(b.await.is_ok());
    }

    #[tokio::test]
    async fn test_unused_slots_are_dropped() {
        let locks = KeyedLocks::new();
        {
            let _a = locks.lock("account:a".into()).await;
            assert_eq!(locks.live(), 1);
        }
        assert_eq!(locks.live(), 0);
    }
}
