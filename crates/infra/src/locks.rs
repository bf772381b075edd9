//! Per-entity mutual exclusion.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

/// One mutex per key, created on first use and dropped once nobody holds or
/// waits on it, so the map only holds keys that are currently in use.
///
/// A key is held for the duration of one mutating operation. Operations on
/// different keys only share the short map lookups.
#[derive(Debug)]
pub struct KeyedLocks<K> {
    slots: RwLock<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
        }
    }
}

impl<K> KeyedLocks<K>
where
    K: Eq + Hash + Clone + Ord,
{
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &K) -> Arc<Mutex<()>> {
        if let Some(slot) = self
            .slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
        {
            return Arc::clone(slot);
        }

        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(key.clone()).or_default())
    }

    /// Run `f` while holding `key`.
    pub fn with_lock<R>(&self, key: &K, f: impl FnOnce() -> R) -> R {
        self.with_locks(&[key], f)
    }

    /// Run `f` while holding every key. Keys are taken in ascending order and
    /// duplicates once, so two callers can never wait on each other.
    ///
    /// The mutexes guard no data; a poisoned one is reused as is.
    pub fn with_locks<R>(&self, keys: &[&K], f: impl FnOnce() -> R) -> R {
        let mut keys = keys.to_vec();
        keys.sort();
        keys.dedup();

        let slots: Vec<_> = keys.iter().map(|k| self.slot(k)).collect();
        let result = {
            let _guards: Vec<MutexGuard<'_, ()>> = slots
                .iter()
                .map(|s| s.lock().unwrap_or_else(PoisonError::into_inner))
                .collect();
            f()
        };

        drop(slots);
        self.release(&keys);
        result
    }

    /// Drop the slots of `keys` that no other caller still references.
    ///
    /// Handles are only cloned under the map lock, so a count of one seen
    /// under the write lock means the map holds the last reference.
    fn release(&self, keys: &[&K]) {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        for key in keys {
            if slots.get(*key).is_some_and(|slot| Arc::strong_count(slot) == 1) {
                slots.remove(*key);
            }
        }
    }

    /// Number of keys currently held or waited on.
    pub fn len(&self) -> usize {
        self.slots.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn same_key_is_exclusive() {
        let locks: Arc<KeyedLocks<String>> = Arc::new(KeyedLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let inside = Arc::clone(&inside);
                let max_seen = Arc::clone(&max_seen);
                thread::spawn(move || {
                    for _ in 0..50 {
                        locks.with_lock(&"V1".to_string(), || {
                            let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                            max_seen.fetch_max(now, Ordering::SeqCst);
                            thread::yield_now();
                            inside.fetch_sub(1, Ordering::SeqCst);
                        });
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn nested_locks_on_different_keys_do_not_block() {
        let locks: KeyedLocks<String> = KeyedLocks::new();
        let value = locks.with_lock(&"A".to_string(), || {
            locks.with_lock(&"B".to_string(), || 7)
        });
        assert_eq!(value, 7);
    }

    #[test]
    fn slots_are_released_after_use() {
        let locks: Arc<KeyedLocks<String>> = Arc::new(KeyedLocks::new());

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let locks = Arc::clone(&locks);
                thread::spawn(move || {
                    for i in 0..50 {
                        let own = format!("C{t}-{i}");
                        let shared = "SHARED".to_string();
                        locks.with_locks(&[&own, &shared], thread::yield_now);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert!(locks.is_empty());
    }

    #[test]
    fn nested_slot_survives_until_the_outer_call_ends() {
        let locks: KeyedLocks<String> = KeyedLocks::new();
        let a = "A".to_string();
        let b = "B".to_string();

        let held_inside = locks.with_lock(&a, || {
            locks.with_lock(&b, || ());
            locks.len()
        });

        assert_eq!(held_inside, 1);
        assert!(locks.is_empty());
    }

    #[test]
    fn duplicate_keys_are_taken_once() {
        let locks: KeyedLocks<String> = KeyedLocks::new();
        let a = "A".to_string();
        assert!(locks.with_locks(&[&a, &a], || true));
    }
}
