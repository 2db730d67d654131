use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use crate::entry::{EntryStatus, Slot, StoreEntry};

/// Map from key to entry.
///
/// The map lock is only held to find or insert a slot. Values are published
/// through the slot itself, so completing one key never blocks readers of
/// another.
#[derive(Debug, Default)]
pub(crate) struct Store {
  slots: RwLock<HashMap<String, Arc<Slot>>>,
}

impl Store {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  /// Return the slot for `key`, creating a pending one for `target` if the key
  /// is new. The flag is true when this call created it.
  pub(crate) fn reserve(&self, key: &str, target: &str) -> (Arc<Slot>, bool) {
    if let Some(slot) = self.slot(key) {
      return (slot, false);
    }

    let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
    // Another caller may have inserted between the read and write locks.
    if let Some(slot) = slots.get(key) {
      return (slot.clone(), false);
    }
    let slot = Arc::new(Slot::new(target));
    slots.insert(key.to_string(), slot.clone());
    (slot, true)
  }

  pub(crate) fn slot(&self, key: &str) -> Option<Arc<Slot>> {
    self
      .slots
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .get(key)
      .cloned()
  }

  pub(crate) fn status(&self, key: &str) -> Option<EntryStatus> {
    self.slot(key).map(|slot| slot.status())
  }

  pub(crate) fn len(&self) -> usize {
    self.slots.read().unwrap_or_else(PoisonError::into_inner).len()
  }

  /// Copy of every entry, ordered by key.
  pub(crate) fn snapshot(&self) -> BTreeMap<String, StoreEntry> {
    let slots: Vec<(String, Arc<Slot>)> = self
      .slots
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .iter()
      .map(|(key, slot)| (key.clone(), slot.clone()))
      .collect();

    slots
      .into_iter()
      .map(|(key, slot)| {
        let entry = slot.to_entry(&key);
        (key, entry)
      })
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_reserve_creates_once() {
    let store = Store::new();

    let (first, created) = store.reserve("a", "https://a");
    assert!(created);

    let (second, created) = store.reserve("a", "https://other");
    assert!(!created);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(second.target(), "https://a");
  }

  #[test]
  fn test_unknown_key() {
    let store = Store::new();
    assert_eq!(store.len(), 0);
    assert_eq!(store.status("missing"), None);
    assert!(store.slot("missing").is_none());
  }

  #[test]
  fn test_snapshot_is_ordered_by_key() {
    let store = Store::new();
    store.reserve("b", "https://b");
    store.reserve("a", "https://a");

    let keys: Vec<_> = store.snapshot().into_keys().collect();
    assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
    assert_eq!(store.len(), 2);
  }

  #[test]
  fn test_concurrent_reserve_single_winner() {
    let store = Arc::new(Store::new());

    let created: usize = std::thread::scope(|scope| {
      let handles: Vec<_> = (0..8)
        .map(|_| {
          let store = store.clone();
          scope.spawn(move || store.reserve("shared", "https://shared").1)
        })
        .collect();
      handles
        .into_iter()
        .map(|h| h.join().unwrap() as usize)
        .sum()
    });

    assert_eq!(created, 1);
  }
}
