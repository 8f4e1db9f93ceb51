use std::collections::hash_map::DefaultHasher;
use std::hash::{
  Hash,
  Hasher
};

use tracing::{
  debug,
  trace
};

#[must_use]
pub fn structural_hash<T>(
  value: &T
) -> u64
where
  T: Hash + ?Sized
{
  let mut hasher = DefaultHasher::new();
  value.hash(&mut hasher);
  hasher.finish()
}

#[derive(Debug, Clone)]
struct Slot<K, V> {
  hash:  u64,
  key:   K,
  value: V
}

/// Single-slot cache for a pure computation. The hash of the inputs is a
/// quick pre-check; a hit also needs the stored inputs to compare equal,
/// so a hash collision only costs a recompute.
#[derive(Debug, Clone)]
pub struct Memo<K, V> {
  slot:   Option<Slot<K, V>>,
  hits:   u64,
  misses: u64
}

impl<K, V> Default for Memo<K, V> {
  fn default() -> Self {
    Self {
      slot:   None,
      hits:   0,
      misses: 0
    }
  }
}

impl<K, V> Memo<K, V>
where
  K: Hash + PartialEq
{
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  pub fn get_or_compute<F>(
    &mut self,
    key: K,
    compute: F
  ) -> &V
  where
    F: FnOnce(&K) -> V
  {
    let hash = structural_hash(&key);
    let (same_hash, fresh) =
      match &self.slot {
        | Some(slot) if slot.hash == hash => {
          (true, slot.key == key)
        }
        | _ => (false, false)
      };

    if fresh {
      self.hits += 1;
      trace!(hash, "memo hit");
    } else {
      self.misses += 1;
      if same_hash {
        debug!(
          hash,
          "memo hash collision; recomputing"
        );
      } else {
        trace!(hash, "memo miss; recomputing");
      }
      self.slot = None;
    }

    let slot =
      self.slot.get_or_insert_with(|| {
        let value = compute(&key);
        Slot {
          hash,
          key,
          value
        }
      });
    &slot.value
  }

  #[must_use]
  pub fn hits(&self) -> u64 {
    self.hits
  }

  #[must_use]
  pub fn misses(&self) -> u64 {
    self.misses
  }
}
