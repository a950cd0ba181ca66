use std::hash::{BuildHasher, Hash};

/// A fixed-size bit set recording which keys were touched since the writer
/// last considered them.
///
/// Slots are addressed by `hash(key) & (slots - 1)`, so unrelated keys can
/// share a slot. A collision only causes a spurious skip (the entry is
/// retried on the next pass) or a spurious re-write (the write is
/// idempotent); it can never lose a write, which is the one direction the
/// filter must not be wrong in.
pub(crate) struct DebounceFilter {
  words: Box<[u64]>,
  mask: u64,
  hasher: ahash::RandomState,
}

impl DebounceFilter {
  /// Creates a filter with `slots` bits. `slots` must be a power of two
  /// and at least 64; the builder normalizes its input accordingly.
  pub(crate) fn new(slots: usize) -> Self {
    debug_assert!(slots.is_power_of_two() && slots >= 64);
    Self {
      words: vec![0u64; slots / 64].into_boxed_slice(),
      mask: (slots - 1) as u64,
      hasher: ahash::RandomState::new(),
    }
  }

  #[inline]
  fn locate<K: Hash>(&self, key: &K) -> (usize, u64) {
    let slot = self.hasher.hash_one(key) & self.mask;
    ((slot / 64) as usize, 1u64 << (slot % 64))
  }

  /// Marks the key's slot as recently touched.
  pub(crate) fn mark<K: Hash>(&mut self, key: &K) {
    let (word, bit) = self.locate(key);
    self.words[word] |= bit;
  }

  /// Clears the key's slot and reports whether it was marked.
  pub(crate) fn take<K: Hash>(&mut self, key: &K) -> bool {
    let (word, bit) = self.locate(key);
    let was_marked = self.words[word] & bit != 0;
    self.words[word] &= !bit;
    was_marked
  }

  /// Reports whether the key's slot is marked, without clearing it.
  pub(crate) fn is_marked<K: Hash>(&self, key: &K) -> bool {
    let (word, bit) = self.locate(key);
    self.words[word] & bit != 0
  }
}
