use std::fmt;
use std::hash::Hash;

/// Identifies the translation unit a key belongs to.
///
/// Entries for a whole unit can be purged from the cache at once with
/// [`WriteBackCache::remove_unit`](crate::WriteBackCache::remove_unit),
/// e.g. when the unit is invalidated and its queued writes are moot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnitId(u32);

impl UnitId {
  pub const fn new(id: u32) -> Self {
    Self(id)
  }

  pub const fn get(self) -> u32 {
    self.0
  }
}

impl fmt::Display for UnitId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "unit#{}", self.0)
  }
}

/// The queue class of a key.
///
/// The cache keeps two insertion-ordered queues and always drains ordinary
/// (small, mostly immutable) entries before large-and-mutable ones, so that
/// many cheap writes are not starved behind a few expensive ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Behavior {
  /// A small object, typically written once and rarely superseded.
  Ordinary,
  /// A large object that is expected to be mutated and re-put repeatedly.
  LargeAndMutable,
}

/// The identity token for a persisted unit of data.
///
/// Keys are produced and owned by the caller; the cache never mutates one.
/// Equality and hash must be stable for the lifetime of a queued entry, and
/// [`behavior`](CacheKey::behavior) must always report the same class for
/// equal keys, since it alone decides which of the two queues holds the entry.
pub trait CacheKey: Eq + Hash + Clone + Send + Sync + 'static {
  /// The translation unit this key belongs to.
  fn unit(&self) -> UnitId;

  /// The queue class of this key.
  fn behavior(&self) -> Behavior;
}
