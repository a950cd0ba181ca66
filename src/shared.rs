use crate::debounce::DebounceFilter;
use crate::key::{Behavior, CacheKey, UnitId};
use crate::metrics::Metrics;
use crate::storage::{RemovedKeyListener, StorageManager};

use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use parking_lot::{Condvar, Mutex};

/// A queued write: the latest value for a key, or a deletion request.
///
/// Deletion is a tagged variant rather than a sentinel value, so there is
/// no reliance on reference identity anywhere.
pub(crate) enum WriteOp<V> {
  Value(Arc<V>),
  Delete,
}

// Manual impl: cloning an op never requires `V: Clone`, only a new `Arc`.
impl<V> Clone for WriteOp<V> {
  fn clone(&self) -> Self {
    match self {
      WriteOp::Value(v) => WriteOp::Value(v.clone()),
      WriteOp::Delete => WriteOp::Delete,
    }
  }
}

type SegmentMap<K, V> = IndexMap<K, WriteOp<V>, ahash::RandomState>;

/// Everything guarded by the cache's single mutex.
///
/// The two segment maps are insertion-ordered; re-inserting a key moves it
/// to the tail, so within a map entries drain in best-effort order of last
/// update. A key lives in at most one of the two maps, chosen solely by
/// its behavior class.
pub(crate) struct QueueState<K, V> {
  pub(crate) small: SegmentMap<K, V>,
  pub(crate) large: SegmentMap<K, V>,
  pub(crate) debounce: DebounceFilter,
  pub(crate) flush_waiters: usize,
  pub(crate) shutdown: bool,
  pub(crate) writer_exited: bool,
}

impl<K: CacheKey, V> QueueState<K, V> {
  pub(crate) fn new(debounce_slots: usize) -> Self {
    Self {
      small: SegmentMap::with_hasher(ahash::RandomState::new()),
      large: SegmentMap::with_hasher(ahash::RandomState::new()),
      debounce: DebounceFilter::new(debounce_slots),
      flush_waiters: 0,
      shutdown: false,
      writer_exited: false,
    }
  }

  pub(crate) fn len(&self) -> usize {
    self.small.len() + self.large.len()
  }

  pub(crate) fn is_drained(&self) -> bool {
    self.small.is_empty() && self.large.is_empty()
  }

  pub(crate) fn segment_mut(&mut self, behavior: Behavior) -> &mut SegmentMap<K, V> {
    match behavior {
      Behavior::Ordinary => &mut self.small,
      Behavior::LargeAndMutable => &mut self.large,
    }
  }

  pub(crate) fn segment(&self, behavior: Behavior) -> &SegmentMap<K, V> {
    match behavior {
      Behavior::Ordinary => &self.small,
      Behavior::LargeAndMutable => &self.large,
    }
  }

  /// Queues `op` for `key`, refreshing the key's position to the tail of
  /// its segment and marking its debounce slot. Returns `true` if an
  /// earlier op for the same key was superseded before reaching storage.
  pub(crate) fn enqueue(&mut self, key: K, op: WriteOp<V>) -> bool {
    self.debounce.mark(&key);
    let segment = self.segment_mut(key.behavior());
    let superseded = segment.shift_remove(&key).is_some();
    segment.insert(key, op);
    superseded
  }

  pub(crate) fn lookup(&self, key: &K) -> Option<&WriteOp<V>> {
    self.segment(key.behavior()).get(key)
  }

  /// Drops every queued entry belonging to `unit` without writing it.
  /// Returns the number of entries dropped.
  pub(crate) fn purge_unit(&mut self, unit: UnitId) -> usize {
    let before = self.len();
    self.small.retain(|key, _| key.unit() != unit);
    self.large.retain(|key, _| key.unit() != unit);
    before - self.len()
  }
}

/// The state shared between the foreground handles and the writer thread.
pub(crate) struct Core<K: CacheKey, V: Send + Sync + 'static> {
  pub(crate) state: Mutex<QueueState<K, V>>,
  /// Signaled by `put`/`remove` and by flush/shutdown to wake the writer.
  pub(crate) not_empty: Condvar,
  /// Signaled by the writer whenever both segment maps drain.
  pub(crate) empty: Condvar,
  /// Signaled by the writer exactly once, when it exits its loop.
  pub(crate) writer_done: Condvar,
  pub(crate) storage: Arc<dyn StorageManager<K, V>>,
  pub(crate) removed_listener: Option<Arc<dyn RemovedKeyListener<K>>>,
  pub(crate) metrics: Arc<Metrics>,
  pub(crate) poll_interval: Duration,
  pub(crate) maintenance_budget: Option<Duration>,
}
