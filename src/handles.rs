use crate::key::{CacheKey, UnitId};
use crate::metrics::MetricsSnapshot;
use crate::shared::{Core, WriteOp};
use crate::task::writer::Writer;

use std::fmt;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::Mutex;

/// The result of a cache lookup that found a queued entry.
#[derive(Debug)]
pub enum CachedValue<V> {
  /// The latest value queued for the key.
  Live(Arc<V>),
  /// A deletion is queued for the key; the backing store may still hold
  /// stale bytes, but callers must treat the key as gone.
  Removed,
}

/// A handle to an asynchronous write-back cache.
///
/// Handles are cheap to clone and share; they all point at the same queue
/// and the same background writer. Construct one with
/// [`WriteBackCacheBuilder`](crate::WriteBackCacheBuilder) and pass it to
/// whoever produces or consumes persisted objects; there is deliberately
/// no global instance.
///
/// Dropping the last handle shuts the cache down, draining every queued
/// entry first.
pub struct WriteBackCache<K: CacheKey, V: Send + Sync + 'static> {
  shared: Arc<CacheShared<K, V>>,
}

impl<K: CacheKey, V: Send + Sync + 'static> Clone for WriteBackCache<K, V> {
  fn clone(&self) -> Self {
    Self {
      shared: self.shared.clone(),
    }
  }
}

impl<K: CacheKey, V: Send + Sync + 'static> fmt::Debug for WriteBackCache<K, V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("WriteBackCache")
      .field("queued", &self.len())
      .field("metrics", &self.metrics())
      .finish_non_exhaustive()
  }
}

impl<K: CacheKey, V: Send + Sync + 'static> WriteBackCache<K, V> {
  pub(crate) fn new(core: Arc<Core<K, V>>, writer: Writer) -> Self {
    Self {
      shared: Arc::new(CacheShared {
        core,
        writer: Mutex::new(Some(writer)),
      }),
    }
  }

  /// Queues `value` as the latest state of `key`.
  ///
  /// The cache holds the `Arc`, not a deep copy: the value may be
  /// serialized at any point between this call and write completion, so a
  /// caller that keeps mutating it gets last-write-wins semantics at the
  /// object level, not at field granularity. Re-putting a key before it
  /// drains supersedes the queued op; the older value is never written.
  ///
  /// Never blocks on I/O. Panics if the cache has been shut down: that is
  /// a caller bug, not a recoverable condition.
  pub fn put(&self, key: K, value: Arc<V>) {
    let superseded = self.shared.enqueue(key, WriteOp::Value(value));
    let metrics = &self.shared.core.metrics;
    metrics.puts.fetch_add(1, Ordering::Relaxed);
    if superseded {
      metrics.superseded_puts.fetch_add(1, Ordering::Relaxed);
    }
  }

  /// Queues a deletion for `key`. Supersedes any queued value. Once the
  /// deletion record is committed, the removed-key listener (if any) is
  /// notified. Panics if the cache has been shut down.
  pub fn remove(&self, key: K) {
    self.shared.enqueue(key, WriteOp::Delete);
    self
      .shared
      .core
      .metrics
      .removals_queued
      .fetch_add(1, Ordering::Relaxed);
  }

  /// Returns the queued state of `key`, if the cache holds one.
  ///
  /// `None` means the key is simply not cached; callers fall through to
  /// the backing store. Never blocks on I/O.
  pub fn get(&self, key: &K) -> Option<CachedValue<V>> {
    let state = self.shared.core.state.lock();
    let found = state.lookup(key).map(|op| match op {
      WriteOp::Value(v) => CachedValue::Live(v.clone()),
      WriteOp::Delete => CachedValue::Removed,
    });

    let metrics = &self.shared.core.metrics;
    match found {
      Some(_) => metrics.hits.fetch_add(1, Ordering::Relaxed),
      None => metrics.misses.fetch_add(1, Ordering::Relaxed),
    };
    found
  }

  /// Drops every queued entry belonging to `unit` without writing it.
  ///
  /// Linear in the number of outstanding entries; unit invalidation is
  /// rare relative to puts.
  pub fn remove_unit(&self, unit: UnitId) {
    let core = &self.shared.core;
    let mut state = core.state.lock();
    let purged = state.purge_unit(unit);
    if purged > 0 {
      core
        .metrics
        .entries_purged
        .fetch_add(purged as u64, Ordering::Relaxed);
    }
    if state.is_drained() {
      core.empty.notify_all();
    }
  }

  /// Blocks until both segment maps are empty.
  ///
  /// While a flush is pending the writer drains at full speed, with no
  /// inter-burst pause. All concurrent flush callers are released together
  /// when the queues drain. There is no timeout: a stuck backing store
  /// stalls the flush, bounded by I/O rather than by this crate.
  pub fn flush(&self) {
    let core = &self.shared.core;
    let mut state = core.state.lock();
    state.flush_waiters += 1;
    core.not_empty.notify_all();
    while !state.is_drained() {
      core.empty.wait(&mut state);
    }
    state.flush_waiters -= 1;
    core.metrics.flushes.fetch_add(1, Ordering::Relaxed);
  }

  /// Flushes on behalf of one unit. Currently equivalent to a full
  /// [`flush`](Self::flush); the queues drain completely either way.
  pub fn flush_unit(&self, unit: UnitId) {
    let _ = unit;
    self.flush();
  }

  /// Drains everything, stops the writer thread, and joins it.
  ///
  /// Idempotent: later calls (including calls racing with the first)
  /// return once the first one has completed. After shutdown, `put` and
  /// `remove` panic.
  pub fn shutdown(&self) {
    self.shared.shutdown();
  }

  /// The number of entries currently queued across both segment maps.
  pub fn len(&self) -> usize {
    self.shared.core.state.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.shared.core.state.lock().is_drained()
  }

  /// A point-in-time snapshot of the cache's counters.
  pub fn metrics(&self) -> MetricsSnapshot {
    self.shared.core.metrics.snapshot()
  }
}

/// Owns the writer thread on behalf of all handles. Dropping it (when the
/// last handle goes away) performs a full shutdown drain.
pub(crate) struct CacheShared<K: CacheKey, V: Send + Sync + 'static> {
  core: Arc<Core<K, V>>,
  writer: Mutex<Option<Writer>>,
}

impl<K: CacheKey, V: Send + Sync + 'static> CacheShared<K, V> {
  fn enqueue(&self, key: K, op: WriteOp<V>) -> bool {
    let mut state = self.core.state.lock();
    assert!(
      !state.shutdown,
      "write-back cache used after shutdown"
    );
    let superseded = state.enqueue(key, op);
    self.core.not_empty.notify_one();
    superseded
  }

  fn shutdown(&self) {
    {
      let mut state = self.core.state.lock();
      if !state.shutdown {
        state.shutdown = true;
        self.core.not_empty.notify_all();
      }
      while !state.writer_exited {
        self.core.writer_done.wait(&mut state);
      }
    }
    // Exactly one caller gets to join the thread; the rest have already
    // seen writer_exited above.
    if let Some(writer) = self.writer.lock().take() {
      writer.join();
    }
  }
}

impl<K: CacheKey, V: Send + Sync + 'static> Drop for CacheShared<K, V> {
  fn drop(&mut self) {
    self.shutdown();
  }
}
