use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crossbeam_utils::CachePadded;

/// A thread-safe, internal metrics collector for the cache.
/// All fields are atomic to allow for lock-free updates.
#[derive(Debug)]
pub(crate) struct Metrics {
  // --- Foreground traffic ---
  pub(crate) puts: CachePadded<AtomicU64>,
  pub(crate) superseded_puts: CachePadded<AtomicU64>,
  pub(crate) removals_queued: CachePadded<AtomicU64>,
  pub(crate) hits: CachePadded<AtomicU64>,
  pub(crate) misses: CachePadded<AtomicU64>,
  pub(crate) entries_purged: CachePadded<AtomicU64>,
  pub(crate) flushes: CachePadded<AtomicU64>,

  // --- Writer thread ---
  pub(crate) debounce_skips: CachePadded<AtomicU64>,
  pub(crate) writes_committed: CachePadded<AtomicU64>,
  pub(crate) deletes_committed: CachePadded<AtomicU64>,
  pub(crate) write_errors: CachePadded<AtomicU64>,
  pub(crate) maintenance_runs: CachePadded<AtomicU64>,

  created_at: Instant,
}

impl Default for Metrics {
  fn default() -> Self {
    Self {
      puts: CachePadded::new(AtomicU64::new(0)),
      superseded_puts: CachePadded::new(AtomicU64::new(0)),
      removals_queued: CachePadded::new(AtomicU64::new(0)),
      hits: CachePadded::new(AtomicU64::new(0)),
      misses: CachePadded::new(AtomicU64::new(0)),
      entries_purged: CachePadded::new(AtomicU64::new(0)),
      flushes: CachePadded::new(AtomicU64::new(0)),
      debounce_skips: CachePadded::new(AtomicU64::new(0)),
      writes_committed: CachePadded::new(AtomicU64::new(0)),
      deletes_committed: CachePadded::new(AtomicU64::new(0)),
      write_errors: CachePadded::new(AtomicU64::new(0)),
      maintenance_runs: CachePadded::new(AtomicU64::new(0)),
      created_at: Instant::now(),
    }
  }
}

impl Metrics {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  /// Creates a point-in-time snapshot of the current metrics.
  pub(crate) fn snapshot(&self) -> MetricsSnapshot {
    MetricsSnapshot {
      puts: self.puts.load(Ordering::Relaxed),
      superseded_puts: self.superseded_puts.load(Ordering::Relaxed),
      removals_queued: self.removals_queued.load(Ordering::Relaxed),
      hits: self.hits.load(Ordering::Relaxed),
      misses: self.misses.load(Ordering::Relaxed),
      entries_purged: self.entries_purged.load(Ordering::Relaxed),
      flushes: self.flushes.load(Ordering::Relaxed),
      debounce_skips: self.debounce_skips.load(Ordering::Relaxed),
      writes_committed: self.writes_committed.load(Ordering::Relaxed),
      deletes_committed: self.deletes_committed.load(Ordering::Relaxed),
      write_errors: self.write_errors.load(Ordering::Relaxed),
      maintenance_runs: self.maintenance_runs.load(Ordering::Relaxed),
      uptime_secs: self.created_at.elapsed().as_secs(),
    }
  }
}

/// A point-in-time, public-facing snapshot of the cache's metrics.
#[derive(Clone)]
pub struct MetricsSnapshot {
  /// The number of values queued via `put`.
  pub puts: u64,
  /// The number of puts that replaced an already-queued entry for the same
  /// key before it reached storage (the older value was never written).
  pub superseded_puts: u64,
  /// The number of deletions queued via `remove`.
  pub removals_queued: u64,
  /// The number of `get` calls that found a queued entry.
  pub hits: u64,
  /// The number of `get` calls that fell through to storage.
  pub misses: u64,
  /// The number of entries dropped by `remove_unit` without being written.
  pub entries_purged: u64,
  /// The number of completed `flush` calls.
  pub flushes: u64,
  /// The number of times the writer deferred an entry because it had been
  /// touched since the previous pass.
  pub debounce_skips: u64,
  /// The number of values committed to storage.
  pub writes_committed: u64,
  /// The number of deletion records committed to storage.
  pub deletes_committed: u64,
  /// The number of failed write attempts (each is retried later).
  pub write_errors: u64,
  /// The number of idle-time maintenance invocations on the backing store.
  pub maintenance_runs: u64,
  /// The number of seconds the cache has been running.
  pub uptime_secs: u64,
}

impl fmt::Debug for MetricsSnapshot {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MetricsSnapshot")
      .field("puts", &self.puts)
      .field("superseded_puts", &self.superseded_puts)
      .field("removals_queued", &self.removals_queued)
      .field("hits", &self.hits)
      .field("misses", &self.misses)
      .field("entries_purged", &self.entries_purged)
      .field("flushes", &self.flushes)
      .field("debounce_skips", &self.debounce_skips)
      .field("writes_committed", &self.writes_committed)
      .field("deletes_committed", &self.deletes_committed)
      .field("write_errors", &self.write_errors)
      .field("maintenance_runs", &self.maintenance_runs)
      .field("uptime_secs", &self.uptime_secs)
      .finish()
  }
}
