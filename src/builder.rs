use crate::error::BuildError;
use crate::handles::WriteBackCache;
use crate::key::CacheKey;
use crate::metrics::Metrics;
use crate::shared::{Core, QueueState};
use crate::storage::{RemovedKeyListener, StorageManager};
use crate::task::writer::Writer;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// The writer's pacing interval when nothing forces a full-speed drain.
/// Test suites typically use something far shorter (10 ms or so).
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

const DEFAULT_DEBOUNCE_SLOTS: usize = 2048;

/// A builder for [`WriteBackCache`] instances.
pub struct WriteBackCacheBuilder<K: CacheKey, V: Send + Sync + 'static> {
  storage: Arc<dyn StorageManager<K, V>>,
  poll_interval: Duration,
  debounce_slots: usize,
  maintenance_budget: Option<Duration>,
  removed_listener: Option<Arc<dyn RemovedKeyListener<K>>>,
}

impl<K: CacheKey, V: Send + Sync + 'static> fmt::Debug for WriteBackCacheBuilder<K, V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("WriteBackCacheBuilder")
      .field("poll_interval", &self.poll_interval)
      .field("debounce_slots", &self.debounce_slots)
      .field("maintenance_budget", &self.maintenance_budget)
      .field("has_removed_listener", &self.removed_listener.is_some())
      .finish_non_exhaustive()
  }
}

impl<K: CacheKey, V: Send + Sync + 'static> WriteBackCacheBuilder<K, V> {
  /// Starts a builder draining into `storage`.
  pub fn new(storage: Arc<dyn StorageManager<K, V>>) -> Self {
    Self {
      storage,
      poll_interval: DEFAULT_POLL_INTERVAL,
      debounce_slots: DEFAULT_DEBOUNCE_SLOTS,
      maintenance_budget: None,
      removed_listener: None,
    }
  }

  /// Sets the writer's pacing interval: how long it idles between drain
  /// bursts and while the queues are empty. Flush and shutdown always
  /// drain at full speed regardless of this value.
  pub fn poll_interval(mut self, interval: Duration) -> Self {
    self.poll_interval = interval;
    self
  }

  /// Sets the size of the debounce bit set. Rounded up to a power of two,
  /// with a floor of 64. More slots mean fewer hash collisions and so
  /// fewer spurious skips and re-writes.
  pub fn debounce_slots(mut self, slots: usize) -> Self {
    self.debounce_slots = slots;
    self
  }

  /// Enables the idle-time maintenance hook on the backing store, bounding
  /// each invocation by `budget`.
  pub fn maintenance_budget(mut self, budget: Duration) -> Self {
    self.maintenance_budget = Some(budget);
    self
  }

  /// Registers a listener notified after each committed deletion record.
  pub fn removed_key_listener(mut self, listener: Arc<dyn RemovedKeyListener<K>>) -> Self {
    self.removed_listener = Some(listener);
    self
  }

  /// Validates the configuration, constructs the shared core, and spawns
  /// the writer thread.
  pub fn build(self) -> Result<WriteBackCache<K, V>, BuildError> {
    if self.debounce_slots == 0 {
      return Err(BuildError::ZeroDebounceSlots);
    }
    if self.poll_interval.is_zero() {
      return Err(BuildError::ZeroPollInterval);
    }

    let slots = self.debounce_slots.next_power_of_two().max(64);

    let core = Arc::new(Core {
      state: Mutex::new(QueueState::new(slots)),
      not_empty: Condvar::new(),
      empty: Condvar::new(),
      writer_done: Condvar::new(),
      storage: self.storage,
      removed_listener: self.removed_listener,
      metrics: Arc::new(Metrics::new()),
      poll_interval: self.poll_interval,
      maintenance_budget: self.maintenance_budget,
    });

    let writer = Writer::spawn(core.clone());
    Ok(WriteBackCache::new(core, writer))
  }
}
