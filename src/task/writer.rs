use crate::key::CacheKey;
use crate::shared::{Core, WriteOp};
use crate::storage::StorageManager;

use std::io;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// The background task that drains the segment maps into storage.
///
/// There is exactly one writer per cache. It is the only thread that ever
/// performs storage I/O, and it does so outside the cache lock, so
/// foreground `put` throughput is independent of storage latency.
pub(crate) struct Writer {
  handle: JoinHandle<()>,
}

impl Writer {
  /// Spawns the writer thread.
  pub(crate) fn spawn<K, V>(core: Arc<Core<K, V>>) -> Self
  where
    K: CacheKey,
    V: Send + Sync + 'static,
  {
    let handle = thread::spawn(move || run(core));
    Self { handle }
  }

  /// Waits for the writer thread to exit. Callers must have signaled
  /// shutdown first, or this blocks forever.
  pub(crate) fn join(self) {
    let _ = self.handle.join();
  }
}

fn run<K, V>(core: Arc<Core<K, V>>)
where
  K: CacheKey,
  V: Send + Sync + 'static,
{
  // Whether the backing store reported outstanding maintenance work the
  // last time it was asked. Any committed write may create new work.
  let mut maintenance_pending = core.maintenance_budget.is_some();

  loop {
    // Sample the combined queue length once; it is this cycle's burst
    // size, so the writer self-paces instead of busy-looping on a queue
    // that refills as fast as it drains.
    let burst = core.state.lock().len();

    if burst == 0 {
      if idle(&core, &mut maintenance_pending) {
        return;
      }
      continue;
    }

    for _ in 0..burst {
      match select_entry(&core) {
        Some((key, op)) => {
          if write_entry(&core, &key, &op) {
            maintenance_pending = core.maintenance_budget.is_some();
            finish_entry(&core, &key);
          }
        }
        // Every queued entry was debounce-deferred; end the pass.
        None => break,
      }
    }

    pace(&core);
  }
}

/// Handles the empty-queue state. Returns `true` when the writer should
/// exit (terminal shutdown drain is complete).
fn idle<K, V>(core: &Core<K, V>, maintenance_pending: &mut bool) -> bool
where
  K: CacheKey,
  V: Send + Sync + 'static,
{
  {
    let mut state = core.state.lock();
    if !state.is_drained() {
      // A put raced in since the burst sample; go drain it.
      return false;
    }

    core.empty.notify_all();

    if state.shutdown {
      state.writer_exited = true;
      core.writer_done.notify_all();
      return true;
    }
  }

  // Maintenance is storage I/O, so it runs outside the lock like any
  // other write. It only runs while the cache is idle and only while the
  // store reports work remaining.
  if *maintenance_pending {
    if let Some(budget) = core.maintenance_budget {
      core.metrics.maintenance_runs.fetch_add(1, Ordering::Relaxed);
      *maintenance_pending = core.storage.maintenance(budget);
    }
  }

  let mut state = core.state.lock();
  if state.is_drained() && !state.shutdown {
    core.not_empty.wait_for(&mut state, core.poll_interval);
  }
  false
}

/// Picks the next entry to write: the first entry of the small map, then
/// the large map, whose debounce slot is clear. Entries whose slot is set
/// were touched since the previous pass; their slot is cleared and they
/// are deferred to the next pass, batching rapid re-writes.
///
/// The selected entry stays in its map while its write is in flight, so
/// `get` keeps hitting and `flush` keeps waiting until the write lands.
fn select_entry<K, V>(core: &Core<K, V>) -> Option<(K, WriteOp<V>)>
where
  K: CacheKey,
  V: Send + Sync + 'static,
{
  let mut guard = core.state.lock();
  let state = &mut *guard;

  for segment in [&state.small, &state.large] {
    for index in 0..segment.len() {
      let Some((key, op)) = segment.get_index(index) else {
        break;
      };
      if state.debounce.take(key) {
        core.metrics.debounce_skips.fetch_add(1, Ordering::Relaxed);
        continue;
      }
      return Some((key.clone(), op.clone()));
    }
  }

  None
}

/// Performs the open/serialize/commit sequence for one entry, outside the
/// lock. Returns `true` on success. A failure is logged and counted, the
/// entry's debounce slot is marked so the retry lands on a later pass, and
/// the writer moves on; one bad write never stops the loop.
fn write_entry<K, V>(core: &Core<K, V>, key: &K, op: &WriteOp<V>) -> bool
where
  K: CacheKey,
  V: Send + Sync + 'static,
{
  let value = match op {
    WriteOp::Value(v) => Some(v.as_ref()),
    WriteOp::Delete => None,
  };

  match commit_one(core.storage.as_ref(), key, value) {
    Ok(()) => {
      match op {
        WriteOp::Value(_) => {
          core.metrics.writes_committed.fetch_add(1, Ordering::Relaxed);
        }
        WriteOp::Delete => {
          core.metrics.deletes_committed.fetch_add(1, Ordering::Relaxed);
          // The removal is durable; the external index may now drop the key.
          if let Some(listener) = &core.removed_listener {
            listener.key_removed(key);
          }
        }
      }
      true
    }
    Err(err) => {
      log::error!("write-back for {} failed: {}", key.unit(), err);
      core.metrics.write_errors.fetch_add(1, Ordering::Relaxed);
      core.state.lock().debounce.mark(key);
      false
    }
  }
}

fn commit_one<K, V>(
  storage: &dyn StorageManager<K, V>,
  key: &K,
  value: Option<&V>,
) -> io::Result<()> {
  let mut channel = storage.open(key)?;
  storage.serialize(key, value, &mut *channel)?;
  channel.commit()
}

/// Removes a written entry from its map, unless it was re-put while the
/// write was in flight (its debounce slot is set again), in which case it
/// stays queued and the newer value is written on a later pass.
fn finish_entry<K, V>(core: &Core<K, V>, key: &K)
where
  K: CacheKey,
  V: Send + Sync + 'static,
{
  let mut guard = core.state.lock();
  let state = &mut *guard;

  if state.debounce.is_marked(key) {
    return;
  }

  state.segment_mut(key.behavior()).shift_remove(key);
  if state.is_drained() {
    core.empty.notify_all();
  }
}

/// The inter-burst throttle: a short timed wait, skipped entirely while a
/// flush or shutdown is draining at full speed. A `put` arriving during
/// the wait ends it early.
fn pace<K, V>(core: &Core<K, V>)
where
  K: CacheKey,
  V: Send + Sync + 'static,
{
  let mut state = core.state.lock();
  if state.flush_waiters > 0 || state.shutdown {
    return;
  }
  core.not_empty.wait_for(&mut state, core.poll_interval);
}
