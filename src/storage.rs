use std::io;
use std::time::Duration;

/// A per-key output channel opened against the backing store.
///
/// Bytes written through the `io::Write` impl are not durable until
/// [`commit`](OutputChannel::commit) returns `Ok`. Dropping a channel
/// without committing abandons the write.
pub trait OutputChannel: io::Write + Send {
  /// Makes the written bytes durable.
  fn commit(self: Box<Self>) -> io::Result<()>;
}

/// The backing-store abstraction the cache drains into.
///
/// Implementations own the on-disk format entirely; the cache only opens a
/// channel per key, asks the store to serialize the value into it, and
/// commits. All three steps run on the background writer thread, outside
/// the cache lock, so they may block on I/O freely.
pub trait StorageManager<K, V>: Send + Sync {
  /// Opens an output channel for `key`.
  fn open(&self, key: &K) -> io::Result<Box<dyn OutputChannel>>;

  /// Serializes `value` for `key` into `out`.
  ///
  /// `None` requests a deletion record: the key's backing object is being
  /// removed rather than rewritten.
  fn serialize(&self, key: &K, value: Option<&V>, out: &mut dyn io::Write) -> io::Result<()>;

  /// Optional maintenance hook (e.g. compaction), called by the writer
  /// thread only while the cache is idle, bounded by `budget`.
  ///
  /// Returns `true` if more maintenance work remains, in which case the
  /// writer calls again on a later idle cycle.
  fn maintenance(&self, budget: Duration) -> bool {
    let _ = budget;
    false
  }
}

/// Receives a notification after a deletion record has been committed.
///
/// This lets an external index or catalog drop its reference to the key
/// only once the removal is actually durable.
pub trait RemovedKeyListener<K>: Send + Sync {
  fn key_removed(&self, key: &K);
}
