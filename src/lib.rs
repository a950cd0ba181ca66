//! An asynchronous write-back cache for persisted program-model objects.
//!
//! Foreground threads `put`, `get`, `remove`, and `remove_unit` against an
//! in-memory buffer without ever blocking on storage; a single background
//! writer thread drains the buffer into a caller-supplied
//! [`StorageManager`]. `flush` and `shutdown` block their caller until the
//! buffer is fully drained.
//!
//! # Design
//! - **Two priority queues**: entries are segregated by their key's
//!   [`Behavior`] into an ordinary (small) and a large-and-mutable queue;
//!   the small queue always drains first. Within a queue, re-putting a key
//!   refreshes its position to the tail, so entries drain in best-effort
//!   order of last update.
//! - **Debounced draining**: a fixed-size bit set defers entries that were
//!   touched since the writer's previous pass, batching rapid re-writes of
//!   the same key into a single physical write. Only the latest value for
//!   a key is ever written.
//! - **Unlocked I/O**: serialization and commit run outside the cache
//!   lock, so `put` throughput is independent of storage latency.
//! - **No backpressure**: a failing store degrades to logged errors and
//!   retries; foreground responsiveness is prioritized over storage health
//!   visibility.
//!
//! # Example
//! ```no_run
//! # use std::sync::Arc;
//! # use writeback_cache::*;
//! # fn demo<K: CacheKey, V: Send + Sync + 'static>(
//! #   storage: Arc<dyn StorageManager<K, V>>,
//! #   key: K,
//! #   value: Arc<V>,
//! # ) {
//! let cache = WriteBackCacheBuilder::new(storage).build().unwrap();
//! cache.put(key, value);
//! cache.flush(); // blocks until the value is committed
//! # }
//! ```

// Public modules that form the API
pub mod builder;
pub mod error;
pub mod handles;
pub mod key;
pub mod metrics;
pub mod storage;

// Internal, crate-only modules
mod debounce;
mod shared;
mod task;

// Re-export the primary user-facing types for convenience
pub use builder::WriteBackCacheBuilder;
pub use error::BuildError;
pub use handles::{CachedValue, WriteBackCache};
pub use key::{Behavior, CacheKey, UnitId};
pub use metrics::MetricsSnapshot;
pub use storage::{OutputChannel, RemovedKeyListener, StorageManager};
