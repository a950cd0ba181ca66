//! This module contains the cache's background task: the writer thread
//! that drains queued entries into the backing store.

pub(crate) mod writer;
