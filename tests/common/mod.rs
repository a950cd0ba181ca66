#![allow(dead_code)]

use std::io::{self, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use writeback_cache::{
  Behavior, CacheKey, OutputChannel, RemovedKeyListener, StorageManager, UnitId, WriteBackCache,
  WriteBackCacheBuilder,
};

/// A key over a name, with an explicit unit and behavior class.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TestKey {
  pub name: String,
  pub unit: u32,
  pub behavior: Behavior,
}

impl TestKey {
  pub fn ordinary(name: impl Into<String>, unit: u32) -> Self {
    Self {
      name: name.into(),
      unit,
      behavior: Behavior::Ordinary,
    }
  }

  pub fn large(name: impl Into<String>, unit: u32) -> Self {
    Self {
      name: name.into(),
      unit,
      behavior: Behavior::LargeAndMutable,
    }
  }
}

impl CacheKey for TestKey {
  fn unit(&self) -> UnitId {
    UnitId::new(self.unit)
  }

  fn behavior(&self) -> Behavior {
    self.behavior
  }
}

/// One committed record: the key it was written for, and the serialized
/// payload (`None` for a deletion record).
pub type Commit = (TestKey, Option<Vec<u8>>);

#[derive(Default)]
struct MockState {
  failing: bool,
  commits: Vec<Commit>,
  maintenance_calls: u64,
  maintenance_rounds_left: u64,
}

/// An in-memory storage backend recording every committed write in order,
/// with switchable failure injection and a counting maintenance hook.
#[derive(Default)]
pub struct MockStorage {
  state: Arc<Mutex<MockState>>,
}

impl MockStorage {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  /// With `rounds > 0`, `maintenance` keeps reporting work remaining
  /// until `rounds` invocations have occurred.
  pub fn with_maintenance_rounds(rounds: u64) -> Arc<Self> {
    let storage = Self::default();
    storage.state.lock().maintenance_rounds_left = rounds;
    Arc::new(storage)
  }

  /// While failing, every `open` returns an injected I/O error.
  pub fn set_failing(&self, failing: bool) {
    self.state.lock().failing = failing;
  }

  pub fn commits(&self) -> Vec<Commit> {
    self.state.lock().commits.clone()
  }

  pub fn commits_for(&self, key: &TestKey) -> Vec<Option<Vec<u8>>> {
    self
      .state
      .lock()
      .commits
      .iter()
      .filter(|(k, _)| k == key)
      .map(|(_, payload)| payload.clone())
      .collect()
  }

  pub fn maintenance_calls(&self) -> u64 {
    self.state.lock().maintenance_calls
  }
}

impl StorageManager<TestKey, String> for MockStorage {
  fn open(&self, key: &TestKey) -> io::Result<Box<dyn OutputChannel>> {
    let state = self.state.lock();
    if state.failing {
      return Err(io::Error::new(io::ErrorKind::Other, "injected failure"));
    }
    Ok(Box::new(MockChannel {
      key: key.clone(),
      buf: Vec::new(),
      storage: self.state.clone(),
    }))
  }

  fn serialize(&self, _key: &TestKey, value: Option<&String>, out: &mut dyn Write) -> io::Result<()> {
    match value {
      Some(v) => out.write_all(v.as_bytes()),
      // A deletion record: a single marker byte the channel recognizes.
      None => out.write_all(&[0]),
    }
  }

  fn maintenance(&self, _budget: Duration) -> bool {
    let mut state = self.state.lock();
    state.maintenance_calls += 1;
    if state.maintenance_rounds_left > 0 {
      state.maintenance_rounds_left -= 1;
    }
    state.maintenance_rounds_left > 0
  }
}

struct MockChannel {
  key: TestKey,
  buf: Vec<u8>,
  storage: Arc<Mutex<MockState>>,
}

impl Write for MockChannel {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    self.buf.extend_from_slice(buf);
    Ok(buf.len())
  }

  fn flush(&mut self) -> io::Result<()> {
    Ok(())
  }
}

impl OutputChannel for MockChannel {
  fn commit(self: Box<Self>) -> io::Result<()> {
    let mut state = self.storage.lock();
    if state.failing {
      return Err(io::Error::new(io::ErrorKind::Other, "injected failure"));
    }
    let payload = if self.buf == [0] { None } else { Some(self.buf) };
    state.commits.push((self.key, payload));
    Ok(())
  }
}

/// A removed-key listener recording every notification.
#[derive(Default)]
pub struct RecordingListener {
  removed: Mutex<Vec<TestKey>>,
}

impl RecordingListener {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  pub fn removed(&self) -> Vec<TestKey> {
    self.removed.lock().clone()
  }
}

impl RemovedKeyListener<TestKey> for RecordingListener {
  fn key_removed(&self, key: &TestKey) {
    self.removed.lock().push(key.clone());
  }
}

/// Builds a cache with the fast test poll interval.
pub fn test_cache(storage: Arc<MockStorage>) -> WriteBackCache<TestKey, String> {
  WriteBackCacheBuilder::new(storage)
    .poll_interval(Duration::from_millis(10))
    .build()
    .unwrap()
}

/// Spins until `predicate` holds, panicking after `timeout`.
pub fn wait_until(timeout: Duration, predicate: impl Fn() -> bool) {
  let deadline = Instant::now() + timeout;
  while !predicate() {
    assert!(Instant::now() < deadline, "condition not reached in time");
    std::thread::sleep(Duration::from_millis(2));
  }
}
