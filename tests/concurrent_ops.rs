mod common;

use common::{test_cache, MockStorage, TestKey};

use std::sync::Arc;
use std::thread;
use writeback_cache::Behavior;

const THREADS: usize = 4;
const KEYS_PER_THREAD: usize = 16;
const PUTS_PER_KEY: usize = 25;

#[test]
fn final_value_per_key_is_committed_last() {
  let storage = MockStorage::new();
  let cache = test_cache(storage.clone());

  let mut handles = Vec::new();
  for t in 0..THREADS {
    let cache = cache.clone();
    handles.push(thread::spawn(move || {
      for k in 0..KEYS_PER_THREAD {
        let behavior = if k % 2 == 0 {
          Behavior::Ordinary
        } else {
          Behavior::LargeAndMutable
        };
        let key = TestKey {
          name: format!("t{t}-k{k}"),
          unit: t as u32,
          behavior,
        };
        for v in 0..PUTS_PER_KEY {
          cache.put(key.clone(), Arc::new(format!("v{v}")));
        }
      }
    }));
  }
  for handle in handles {
    handle.join().unwrap();
  }

  cache.flush();
  assert!(cache.is_empty());

  // Intermediate values may or may not have reached storage, but the last
  // committed record for every key must carry that key's final value.
  let last = format!("v{}", PUTS_PER_KEY - 1).into_bytes();
  for t in 0..THREADS {
    for k in 0..KEYS_PER_THREAD {
      let behavior = if k % 2 == 0 {
        Behavior::Ordinary
      } else {
        Behavior::LargeAndMutable
      };
      let key = TestKey {
        name: format!("t{t}-k{k}"),
        unit: t as u32,
        behavior,
      };
      let commits = storage.commits_for(&key);
      assert!(!commits.is_empty(), "key {key:?} was never written");
      assert_eq!(commits.last().unwrap().as_deref(), Some(last.as_slice()));
    }
  }
}

#[test]
fn puts_and_unit_removal_race_safely() {
  let storage = MockStorage::new();
  let cache = test_cache(storage.clone());

  // One thread fills unit 1, another repeatedly invalidates it, a third
  // fills unit 2. Whatever interleaving happens, flush must drain fully
  // and unit 2 must keep its final values.
  let writer_cache = cache.clone();
  let writer = thread::spawn(move || {
    for i in 0..200 {
      let key = TestKey::ordinary(format!("u1-{}", i % 8), 1);
      writer_cache.put(key, Arc::new(format!("v{i}")));
    }
  });

  let remover_cache = cache.clone();
  let remover = thread::spawn(move || {
    for _ in 0..50 {
      remover_cache.remove_unit(writeback_cache::UnitId::new(1));
      thread::yield_now();
    }
  });

  let other_cache = cache.clone();
  let other = thread::spawn(move || {
    for i in 0..200 {
      let key = TestKey::ordinary(format!("u2-{}", i % 8), 2);
      other_cache.put(key, Arc::new(format!("v{i}")));
    }
  });

  writer.join().unwrap();
  remover.join().unwrap();
  other.join().unwrap();

  cache.flush();
  assert!(cache.is_empty());

  for k in 0..8 {
    let key = TestKey::ordinary(format!("u2-{k}"), 2);
    let commits = storage.commits_for(&key);
    assert!(!commits.is_empty(), "unit 2 key {key:?} was never written");
    let expected = format!("v{}", 192 + k).into_bytes();
    assert_eq!(commits.last().unwrap().as_deref(), Some(expected.as_slice()));
  }
}

#[test]
fn foreground_gets_stay_responsive_during_drain() {
  let storage = MockStorage::new();
  let cache = test_cache(storage.clone());

  let reader_cache = cache.clone();
  let reader = thread::spawn(move || {
    let mut observed = 0u64;
    for i in 0..500 {
      let key = TestKey::ordinary(format!("k{}", i % 32), 1);
      if reader_cache.get(&key).is_some() {
        observed += 1;
      }
    }
    observed
  });

  for i in 0..500 {
    let key = TestKey::ordinary(format!("k{}", i % 32), 1);
    cache.put(key, Arc::new(format!("v{i}")));
  }

  reader.join().unwrap();
  cache.flush();
  assert!(cache.is_empty());
}
