//! Locking behaviour across concurrent store handles

use dotyaml_store::{FileLock, LockError, LockMode, Path, StoreError, StoreOptions, Value};
use dotyaml_test_utils::TempConfig;
use std::thread;
use std::time::Duration;

const THREADS: usize = 8;
const PUSHES: usize = 5;

#[test]
fn test_concurrent_pushes_all_land() {
    let config = TempConfig::new("# shared\nitems: []\n");

    thread::scope(|scope| {
        for t in 0..THREADS {
            let store = config.store();
            scope.spawn(move || {
                for i in 0..PUSHES {
                    let n = i64::try_from(t * PUSHES + i).unwrap();
                    store.push("items", Value::from(n)).unwrap();
                }
            });
        }
    });

    let doc = config.document();
    let items = doc
        .get(&Path::parse("items"))
        .and_then(Value::as_sequence)
        .unwrap();
    assert_eq!(items.len(), THREADS * PUSHES);

    let mut seen: Vec<i64> = items
        .iter()
        .map(|v| v.to_string().parse().unwrap())
        .collect();
    seen.sort_unstable();
    let expected: Vec<i64> = (0..i64::try_from(THREADS * PUSHES).unwrap()).collect();
    assert_eq!(seen, expected);
    assert!(config.leftover_temp_files().is_empty());
}

#[test]
fn test_concurrent_sets_to_distinct_keys() {
    let config = TempConfig::new("counters: {}\n");

    thread::scope(|scope| {
        for t in 0..THREADS {
            let store = config.store();
            scope.spawn(move || {
                store.set_raw(&format!("counters.c{t}"), &t.to_string()).unwrap();
            });
        }
    });

    let store = config.store();
    for t in 0..THREADS {
        let value = store.get(&format!("counters.c{t}")).unwrap();
        assert_eq!(value.to_string(), t.to_string());
    }
}

#[test]
fn test_held_lock_times_out_writer() {
    let config = TempConfig::new("a: 1\n");
    let _held = FileLock::acquire(config.path(), LockMode::Exclusive, None).unwrap();

    let store = config.store_with(StoreOptions::new().with_lock_timeout(Duration::from_millis(50)));
    let err = store.set_raw("a", "2").unwrap_err();
    assert!(matches!(
        err,
        StoreError::Lock(LockError::Timeout {
            mode: LockMode::Exclusive,
            ..
        })
    ));
    assert_eq!(config.read(), "a: 1\n");
}

#[test]
fn test_writer_blocks_reader_until_released() {
    let config = TempConfig::new("a: 1\n");
    let held = FileLock::acquire(config.path(), LockMode::Exclusive, None).unwrap();

    let timed = config.store_with(StoreOptions::new().with_lock_timeout(Duration::from_millis(30)));
    assert!(matches!(
        timed.get("a").unwrap_err(),
        StoreError::Lock(LockError::Timeout {
            mode: LockMode::Shared,
            ..
        })
    ));

    drop(held);
    assert_eq!(timed.get("a").unwrap(), Value::from(1));
}

#[test]
fn test_readers_share_lock() {
    let config = TempConfig::new("a: 1\n");
    let _reader = FileLock::acquire(config.path(), LockMode::Shared, None).unwrap();

    let store = config.store_with(StoreOptions::new().with_lock_timeout(Duration::from_millis(30)));
    assert_eq!(store.get("a").unwrap(), Value::from(1));
    assert!(store.set_raw("a", "2").is_err());
}
