use std::time::Duration;

use fdpool_cache::{EvictionCondition, EvictionPolicy, ManualClock};
use fdpool_cfg::ConfigSet;

use crate::pool::HandlePool;
use crate::{Error, OpenOptions, MAX_OPEN_HANDLES};

fn test_configs() -> ConfigSet {
    let mut builder = ConfigSet::builder();
    crate::register_configs(&mut builder);
    builder.build()
}

/// Creates `names` in a fresh temporary directory, returning their paths.
fn temp_files(names: &[&str]) -> (tempfile::TempDir, Vec<String>) {
    let dir = tempfile::TempDir::new().unwrap();
    let paths = names
        .iter()
        .map(|name| {
            let path = dir.path().join(name);
            std::fs::write(&path, name.as_bytes()).unwrap();
            path.to_string_lossy().to_string()
        })
        .collect();
    (dir, paths)
}

#[test]
fn smoketest_open_reuses_handle() {
    let (_dir, paths) = temp_files(&["hello.txt"]);
    let pool = HandlePool::new(test_configs());

    let first = pool.open(&paths[0], OpenOptions::READ_ONLY).unwrap();
    let second = pool.open(&paths[0], OpenOptions::READ_ONLY).unwrap();
    assert_eq!(first, second);
    assert_eq!(pool.len(), 1);

    let stat = first.stat().unwrap();
    assert_eq!(stat.size, "hello.txt".len() as u64);

    assert!(pool.close(&paths[0]).unwrap());
    assert!(!pool.close(&paths[0]).unwrap());
    assert!(pool.is_empty());
}

#[test]
fn open_creates_files() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("new.txt").to_string_lossy().to_string();
    let pool = HandlePool::new(test_configs());

    pool.open(&path, OpenOptions::READ_WRITE | OpenOptions::CREATE)
        .unwrap();
    assert!(std::path::Path::new(&path).exists());
    assert_eq!(pool.close_all().closed.len(), 1);
}

#[test]
fn open_failures_are_not_tracked() {
    let dir = tempfile::TempDir::new().unwrap();
    let missing = dir.path().join("missing.txt").to_string_lossy().to_string();
    let pool = HandlePool::new(test_configs());

    let err = pool.open(&missing, OpenOptions::READ_ONLY).unwrap_err();
    assert_eq!(err.raw_os_error(), Some(libc::ENOENT));
    assert!(matches!(
        pool.open("", OpenOptions::READ_ONLY),
        Err(Error::InvalidPath(_))
    ));
    assert!(pool.is_empty());
}

#[test]
fn limit_evicts_least_recently_used() {
    let (_dir, paths) = temp_files(&["a", "b", "c"]);
    let configs = test_configs();
    configs.update(&MAX_OPEN_HANDLES, 2);
    let pool = HandlePool::new(configs);

    pool.open(&paths[0], OpenOptions::READ_ONLY).unwrap();
    pool.open(&paths[1], OpenOptions::READ_ONLY).unwrap();
    // Using `a` again makes `b` the least recently used.
    pool.open(&paths[0], OpenOptions::READ_ONLY).unwrap();
    pool.open(&paths[2], OpenOptions::READ_ONLY).unwrap();

    assert_eq!(pool.len(), 2);
    assert!(pool.contains(&paths[0]));
    assert!(!pool.contains(&paths[1]));
    assert!(pool.contains(&paths[2]));
    assert!(pool.enforce_limit().is_none());

    pool.close_all();
}

#[test]
fn evict_stale_handles() {
    let (_dir, paths) = temp_files(&["old-1", "old-2", "fresh"]);
    let clock = ManualClock::new();
    let configs = test_configs();
    configs.try_update("eviction_age", "5m").unwrap();
    let pool = HandlePool::with_clock(configs, clock.clone());

    pool.open(&paths[0], OpenOptions::READ_ONLY).unwrap();
    pool.open(&paths[1], OpenOptions::READ_ONLY).unwrap();
    clock.advance(Duration::from_secs(10 * 60));
    pool.open(&paths[2], OpenOptions::READ_ONLY).unwrap();

    let report = pool.evict_configured().unwrap();
    let closed: Vec<_> = report.closed.iter().map(|path| path.to_string()).collect();
    assert_eq!(closed, &paths[..2]);
    assert!(report.failed.is_empty());
    assert_eq!(pool.paths().len(), 1);
    assert!(pool.contains(&paths[2]));

    pool.close_all();
}

#[test]
fn evict_with_explicit_policy() {
    let (_dir, paths) = temp_files(&["a", "b", "c", "d"]);
    let pool = HandlePool::new(test_configs());
    for path in &paths {
        pool.open(path, OpenOptions::READ_ONLY).unwrap();
    }

    let policy = EvictionPolicy::builder(EvictionCondition::all())
        .percentage(fdpool_cache::Bound::Fraction(0.5))
        .build()
        .unwrap();
    let report = pool.evict(&policy).unwrap();
    assert_eq!(report.closed.len(), 2);
    assert_eq!(pool.len(), 2);

    pool.close_all();
    assert!(pool.is_empty());
}

#[test]
fn unsatisfiable_configs_close_nothing() {
    let (_dir, paths) = temp_files(&["a", "b"]);
    let configs = test_configs();
    configs.try_update("eviction_age", "0ms").unwrap();
    let pool = HandlePool::new(configs);
    for path in &paths {
        pool.open(path, OpenOptions::READ_ONLY).unwrap();
    }

    pool.configs().try_update("eviction_min", "unset").unwrap();
    pool.configs().try_update("eviction_max", "1").unwrap();
    assert!(pool.evict_configured().is_err());

    pool.configs().try_update("eviction_min", "3").unwrap();
    pool.configs().try_update("eviction_max", "unset").unwrap();
    assert!(pool.evict_configured().is_err());
    assert_eq!(pool.len(), 2);

    pool.close_all();
}

#[test]
fn close_all_keeps_use_order() {
    let (_dir, paths) = temp_files(&["a", "b"]);
    let clock = ManualClock::new();
    let pool = HandlePool::with_clock(test_configs(), clock.clone());

    pool.open(&paths[0], OpenOptions::READ_ONLY).unwrap();
    pool.close_all();

    pool.open(&paths[0], OpenOptions::READ_ONLY).unwrap();
    clock.advance(Duration::from_secs(1));
    pool.open(&paths[1], OpenOptions::READ_ONLY).unwrap();
    clock.advance(Duration::from_secs(1));
    // Reusing `a` makes it the most recently used.
    pool.open(&paths[0], OpenOptions::READ_ONLY).unwrap();

    let order: Vec<_> = pool.paths().iter().map(|path| path.to_string()).collect();
    assert_eq!(order, [paths[1].clone(), paths[0].clone()]);

    pool.close_all();
}

#[test]
fn reuse_respects_access_mode() {
    let (_dir, paths) = temp_files(&["read-only", "read-write"]);
    let pool = HandlePool::new(test_configs());

    let read_only = pool.open(&paths[0], OpenOptions::READ_ONLY).unwrap();
    assert!(matches!(
        pool.open(&paths[0], OpenOptions::READ_WRITE),
        Err(Error::ReadOnly(_))
    ));
    // The failed request didn't replace or close the tracked handle.
    assert_eq!(pool.open(&paths[0], OpenOptions::READ_ONLY).unwrap(), read_only);
    assert_eq!(pool.len(), 1);

    let writable = pool.open(&paths[1], OpenOptions::READ_WRITE).unwrap();
    assert!(writable.options().is_writable());
    assert_eq!(pool.open(&paths[1], OpenOptions::READ_ONLY).unwrap(), writable);

    // Closing the read-only handle lets it be re-opened for writing.
    assert!(pool.close(&paths[0]).unwrap());
    let reopened = pool.open(&paths[0], OpenOptions::READ_WRITE).unwrap();
    assert!(reopened.options().is_writable());

    pool.close_all();
}

#[tokio::test]
async fn background_evictor_closes_stale_handles() {
    let (_dir, paths) = temp_files(&["a", "b"]);
    let configs = test_configs();
    configs.try_update("eviction_interval", "10ms").unwrap();
    configs.try_update("eviction_age", "0ms").unwrap();
    let pool = HandlePool::new(configs);

    for path in &paths {
        pool.open(path, OpenOptions::READ_ONLY).unwrap();
    }
    let evictor = pool.spawn_evictor();

    let mut waited = Duration::ZERO;
    while !pool.is_empty() && waited < Duration::from_secs(5) {
        tokio::time::sleep(Duration::from_millis(10)).await;
        waited += Duration::from_millis(10);
    }
    evictor.abort();

    assert!(pool.is_empty());
}
