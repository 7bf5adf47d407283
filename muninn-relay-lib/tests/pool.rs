mod helpers;

use helpers::{test_config, DuplexConnector, TestResult, TestServer};
use muninn_relay_lib::config::PoolConfig;
use muninn_relay_lib::{ConnectionPool, PoolKey, ProfileStore, Relay, RelayRequest};
use std::sync::Arc;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(2);

fn pool_config(max_idle_per_key: usize, idle_timeout_ms: u64) -> PoolConfig {
    PoolConfig { max_idle_per_key, idle_timeout_ms, ..PoolConfig::default() }
}

#[tokio::test]
async fn test_acquire_release_acquire_reuses_handle() -> TestResult {
    let profile = ProfileStore::builtin()?.get_profile("chrome-120")?;
    let pool = ConnectionPool::new(DuplexConnector::new(), &pool_config(4, 60_000), None);

    let first = pool.acquire("example.com", 443, &profile, None, TIMEOUT).await?;
    let id = first.id();
    pool.release(first);
    let again = pool.acquire("example.com", 443, &profile, None, TIMEOUT).await?;

    assert_eq!(again.id(), id);
    assert_eq!(pool.connector().calls(), 1);
    Ok(())
}

#[tokio::test]
async fn test_keys_do_not_share_handles() -> TestResult {
    let store = ProfileStore::builtin()?;
    let chrome = store.get_profile("chrome-120")?;
    let firefox = store.get_profile("firefox-121")?;
    let pool = ConnectionPool::new(DuplexConnector::new(), &pool_config(4, 60_000), None);

    let handle = pool.acquire("example.com", 443, &chrome, None, TIMEOUT).await?;
    pool.release(handle);
    let other = pool.acquire("example.com", 443, &firefox, None, TIMEOUT).await?;

    assert_eq!(other.key().profile(), "firefox-121");
    assert_eq!(pool.connector().calls(), 2);
    assert_eq!(pool.idle_count(&PoolKey::new("example.com", 443, "chrome-120", None)), 1);
    Ok(())
}

#[tokio::test]
async fn test_overflow_closes_least_recently_released() -> TestResult {
    let profile = ProfileStore::builtin()?.get_profile("chrome-120")?;
    let pool = ConnectionPool::new(DuplexConnector::new(), &pool_config(2, 60_000), None);
    let key = PoolKey::new("example.com", 443, profile.id(), None);

    let mut handles = Vec::new();
    for _ in 0..3 {
        handles.push(pool.negotiate_fresh(&key, &profile, TIMEOUT).await?);
    }
    let ids: Vec<u64> = handles.iter().map(|h| h.id()).collect();
    for handle in handles {
        pool.release(handle);
    }
    assert_eq!(pool.idle_count(&key), 2);

    let newest = pool.acquire_key(&key, &profile, TIMEOUT).await?;
    let older = pool.acquire_key(&key, &profile, TIMEOUT).await?;
    assert_eq!(newest.id(), ids[2]);
    assert_eq!(older.id(), ids[1]);
    assert_eq!(pool.connector().calls(), 3, "the oldest handle was closed, not reused");
    Ok(())
}

#[tokio::test]
async fn test_expired_handles_are_evicted() -> TestResult {
    let profile = ProfileStore::builtin()?.get_profile("chrome-120")?;
    let pool = ConnectionPool::new(DuplexConnector::new(), &pool_config(4, 50), None);
    let key = PoolKey::new("example.com", 443, profile.id(), None);

    let handle = pool.acquire_key(&key, &profile, TIMEOUT).await?;
    pool.release(handle);
    assert_eq!(pool.stats().idle, 1);

    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(pool.evict_expired(), 1);
    assert_eq!(pool.stats().idle, 0);

    let fresh = pool.acquire_key(&key, &profile, TIMEOUT).await?;
    assert_eq!(pool.connector().calls(), 2);
    drop(fresh);
    Ok(())
}

#[tokio::test]
async fn test_expired_keys_are_forgotten() -> TestResult {
    let profile = ProfileStore::builtin()?.get_profile("chrome-120")?;
    let pool = ConnectionPool::new(DuplexConnector::new(), &pool_config(4, 50), None);

    for i in 0..5 {
        let handle = pool.acquire(&format!("host-{i}.test"), 443, &profile, None, TIMEOUT).await?;
        pool.release(handle);
    }
    assert_eq!(pool.tracked_keys(), 5);

    // a key whose handle was taken back out stays tracked until the sweep
    let taken = pool.acquire("host-0.test", 443, &profile, None, TIMEOUT).await?;
    assert_eq!(pool.stats().keys, 4);
    assert_eq!(pool.tracked_keys(), 5);

    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(pool.evict_expired(), 4);
    assert_eq!(pool.tracked_keys(), 0);

    pool.release(taken);
    assert_eq!(pool.tracked_keys(), 1);
    assert_eq!(pool.idle_count(&PoolKey::new("host-0.test", 443, "chrome-120", None)), 1);
    Ok(())
}

#[tokio::test]
async fn test_reaper_evicts_in_background() -> TestResult {
    let profile = ProfileStore::builtin()?.get_profile("chrome-120")?;
    let pool = Arc::new(ConnectionPool::new(DuplexConnector::new(), &pool_config(4, 30), None));
    let reaper = pool.spawn_reaper(Duration::from_millis(20));

    let handle = pool.acquire("example.com", 443, &profile, None, TIMEOUT).await?;
    pool.release(handle);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(pool.stats().idle, 0);

    pool.close();
    tokio::time::timeout(Duration::from_secs(1), reaper).await??;
    Ok(())
}

#[tokio::test]
async fn test_dead_and_closed_pool_handles_are_not_kept() -> TestResult {
    let profile = ProfileStore::builtin()?.get_profile("chrome-120")?;
    let pool = ConnectionPool::new(DuplexConnector::new(), &pool_config(4, 60_000), None);

    let mut dead = pool.acquire("example.com", 443, &profile, None, TIMEOUT).await?;
    dead.mark_dead();
    pool.release(dead);
    assert_eq!(pool.stats().idle, 0);

    let live = pool.acquire("example.com", 443, &profile, None, TIMEOUT).await?;
    pool.close();
    pool.release(live);
    assert_eq!(pool.stats().idle, 0);
    assert!(pool.is_closed());
    Ok(())
}

#[tokio::test]
async fn test_disabled_pool_always_negotiates() -> TestResult {
    let profile = ProfileStore::builtin()?.get_profile("chrome-120")?;
    let config = PoolConfig { enabled: false, ..PoolConfig::default() };
    let pool = ConnectionPool::new(DuplexConnector::new(), &config, None);

    let handle = pool.acquire("example.com", 443, &profile, None, TIMEOUT).await?;
    pool.release(handle);
    let _second = pool.acquire("example.com", 443, &profile, None, TIMEOUT).await?;
    assert_eq!(pool.connector().calls(), 2);
    Ok(())
}

#[tokio::test]
async fn test_relay_reuses_tls_connection() -> TestResult {
    let server = TestServer::spawn(&["h2", "http/1.1"]).await?;
    let relay = Relay::from_config(&test_config(), None)?;

    for _ in 0..3 {
        let response = relay.dispatch(RelayRequest::get(&server.url("/"), "chrome-120")?).await?;
        assert_eq!(response.status(), 200);
        assert_eq!(response.attempts(), 1);
    }
    assert_eq!(server.connections(), 1);
    assert_eq!(relay.health().pool.idle, 1);
    Ok(())
}
