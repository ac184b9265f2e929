//! 内存适配器契约测试
//!
//! 验证测试用内存适配器满足能力契约的原子语义：竞争时至多一个
//! `store` 成功、持有者校验、TTL 过期、计数器的无下限递减。

use std::time::Duration;

use remote_lock::LockAdapter;
use remote_lock::test_utils::MemoryAdapter;

const TTL: Duration = Duration::from_secs(60);

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_store_admits_single_winner_under_race() {
    let adapter = MemoryAdapter::new();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let contender = adapter.sibling();
        handles.push(tokio::spawn(async move {
            contender.store("lock|res", TTL).await.unwrap()
        }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
}

#[tokio::test]
async fn test_has_key_checks_ownership_not_existence() {
    let adapter = MemoryAdapter::new();
    let other = adapter.sibling();

    assert!(adapter.store("lock|res", TTL).await.unwrap());
    assert!(adapter.has_key("lock|res").await.unwrap());
    // 条目存在但持有者不同
    assert!(!other.has_key("lock|res").await.unwrap());

    // 过期后被另一身份重新获取，原持有者不得误报持有权
    adapter.delete("lock|res").await.unwrap();
    assert!(other.store("lock|res", TTL).await.unwrap());
    assert!(!adapter.has_key("lock|res").await.unwrap());
    assert!(other.has_key("lock|res").await.unwrap());
}

#[tokio::test]
async fn test_store_succeeds_after_expiry() {
    let adapter = MemoryAdapter::new();
    let contender = adapter.sibling();

    assert!(
        adapter
            .store("lock|res", Duration::from_millis(20))
            .await
            .unwrap()
    );
    assert!(!contender.store("lock|res", TTL).await.unwrap());

    tokio::time::sleep(Duration::from_millis(40)).await;
    assert!(contender.store("lock|res", TTL).await.unwrap());
}

#[tokio::test]
async fn test_delete_is_unconditional() {
    let adapter = MemoryAdapter::new();
    let other = adapter.sibling();

    assert!(adapter.store("lock|res", TTL).await.unwrap());
    // 非持有者也能删除——release_lock 的已知契约
    other.delete("lock|res").await.unwrap();
    assert!(!adapter.lock_exists("lock|res").await);
    assert!(other.store("lock|res", TTL).await.unwrap());
}

#[tokio::test]
async fn test_counter_incr_decr_is_positive() {
    let adapter = MemoryAdapter::new();
    let key = "lock|res|counter";

    assert!(!adapter.is_positive(key).await.unwrap());

    adapter.incr(key, TTL).await.unwrap();
    assert_eq!(adapter.counter_value(key).await, Some(1));
    assert!(adapter.is_positive(key).await.unwrap());

    adapter.incr(key, TTL).await.unwrap();
    assert_eq!(adapter.counter_value(key).await, Some(2));

    adapter.decr(key).await.unwrap();
    adapter.decr(key).await.unwrap();
    assert_eq!(adapter.counter_value(key).await, Some(0));
    assert!(!adapter.is_positive(key).await.unwrap());
}

#[tokio::test]
async fn test_decr_has_no_floor() {
    let adapter = MemoryAdapter::new();
    let key = "lock|res|counter";

    adapter.incr(key, TTL).await.unwrap();
    adapter.decr(key).await.unwrap();
    // 多余的注销把计数减成负值，is_positive 将其视为"无读者"
    adapter.decr(key).await.unwrap();
    assert_eq!(adapter.counter_value(key).await, Some(-1));
    assert!(!adapter.is_positive(key).await.unwrap());
}

#[tokio::test]
async fn test_incr_refreshes_counter_ttl() {
    let adapter = MemoryAdapter::new();
    let key = "lock|res|counter";

    adapter.incr(key, Duration::from_millis(50)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;

    // 第二次递增刷新 TTL，计数在原 TTL 过后仍然存活
    adapter.incr(key, Duration::from_millis(50)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(adapter.is_positive(key).await.unwrap());
    assert_eq!(adapter.counter_value(key).await, Some(2));

    tokio::time::sleep(Duration::from_millis(40)).await;
    assert!(!adapter.is_positive(key).await.unwrap());
}

#[tokio::test]
async fn test_owner_id_is_stable_and_unique_per_instance() {
    let adapter = MemoryAdapter::new();
    let sibling = adapter.sibling();
    assert_ne!(adapter.owner_id(), sibling.owner_id());

    let injected = MemoryAdapter::with_owner_id("ctx-1");
    assert_eq!(injected.owner_id(), "ctx-1");
}
