//! 测试工具模块
//!
//! 提供无外部依赖的内存存储适配器，在测试中模拟后端键值存储的原子语义
//! （含 TTL 过期），用于驱动完整的会话协议而不连接真实后端。

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::adapter::LockAdapter;
use crate::error::Result;

/// 内存条目：锁或计数器
#[derive(Debug, Clone)]
enum Entry {
    Lock { owner: String, expires_at: Instant },
    Counter { value: i64, expires_at: Instant },
}

/// 内存存储适配器
///
/// 用单把 Mutex 序列化所有操作来模拟后端的原子性，仅供测试使用。
/// 每个实例代表一个执行上下文（独立的持有者身份）；用 [`sibling`]
/// 构造共享同一存储、身份不同的另一个竞争者。
///
/// [`sibling`]: MemoryAdapter::sibling
#[derive(Clone)]
pub struct MemoryAdapter {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
    owner_id: String,
    store_calls: Arc<AtomicU32>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            owner_id: format!("test-{}", Uuid::new_v4()),
            store_calls: Arc::new(AtomicU32::new(0)),
        }
    }

    /// 指定持有者身份创建适配器
    pub fn with_owner_id(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            ..Self::new()
        }
    }

    /// 共享同一存储但身份不同的新适配器，模拟另一个执行上下文
    pub fn sibling(&self) -> Self {
        Self {
            entries: self.entries.clone(),
            owner_id: format!("test-{}", Uuid::new_v4()),
            store_calls: self.store_calls.clone(),
        }
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// 所有实例（含 sibling）累计的 `store` 调用次数
    pub fn store_calls(&self) -> u32 {
        self.store_calls.load(Ordering::SeqCst)
    }

    /// 当前计数器值，条目不存在或已过期时为 None
    pub async fn counter_value(&self, key: &str) -> Option<i64> {
        let entries = self.entries.lock().await;
        match entries.get(key) {
            Some(Entry::Counter { value, expires_at }) if *expires_at > Instant::now() => {
                Some(*value)
            }
            _ => None,
        }
    }

    /// key 上是否存在未过期的锁条目（不校验持有者）
    pub async fn lock_exists(&self, key: &str) -> bool {
        let entries = self.entries.lock().await;
        matches!(
            entries.get(key),
            Some(Entry::Lock { expires_at, .. }) if *expires_at > Instant::now()
        )
    }
}

impl Default for MemoryAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LockAdapter for MemoryAdapter {
    async fn store(&self, key: &str, ttl: Duration) -> Result<bool> {
        self.store_calls.fetch_add(1, Ordering::SeqCst);
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            // 未过期条目存在即竞争失败
            Some(Entry::Lock { expires_at, .. }) if *expires_at > Instant::now() => Ok(false),
            _ => {
                entries.insert(
                    key.to_string(),
                    Entry::Lock {
                        owner: self.owner_id.clone(),
                        expires_at: Instant::now() + ttl,
                    },
                );
                Ok(true)
            }
        }
    }

    async fn has_key(&self, key: &str) -> Result<bool> {
        let entries = self.entries.lock().await;
        Ok(matches!(
            entries.get(key),
            Some(Entry::Lock { owner, expires_at })
                if *expires_at > Instant::now() && *owner == self.owner_id
        ))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.remove(key);
        Ok(())
    }

    async fn incr(&self, key: &str, ttl: Duration) -> Result<()> {
        let mut entries = self.entries.lock().await;
        let next = match entries.get(key) {
            Some(Entry::Counter { value, expires_at }) if *expires_at > Instant::now() => value + 1,
            _ => 1,
        };
        entries.insert(
            key.to_string(),
            Entry::Counter {
                value: next,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn decr(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().await;
        // 与 Redis 的 DECR 一致：条目不存在时从 0 递减，且不设下限
        let (next, expires_at) = match entries.get(key) {
            Some(Entry::Counter { value, expires_at }) if *expires_at > Instant::now() => {
                (value - 1, *expires_at)
            }
            _ => (-1, Instant::now() + Duration::from_secs(60)),
        };
        entries.insert(
            key.to_string(),
            Entry::Counter {
                value: next,
                expires_at,
            },
        );
        Ok(())
    }

    async fn is_positive(&self, key: &str) -> Result<bool> {
        let entries = self.entries.lock().await;
        Ok(matches!(
            entries.get(key),
            Some(Entry::Counter { value, expires_at })
                if *expires_at > Instant::now() && *value > 0
        ))
    }
}
