//! Redis 适配器实现
//!
//! Redis 的 SETNX 与 EXPIRE 之间没有原子性，客户端在两者之间崩溃会留下
//! 永不过期的 key。这里把存在性检查与带过期的写入包在 WATCH/MULTI
//! 事务里：检查之后 key 被任何客户端动过，EXEC 返回 Nil，按普通获取
//! 失败处理。
//!
//! 注意 Redis 事务与 SQL 事务差别很大：EXEC 不回滚，只保证排队命令
//! 作为整体执行或（被 WATCH 打断时）整体不执行。

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use tracing::{debug, instrument};
use uuid::Uuid;

use remote_lock::{LockAdapter, LockError, Result};

/// Redis 存储适配器
///
/// 持有者身份在构造时生成一次（进程号 + UUID），实例生命周期内保持
/// 稳定；并发任务共享同一实例即共享同一身份。每次操作建立独立连接，
/// WATCH 状态随连接丢弃，不会泄漏到其它操作。
#[derive(Clone)]
pub struct RedisAdapter {
    client: Client,
    owner_id: String,
}

impl RedisAdapter {
    /// 创建适配器，自动生成持有者身份
    pub fn new(client: Client) -> Self {
        Self {
            client,
            owner_id: format!("{}-{}", std::process::id(), Uuid::new_v4()),
        }
    }

    /// 指定持有者身份创建适配器
    pub fn with_owner_id(client: Client, owner_id: impl Into<String>) -> Self {
        Self {
            client,
            owner_id: owner_id.into(),
        }
    }

    /// 从连接 URL 创建适配器
    pub fn from_url(url: &str) -> Result<Self> {
        let client = Client::open(url).map_err(backend_err)?;
        Ok(Self::new(client))
    }

    /// 本实例的持有者身份
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// 健康检查
    pub async fn health_check(&self) -> Result<()> {
        let mut conn = self.conn().await?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map(|_| ())
            .map_err(backend_err)
    }

    async fn conn(&self) -> Result<MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(backend_err)
    }
}

fn backend_err(err: redis::RedisError) -> LockError {
    LockError::Backend(anyhow::Error::new(err))
}

#[async_trait]
impl LockAdapter for RedisAdapter {
    #[instrument(skip(self))]
    async fn store(&self, key: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.conn().await?;

        // 监视 key：从这里起其它客户端的任何修改都会使事务中止
        redis::cmd("WATCH")
            .arg(key)
            .query_async::<()>(&mut conn)
            .await
            .map_err(backend_err)?;

        let contended: bool = conn.exists(key).await.map_err(backend_err)?;
        if contended {
            debug!(key = %key, "lock entry already present");
            redis::cmd("UNWATCH")
                .query_async::<()>(&mut conn)
                .await
                .map_err(backend_err)?;
            return Ok(false);
        }

        // SETEX 的秒数必须为正
        let ttl_secs = ttl.as_secs().max(1);

        // EXEC 返回 Nil 表示检查之后 key 被动过，按普通获取失败处理
        let committed: Option<(String,)> = redis::pipe()
            .atomic()
            .set_ex(key, &self.owner_id, ttl_secs)
            .query_async(&mut conn)
            .await
            .map_err(backend_err)?;

        if committed.is_none() {
            debug!(key = %key, "store transaction aborted by concurrent writer");
        }
        Ok(committed.is_some())
    }

    async fn has_key(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn().await?;
        // 比较持有者而非仅判断存在，条目被他人重新获取时不得误报
        let value: Option<String> = conn.get(key).await.map_err(backend_err)?;
        Ok(value.as_deref() == Some(self.owner_id.as_str()))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn().await?;
        let _: () = conn.del(key).await.map_err(backend_err)?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn incr(&self, key: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.conn().await?;

        // 部分代理部署下 INCR 可能瞬时返回 Nil，重试直到确认落在正值上
        loop {
            let value: Option<i64> = redis::cmd("INCR")
                .arg(key)
                .query_async(&mut conn)
                .await
                .map_err(backend_err)?;
            match value {
                Some(v) if v > 0 => break,
                other => {
                    debug!(key = %key, value = ?other, "INCR not confirmed positive, retrying");
                }
            }
        }

        let _: () = conn
            .expire(key, ttl.as_secs() as i64)
            .await
            .map_err(backend_err)?;
        Ok(())
    }

    async fn decr(&self, key: &str) -> Result<()> {
        let mut conn = self.conn().await?;
        // 不设下限：减成负值属调用方纪律问题
        let _: i64 = conn.decr(key, 1).await.map_err(backend_err)?;
        Ok(())
    }

    async fn is_positive(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn().await?;
        let value: Option<i64> = conn.get(key).await.map_err(backend_err)?;
        Ok(value.is_some_and(|v| v > 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_id_unique_per_instance() {
        let client = Client::open("redis://localhost:6379/0").unwrap();
        let first = RedisAdapter::new(client.clone());
        let second = RedisAdapter::new(client);

        assert_ne!(first.owner_id(), second.owner_id());
        // 身份含进程号前缀，便于排障
        assert!(
            first
                .owner_id()
                .starts_with(&std::process::id().to_string())
        );
    }

    #[test]
    fn test_owner_id_stable_for_instance_lifetime() {
        let client = Client::open("redis://localhost:6379/0").unwrap();
        let adapter = RedisAdapter::new(client);

        let first = adapter.owner_id().to_string();
        assert_eq!(adapter.owner_id(), first);
    }

    #[test]
    fn test_owner_id_injection() {
        let client = Client::open("redis://localhost:6379/0").unwrap();
        let adapter = RedisAdapter::with_owner_id(client, "host-42-ctx");
        assert_eq!(adapter.owner_id(), "host-42-ctx");
    }

    #[test]
    fn test_from_url_rejects_invalid_url() {
        assert!(RedisAdapter::from_url("not-a-redis-url").is_err());
        assert!(RedisAdapter::from_url("redis://localhost:6379/0").is_ok());
    }
}
