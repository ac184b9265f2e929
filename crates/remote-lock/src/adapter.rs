//! 存储适配器 Trait 定义
//!
//! 定义后端键值存储必须原子化提供的六个操作。核心层只解释这些操作的
//! 布尔结果，后端自身的故障通过错误原样向上传播；每个操作的原子性
//! 完全由后端自身的并发控制（事务、CAS）保证，核心层不持有任何进程内锁。

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

/// 后端键值存储能力接口
///
/// 持有者标识属于适配器实例，构造时生成一次（或由调用方注入），
/// 在实例生命周期内保持稳定。并发任务共享同一实例即共享同一身份，
/// 需要独立竞争者的调用方应为每个执行上下文构造各自的适配器。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LockAdapter: Send + Sync {
    /// 仅当 key 没有未过期条目时，原子创建以本实例为持有者、带给定 TTL 的锁条目
    ///
    /// 必须无竞态：两个调用者竞争时至多一个成功。原生原语只有两两原子性的
    /// 后端需将其组合为单个有效原子单元（乐观读取后条件写入），被中止的
    /// 条件写入按普通获取失败返回 false，不作为独立错误。
    async fn store(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// 仅当条目存在且持有者为本实例时返回 true
    ///
    /// 只判断存在性会在条目过期又被其它持有者重新获取后误报持有权。
    async fn has_key(&self, key: &str) -> Result<bool>;

    /// 无条件删除条目
    async fn delete(&self, key: &str) -> Result<()>;

    /// 原子递增计数器（不存在时从 1 创建）并刷新其 TTL
    ///
    /// 后端瞬时返回空值时需内部重试，直到确认递增落在正值上。
    async fn incr(&self, key: &str, ttl: Duration) -> Result<()>;

    /// 原子递减计数器
    ///
    /// 不设下限：减到负值属调用方纪律问题，不作为被拒绝的操作。
    async fn decr(&self, key: &str) -> Result<()>;

    /// 仅当计数器存在且大于零时返回 true；计数器不存在视为 false
    async fn is_positive(&self, key: &str) -> Result<bool>;
}
