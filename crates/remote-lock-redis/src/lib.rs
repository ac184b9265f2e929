//! Redis 存储适配器
//!
//! 实现核心能力契约的参考后端：`store` 用 WATCH/MULTI 乐观事务
//! 把"检查后写入"组合成单个有效原子单元，读者计数器用 INCR/DECR。
//!
//! ## 使用示例
//!
//! ```ignore
//! let adapter = RedisAdapter::from_url("redis://localhost:6379/0")?;
//! let manager = LockManager::with_defaults(adapter);
//! ```

mod adapter;

pub use adapter::RedisAdapter;
