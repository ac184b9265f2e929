//! 分布式互斥原语
//!
//! 通过共享键值存储协调独立进程对命名逻辑资源的排它访问与共享（读者）访问。
//! 存储是唯一的通信媒介：没有中心锁服务器，进程之间也没有直接消息。
//!
//! ## 设计理念
//!
//! - **有界轮询**: 所有等待都是调用方上下文内的有界重试加退避，
//!   没有阻塞原语、条件变量或存储侧推送通知
//! - **能力契约**: 后端只需原子化提供六个操作（见 [`LockAdapter`]），
//!   原子性完全由后端自身的并发控制保证
//! - **TTL 自愈**: 持有者崩溃后锁条目按 TTL 自行过期，
//!   代价是一个需要调用方通过 expiry 配置兜住的正确性窗口
//!
//! ## 使用示例
//!
//! ```ignore
//! let manager = LockManager::with_defaults(adapter);
//!
//! // 排它会话：获取锁、执行工作、任意退出路径上释放
//! let value = manager
//!     .synchronize("resource:123", None, || async {
//!         do_critical_work().await
//!     })
//!     .await?;
//! ```

pub mod adapter;
pub mod config;
pub mod error;
pub mod manager;
mod retry;
pub mod test_utils;

pub use adapter::LockAdapter;
pub use config::LockConfig;
pub use error::{LockError, Result};
pub use manager::LockManager;
