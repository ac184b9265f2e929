//! 锁错误类型
//!
//! 协议层只在两种情况下产生专用错误：排它锁重试预算耗尽、等待读者
//! 排空的预算耗尽。后端自身的故障（连接、协议错误）不在此拦截，
//! 通过 `Backend` 变体原样向上传播。

use thiserror::Error;

/// 分布式锁错误类型
#[derive(Debug, Error)]
pub enum LockError {
    // === 协议错误 ===
    #[error("无法获取锁: {key}")]
    AcquireTimeout { key: String },

    #[error("等待读者释放超时: {key}")]
    ReadersTimeout { key: String },

    // === 系统错误 ===
    /// 后端存储自身的故障（连接、协议），原样透传
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// 锁 Result 类型别名
pub type Result<T> = std::result::Result<T, LockError>;

impl LockError {
    /// 出错的锁 key（仅协议错误携带）
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::AcquireTimeout { key } | Self::ReadersTimeout { key } => Some(key),
            Self::Backend(_) => None,
        }
    }

    /// 是否为重试预算耗尽产生的协议错误
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::AcquireTimeout { .. } | Self::ReadersTimeout { .. }
        )
    }
}
