//! 锁管理器
//!
//! 暴露排它/读者/写者三种会话操作，在后端能力契约之上实现
//! 重试退避与读者排空协议。
//!
//! ## 会话协议
//!
//! - **排它会话**: 已持有则直接执行（可重入，不做嵌套获取）；
//!   否则获取锁、执行工作、任意退出路径上释放
//! - **读者会话**: 短暂持有排它锁以串行化登记，递增读者计数后立即释放，
//!   工作结束后任意退出路径上递减计数；登记窗口之外读者互不阻塞
//! - **写者会话**: 获取排它锁后有界轮询等待读者计数归零，持锁执行工作，
//!   结束后释放；在没有等待/通知原语的前提下提供单写多读语义

use std::future::Future;

use tracing::{debug, instrument, warn};

use crate::adapter::LockAdapter;
use crate::config::LockConfig;
use crate::error::{LockError, Result};
use crate::retry::poll_with_backoff;

/// 分布式锁管理器
///
/// 不持有后台线程，所有等待都在调用方任务上有界轮询完成。
/// 持有者身份属于适配器实例，见 [`LockAdapter`] 的说明。
pub struct LockManager<A> {
    adapter: A,
    prefix: Option<String>,
    config: LockConfig,
}

impl<A: LockAdapter> LockManager<A> {
    /// 创建锁管理器
    ///
    /// # Arguments
    /// - `adapter`: 后端存储适配器
    /// - `prefix`: 可选的全局 key 前缀，用于多套部署共用一个存储
    /// - `config`: 默认锁配置，可被会话调用按次覆盖
    pub fn new(adapter: A, prefix: Option<String>, config: LockConfig) -> Self {
        Self {
            adapter,
            prefix,
            config,
        }
    }

    /// 使用默认配置、无前缀创建锁管理器
    pub fn with_defaults(adapter: A) -> Self {
        Self::new(adapter, None, LockConfig::default())
    }

    /// 排它会话
    ///
    /// 本实例已持有 key 的锁时直接执行工作，不做第二次 `store`。
    /// 否则获取排它锁、执行工作，并在任意退出路径上释放——包括工作
    /// 单元返回错误的路径。任务被取消或 panic 时释放不会执行，
    /// 锁条目最终由 TTL 过期兜底。
    #[instrument(skip(self, options, work))]
    pub async fn synchronize<F, Fut, T>(
        &self,
        key: &str,
        options: Option<LockConfig>,
        work: F,
    ) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let config = options.unwrap_or_else(|| self.config.clone());

        if self.acquired(key).await? {
            debug!(key = %key, "lock already held, running re-entrantly");
            return work().await;
        }

        self.acquire_lock(key, &config).await?;
        let result = work().await;
        let cleanup = self.release_lock(key).await;
        prefer_work_error(key, "release_lock", result, cleanup)
    }

    /// 读者会话
    ///
    /// 登记流程：获取排它锁 → 递增读者计数 → 立即释放排它锁 → 执行工作，
    /// 工作结束后在任意退出路径上递减计数。
    #[instrument(skip(self, options, work))]
    pub async fn synchronize_reader<F, Fut, T>(
        &self,
        key: &str,
        options: Option<LockConfig>,
        work: F,
    ) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let config = options.unwrap_or_else(|| self.config.clone());

        self.acquire_lock(key, &config).await?;
        self.add_reader(key, &config).await?;
        self.release_lock(key).await?;
        debug!(key = %key, "reader registered, lock released");

        let result = work().await;
        let cleanup = self.remove_reader(key).await;
        prefer_work_error(key, "remove_reader", result, cleanup)
    }

    /// 写者会话
    ///
    /// 与排它会话同样可重入。获取排它锁后有界轮询等待读者计数归零，
    /// 持锁执行工作；读者在预算内未排空时返回错误而非静默放行，
    /// 错误路径上同样释放锁。
    #[instrument(skip(self, options, work))]
    pub async fn synchronize_writer<F, Fut, T>(
        &self,
        key: &str,
        options: Option<LockConfig>,
        work: F,
    ) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let config = options.unwrap_or_else(|| self.config.clone());

        if self.acquired(key).await? {
            debug!(key = %key, "lock already held, running re-entrantly");
            return work().await;
        }

        self.acquire_lock(key, &config).await?;
        let result = match self.wait_for_readers(key, &config).await {
            Ok(()) => work().await,
            Err(err) => Err(err),
        };
        let cleanup = self.release_lock(key).await;
        prefer_work_error(key, "release_lock", result, cleanup)
    }

    /// 获取排它锁
    ///
    /// 最多尝试 `config.retries` 次 `store`，每次失败后按配置退避，
    /// 最后一次失败后不再等待。预算耗尽返回 [`LockError::AcquireTimeout`]。
    #[instrument(skip(self, config))]
    pub async fn acquire_lock(&self, key: &str, config: &LockConfig) -> Result<()> {
        let lock_key = self.key_for(key);
        let acquired =
            poll_with_backoff(config, || self.adapter.store(&lock_key, config.expiry)).await?;

        if acquired {
            debug!(key = %key, "lock acquired");
            Ok(())
        } else {
            warn!(key = %key, retries = config.retries, "lock acquisition budget exhausted");
            Err(LockError::AcquireTimeout {
                key: key.to_string(),
            })
        }
    }

    /// 无条件删除锁条目
    ///
    /// 不校验当前持有权：若条目已因 TTL 过期且被其它持有者重新获取，
    /// 这里会删掉新持有者的锁。保持与既有部署一致的契约，调用方应把
    /// `expiry` 配置得大于受保护工作的时长来规避该窗口。
    pub async fn release_lock(&self, key: &str) -> Result<()> {
        self.adapter.delete(&self.key_for(key)).await
    }

    /// 本实例当前是否持有 key 的未过期锁条目
    pub async fn acquired(&self, key: &str) -> Result<bool> {
        self.adapter.has_key(&self.key_for(key)).await
    }

    /// 登记一个读者：递增读者计数并刷新其 TTL
    pub async fn add_reader(&self, key: &str, config: &LockConfig) -> Result<()> {
        self.adapter
            .incr(&self.counter_for(key), config.expiry)
            .await
    }

    /// 注销一个读者：递减读者计数
    ///
    /// 计数不设下限，多余的注销会把计数减成负值并被 `is_positive`
    /// 视为"无读者"，从而掩盖读者登记泄漏——这是刻意保留的已知缺口。
    pub async fn remove_reader(&self, key: &str) -> Result<()> {
        self.adapter.decr(&self.counter_for(key)).await
    }

    /// 有界轮询等待读者计数归零
    ///
    /// 与获取锁共用同一退避形状，判定换成"计数不为正"。预算耗尽而
    /// 读者仍未排空时返回 [`LockError::ReadersTimeout`]。
    #[instrument(skip(self, config))]
    pub async fn wait_for_readers(&self, key: &str, config: &LockConfig) -> Result<()> {
        let counter_key = self.counter_for(key);
        let counter_key = counter_key.as_str();
        let drained = poll_with_backoff(config, || async move {
            Ok(!self.adapter.is_positive(counter_key).await?)
        })
        .await?;

        if drained {
            Ok(())
        } else {
            warn!(key = %key, retries = config.retries, "readers did not drain within budget");
            Err(LockError::ReadersTimeout {
                key: key.to_string(),
            })
        }
    }

    /// 锁条目的后端 key: `{prefix}|lock|{key}`，无前缀时省略前缀段
    fn key_for(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}|lock|{}", prefix, key),
            None => format!("lock|{}", key),
        }
    }

    /// 读者计数器的后端 key: `{prefix}|lock|{key}|counter`
    fn counter_for(&self, key: &str) -> String {
        format!("{}|counter", self.key_for(key))
    }
}

/// 清理失败时的错误优先级
///
/// 工作单元的错误优先向上传播；工作成功而清理失败时抛出清理错误，
/// 两者都失败时记录清理错误、保留工作单元的原始错误。
fn prefer_work_error<T>(
    key: &str,
    action: &'static str,
    result: Result<T>,
    cleanup: Result<()>,
) -> Result<T> {
    match cleanup {
        Ok(()) => result,
        Err(cleanup_err) => match result {
            Ok(_) => Err(cleanup_err),
            Err(work_err) => {
                warn!(
                    key = %key,
                    action,
                    error = %cleanup_err,
                    "cleanup failed after work error, keeping the work error"
                );
                Err(work_err)
            }
        },
    }
}
