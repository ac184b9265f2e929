//! 有界轮询执行器
//!
//! 排它锁获取与读者排空等待共用同一个重试加退避的形状，只有成功判定不同。
//! 这里只负责"预算内反复尝试"：最后一次失败后不再等待，超时错误由调用方
//! 按语义（获取失败/读者未排空）构造。

use std::future::Future;

use tracing::debug;

use crate::config::LockConfig;
use crate::error::Result;

// ---------------------------------------------------------------------------
// poll_with_backoff — 带退避的有界轮询
// ---------------------------------------------------------------------------

/// 按配置有界轮询 `attempt_op`，直到其返回 true 或尝试次数用尽
///
/// 返回 Ok(true) 表示在预算内成功，Ok(false) 表示预算耗尽。
/// `attempt_op` 自身的错误直接向上传播，不消耗重试次数。
pub(crate) async fn poll_with_backoff<F, Fut>(
    config: &LockConfig,
    mut attempt_op: F,
) -> Result<bool>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    for attempt in 1..=config.retries {
        if attempt_op().await? {
            return Ok(true);
        }

        // 最后一次失败后不再等待
        if attempt == config.retries {
            break;
        }

        let delay = config.delay_for_attempt(attempt);
        debug!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            "尝试未成功，退避后重试"
        );
        tokio::time::sleep(delay).await;
    }

    Ok(false)
}

// ---------------------------------------------------------------------------
// 单元测试
// ---------------------------------------------------------------------------
