//! 锁配置
//!
//! 重试次数、退避基准等待与条目 TTL 的配置。默认值在指数退避下
//! 最坏累计等待约 41 秒。

use std::time::Duration;

use rand::Rng;

/// 锁配置
///
/// 会话调用可按次覆盖；未覆盖的调用使用管理器构造时的配置。
/// 需要只改个别字段时用结构体更新语法在 `Default` 上合并。
#[derive(Debug, Clone)]
pub struct LockConfig {
    /// 退避等待的基准时间
    pub initial_wait: Duration,
    /// 锁条目与读者计数器的过期时间，应大于受保护工作的预期时长
    pub expiry: Duration,
    /// 最大尝试次数（含首次）
    pub retries: u32,
    /// 线性退避：等待时间始终在 initial_wait 附近抖动，不随尝试次数增长
    pub linear_wait: bool,
}

impl Default for LockConfig {
    /// 默认配置：10ms 基准等待、60 秒过期、11 次尝试、指数退避
    fn default() -> Self {
        Self {
            initial_wait: Duration::from_millis(10),
            expiry: Duration::from_secs(60),
            retries: 11,
            linear_wait: false,
        }
    }
}

impl LockConfig {
    /// 计算第 attempt 次失败后的退避等待时间（attempt 从 1 开始）
    ///
    /// 指数模式: 2^(attempt - 1 + r) * initial_wait，r 每次从 [0, 1) 均匀抽取，
    /// 等待随尝试次数大致翻倍，抖动用于打散关联的重试风暴。
    /// 线性模式: initial_wait * r'，r' 从 [0.5, 1.5) 均匀抽取。
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial_wait.as_secs_f64();
        let mut rng = rand::thread_rng();

        let seconds = if self.linear_wait {
            base * rng.gen_range(0.5..1.5)
        } else {
            let exponent = attempt.saturating_sub(1) as f64 + rng.gen_range(0.0..1.0);
            2f64.powf(exponent) * base
        };

        Duration::from_secs_f64(seconds)
    }
}
