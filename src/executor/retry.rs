use std::time::Duration;

use crate::error::AppError;

/// 重试策略
#[derive(Debug, Clone)]
pub enum RetryStrategy {
    /// 立即重试
    Immediate,

    /// 固定延迟重试
    FixedDelay { delay_ms: u64 },

    /// 指数退避重试
    ExponentialBackoff {
        initial_delay_ms: u64,
        max_delay_ms: u64,
        multiplier: f64,
    },
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self::ExponentialBackoff {
            initial_delay_ms: 1000,
            max_delay_ms: 10000,
            multiplier: 2.0,
        }
    }
}

impl RetryStrategy {
    /// 第 attempt 次失败后的等待时长（attempt 从 0 开始）
    pub fn next_delay(&self, attempt: u32) -> Duration {
        match self {
            RetryStrategy::Immediate => Duration::from_millis(0),
            RetryStrategy::FixedDelay { delay_ms } => Duration::from_millis(*delay_ms),
            RetryStrategy::ExponentialBackoff {
                initial_delay_ms,
                max_delay_ms,
                multiplier,
            } => {
                let delay = (*initial_delay_ms as f64 * multiplier.powi(attempt as i32)) as u64;
                Duration::from_millis(delay.min(*max_delay_ms))
            }
        }
    }

    pub fn exponential(initial_delay_ms: u64, max_delay_ms: u64, multiplier: f64) -> Self {
        Self::ExponentialBackoff {
            initial_delay_ms,
            max_delay_ms,
            multiplier,
        }
    }

    pub fn fixed(delay_ms: u64) -> Self {
        Self::FixedDelay { delay_ms }
    }
}

/// 重试配置
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// 最大尝试次数（含首次）
    pub max_attempts: u32,
    pub strategy: RetryStrategy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            strategy: RetryStrategy::default(),
        }
    }
}

impl RetryConfig {
    pub fn new(max_attempts: u32, strategy: RetryStrategy) -> Self {
        Self {
            max_attempts,
            strategy,
        }
    }

    /// 该错误是否值得重试
    ///
    /// 解析/校验错误通过"反馈给模型"的通道重试，不走这里；
    /// 用户拒绝与步数超限是终态。
    pub fn is_retryable(&self, error: &AppError) -> bool {
        matches!(
            error,
            AppError::DeviceUnavailable(_)
                | AppError::ActionDispatchFailure(_)
                | AppError::ModelError(_)
                | AppError::IoError(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_backoff_growth() {
        let strategy = RetryStrategy::exponential(1000, 10000, 2.0);
        assert_eq!(strategy.next_delay(0), Duration::from_millis(1000));
        assert_eq!(strategy.next_delay(1), Duration::from_millis(2000));
        assert_eq!(strategy.next_delay(2), Duration::from_millis(4000));
        // 到达上限后不再增长
        assert_eq!(strategy.next_delay(10), Duration::from_millis(10000));
    }

    #[test]
    fn test_fixed_delay() {
        let strategy = RetryStrategy::fixed(500);
        assert_eq!(strategy.next_delay(0), Duration::from_millis(500));
        assert_eq!(strategy.next_delay(5), Duration::from_millis(500));
    }

    #[test]
    fn test_retryable_errors() {
        let config = RetryConfig::default();
        assert!(config.is_retryable(&AppError::ModelError("timeout".into())));
        assert!(config.is_retryable(&AppError::DeviceUnavailable("offline".into())));
        assert!(!config.is_retryable(&AppError::ConfirmationDenied("no".into())));
        assert!(!config.is_retryable(&AppError::MaxStepsExceeded(100)));
        assert!(!config.is_retryable(&AppError::ValidationError("bad".into())));
    }
}
