//! 재시도 정책 — exponential backoff.

use std::future::Future;
use std::time::Duration;

use ncmon_core::config::LedgerConfig;
use ncmon_core::error::CoreError;
use tracing::warn;

/// 총 시도 횟수와 대기 시간 상한을 가진 backoff 정책
///
/// 대기 시간: base → base*2 → base*4 … (max에서 고정)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 첫 시도를 포함한 최대 시도 횟수
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    /// 스프레드시트 쓰기용 정책
    pub fn for_ledger(config: &LedgerConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.base_backoff_ms),
            Duration::from_millis(config.max_backoff_ms),
        )
    }

    /// 재시도 없이 한 번만
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    /// `attempt`번째(1부터) 실패 후 대기 시간
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// 에러가 지정한 대기 시간이 있으면 우선 (상한 적용)
    pub fn delay_for(&self, attempt: u32, error: &CoreError) -> Duration {
        match error {
            CoreError::RateLimit { retry_after_secs } if *retry_after_secs > 0 => {
                Duration::from_secs(*retry_after_secs).min(self.max_delay)
            }
            _ => self.delay_after(attempt),
        }
    }

    /// 재시도 가능한 에러(한도 초과, 일시 장애)만 backoff 후 다시 실행
    ///
    /// 시도를 다 쓰면 마지막 에러를 그대로 돌려준다.
    pub async fn run<F, Fut, T>(&self, what: &str, operation: F) -> Result<T, CoreError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if !e.is_retryable() || attempt >= self.max_attempts => return Err(e),
                Err(e) => {
                    let delay = self.delay_for(attempt, &e);
                    warn!(
                        "{what} 실패 (시도 {attempt}/{}): {e}, {delay:?} 후 재시도",
                        self.max_attempts
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1), Duration::from_secs(30))
    }
}

/// `Retry-After` 헤더(초 단위) 파싱
pub fn retry_after_secs(headers: &reqwest::header::HeaderMap) -> u64 {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0)
}
