//! 재시도 정책.
//!
//! 논리 작업 하나는 최대 `max_attempts`번 시도됩니다. 시도마다 타임아웃이
//! `base + (attempt-1) * increment`로 늘어나고, 재시도 전 대기 시간은
//! `min(attempt * base_delay, max_delay)`입니다. 시계 오차 거부는 대기 없이
//! 재동기화 후 바로 재시도합니다.

use perp_core::RetrySettings;
use std::time::Duration;

/// 재시도 설정.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// 최대 시도 횟수 (1 이상)
    pub max_attempts: u32,
    /// 첫 시도 타임아웃
    pub base_timeout: Duration,
    /// 시도마다 늘어나는 타임아웃
    pub timeout_increment: Duration,
    /// 백오프 기본 지연
    pub base_delay: Duration,
    /// 백오프 최대 지연
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_timeout: Duration::from_secs(10),
            timeout_increment: Duration::from_secs(5),
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl From<&RetrySettings> for RetryConfig {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            base_timeout: Duration::from_millis(settings.base_timeout_ms),
            timeout_increment: Duration::from_millis(settings.timeout_increment_ms),
            base_delay: Duration::from_millis(settings.base_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
        }
    }
}

impl RetryConfig {
    /// 최대 시도 횟수를 설정합니다.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// 백오프 지연을 설정합니다.
    pub fn with_backoff(mut self, base_delay: Duration, max_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self.max_delay = max_delay;
        self
    }

    /// 타임아웃을 설정합니다.
    pub fn with_timeouts(mut self, base: Duration, increment: Duration) -> Self {
        self.base_timeout = base;
        self.timeout_increment = increment;
        self
    }

    /// 해당 시도(1부터)의 타임아웃.
    pub fn timeout_for(&self, attempt: u32) -> Duration {
        self.base_timeout + self.timeout_increment * attempt.saturating_sub(1)
    }

    /// 해당 시도(1부터)가 실패한 뒤의 대기 시간.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        (self.base_delay * attempt.max(1)).min(self.max_delay)
    }

    /// 호출별 옵션을 적용한 시도 횟수.
    pub fn attempts(&self, options: &CallOptions) -> u32 {
        options.max_attempts.unwrap_or(self.max_attempts).max(1)
    }
}

/// 호출별 옵션.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallOptions {
    /// 이 호출에만 적용할 최대 시도 횟수
    pub max_attempts: Option<u32>,
}

impl CallOptions {
    /// 최대 시도 횟수를 지정한 옵션.
    pub fn attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: Some(max_attempts),
        }
    }
}
