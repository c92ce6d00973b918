//! 어댑터 핵심 에러 타입.
//!
//! 네트워크와 무관한 순수 로직(심볼 정규화, 입력 검증, 설정 로딩)에서
//! 발생하는 에러를 정의합니다.

use thiserror::Error;

/// 핵심 에러.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoreError {
    /// 거래소가 인식할 수 없는 심볼
    #[error("잘못된 심볼: {0}")]
    InvalidSymbol(String),

    /// 잘못된 입력 (음수 수량, 0 레버리지 등)
    #[error("잘못된 입력: {0}")]
    InvalidInput(String),

    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),
}

/// 핵심 작업을 위한 Result 타입.
pub type CoreResult<T> = Result<T, CoreError>;

impl From<config::ConfigError> for CoreError {
    fn from(err: config::ConfigError) -> Self {
        CoreError::Config(err.to_string())
    }
}
