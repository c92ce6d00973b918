//! 거래소 에러 타입.
//!
//! 에러는 네 가지 성격으로 나뉩니다:
//! - 일시적 네트워크 장애 (`Timeout`, `NetworkError`, `Disconnected`, `ServerError`, `RateLimited`): 재시도
//! - 거래소 거부 (`TimestampError`, `ApiError`, `InsufficientBalance` 등): 시계 오차만 재동기화 후 재시도
//! - 찾을 수 없음 (`OrderNotFound`, `SymbolNotFound`)
//! - 설정 에러 (`Configuration`, `Unauthorized`): 재시도하지 않음
//!
//! 진행 중인 시계 동기화 결과를 여러 대기자에게 그대로 나눠 주어야 하므로
//! `Clone`을 구현합니다.

use perp_core::CoreError;
use thiserror::Error;

/// Binance 시계 오차 에러 코드 (`Timestamp for this request is outside of the recvWindow`).
pub const BINANCE_CLOCK_DRIFT_CODE: i32 = -1021;

/// 거래소 관련 에러.
#[derive(Debug, Clone, Error)]
pub enum ExchangeError {
    /// 네트워크/연결 에러
    #[error("Network error: {0}")]
    NetworkError(String),

    /// 거래소 연결 끊김
    #[error("Disconnected: {0}")]
    Disconnected(String),

    /// 요청 타임아웃 (주문 요청이면 결과를 알 수 없음)
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// 요청 한도 초과
    #[error("Rate limit exceeded")]
    RateLimited,

    /// 거래소 서버 에러 (5xx)
    #[error("Server error {status}: {message}")]
    ServerError { status: u16, message: String },

    /// 타임스탬프가 거래소 수신 윈도우를 벗어남 (시계 오차)
    #[error("Timestamp error {code}: {message}")]
    TimestampError { code: i32, message: String },

    /// 인증/권한 에러
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// 자격증명 누락 등 설정 에러
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// API 에러 코드
    #[error("API error {code}: {message}")]
    ApiError { code: i32, message: String },

    /// 잔고/증거금 부족
    #[error("Insufficient balance: {0}")]
    InsufficientBalance(String),

    /// 유효하지 않은 수량
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    /// 주문을 찾을 수 없음
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// 심볼을 찾을 수 없음
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    /// 주문 거부됨
    #[error("Order rejected: {0}")]
    OrderRejected(String),

    /// 파싱/역직렬화 에러
    #[error("Parse error: {0}")]
    ParseError(String),

    /// 해석할 수 없는 심볼
    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    /// 잘못된 입력 (0 레버리지, 가격 없는 지정가 주문 등)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// 마지막 시도까지 실패
    #[error("Retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<ExchangeError>,
    },

    /// 지원되지 않는 작업
    #[error("Not supported: {0}")]
    NotSupported(String),
}

impl ExchangeError {
    /// 재시도 가능한 에러인지 확인.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ExchangeError::NetworkError(_)
                | ExchangeError::Disconnected(_)
                | ExchangeError::Timeout(_)
                | ExchangeError::RateLimited
                | ExchangeError::ServerError { .. }
                | ExchangeError::TimestampError { .. }
        )
    }

    /// 시계 오차로 인한 거부인지 확인.
    pub fn is_clock_drift(&self) -> bool {
        match self {
            ExchangeError::TimestampError { .. } => true,
            ExchangeError::RetriesExhausted { last, .. } => last.is_clock_drift(),
            _ => false,
        }
    }

    /// 인증 에러인지 확인.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, ExchangeError::Unauthorized(_))
    }

    /// 폴백으로 가려서는 안 되는 치명적 에러인지 확인.
    pub fn is_fatal(&self) -> bool {
        match self {
            ExchangeError::Unauthorized(_)
            | ExchangeError::Configuration(_)
            | ExchangeError::InsufficientBalance(_)
            | ExchangeError::InvalidQuantity(_)
            | ExchangeError::OrderRejected(_) => true,
            ExchangeError::RetriesExhausted { last, .. } => last.is_fatal(),
            _ => false,
        }
    }

    /// 주문 결과를 알 수 없는 에러인지 확인 (요청이 거래소에 도달했을 수 있음).
    pub fn is_outcome_unknown(&self) -> bool {
        match self {
            ExchangeError::Timeout(_) | ExchangeError::ServerError { .. } => true,
            ExchangeError::RetriesExhausted { last, .. } => last.is_outcome_unknown(),
            _ => false,
        }
    }

    /// 거래소가 보고한 원본 (코드, 메시지).
    ///
    /// 재시도 소진 에러는 마지막 시도의 원본을 반환합니다.
    pub fn upstream(&self) -> Option<(i32, &str)> {
        match self {
            ExchangeError::ApiError { code, message }
            | ExchangeError::TimestampError { code, message } => Some((*code, message.as_str())),
            ExchangeError::ServerError { status, message } => {
                Some((i32::from(*status), message.as_str()))
            }
            ExchangeError::RetriesExhausted { last, .. } => last.upstream(),
            _ => None,
        }
    }

    /// Binance 에러 코드를 ExchangeError로 매핑.
    pub fn from_binance_code(code: i32, msg: &str) -> Self {
        let msg = msg.to_string();
        match code {
            BINANCE_CLOCK_DRIFT_CODE => ExchangeError::TimestampError { code, message: msg },
            -1001 => ExchangeError::Disconnected(msg),
            -1002 | -1022 | -2014 | -2015 => ExchangeError::Unauthorized(msg),
            -1003 => ExchangeError::RateLimited,
            -1013 | -1111 | -4003 => ExchangeError::InvalidQuantity(msg),
            -1121 => ExchangeError::SymbolNotFound(msg),
            -2010 | -2019 => ExchangeError::InsufficientBalance(msg),
            -2011 | -2013 => ExchangeError::OrderNotFound(msg),
            -2021 | -2022 | -4164 => ExchangeError::OrderRejected(msg),
            _ => ExchangeError::ApiError { code, message: msg },
        }
    }

    /// 구조화된 에러 본문이 없는 HTTP 실패를 매핑.
    pub fn from_http_status(status: u16, body: String) -> Self {
        match status {
            429 | 418 => ExchangeError::RateLimited,
            401 | 403 => ExchangeError::Unauthorized(body),
            500..=599 => ExchangeError::ServerError {
                status,
                message: body,
            },
            _ => ExchangeError::ApiError {
                code: i32::from(status),
                message: body,
            },
        }
    }
}

impl From<reqwest::Error> for ExchangeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ExchangeError::Timeout(err.to_string())
        } else if err.is_connect() || err.is_request() {
            ExchangeError::NetworkError(err.to_string())
        } else if err.is_decode() {
            ExchangeError::ParseError(err.to_string())
        } else {
            ExchangeError::NetworkError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ExchangeError {
    fn from(err: serde_json::Error) -> Self {
        ExchangeError::ParseError(err.to_string())
    }
}

impl From<CoreError> for ExchangeError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidSymbol(s) => ExchangeError::InvalidSymbol(s),
            CoreError::InvalidInput(s) => ExchangeError::InvalidInput(s),
            CoreError::Config(s) => ExchangeError::Configuration(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binance_code_mapping() {
        let drift = ExchangeError::from_binance_code(-1021, "Timestamp outside recvWindow");
        assert!(drift.is_clock_drift());
        assert!(drift.is_retryable());

        let margin = ExchangeError::from_binance_code(-2019, "Margin is insufficient.");
        assert!(matches!(margin, ExchangeError::InsufficientBalance(_)));
        assert!(!margin.is_retryable());
        assert!(margin.is_fatal());

        let unknown = ExchangeError::from_binance_code(-4999, "???");
        assert_eq!(unknown.upstream(), Some((-4999, "???")));
    }

    #[test]
    fn test_http_status_mapping() {
        assert!(matches!(
            ExchangeError::from_http_status(429, String::new()),
            ExchangeError::RateLimited
        ));
        let server = ExchangeError::from_http_status(503, "unavailable".to_string());
        assert!(server.is_retryable());
        assert!(server.is_outcome_unknown());
        assert!(!ExchangeError::from_http_status(404, String::new()).is_retryable());
    }

    #[test]
    fn test_retries_exhausted_keeps_upstream() {
        let err = ExchangeError::RetriesExhausted {
            attempts: 3,
            last: Box::new(ExchangeError::TimestampError {
                code: -1021,
                message: "ahead of server".to_string(),
            }),
        };
        assert_eq!(err.upstream(), Some((-1021, "ahead of server")));
        assert!(err.is_clock_drift());
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("after 3 attempts"));
    }

    #[test]
    fn test_core_error_conversion() {
        let err: ExchangeError = CoreError::Config("missing key".to_string()).into();
        assert!(matches!(err, ExchangeError::Configuration(_)));
        assert!(err.is_fatal());
    }
}
