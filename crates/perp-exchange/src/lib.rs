//! 선물 거래소 어댑터 및 복원력 계층.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - FuturesExchange trait: 통합 선물 거래소 인터페이스
//! - Binance USDⓈ-M 선물 커넥터
//! - 서버 시계 동기화 (단일 진행 동기화)
//! - HMAC-SHA256 요청 서명
//! - 재시도/타임아웃/재동기화를 처리하는 REST 전송 계층
//! - 주문 상태 캐시 (TTL + 크기 제한)

pub mod cache;
pub mod clock;
pub mod connector;
pub mod error;
pub mod retry;
pub mod signer;
pub mod traits;
pub mod transport;

pub use cache::{OrderCache, OrderCacheConfig, OrderCacheEntry};
pub use clock::{
    ClockConfig, ClockState, ClockSync, LocalClock, ManualClock, ServerTimeSource, SystemClock,
};
pub use connector::{BinanceFuturesClient, BinanceFuturesConfig, BinanceTimeSource};
pub use error::*;
pub use retry::{CallOptions, RetryConfig};
pub use signer::{build_query, HmacSha256Signer, RequestSigner, SignedRequest};
pub use traits::*;
pub use transport::{Auth, ErrorDecoder, RestTransport};
