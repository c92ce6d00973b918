//! # Perp Core
//!
//! 선물 거래소 어댑터의 거래소 중립적인 도메인 모델 및 규칙을 제공합니다.
//!
//! 이 크레이트는 어댑터 계층 전반에서 사용되는 기본 타입을 제공합니다:
//! - 계약 심볼 정규화
//! - 수량/가격 정밀도 정규화 (step 단위 내림)
//! - 주문, 포지션, 시세, 체결 결과 타입
//! - 손익/증거금/주문 수량 계산
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod types;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
pub use types::*;
