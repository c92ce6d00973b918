//! 주문 타입 및 결과.
//!
//! 이 모듈은 어댑터가 컨트롤러와 주고받는 주문 관련 타입을 정의합니다:
//! - `Side` - 주문 방향 (매수/매도)
//! - `OrderType` - 주문 유형 (시장가, 지정가)
//! - `OrderState` - 거래소 중립적인 주문 상태 어휘
//! - `OrderRequest` - 주문 요청
//! - `OrderResult` - 거래소와 무관하게 동일한 형태의 주문 결과

use crate::types::{Price, Quantity};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 주문 방향 (매수 또는 매도).
///
/// 포지션 방향으로 쓰일 때는 Buy = 롱, Sell = 숏입니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// 매수 (롱)
    Buy,
    /// 매도 (숏)
    Sell,
}

impl Side {
    /// 반대 방향을 반환합니다.
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// 거래소 표기 문자열 ("BUY"/"SELL")을 파싱합니다.
    pub fn from_exchange(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "BUY" | "LONG" => Some(Side::Buy),
            "SELL" | "SHORT" => Some(Side::Sell),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// 주문 유형.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    /// 시장가 주문
    Market,
    /// 지정가 주문
    Limit,
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderType::Market => write!(f, "MARKET"),
            OrderType::Limit => write!(f, "LIMIT"),
        }
    }
}

/// 주문 유효 기간.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimeInForce {
    /// 취소될 때까지 유효 (Good Till Cancelled)
    GTC,
    /// 즉시 체결 또는 취소 (Immediate Or Cancel)
    IOC,
    /// 전량 체결 또는 취소 (Fill Or Kill)
    FOK,
    /// 메이커 전용 (Good Till Crossing)
    GTX,
}

impl fmt::Display for TimeInForce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TimeInForce::GTC => "GTC",
            TimeInForce::IOC => "IOC",
            TimeInForce::FOK => "FOK",
            TimeInForce::GTX => "GTX",
        };
        f.write_str(s)
    }
}

/// 거래소 중립적인 주문 상태 어휘.
///
/// 거래소 고유 상태 문자열은 이 네 가지 중 하나로 매핑됩니다.
/// 분류할 수 없는 상태는 원문을 `Other`에 보존합니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    /// 미체결 또는 부분 체결 (아직 활성)
    Open,
    /// 전량 체결
    Finished,
    /// 취소 또는 만료
    Cancelled,
    /// 기타 (거부 등, 거래소 원문 상태)
    Other(String),
}

impl OrderState {
    /// 주문이 최종 상태인지 확인합니다.
    pub fn is_final(&self) -> bool {
        !matches!(self, OrderState::Open)
    }
}

impl fmt::Display for OrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderState::Open => write!(f, "open"),
            OrderState::Finished => write!(f, "finished"),
            OrderState::Cancelled => write!(f, "cancelled"),
            OrderState::Other(raw) => write!(f, "{}", raw.to_lowercase()),
        }
    }
}

/// 주문 결과의 출처.
///
/// 조회 실패 시의 저하 모드(degraded mode)를 결과에 명시적으로 드러냅니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderSource {
    /// 거래소 응답
    Live,
    /// 주문 상태 캐시의 마지막 스냅샷
    Cache,
    /// 어디에서도 찾을 수 없어 체결 완료로 가정함
    AssumedFinished,
}

/// 새 주문 생성을 위한 주문 요청.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    /// 상품 식별자 (자유 형식, 어댑터가 정규화)
    pub symbol: String,
    /// 주문 방향
    pub side: Side,
    /// 주문 유형
    pub order_type: OrderType,
    /// 주문 수량 (step 단위로 내림되어 전송됨)
    pub quantity: Quantity,
    /// 지정가 (지정가 주문에 필수)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Price>,
    /// 포지션 축소 전용
    #[serde(default)]
    pub reduce_only: bool,
    /// 주문 유효 기간 (지정가 주문에만 전송)
    pub time_in_force: TimeInForce,
    /// 클라이언트 주문 ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_order_id: Option<String>,
}

impl OrderRequest {
    fn new(symbol: impl Into<String>, side: Side, order_type: OrderType, quantity: Quantity) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            order_type,
            quantity,
            price: None,
            reduce_only: false,
            time_in_force: TimeInForce::GTC,
            client_order_id: None,
        }
    }

    /// 시장가 매수 주문을 생성합니다.
    pub fn market_buy(symbol: impl Into<String>, quantity: Quantity) -> Self {
        Self::new(symbol, Side::Buy, OrderType::Market, quantity)
    }

    /// 시장가 매도 주문을 생성합니다.
    pub fn market_sell(symbol: impl Into<String>, quantity: Quantity) -> Self {
        Self::new(symbol, Side::Sell, OrderType::Market, quantity)
    }

    /// 지정가 매수 주문을 생성합니다.
    pub fn limit_buy(symbol: impl Into<String>, quantity: Quantity, price: Price) -> Self {
        let mut request = Self::new(symbol, Side::Buy, OrderType::Limit, quantity);
        request.price = Some(price);
        request
    }

    /// 지정가 매도 주문을 생성합니다.
    pub fn limit_sell(symbol: impl Into<String>, quantity: Quantity, price: Price) -> Self {
        let mut request = Self::new(symbol, Side::Sell, OrderType::Limit, quantity);
        request.price = Some(price);
        request
    }

    /// 포지션 축소 전용으로 설정합니다.
    pub fn reduce_only(mut self) -> Self {
        self.reduce_only = true;
        self
    }

    /// 주문 유효 기간을 설정합니다.
    pub fn with_time_in_force(mut self, tif: TimeInForce) -> Self {
        self.time_in_force = tif;
        self
    }

    /// 클라이언트 주문 ID를 설정합니다.
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_order_id = Some(client_id.into());
        self
    }
}

/// 거래소와 무관하게 동일한 형태의 주문 결과.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResult {
    /// 거래소 주문 ID
    pub order_id: String,
    /// 클라이언트 주문 ID
    pub client_order_id: Option<String>,
    /// 계약 심볼 (거래소 표준)
    pub symbol: String,
    /// 주문 방향 (알 수 없으면 None)
    pub side: Option<Side>,
    /// 주문 유형 (알 수 없으면 None)
    pub order_type: Option<OrderType>,
    /// 주문 수량
    pub quantity: Quantity,
    /// 주문 가격 (시장가는 0 또는 None)
    pub price: Option<Price>,
    /// 체결 수량
    pub filled_quantity: Quantity,
    /// 평균 체결 가격
    pub average_price: Option<Price>,
    /// 상태
    pub state: OrderState,
    /// 포지션 축소 전용 여부
    pub reduce_only: bool,
    /// 마지막 업데이트 시각
    pub updated_at: DateTime<Utc>,
    /// 결과 출처
    pub source: OrderSource,
}

impl OrderResult {
    /// 어디에서도 찾을 수 없는 주문에 대한 "체결 완료 가정" 결과를 생성합니다.
    ///
    /// 저하 모드 전용입니다. 실제로는 아직 열려 있는 주문일 수도 있으므로
    /// `source`가 `AssumedFinished`임을 확인해야 합니다.
    pub fn assumed_finished(order_id: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            order_id: order_id.into(),
            client_order_id: None,
            symbol: symbol.into(),
            side: None,
            order_type: None,
            quantity: Decimal::ZERO,
            price: None,
            filled_quantity: Decimal::ZERO,
            average_price: None,
            state: OrderState::Finished,
            reduce_only: false,
            updated_at: Utc::now(),
            source: OrderSource::AssumedFinished,
        }
    }

    /// 출처를 바꾼 사본을 반환합니다.
    pub fn with_source(mut self, source: OrderSource) -> Self {
        self.source = source;
        self
    }

    /// 남은 미체결 수량을 반환합니다.
    pub fn remaining_quantity(&self) -> Quantity {
        (self.quantity - self.filled_quantity).max(Decimal::ZERO)
    }

    /// 주문이 아직 활성 상태인지 확인합니다.
    pub fn is_open(&self) -> bool {
        self.state == OrderState::Open
    }
}
