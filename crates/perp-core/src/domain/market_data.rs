//! 시장 데이터 및 체결 기록 타입.
//!
//! 이 모듈은 거래소와 무관하게 동일한 형태로 반환되는 시장 데이터를 정의합니다:
//! - `Kline` - OHLCV 캔들스틱 데이터
//! - `TickerSnapshot` - 시세 스냅샷
//! - `OrderBook` - 호가창 데이터
//! - `TradeRecord` - 계정 체결 기록
//! - `FundingRate` - 펀딩비 정보

use crate::domain::order::Side;
use crate::types::{Price, Quantity, Timeframe};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// OHLCV 캔들스틱 데이터.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Kline {
    /// 계약 심볼
    pub symbol: String,
    /// 타임프레임
    pub timeframe: Timeframe,
    /// 캔들 시작 시간
    pub open_time: DateTime<Utc>,
    /// 시가
    pub open: Price,
    /// 고가
    pub high: Price,
    /// 저가
    pub low: Price,
    /// 종가
    pub close: Price,
    /// 거래량 (기준 자산 단위)
    pub volume: Quantity,
    /// 캔들 종료 시간
    pub close_time: DateTime<Utc>,
    /// 거래대금 (호가 자산 단위)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote_volume: Option<Decimal>,
    /// 체결 건수
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_trades: Option<u64>,
}

impl Kline {
    /// 양봉(종가 > 시가)인지 확인합니다.
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }
}

/// 시세 스냅샷.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickerSnapshot {
    /// 계약 심볼
    pub symbol: String,
    /// 최근 체결가
    pub last: Price,
    /// 최우선 매수 호가
    pub bid: Option<Price>,
    /// 최우선 매도 호가
    pub ask: Option<Price>,
    /// 24시간 최고가
    pub high_24h: Price,
    /// 24시간 최저가
    pub low_24h: Price,
    /// 24시간 거래량
    pub volume_24h: Quantity,
    /// 24시간 변동률(%)
    pub change_24h_percent: Decimal,
    /// 타임스탬프
    pub timestamp: DateTime<Utc>,
}

impl TickerSnapshot {
    /// 중간 가격을 반환합니다. 호가가 없으면 최근 체결가입니다.
    pub fn mid_price(&self) -> Price {
        match (self.bid, self.ask) {
            (Some(bid), Some(ask)) => (bid + ask) / Decimal::TWO,
            _ => self.last,
        }
    }
}

/// 호가창 가격 레벨.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBookLevel {
    /// 가격
    pub price: Price,
    /// 수량
    pub quantity: Quantity,
}

/// 호가창 데이터.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBook {
    /// 계약 심볼
    pub symbol: String,
    /// 매수 호가 - 가격 내림차순 정렬
    pub bids: Vec<OrderBookLevel>,
    /// 매도 호가 - 가격 오름차순 정렬
    pub asks: Vec<OrderBookLevel>,
    /// 타임스탬프
    pub timestamp: DateTime<Utc>,
}

impl OrderBook {
    /// 최우선 매수 호가를 반환합니다.
    pub fn best_bid(&self) -> Option<Price> {
        self.bids.first().map(|l| l.price)
    }

    /// 최우선 매도 호가를 반환합니다.
    pub fn best_ask(&self) -> Option<Price> {
        self.asks.first().map(|l| l.price)
    }

    /// 스프레드를 반환합니다.
    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask - bid),
            _ => None,
        }
    }
}

/// 계정 체결 기록.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    /// 체결 ID
    pub id: String,
    /// 거래소 주문 ID
    pub order_id: String,
    /// 계약 심볼
    pub symbol: String,
    /// 체결 방향
    pub side: Side,
    /// 체결 가격
    pub price: Price,
    /// 체결 수량
    pub quantity: Quantity,
    /// 수수료
    pub fee: Decimal,
    /// 수수료 자산
    pub fee_asset: String,
    /// 거래소가 보고한 실현 손익
    pub realized_pnl: Decimal,
    /// 메이커 체결 여부
    pub is_maker: bool,
    /// 체결 시각
    pub timestamp: DateTime<Utc>,
}

/// 펀딩비 정보.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundingRate {
    /// 계약 심볼
    pub symbol: String,
    /// 현재 펀딩비 (0.0001 = 0.01%)
    pub rate: Decimal,
    /// 마크 가격
    pub mark_price: Price,
    /// 인덱스 가격
    pub index_price: Price,
    /// 다음 펀딩 시각
    pub next_funding_time: DateTime<Utc>,
}
