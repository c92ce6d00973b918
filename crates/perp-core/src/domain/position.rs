//! 포지션 스냅샷.
//!
//! 거래소가 보고한 선물 포지션을 거래소와 무관한 형태로 표현합니다.
//! 크기는 부호가 있는 값입니다 (양수 = 롱, 음수 = 숏).

use crate::domain::{position_margin, Side};
use crate::types::{Price, Quantity};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 선물 포지션 스냅샷.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionSnapshot {
    /// 계약 심볼
    pub symbol: String,
    /// 부호 있는 포지션 크기 (양수 = 롱, 음수 = 숏)
    pub size: Quantity,
    /// 평균 진입 가격
    pub entry_price: Price,
    /// 마크 가격
    pub mark_price: Price,
    /// 레버리지
    pub leverage: u32,
    /// 미실현 손익
    pub unrealized_pnl: Decimal,
    /// 포지션 증거금
    pub margin: Decimal,
    /// 청산 가격 (거래소가 보고한 경우)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub liquidation_price: Option<Price>,
    /// 마지막 업데이트 시각
    pub updated_at: DateTime<Utc>,
}

impl PositionSnapshot {
    /// 포지션 스냅샷을 생성합니다.
    ///
    /// `reported_margin`이 없거나 0이면 `|size * entry_price| / leverage`로
    /// 증거금을 계산합니다.
    pub fn new(
        symbol: impl Into<String>,
        size: Quantity,
        entry_price: Price,
        leverage: u32,
        reported_margin: Option<Decimal>,
    ) -> Self {
        let margin = match reported_margin {
            Some(m) if m > Decimal::ZERO => m,
            _ => position_margin(size, entry_price, leverage),
        };

        Self {
            symbol: symbol.into(),
            size,
            entry_price,
            mark_price: entry_price,
            leverage,
            unrealized_pnl: Decimal::ZERO,
            margin,
            liquidation_price: None,
            updated_at: Utc::now(),
        }
    }

    /// 포지션 방향 (크기가 0이면 None).
    pub fn side(&self) -> Option<Side> {
        if self.size > Decimal::ZERO {
            Some(Side::Buy)
        } else if self.size < Decimal::ZERO {
            Some(Side::Sell)
        } else {
            None
        }
    }

    /// 롱 포지션인지 확인합니다.
    pub fn is_long(&self) -> bool {
        self.size > Decimal::ZERO
    }

    /// 숏 포지션인지 확인합니다.
    pub fn is_short(&self) -> bool {
        self.size < Decimal::ZERO
    }

    /// 포지션이 비어 있는지 확인합니다.
    pub fn is_flat(&self) -> bool {
        self.size.is_zero()
    }

    /// 마크 가격 기준 명목 가치 (항상 양수).
    pub fn notional_value(&self) -> Decimal {
        (self.size * self.mark_price).abs()
    }
}
