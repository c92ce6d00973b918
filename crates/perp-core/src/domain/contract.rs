//! 계약별 거래 규칙.
//!
//! 어댑터는 계약 메타데이터를 요청 시점에 조회하며 캐싱하지 않습니다.
//! 조회된 값은 정밀도 정규화의 기준 입력으로 사용됩니다.

use crate::types::{floor_to_step, Price, Quantity};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 계약 메타데이터.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractMeta {
    /// 계약 심볼
    pub symbol: String,
    /// 기준 자산
    pub base_asset: String,
    /// 호가 자산
    pub quote_asset: String,
    /// 최소 주문 수량
    pub min_qty: Quantity,
    /// 최대 주문 수량
    pub max_qty: Option<Quantity>,
    /// 수량 단위
    pub step_size: Quantity,
    /// 가격 단위
    pub tick_size: Price,
    /// 최소 주문 명목 가치
    pub min_notional: Option<Decimal>,
    /// 메이커 수수료율
    pub maker_fee: Option<Decimal>,
    /// 테이커 수수료율
    pub taker_fee: Option<Decimal>,
    /// 최소 레버리지
    pub min_leverage: u32,
    /// 최대 레버리지 (알 수 없으면 None)
    pub max_leverage: Option<u32>,
}

impl ContractMeta {
    /// 규칙이 비어 있는 메타데이터를 생성합니다.
    pub fn new(
        symbol: impl Into<String>,
        base_asset: impl Into<String>,
        quote_asset: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            base_asset: base_asset.into(),
            quote_asset: quote_asset.into(),
            min_qty: Decimal::ZERO,
            max_qty: None,
            step_size: Decimal::ZERO,
            tick_size: Decimal::ZERO,
            min_notional: None,
            maker_fee: None,
            taker_fee: None,
            min_leverage: 1,
            max_leverage: None,
        }
    }

    /// 수량 규칙을 설정합니다.
    pub fn with_quantity_rules(
        mut self,
        min_qty: Quantity,
        step_size: Quantity,
        max_qty: Option<Quantity>,
    ) -> Self {
        self.min_qty = min_qty;
        self.step_size = step_size;
        self.max_qty = max_qty;
        self
    }

    /// 가격 단위를 설정합니다.
    pub fn with_tick_size(mut self, tick_size: Price) -> Self {
        self.tick_size = tick_size;
        self
    }

    /// 수량을 수량 단위로 내림합니다.
    pub fn floor_quantity(&self, quantity: Quantity) -> Quantity {
        floor_to_step(quantity, self.step_size)
    }

    /// 가격을 가격 단위로 내림합니다.
    pub fn floor_price(&self, price: Price) -> Price {
        floor_to_step(price, self.tick_size)
    }

    /// 레버리지가 계약 허용 범위 안인지 확인합니다.
    pub fn allows_leverage(&self, leverage: u32) -> bool {
        leverage >= self.min_leverage && self.max_leverage.map_or(true, |max| leverage <= max)
    }
}
