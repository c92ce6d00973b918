//! 손익, 증거금, 주문 수량 계산 공통 로직.
//!
//! 모든 계산은 로컬에서 수행되며 거래소에 위임하지 않습니다.

use rust_decimal::Decimal;

use super::contract::ContractMeta;
use super::order::Side;
use crate::error::{CoreError, CoreResult};
use crate::types::{floor_to_step, Price, Quantity};

/// 실현 손익 계산 (수수료 제외).
///
/// * 롱(`Side::Buy`): `qty * (exit - entry)`
/// * 숏(`Side::Sell`): `qty * (entry - exit)`
///
/// # Examples
///
/// ```
/// use perp_core::{calculate_pnl, Side};
/// use rust_decimal_macros::dec;
///
/// assert_eq!(calculate_pnl(dec!(100), dec!(110), dec!(2), Side::Buy), dec!(20));
/// assert_eq!(calculate_pnl(dec!(100), dec!(110), dec!(2), Side::Sell), dec!(-20));
/// ```
pub fn calculate_pnl(entry_price: Price, exit_price: Price, quantity: Quantity, side: Side) -> Decimal {
    match side {
        Side::Buy => quantity * (exit_price - entry_price),
        Side::Sell => quantity * (entry_price - exit_price),
    }
}

/// 명목 가치 계산 (가격 × 수량).
pub fn notional_value(price: Price, quantity: Quantity) -> Decimal {
    price * quantity
}

/// 포지션 증거금 계산: `|size * entry_price| / leverage`.
///
/// 레버리지가 0이면 1배로 취급합니다.
pub fn position_margin(size: Quantity, entry_price: Price, leverage: u32) -> Decimal {
    let leverage = Decimal::from(leverage.max(1));
    (size * entry_price).abs() / leverage
}

/// 증거금 예산으로 주문 수량을 계산합니다.
///
/// `margin * leverage / price`를 계약의 수량 step으로 내림한 뒤,
/// 계약 최소 수량 미만이면 최소 수량으로, 최대 수량 초과면 최대 수량으로
/// 맞춥니다.
///
/// 최소 수량으로 올리는 경우 결과의 명목 가치가 예산을 넘을 수 있습니다.
/// 거래소가 받아들이지 않는 수량을 내는 대신 최소 주문을 내는 쪽을 택한
/// 동작이므로, 예산이 엄격한 호출자는 결과를 다시 확인해야 합니다.
///
/// # Errors
/// 가격이 0 이하이거나, 레버리지가 0이거나, 증거금이 음수이면
/// `CoreError::InvalidInput`을 반환합니다.
pub fn calculate_quantity(
    margin: Decimal,
    leverage: u32,
    price: Price,
    contract: &ContractMeta,
) -> CoreResult<Quantity> {
    if price <= Decimal::ZERO {
        return Err(CoreError::InvalidInput(format!("가격은 양수여야 합니다: {}", price)));
    }
    if leverage == 0 {
        return Err(CoreError::InvalidInput("레버리지는 1 이상이어야 합니다".to_string()));
    }
    if margin < Decimal::ZERO {
        return Err(CoreError::InvalidInput(format!("증거금은 음수일 수 없습니다: {}", margin)));
    }

    let raw = margin
        .checked_mul(Decimal::from(leverage))
        .and_then(|budget| budget.checked_div(price))
        .ok_or_else(|| {
            CoreError::InvalidInput(format!(
                "수량 계산이 범위를 넘습니다: {} * {} / {}",
                margin, leverage, price
            ))
        })?;
    let mut quantity = floor_to_step(raw, contract.step_size).max(contract.min_qty);

    if let Some(max_qty) = contract.max_qty.filter(|m| *m > Decimal::ZERO) {
        quantity = quantity.min(floor_to_step(max_qty, contract.step_size));
    }

    Ok(quantity)
}
