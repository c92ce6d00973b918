//! 정밀한 금융 계산을 위한 Decimal 유틸리티.
//!
//! 거래소는 계약별 최소 단위(step)의 배수로만 수량/가격을 받습니다.
//! 이 모듈은 값을 step 단위로 내림하는 정밀도 정규화 함수를 제공합니다.
//! 모든 연산은 `rust_decimal`의 10진 정수 스케일 연산이므로 이진 부동소수점
//! 누적 오차가 없습니다.

use rust_decimal::{Decimal, RoundingStrategy};

/// 금융 정밀도를 위한 가격 타입.
pub type Price = Decimal;

/// 주문 수량을 위한 타입.
pub type Quantity = Decimal;

/// step이 나타내는 소수점 자릿수를 계산합니다.
///
/// `step >= 1`이면 0, 그 외에는 `-floor(log10(step))`입니다.
/// (예: `0.001` → 3, `0.005` → 3, `0.5` → 1, `10` → 0)
///
/// step이 0 이하이면 0을 반환합니다.
pub fn decimals_for_step(step: Decimal) -> u32 {
    if step <= Decimal::ZERO || step >= Decimal::ONE {
        return 0;
    }

    let mut decimals = 0;
    let mut scaled = step;
    while scaled < Decimal::ONE {
        scaled *= Decimal::TEN;
        decimals += 1;
    }
    decimals
}

/// 값을 지정된 소수점 자릿수로 내림합니다 (0 방향 절사).
///
/// 절대값이 절대 커지지 않도록 음수도 0 방향으로 자릅니다.
pub fn floor_to_decimals(value: Decimal, decimals: u32) -> Decimal {
    value.round_dp_with_strategy(decimals, RoundingStrategy::ToZero)
}

/// 값을 step의 배수로 내림합니다.
///
/// 결과는 항상 `|result| <= |value|`이며 step의 정확한 배수입니다.
/// step이 0 이하이면 정밀도 규칙이 없는 것으로 보고 값을 그대로 반환합니다.
/// `value / step`이 Decimal 범위를 넘으면 step의 소수점 자릿수로만 자릅니다.
/// 이때 값은 정수이거나 step보다 훨씬 커서 배수 오차가 무시할 만합니다.
///
/// # Examples
///
/// ```
/// use perp_core::floor_to_step;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(floor_to_step(dec!(1.23456), dec!(0.001)), dec!(1.234));
/// assert_eq!(floor_to_step(dec!(1.2347), dec!(0.005)), dec!(1.230));
/// assert_eq!(floor_to_step(dec!(157), dec!(10)), dec!(150));
/// ```
pub fn floor_to_step(value: Decimal, step: Decimal) -> Decimal {
    if step <= Decimal::ZERO {
        return value;
    }

    let decimals = decimals_for_step(step);
    let floored = value
        .checked_div(step)
        .and_then(|steps| steps.trunc().checked_mul(step))
        .unwrap_or(value);
    floor_to_decimals(floored, decimals).normalize()
}

/// 값이 step의 정확한 배수인지 확인합니다.
pub fn is_multiple_of_step(value: Decimal, step: Decimal) -> bool {
    if step <= Decimal::ZERO {
        return true;
    }
    (value % step).is_zero()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_decimals_for_step() {
        assert_eq!(decimals_for_step(dec!(1)), 0);
        assert_eq!(decimals_for_step(dec!(10)), 0);
        assert_eq!(decimals_for_step(dec!(0.1)), 1);
        assert_eq!(decimals_for_step(dec!(0.5)), 1);
        assert_eq!(decimals_for_step(dec!(0.001)), 3);
        assert_eq!(decimals_for_step(dec!(0.005)), 3);
        assert_eq!(decimals_for_step(dec!(0.00000001)), 8);
        assert_eq!(decimals_for_step(dec!(0)), 0);
        assert_eq!(decimals_for_step(dec!(-0.01)), 0);
    }

    #[test]
    fn test_floor_never_rounds_up() {
        assert_eq!(floor_to_step(dec!(0.0999), dec!(0.001)), dec!(0.099));
        assert_eq!(floor_to_step(dec!(2.9999999), dec!(1)), dec!(2));
        assert_eq!(floor_to_step(dec!(-1.2399), dec!(0.01)), dec!(-1.23));
    }

    #[test]
    fn test_floor_avoids_binary_float_drift() {
        // 0.1 + 0.2 같은 입력이 0.30000000000000004 로 흔들리지 않음
        let value = dec!(0.1) + dec!(0.2);
        assert_eq!(floor_to_step(value, dec!(0.1)), dec!(0.3));
        assert_eq!(floor_to_step(dec!(4.35), dec!(0.01)), dec!(4.35));
    }

    #[test]
    fn test_floor_non_power_of_ten_step() {
        assert_eq!(floor_to_step(dec!(1.2347), dec!(0.005)), dec!(1.23));
        assert_eq!(floor_to_step(dec!(37), dec!(5)), dec!(35));
        assert!(is_multiple_of_step(dec!(1.235), dec!(0.005)));
        assert!(!is_multiple_of_step(dec!(1.236), dec!(0.005)));
    }

    #[test]
    fn test_floor_huge_value_does_not_overflow() {
        let huge = dec!(100000000000000000000000);
        assert_eq!(floor_to_step(huge, dec!(0.00000001)), huge);
        assert_eq!(floor_to_step(-huge, dec!(0.00000001)), -huge);
        assert_eq!(floor_to_step(Decimal::MAX, dec!(0.005)), Decimal::MAX);
    }

    #[test]
    fn test_floor_without_step_rule() {
        assert_eq!(floor_to_step(dec!(1.23456), dec!(0)), dec!(1.23456));
    }

    #[test]
    fn test_floor_to_decimals() {
        assert_eq!(floor_to_decimals(dec!(1.999), 2), dec!(1.99));
        assert_eq!(floor_to_decimals(dec!(-1.999), 2), dec!(-1.99));
    }
}
