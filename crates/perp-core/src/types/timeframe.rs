//! 캔들 조회 간격 정의.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// 캔들스틱 타임프레임.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    M1,
    M3,
    M5,
    M15,
    M30,
    H1,
    H2,
    H4,
    H6,
    H8,
    H12,
    D1,
    D3,
    W1,
    /// 월봉 (기간은 30일 근사값)
    MN1,
}

/// (타임프레임, 거래소 간격 문자열, 초)
const TIMEFRAMES: [(Timeframe, &str, u64); 15] = [
    (Timeframe::M1, "1m", 60),
    (Timeframe::M3, "3m", 3 * 60),
    (Timeframe::M5, "5m", 5 * 60),
    (Timeframe::M15, "15m", 15 * 60),
    (Timeframe::M30, "30m", 30 * 60),
    (Timeframe::H1, "1h", 3_600),
    (Timeframe::H2, "2h", 2 * 3_600),
    (Timeframe::H4, "4h", 4 * 3_600),
    (Timeframe::H6, "6h", 6 * 3_600),
    (Timeframe::H8, "8h", 8 * 3_600),
    (Timeframe::H12, "12h", 12 * 3_600),
    (Timeframe::D1, "1d", 86_400),
    (Timeframe::D3, "3d", 3 * 86_400),
    (Timeframe::W1, "1w", 7 * 86_400),
    (Timeframe::MN1, "1M", 30 * 86_400),
];

impl Timeframe {
    fn entry(&self) -> &'static (Timeframe, &'static str, u64) {
        TIMEFRAMES
            .iter()
            .find(|(tf, _, _)| tf == self)
            .unwrap_or(&TIMEFRAMES[0])
    }

    /// 이 타임프레임의 기간을 반환합니다.
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.entry().2)
    }

    /// 밀리초 단위 기간을 반환합니다.
    pub fn as_millis(&self) -> i64 {
        (self.entry().2 * 1000) as i64
    }

    /// 거래소 간격 문자열 ("1m", "4h", "1M")로 변환합니다.
    pub fn as_interval(&self) -> &'static str {
        self.entry().1
    }

    /// 거래소 간격 문자열에서 파싱합니다. 월봉(`1M`)만 대소문자를 구분합니다.
    pub fn from_interval(s: &str) -> Option<Self> {
        if s == "1M" {
            return Some(Timeframe::MN1);
        }
        let lower = s.to_lowercase();
        TIMEFRAMES
            .iter()
            .find(|(tf, interval, _)| *tf != Timeframe::MN1 && *interval == lower)
            .map(|(tf, _, _)| *tf)
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_interval())
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_interval(s).ok_or_else(|| format!("Invalid timeframe: {}", s))
    }
}
