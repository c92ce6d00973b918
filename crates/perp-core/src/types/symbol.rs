//! 계약 심볼 정의 및 정규화.
//!
//! 이 모듈은 자유 형식의 상품 식별자를 거래소별 표준 계약 심볼로 변환합니다:
//! - `SymbolFormat` - 거래소의 계약 심볼 표기 방식
//! - `ContractSymbol` - 거래소 표준 계약 심볼
//! - `SymbolNormalizer` - 입력 형식을 표준 심볼로 정규화
//!
//! # 허용 입력 형식
//!
//! | 입력 | Concatenated | Underscore |
//! |------|--------------|------------|
//! | `BTC` | `BTCUSDT` | `BTC_USDT` |
//! | `BTC/USDT` | `BTCUSDT` | `BTC_USDT` |
//! | `BTC/USDT:USDT` | `BTCUSDT` | `BTC_USDT` |
//! | `BTC_USDT`, `btc-usdt` | `BTCUSDT` | `BTC_USDT` |
//! | `BTCUSDT` | `BTCUSDT` | `BTC_USDT` |
//!
//! # 기본 호가 자산 추가 정책
//!
//! 호가 자산을 식별할 수 없는 입력(`BTC`)은 기본 호가 자산(`USDT`)을 붙여
//! 해석합니다. 컨트롤러가 기준 자산만으로 주문할 수 있게 하기 위한 사용성
//! 우선 정책이며, 기준 자산이 우연히 알려진 호가 자산으로 끝나는 경우
//! (예: `XUSDC`) 페어로 해석될 수 있습니다. 구분자가 두 개 이상이거나,
//! 영숫자가 아닌 문자가 있거나, 기준/호가 자산이 같은 입력은 거부합니다.
//! 명시적 페어(`ETH/BTC`)의 호가 자산은 알려진 호가 자산이어야 합니다.
//! 그렇지 않으면 연결 표기에서 다시 분해할 수 없어 정규화가 멱등이 아니게 됩니다.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 기본 호가 자산.
pub const DEFAULT_QUOTE_ASSET: &str = "USDT";

/// 페어 구분자로 허용하는 문자.
const PAIR_SEPARATORS: &[char] = &['/', '_', '-'];

/// 거래소의 계약 심볼 표기 방식.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolFormat {
    /// 구분자 없음 (예: Binance `BTCUSDT`)
    Concatenated,
    /// 밑줄 구분 (예: `BTC_USDT`)
    Underscore,
}

impl SymbolFormat {
    fn join(&self, base: &str, quote: &str) -> String {
        match self {
            SymbolFormat::Concatenated => format!("{}{}", base, quote),
            SymbolFormat::Underscore => format!("{}_{}", base, quote),
        }
    }
}

/// 거래소 표준 계약 심볼.
///
/// `SymbolNormalizer`를 통해서만 생성되며, 같은 정규화기로 다시 정규화해도
/// 값이 바뀌지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContractSymbol(String);

impl ContractSymbol {
    /// 문자열 참조를 반환합니다.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 내부 문자열을 반환합니다.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ContractSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ContractSymbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// 심볼 정규화기.
///
/// 순수 함수로만 구성되며 I/O가 없습니다.
#[derive(Debug, Clone)]
pub struct SymbolNormalizer {
    format: SymbolFormat,
    default_quote: String,
    /// 긴 것부터 정렬된 알려진 호가 자산
    known_quotes: Vec<String>,
}

impl SymbolNormalizer {
    /// 새 정규화기를 생성합니다.
    pub fn new(format: SymbolFormat) -> Self {
        let mut normalizer = Self {
            format,
            default_quote: DEFAULT_QUOTE_ASSET.to_string(),
            known_quotes: Vec::new(),
        };
        normalizer.set_known_quotes(["USDT", "USDC", "BUSD", "FDUSD"]);
        normalizer
    }

    /// Binance USDⓈ-M 선물 표기 (`BTCUSDT`).
    pub fn binance_futures() -> Self {
        Self::new(SymbolFormat::Concatenated)
    }

    /// 기본 호가 자산을 설정합니다.
    pub fn with_default_quote(mut self, quote: impl Into<String>) -> Self {
        self.default_quote = quote.into().to_uppercase();
        let quotes = self.known_quotes.clone();
        self.set_known_quotes(quotes);
        self
    }

    /// 접미사로 인식할 호가 자산 목록을 설정합니다.
    pub fn with_known_quotes<I, S>(mut self, quotes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.set_known_quotes(quotes);
        self
    }

    fn set_known_quotes<I, S>(&mut self, quotes: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut quotes: Vec<String> = quotes
            .into_iter()
            .map(|q| q.as_ref().to_uppercase())
            .collect();
        if !quotes.contains(&self.default_quote) {
            quotes.push(self.default_quote.clone());
        }
        // 가장 긴 접미사가 먼저 매칭되도록 정렬
        quotes.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        quotes.dedup();
        self.known_quotes = quotes;
    }

    /// 표기 방식을 반환합니다.
    pub fn format(&self) -> SymbolFormat {
        self.format
    }

    /// 입력을 거래소 표준 계약 심볼로 정규화합니다.
    ///
    /// # Errors
    /// 해석할 수 없는 입력이면 `CoreError::InvalidSymbol`을 반환합니다.
    pub fn normalize(&self, raw: &str) -> CoreResult<ContractSymbol> {
        let (base, quote) = self.split(raw)?;
        Ok(ContractSymbol(self.format.join(&base, &quote)))
    }

    /// 입력에서 기준 자산을 추출합니다.
    pub fn extract_base(&self, raw: &str) -> CoreResult<String> {
        self.split(raw).map(|(base, _)| base)
    }

    /// 입력을 (기준 자산, 호가 자산) 쌍으로 분해합니다.
    ///
    /// 표준 심볼을 다시 "BASE/QUOTE" 형식으로 되돌릴 때 사용합니다.
    pub fn to_pair(&self, raw: &str) -> CoreResult<(String, String)> {
        self.split(raw)
    }

    /// 입력을 "BASE/QUOTE" 표시 형식으로 변환합니다.
    pub fn to_display(&self, raw: &str) -> CoreResult<String> {
        self.split(raw)
            .map(|(base, quote)| format!("{}/{}", base, quote))
    }

    fn split(&self, raw: &str) -> CoreResult<(String, String)> {
        let upper = raw.trim().to_uppercase();
        if upper.is_empty() {
            return Err(CoreError::InvalidSymbol("빈 심볼".to_string()));
        }

        // 정산 자산 접미사 제거 ("BTC/USDT:USDT")
        let pair = match upper.split_once(':') {
            Some((pair, settle)) => {
                if !is_asset(settle) {
                    return Err(CoreError::InvalidSymbol(raw.to_string()));
                }
                pair
            }
            None => upper.as_str(),
        };

        let parts: Vec<&str> = pair.split(PAIR_SEPARATORS).collect();
        let (base, quote) = match parts.as_slice() {
            // 연결 표기에서 되돌릴 수 없는 호가 자산은 거부
            [base, quote] if self.is_known_quote(quote) => (base.to_string(), quote.to_string()),
            [token] => self.split_concatenated(token),
            _ => return Err(CoreError::InvalidSymbol(raw.to_string())),
        };

        if !is_asset(&base) || !is_asset(&quote) || base == quote {
            return Err(CoreError::InvalidSymbol(raw.to_string()));
        }

        Ok((base, quote))
    }

    fn is_known_quote(&self, quote: &str) -> bool {
        self.known_quotes.iter().any(|q| q == quote)
    }

    fn split_concatenated(&self, token: &str) -> (String, String) {
        for quote in &self.known_quotes {
            if let Some(base) = token.strip_suffix(quote.as_str()) {
                if !base.is_empty() {
                    return (base.to_string(), quote.clone());
                }
            }
        }

        // 호가 자산 없음: 기본 호가 자산 추가
        (token.to_string(), self.default_quote.clone())
    }
}

impl Default for SymbolNormalizer {
    fn default() -> Self {
        Self::binance_futures()
    }
}

fn is_asset(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric())
}
