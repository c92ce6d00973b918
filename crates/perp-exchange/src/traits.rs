//! 선물 거래소 trait 정의.

use async_trait::async_trait;
use perp_core::{
    calculate_pnl, calculate_quantity, ContractMeta, FundingRate, Kline, OrderBook, OrderRequest,
    OrderResult, PositionSnapshot, Price, Quantity, Side, TickerSnapshot, Timeframe, TradeRecord,
};
use rust_decimal::Decimal;

use crate::retry::CallOptions;
use crate::ExchangeError;

/// 거래소 작업을 위한 Result 타입.
pub type ExchangeResult<T> = Result<T, ExchangeError>;

/// 자산의 잔고 정보.
#[derive(Debug, Clone)]
pub struct Balance {
    /// 자산 이름 (예: "USDT")
    pub asset: String,
    /// 사용 가능한 잔고
    pub free: Decimal,
    /// 증거금/주문에 묶인 잔고
    pub locked: Decimal,
    /// 이 자산 기준 미실현 손익
    pub unrealized_pnl: Decimal,
}

impl Balance {
    /// 총 잔고 반환 (사용 가능 + 묶인 잔고).
    pub fn total(&self) -> Decimal {
        self.free + self.locked
    }
}

/// 선물 계좌 정보.
#[derive(Debug, Clone)]
pub struct AccountInfo {
    /// 자산별 잔고 (0이 아닌 것만)
    pub balances: Vec<Balance>,
    /// 총 지갑 잔고
    pub total_wallet_balance: Decimal,
    /// 총 미실현 손익
    pub total_unrealized_pnl: Decimal,
    /// 주문에 사용 가능한 잔고
    pub available_balance: Decimal,
    /// 거래 가능 여부
    pub can_trade: bool,
}

impl AccountInfo {
    /// 특정 자산의 잔고 조회.
    pub fn balance(&self, asset: &str) -> Option<&Balance> {
        self.balances
            .iter()
            .find(|b| b.asset.eq_ignore_ascii_case(asset))
    }
}

/// 통합 선물 거래소 인터페이스.
///
/// 심볼 인자는 자유 형식(`BTC`, `BTC/USDT`, `BTC/USDT:USDT`, `BTCUSDT`)이며
/// 구현체가 정규화합니다. 네트워크 작업은 `CallOptions`로 호출별 재시도
/// 횟수를 바꿀 수 있습니다.
#[async_trait]
pub trait FuturesExchange: Send + Sync {
    /// 거래소 이름 반환.
    fn name(&self) -> &str;

    /// 거래소 연결 여부 확인.
    async fn is_connected(&self) -> bool;

    /// 거래소에 연결 (첫 시계 동기화 포함).
    async fn connect(&self) -> ExchangeResult<()>;

    // === 시장 데이터 ===

    /// 현재 시세 조회.
    async fn get_ticker(&self, symbol: &str, options: CallOptions) -> ExchangeResult<TickerSnapshot>;

    /// 캔들스틱 조회.
    async fn get_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: Option<u32>,
        options: CallOptions,
    ) -> ExchangeResult<Vec<Kline>>;

    /// 호가창 조회.
    async fn get_order_book(
        &self,
        symbol: &str,
        limit: Option<u32>,
        options: CallOptions,
    ) -> ExchangeResult<OrderBook>;

    /// 펀딩비 조회.
    async fn get_funding_rate(&self, symbol: &str, options: CallOptions) -> ExchangeResult<FundingRate>;

    /// 마크 가격 조회.
    async fn get_mark_price(&self, symbol: &str, options: CallOptions) -> ExchangeResult<Price> {
        Ok(self.get_funding_rate(symbol, options).await?.mark_price)
    }

    /// 계약 메타데이터 조회 (캐싱하지 않음).
    async fn get_contract_info(&self, symbol: &str, options: CallOptions) -> ExchangeResult<ContractMeta>;

    /// 전체 계약 메타데이터 조회.
    async fn get_all_contracts(&self, options: CallOptions) -> ExchangeResult<Vec<ContractMeta>>;

    // === 계좌 작업 ===

    /// 계좌 정보 조회.
    async fn get_account(&self, options: CallOptions) -> ExchangeResult<AccountInfo>;

    /// 열린 포지션 조회 (크기가 0인 포지션 제외).
    async fn get_positions(&self, options: CallOptions) -> ExchangeResult<Vec<PositionSnapshot>>;

    /// 레버리지 설정. 거래소가 적용한 레버리지를 반환합니다.
    async fn set_leverage(&self, symbol: &str, leverage: u32, options: CallOptions) -> ExchangeResult<u32>;

    /// 계정 체결 기록 조회.
    async fn get_trades(
        &self,
        symbol: &str,
        limit: Option<u32>,
        options: CallOptions,
    ) -> ExchangeResult<Vec<TradeRecord>>;

    // === 주문 작업 ===

    /// 새 주문 제출.
    ///
    /// 실패는 절대 숨기지 않습니다. 타임아웃은 "결과 알 수 없음"으로 다뤄야 합니다.
    async fn place_order(&self, request: &OrderRequest, options: CallOptions) -> ExchangeResult<OrderResult>;

    /// 주문 상태 조회.
    ///
    /// 심볼을 모르면 `None`을 넘길 수 있습니다. 조회 실패는 저하 모드로
    /// 처리될 수 있으며 `OrderResult::source`로 구분됩니다.
    async fn get_order(
        &self,
        order_id: &str,
        symbol: Option<&str>,
        options: CallOptions,
    ) -> ExchangeResult<OrderResult>;

    /// 주문 취소.
    async fn cancel_order(
        &self,
        order_id: &str,
        symbol: Option<&str>,
        options: CallOptions,
    ) -> ExchangeResult<OrderResult>;

    /// 심볼의 모든 미체결 주문 취소.
    async fn cancel_all_orders(&self, symbol: &str, options: CallOptions) -> ExchangeResult<()>;

    /// 미체결 주문 조회.
    async fn get_open_orders(
        &self,
        symbol: Option<&str>,
        options: CallOptions,
    ) -> ExchangeResult<Vec<OrderResult>>;

    // === 로컬 계산 ===

    /// 증거금 예산으로 주문 수량을 계산합니다.
    ///
    /// 계약 메타데이터 조회만 네트워크를 사용하며 계산은 로컬에서 수행됩니다.
    async fn calculate_quantity(
        &self,
        symbol: &str,
        margin: Decimal,
        leverage: u32,
        price: Price,
        options: CallOptions,
    ) -> ExchangeResult<Quantity> {
        let contract = self.get_contract_info(symbol, options).await?;
        Ok(calculate_quantity(margin, leverage, price, &contract)?)
    }

    /// 실현 손익 계산 (로컬, 수수료 제외).
    fn calculate_pnl(&self, entry_price: Price, exit_price: Price, quantity: Quantity, side: Side) -> Decimal {
        calculate_pnl(entry_price, exit_price, quantity, side)
    }
}
