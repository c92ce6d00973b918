//! Binance USDⓈ-M 선물 커넥터.
//!
//! REST API 구현. 메인넷과 테스트넷 모두 지원.
//! 시계 동기화, 서명, 재시도는 공용 계층(`ClockSync`, `HmacSha256Signer`,
//! `RestTransport`)에 위임하고, 이 모듈은 요청 구성과 응답 정규화만 담당합니다.

use crate::cache::{OrderCache, OrderCacheConfig};
use crate::clock::{ClockConfig, ClockSync, ServerTimeSource};
use crate::error::ExchangeError;
use crate::retry::{CallOptions, RetryConfig};
use crate::signer::{HmacSha256Signer, RequestSigner};
use crate::traits::{AccountInfo, Balance, ExchangeResult, FuturesExchange};
use crate::transport::RestTransport;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use perp_core::{
    exchange_span, mask_key, AdapterConfig, ContractMeta, FundingRate, Kline, OrderBook,
    OrderBookLevel, OrderRequest, OrderResult, OrderSource, OrderState, OrderType,
    PositionSnapshot, Side, SymbolNormalizer, TickerSnapshot, Timeframe, TradeRecord,
};
use reqwest::Client;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

/// API 키 헤더.
pub const API_KEY_HEADER: &str = "X-MBX-APIKEY";

const MAINNET_REST_URL: &str = "https://fapi.binance.com";
const TESTNET_REST_URL: &str = "https://testnet.binancefuture.com";

/// 중복된 클라이언트 주문 ID
const DUPLICATE_CLIENT_ID_CODE: i32 = -4116;

// ============================================================================
// 설정
// ============================================================================

/// Binance 선물 클라이언트 설정.
///
/// # 보안
/// - `Debug` 구현은 민감 정보(`api_key`, `api_secret`)를 마스킹합니다.
#[derive(Clone)]
pub struct BinanceFuturesConfig {
    /// API 키
    pub api_key: String,
    /// API 시크릿
    pub api_secret: SecretString,
    /// 테스트넷 사용
    pub testnet: bool,
    /// REST 기본 URL 오버라이드
    pub rest_base_url: Option<String>,
    /// 수신 윈도우 (밀리초)
    pub recv_window_ms: u64,
    /// HTTP 연결 타임아웃 (초)
    pub connect_timeout_secs: u64,
    /// 재시도 설정
    pub retry: RetryConfig,
    /// 시계 동기화 설정
    pub clock: ClockConfig,
    /// 주문 캐시 설정
    pub cache: OrderCacheConfig,
}

impl fmt::Debug for BinanceFuturesConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinanceFuturesConfig")
            .field("api_key", &mask_key(&self.api_key))
            .field("api_secret", &"***REDACTED***")
            .field("testnet", &self.testnet)
            .field("rest_base_url", &self.rest_base_url_str())
            .field("recv_window_ms", &self.recv_window_ms)
            .field("retry", &self.retry)
            .field("clock", &self.clock)
            .field("cache", &self.cache)
            .finish()
    }
}

impl Default for BinanceFuturesConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_secret: SecretString::from(String::new()),
            testnet: false,
            rest_base_url: None,
            recv_window_ms: 5_000,
            connect_timeout_secs: 10,
            retry: RetryConfig::default(),
            clock: ClockConfig::default(),
            cache: OrderCacheConfig::default(),
        }
    }
}

impl BinanceFuturesConfig {
    /// 새 설정 생성.
    pub fn new(api_key: String, api_secret: String) -> Self {
        Self {
            api_key,
            api_secret: SecretString::from(api_secret),
            ..Default::default()
        }
    }

    /// 자격증명 없는 설정 (공개 엔드포인트 전용).
    pub fn public() -> Self {
        Self::default()
    }

    /// 테스트넷 사용.
    pub fn with_testnet(mut self, testnet: bool) -> Self {
        self.testnet = testnet;
        self
    }

    /// REST 기본 URL 오버라이드.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.rest_base_url = Some(url.into());
        self
    }

    /// 재시도 설정.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// 환경 변수에서 생성.
    pub fn from_env() -> Option<Self> {
        let testnet = std::env::var("BINANCE_TESTNET")
            .map(|v| v.to_lowercase() == "true")
            .unwrap_or(false);

        let (api_key, api_secret) = if testnet {
            (
                std::env::var("BINANCE_TESTNET_API_KEY").ok()?,
                std::env::var("BINANCE_TESTNET_API_SECRET").ok()?,
            )
        } else {
            (
                std::env::var("BINANCE_API_KEY").ok()?,
                std::env::var("BINANCE_API_SECRET").ok()?,
            )
        };

        Some(Self::new(api_key, api_secret).with_testnet(testnet))
    }

    /// 어댑터 설정에서 생성.
    pub fn from_adapter_config(config: &AdapterConfig) -> Self {
        let exchange = &config.exchange;
        Self {
            api_key: exchange.api_key.clone(),
            api_secret: exchange.api_secret.clone(),
            testnet: exchange.testnet,
            rest_base_url: exchange.rest_base_url.clone(),
            recv_window_ms: exchange.recv_window_ms,
            connect_timeout_secs: exchange.connect_timeout_secs,
            retry: RetryConfig::from(&config.retry),
            clock: ClockConfig::from(&config.clock),
            cache: OrderCacheConfig::from(&config.cache),
        }
    }

    /// 자격증명이 설정되어 있는지 확인.
    pub fn has_credentials(&self) -> bool {
        !self.api_key.is_empty() && !self.api_secret.expose_secret().is_empty()
    }

    /// REST API 기본 URL 반환.
    pub fn rest_base_url_str(&self) -> &str {
        match &self.rest_base_url {
            Some(url) => url.as_str(),
            None if self.testnet => TESTNET_REST_URL,
            None => MAINNET_REST_URL,
        }
    }
}

// ============================================================================
// API 응답 타입
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceServerTime {
    server_time: i64,
}

#[derive(Debug, Deserialize)]
struct BinanceError {
    code: i32,
    msg: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceTicker24h {
    price_change_percent: String,
    last_price: String,
    high_price: String,
    low_price: String,
    volume: String,
    close_time: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceBookTicker {
    bid_price: String,
    ask_price: String,
}

#[derive(Debug, Deserialize)]
struct BinanceKline(
    i64,    // 0: Open time
    String, // 1: Open
    String, // 2: High
    String, // 3: Low
    String, // 4: Close
    String, // 5: Volume
    i64,    // 6: Close time
    String, // 7: Quote asset volume
    u64,    // 8: Number of trades
    String, // 9: Taker buy base asset volume
    String, // 10: Taker buy quote asset volume
    String, // 11: Ignore
);

#[derive(Debug, Deserialize)]
struct BinanceDepth {
    bids: Vec<[String; 2]>,
    asks: Vec<[String; 2]>,
    #[serde(rename = "E", default)]
    event_time: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct BinanceExchangeInfo {
    symbols: Vec<BinanceSymbolInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceSymbolInfo {
    symbol: String,
    base_asset: String,
    quote_asset: String,
    status: String,
    #[serde(default)]
    filters: Vec<BinanceFilter>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "filterType")]
enum BinanceFilter {
    #[serde(rename = "LOT_SIZE", rename_all = "camelCase")]
    LotSize {
        min_qty: String,
        max_qty: String,
        step_size: String,
    },
    #[serde(rename = "PRICE_FILTER", rename_all = "camelCase")]
    PriceFilter { tick_size: String },
    #[serde(rename = "MIN_NOTIONAL")]
    MinNotional { notional: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinancePremiumIndex {
    symbol: String,
    mark_price: String,
    index_price: String,
    last_funding_rate: String,
    next_funding_time: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceAccountAsset {
    asset: String,
    wallet_balance: String,
    unrealized_profit: String,
    available_balance: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceAccount {
    total_wallet_balance: String,
    total_unrealized_profit: String,
    available_balance: String,
    #[serde(default)]
    can_trade: bool,
    #[serde(default)]
    assets: Vec<BinanceAccountAsset>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinancePositionRisk {
    symbol: String,
    position_amt: String,
    entry_price: String,
    mark_price: String,
    un_realized_profit: String,
    liquidation_price: String,
    leverage: String,
    #[serde(default)]
    isolated_margin: Option<String>,
    #[serde(default)]
    update_time: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceOrder {
    symbol: String,
    order_id: i64,
    client_order_id: String,
    price: String,
    orig_qty: String,
    executed_qty: String,
    #[serde(default)]
    avg_price: Option<String>,
    status: String,
    #[serde(rename = "type")]
    order_type: String,
    side: String,
    #[serde(default)]
    reduce_only: bool,
    #[serde(default)]
    update_time: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct BinanceLeverage {
    leverage: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceBracket {
    initial_leverage: u32,
}

#[derive(Debug, Deserialize)]
struct BinanceLeverageBracket {
    brackets: Vec<BinanceBracket>,
}

/// 심볼을 지정하면 단일 객체, 아니면 배열로 응답하는 엔드포인트용.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    fn into_first(self) -> Option<T> {
        match self {
            OneOrMany::One(item) => Some(item),
            OneOrMany::Many(items) => items.into_iter().next(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceCommissionRate {
    maker_commission_rate: String,
    taker_commission_rate: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceUserTrade {
    id: i64,
    order_id: i64,
    symbol: String,
    side: String,
    price: String,
    qty: String,
    realized_pnl: String,
    commission: String,
    commission_asset: String,
    time: i64,
    #[serde(default)]
    maker: bool,
}

#[derive(Debug, Deserialize)]
struct BinanceCodeResponse {
    code: i32,
    msg: String,
}

// ============================================================================
// 응답 변환
// ============================================================================

/// Binance HTTP 실패 응답을 ExchangeError로 변환.
pub fn decode_binance_error(status: u16, body: &str) -> ExchangeError {
    if status == 429 || status == 418 {
        return ExchangeError::RateLimited;
    }
    match serde_json::from_str::<BinanceError>(body) {
        Ok(error) => ExchangeError::from_binance_code(error.code, &error.msg),
        Err(_) => ExchangeError::from_http_status(status, body.to_string()),
    }
}

/// 문자열에서 Decimal 파싱.
fn parse_decimal(s: &str) -> Decimal {
    s.parse().unwrap_or(Decimal::ZERO)
}

/// 0이면 None.
fn non_zero(value: Decimal) -> Option<Decimal> {
    (!value.is_zero()).then_some(value)
}

fn timestamp(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_else(Utc::now)
}

fn parse_levels(levels: Vec<[String; 2]>) -> Vec<OrderBookLevel> {
    levels
        .into_iter()
        .map(|[price, qty]| OrderBookLevel {
            price: parse_decimal(&price),
            quantity: parse_decimal(&qty),
        })
        .collect()
}

/// Binance 주문 상태를 공통 상태 어휘로 변환.
fn parse_order_state(status: &str) -> OrderState {
    match status {
        "NEW" | "PARTIALLY_FILLED" => OrderState::Open,
        "FILLED" => OrderState::Finished,
        "CANCELED" | "EXPIRED" | "EXPIRED_IN_MATCH" => OrderState::Cancelled,
        other => OrderState::Other(other.to_string()),
    }
}

fn parse_order(resp: BinanceOrder) -> OrderResult {
    let order_type = match resp.order_type.as_str() {
        "MARKET" => Some(OrderType::Market),
        "LIMIT" => Some(OrderType::Limit),
        _ => None,
    };

    OrderResult {
        order_id: resp.order_id.to_string(),
        client_order_id: Some(resp.client_order_id).filter(|id| !id.is_empty()),
        symbol: resp.symbol,
        side: Side::from_exchange(&resp.side),
        order_type,
        quantity: parse_decimal(&resp.orig_qty),
        price: non_zero(parse_decimal(&resp.price)),
        filled_quantity: parse_decimal(&resp.executed_qty),
        average_price: resp
            .avg_price
            .as_deref()
            .map(parse_decimal)
            .and_then(non_zero),
        state: parse_order_state(&resp.status),
        reduce_only: resp.reduce_only,
        updated_at: resp.update_time.map(timestamp).unwrap_or_else(Utc::now),
        source: OrderSource::Live,
    }
}

fn parse_contract(info: BinanceSymbolInfo) -> ContractMeta {
    let mut meta = ContractMeta::new(info.symbol, info.base_asset, info.quote_asset);

    for filter in info.filters {
        match filter {
            BinanceFilter::LotSize {
                min_qty,
                max_qty,
                step_size,
            } => {
                meta.min_qty = parse_decimal(&min_qty);
                meta.max_qty = non_zero(parse_decimal(&max_qty));
                meta.step_size = parse_decimal(&step_size);
            }
            BinanceFilter::PriceFilter { tick_size } => {
                meta.tick_size = parse_decimal(&tick_size);
            }
            BinanceFilter::MinNotional { notional } => {
                meta.min_notional = non_zero(parse_decimal(&notional));
            }
            BinanceFilter::Other => {}
        }
    }

    meta
}

fn parse_position(resp: BinancePositionRisk) -> PositionSnapshot {
    let size = parse_decimal(&resp.position_amt);
    let entry_price = parse_decimal(&resp.entry_price);
    let leverage = resp.leverage.parse().unwrap_or(1);
    let reported_margin = resp.isolated_margin.as_deref().map(parse_decimal);

    let mut position = PositionSnapshot::new(resp.symbol, size, entry_price, leverage, reported_margin);
    position.mark_price = parse_decimal(&resp.mark_price);
    position.unrealized_pnl = parse_decimal(&resp.un_realized_profit);
    position.liquidation_price = non_zero(parse_decimal(&resp.liquidation_price));
    if let Some(ms) = resp.update_time.filter(|ms| *ms > 0) {
        position.updated_at = timestamp(ms);
    }
    position
}

// ============================================================================
// 서버 시각
// ============================================================================

/// `/fapi/v1/time` 서버 시각 소스.
pub struct BinanceTimeSource {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl BinanceTimeSource {
    /// 새 시각 소스 생성.
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(5),
        }
    }
}

#[async_trait]
impl ServerTimeSource for BinanceTimeSource {
    async fn server_time_ms(&self) -> ExchangeResult<i64> {
        let response = self
            .client
            .get(format!("{}/fapi/v1/time", self.base_url))
            .timeout(self.timeout)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(decode_binance_error(status.as_u16(), &body));
        }
        let time: BinanceServerTime = serde_json::from_str(&body)?;
        Ok(time.server_time)
    }
}

// ============================================================================
// Binance 선물 클라이언트
// ============================================================================

/// Binance USDⓈ-M 선물 클라이언트.
pub struct BinanceFuturesClient {
    config: BinanceFuturesConfig,
    transport: RestTransport,
    normalizer: SymbolNormalizer,
    cache: OrderCache,
    connected: AtomicBool,
}

impl fmt::Debug for BinanceFuturesClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinanceFuturesClient")
            .field("config", &self.config)
            .field("transport", &self.transport)
            .field("cache", &self.cache)
            .finish()
    }
}

impl BinanceFuturesClient {
    /// 새 Binance 선물 클라이언트 생성.
    ///
    /// # Errors
    /// HTTP 클라이언트 생성에 실패하면 `ExchangeError::NetworkError`를 반환합니다.
    pub fn new(config: BinanceFuturesConfig) -> ExchangeResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| ExchangeError::NetworkError(format!("HTTP 클라이언트 생성 실패: {}", e)))?;

        let base_url = config.rest_base_url_str().to_string();
        let time_source = Arc::new(BinanceTimeSource::new(client.clone(), base_url.clone()));
        let clock = ClockSync::new(time_source, config.clock.clone());

        let mut transport = RestTransport::new(
            client,
            base_url,
            clock,
            config.retry.clone(),
            decode_binance_error,
        );
        if config.has_credentials() {
            let signer = Arc::new(HmacSha256Signer::new(
                config.api_secret.clone(),
                config.recv_window_ms,
            ));
            transport = transport.with_credentials(API_KEY_HEADER, config.api_key.clone(), signer);
        }

        Ok(Self {
            cache: OrderCache::new(config.cache.clone()),
            config,
            transport,
            normalizer: SymbolNormalizer::binance_futures(),
            connected: AtomicBool::new(false),
        })
    }

    /// 환경 변수에서 생성.
    ///
    /// 환경 변수가 설정되지 않았거나 클라이언트 생성에 실패하면 `None`을 반환합니다.
    pub fn from_env() -> Option<Self> {
        BinanceFuturesConfig::from_env().and_then(|config| Self::new(config).ok())
    }

    /// 요청 서명기를 교체합니다 (API 키는 설정값 사용).
    pub fn with_signer(mut self, signer: Arc<dyn RequestSigner>) -> Self {
        self.transport = self
            .transport
            .with_credentials(API_KEY_HEADER, self.config.api_key.clone(), signer);
        self
    }

    /// 주문 캐시를 교체합니다.
    pub fn with_order_cache(mut self, cache: OrderCache) -> Self {
        self.cache = cache;
        self
    }

    /// 시계 동기화기.
    pub fn clock(&self) -> &ClockSync {
        self.transport.clock()
    }

    /// 주문 상태 캐시.
    pub fn order_cache(&self) -> &OrderCache {
        &self.cache
    }

    /// 심볼 정규화기.
    pub fn normalizer(&self) -> &SymbolNormalizer {
        &self.normalizer
    }

    /// 주기적 시계 재동기화를 시작합니다.
    pub fn spawn_clock_resync(&self) -> tokio::task::JoinHandle<()> {
        self.transport.clock().spawn_periodic_resync()
    }

    fn contract(&self, symbol: &str) -> ExchangeResult<String> {
        Ok(self.normalizer.normalize(symbol)?.into_string())
    }

    async fn exchange_info(&self, options: CallOptions) -> ExchangeResult<BinanceExchangeInfo> {
        self.transport
            .public_get("/fapi/v1/exchangeInfo", &[], options)
            .await
    }

    /// 거래소 수량/가격 규칙만 조회합니다 (보강 없음).
    async fn contract_rules(&self, contract: &str, options: CallOptions) -> ExchangeResult<ContractMeta> {
        self.exchange_info(options)
            .await?
            .symbols
            .into_iter()
            .find(|s| s.symbol == contract)
            .map(parse_contract)
            .ok_or_else(|| ExchangeError::SymbolNotFound(contract.to_string()))
    }

    /// 수수료율과 레버리지 범위로 메타데이터를 보강합니다. 실패는 경고만 남깁니다.
    async fn enrich_contract(&self, meta: &mut ContractMeta, options: CallOptions) {
        let params = [("symbol", meta.symbol.clone())];

        match self
            .transport
            .signed_get::<BinanceCommissionRate>("/fapi/v1/commissionRate", &params, options)
            .await
        {
            Ok(rate) => {
                meta.maker_fee = Some(parse_decimal(&rate.maker_commission_rate));
                meta.taker_fee = Some(parse_decimal(&rate.taker_commission_rate));
            }
            Err(e) => warn!(symbol = %meta.symbol, error = %e, "Failed to fetch commission rate"),
        }

        match self
            .transport
            .signed_get::<OneOrMany<BinanceLeverageBracket>>(
                "/fapi/v1/leverageBracket",
                &params,
                options,
            )
            .await
        {
            Ok(brackets) => {
                meta.max_leverage = brackets
                    .into_first()
                    .and_then(|b| b.brackets.iter().map(|x| x.initial_leverage).max());
            }
            Err(e) => warn!(symbol = %meta.symbol, error = %e, "Failed to fetch leverage brackets"),
        }
    }

    async fn query_order(
        &self,
        contract: &str,
        order_id: &str,
        options: CallOptions,
    ) -> ExchangeResult<OrderResult> {
        let params = [
            ("symbol", contract.to_string()),
            ("orderId", order_id.to_string()),
        ];
        let resp: BinanceOrder = self
            .transport
            .signed_get("/fapi/v1/order", &params, options)
            .await?;
        Ok(parse_order(resp))
    }

    async fn query_by_client_id(
        &self,
        contract: &str,
        client_order_id: &str,
        options: CallOptions,
    ) -> ExchangeResult<OrderResult> {
        let params = [
            ("symbol", contract.to_string()),
            ("origClientOrderId", client_order_id.to_string()),
        ];
        let resp: BinanceOrder = self
            .transport
            .signed_get("/fapi/v1/order", &params, options)
            .await?;
        Ok(parse_order(resp))
    }

    async fn find_open_order(
        &self,
        order_id: &str,
        contract: Option<&str>,
        options: CallOptions,
    ) -> ExchangeResult<Option<OrderResult>> {
        let open = self.get_open_orders(contract, options).await?;
        Ok(open.into_iter().find(|o| o.order_id == order_id))
    }

    /// 실시간 조회가 실패했을 때의 저하 모드.
    ///
    /// 캐시 스냅샷 → 미체결 주문 목록 → "체결 완료 가정" 순서로 결과를 만듭니다.
    /// 폴링 루프를 멈추지 않기 위해 에러 대신 결과를 반환하며, 마지막 단계는
    /// 실제로는 열려 있는 주문을 완료로 보고할 수 있습니다. 호출자는
    /// `OrderResult::source`로 이 경우를 구분해야 합니다.
    async fn degraded_order(
        &self,
        order_id: &str,
        contract: Option<&str>,
        options: CallOptions,
    ) -> ExchangeResult<OrderResult> {
        if let Some(entry) = self.cache.lookup(order_id) {
            info!(order_id, contract = %entry.contract, "Serving order from cache");
            return Ok(entry.snapshot.with_source(OrderSource::Cache));
        }

        match self.find_open_order(order_id, contract, options).await {
            Ok(Some(order)) => return Ok(order),
            Ok(None) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => warn!(order_id, error = %e, "Open order scan failed"),
        }

        warn!(order_id, "Order not found anywhere, assuming finished");
        Ok(OrderResult::assumed_finished(
            order_id,
            contract.unwrap_or_default(),
        ))
    }

    fn order_params(
        &self,
        contract: &str,
        request: &OrderRequest,
        meta: &ContractMeta,
        client_order_id: &str,
    ) -> ExchangeResult<Vec<(&'static str, String)>> {
        let quantity = meta.floor_quantity(request.quantity);
        if quantity <= Decimal::ZERO || quantity < meta.min_qty {
            return Err(ExchangeError::InvalidQuantity(format!(
                "{} floors to {} (step {}, min {})",
                request.quantity, quantity, meta.step_size, meta.min_qty
            )));
        }
        if let Some(max_qty) = meta.max_qty.filter(|max| quantity > *max) {
            return Err(ExchangeError::InvalidQuantity(format!(
                "{} exceeds max {}",
                quantity, max_qty
            )));
        }
        if quantity != request.quantity {
            debug!(requested = %request.quantity, adjusted = %quantity, "Quantity floored to step size");
        }

        let mut params = vec![
            ("symbol", contract.to_string()),
            ("side", request.side.to_string()),
            ("type", request.order_type.to_string()),
            ("quantity", quantity.to_string()),
        ];

        if request.order_type == OrderType::Limit {
            let price = request.price.ok_or_else(|| {
                ExchangeError::InvalidInput("limit order requires a price".to_string())
            })?;
            let floored = meta.floor_price(price);
            if floored <= Decimal::ZERO {
                return Err(ExchangeError::InvalidInput(format!(
                    "price {} floors to {} (tick {})",
                    price, floored, meta.tick_size
                )));
            }
            if floored != price {
                debug!(requested = %price, adjusted = %floored, "Price floored to tick size");
            }
            params.push(("price", floored.to_string()));
            params.push(("timeInForce", request.time_in_force.to_string()));
        }

        if request.reduce_only {
            params.push(("reduceOnly", "true".to_string()));
        }
        params.push(("newClientOrderId", client_order_id.to_string()));
        params.push(("newOrderRespType", "RESULT".to_string()));

        Ok(params)
    }
}

#[async_trait]
impl FuturesExchange for BinanceFuturesClient {
    fn name(&self) -> &str {
        if self.config.testnet {
            "binance-futures-testnet"
        } else {
            "binance-futures"
        }
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn connect(&self) -> ExchangeResult<()> {
        info!(
            "Connecting to Binance Futures {}...",
            if self.config.testnet { "testnet" } else { "mainnet" }
        );

        let offset_ms = self.transport.clock().sync().await?;

        self.connected.store(true, Ordering::SeqCst);
        info!(offset_ms, "Connected to Binance Futures successfully");
        Ok(())
    }

    async fn get_ticker(&self, symbol: &str, options: CallOptions) -> ExchangeResult<TickerSnapshot> {
        let contract = self.contract(symbol)?;
        let params = [("symbol", contract.clone())];

        let (stats, book) = futures::try_join!(
            self.transport
                .public_get::<BinanceTicker24h>("/fapi/v1/ticker/24hr", &params, options),
            self.transport
                .public_get::<BinanceBookTicker>("/fapi/v1/ticker/bookTicker", &params, options),
        )?;

        Ok(TickerSnapshot {
            symbol: contract,
            last: parse_decimal(&stats.last_price),
            bid: non_zero(parse_decimal(&book.bid_price)),
            ask: non_zero(parse_decimal(&book.ask_price)),
            high_24h: parse_decimal(&stats.high_price),
            low_24h: parse_decimal(&stats.low_price),
            volume_24h: parse_decimal(&stats.volume),
            change_24h_percent: parse_decimal(&stats.price_change_percent),
            timestamp: timestamp(stats.close_time),
        })
    }

    async fn get_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: Option<u32>,
        options: CallOptions,
    ) -> ExchangeResult<Vec<Kline>> {
        let contract = self.contract(symbol)?;
        let params = [
            ("symbol", contract.clone()),
            ("interval", timeframe.as_interval().to_string()),
            ("limit", limit.unwrap_or(500).min(1500).to_string()),
        ];

        let resp: Vec<BinanceKline> = self
            .transport
            .public_get("/fapi/v1/klines", &params, options)
            .await?;

        Ok(resp
            .into_iter()
            .map(|k| Kline {
                symbol: contract.clone(),
                timeframe,
                open_time: timestamp(k.0),
                open: parse_decimal(&k.1),
                high: parse_decimal(&k.2),
                low: parse_decimal(&k.3),
                close: parse_decimal(&k.4),
                volume: parse_decimal(&k.5),
                close_time: timestamp(k.6),
                quote_volume: Some(parse_decimal(&k.7)),
                num_trades: Some(k.8),
            })
            .collect())
    }

    async fn get_order_book(
        &self,
        symbol: &str,
        limit: Option<u32>,
        options: CallOptions,
    ) -> ExchangeResult<OrderBook> {
        let contract = self.contract(symbol)?;
        let params = [
            ("symbol", contract.clone()),
            ("limit", limit.unwrap_or(100).to_string()),
        ];

        let resp: BinanceDepth = self
            .transport
            .public_get("/fapi/v1/depth", &params, options)
            .await?;

        Ok(OrderBook {
            symbol: contract,
            bids: parse_levels(resp.bids),
            asks: parse_levels(resp.asks),
            timestamp: resp.event_time.map(timestamp).unwrap_or_else(Utc::now),
        })
    }

    async fn get_funding_rate(&self, symbol: &str, options: CallOptions) -> ExchangeResult<FundingRate> {
        let contract = self.contract(symbol)?;
        let resp: BinancePremiumIndex = self
            .transport
            .public_get("/fapi/v1/premiumIndex", &[("symbol", contract)], options)
            .await?;

        Ok(FundingRate {
            symbol: resp.symbol,
            rate: parse_decimal(&resp.last_funding_rate),
            mark_price: parse_decimal(&resp.mark_price),
            index_price: parse_decimal(&resp.index_price),
            next_funding_time: timestamp(resp.next_funding_time),
        })
    }

    async fn get_contract_info(&self, symbol: &str, options: CallOptions) -> ExchangeResult<ContractMeta> {
        let contract = self.contract(symbol)?;
        let mut meta = self.contract_rules(&contract, options).await?;

        if self.transport.has_credentials() {
            self.enrich_contract(&mut meta, options).await;
        }

        Ok(meta)
    }

    async fn get_all_contracts(&self, options: CallOptions) -> ExchangeResult<Vec<ContractMeta>> {
        let info = self.exchange_info(options).await?;

        Ok(info
            .symbols
            .into_iter()
            .filter(|s| s.status == "TRADING")
            .map(parse_contract)
            .collect())
    }

    async fn get_account(&self, options: CallOptions) -> ExchangeResult<AccountInfo> {
        let resp: BinanceAccount = self
            .transport
            .signed_get("/fapi/v2/account", &[], options)
            .await?;

        let balances = resp
            .assets
            .into_iter()
            .map(|a| {
                let wallet = parse_decimal(&a.wallet_balance);
                let free = parse_decimal(&a.available_balance);
                Balance {
                    asset: a.asset,
                    free,
                    locked: (wallet - free).max(Decimal::ZERO),
                    unrealized_pnl: parse_decimal(&a.unrealized_profit),
                }
            })
            .filter(|b| !b.total().is_zero() || !b.unrealized_pnl.is_zero())
            .collect();

        Ok(AccountInfo {
            balances,
            total_wallet_balance: parse_decimal(&resp.total_wallet_balance),
            total_unrealized_pnl: parse_decimal(&resp.total_unrealized_profit),
            available_balance: parse_decimal(&resp.available_balance),
            can_trade: resp.can_trade,
        })
    }

    async fn get_positions(&self, options: CallOptions) -> ExchangeResult<Vec<PositionSnapshot>> {
        let resp: Vec<BinancePositionRisk> = self
            .transport
            .signed_get("/fapi/v2/positionRisk", &[], options)
            .await?;

        Ok(resp
            .into_iter()
            .map(parse_position)
            .filter(|p| !p.is_flat())
            .collect())
    }

    async fn set_leverage(&self, symbol: &str, leverage: u32, options: CallOptions) -> ExchangeResult<u32> {
        if leverage == 0 {
            return Err(ExchangeError::InvalidInput(
                "leverage must be at least 1".to_string(),
            ));
        }
        let contract = self.contract(symbol)?;
        let params = [("symbol", contract.clone()), ("leverage", leverage.to_string())];

        let resp: BinanceLeverage = self
            .transport
            .signed_post("/fapi/v1/leverage", &params, options)
            .await?;

        info!(symbol = %contract, leverage = resp.leverage, "Leverage set");
        Ok(resp.leverage)
    }

    async fn get_trades(
        &self,
        symbol: &str,
        limit: Option<u32>,
        options: CallOptions,
    ) -> ExchangeResult<Vec<TradeRecord>> {
        let contract = self.contract(symbol)?;
        let params = [
            ("symbol", contract),
            ("limit", limit.unwrap_or(500).min(1000).to_string()),
        ];

        let resp: Vec<BinanceUserTrade> = self
            .transport
            .signed_get("/fapi/v1/userTrades", &params, options)
            .await?;

        Ok(resp
            .into_iter()
            .filter_map(|t| {
                let side = Side::from_exchange(&t.side)?;
                Some(TradeRecord {
                    id: t.id.to_string(),
                    order_id: t.order_id.to_string(),
                    symbol: t.symbol,
                    side,
                    price: parse_decimal(&t.price),
                    quantity: parse_decimal(&t.qty),
                    fee: parse_decimal(&t.commission),
                    fee_asset: t.commission_asset,
                    realized_pnl: parse_decimal(&t.realized_pnl),
                    is_maker: t.maker,
                    timestamp: timestamp(t.time),
                })
            })
            .collect())
    }

    async fn place_order(&self, request: &OrderRequest, options: CallOptions) -> ExchangeResult<OrderResult> {
        let contract = self.contract(&request.symbol)?;
        let span = exchange_span!("place_order", self.name(), contract);

        async {
            let meta = self.contract_rules(&contract, options).await?;

            // 재시도된 요청이 중복 주문이 되지 않도록 항상 클라이언트 ID를 보냄
            let generated_id = request.client_order_id.is_none();
            let client_order_id = request
                .client_order_id
                .clone()
                .unwrap_or_else(|| format!("pa{}", Uuid::new_v4().simple()));

            let params = self.order_params(&contract, request, &meta, &client_order_id)?;

            info!(
                side = %request.side,
                order_type = %request.order_type,
                quantity = %request.quantity,
                price = ?request.price,
                client_order_id = %client_order_id,
                "Placing order"
            );

            let result = match self
                .transport
                .signed_post::<BinanceOrder>("/fapi/v1/order", &params, options)
                .await
            {
                Ok(resp) => parse_order(resp),
                // 타임아웃된 이전 시도가 실제로 접수된 경우
                Err(e)
                    if generated_id
                        && e.upstream().map(|(code, _)| code) == Some(DUPLICATE_CLIENT_ID_CODE) =>
                {
                    warn!(client_order_id = %client_order_id, "Order already accepted by earlier attempt");
                    self.query_by_client_id(&contract, &client_order_id, options)
                        .await?
                }
                Err(e) => return Err(e),
            };

            self.cache.remember(&result.order_id, &contract, result.clone());
            info!(order_id = %result.order_id, state = %result.state, "Order placed successfully");
            Ok::<_, ExchangeError>(result)
        }
        .instrument(span)
        .await
    }

    async fn get_order(
        &self,
        order_id: &str,
        symbol: Option<&str>,
        options: CallOptions,
    ) -> ExchangeResult<OrderResult> {
        let contract = match symbol {
            Some(s) => Some(self.contract(s)?),
            None => self.cache.contract_of(order_id),
        };
        let span = exchange_span!(
            "get_order",
            self.name(),
            contract.as_deref().unwrap_or("?"),
            order_id
        );

        async move {
            let Some(contract) = contract else {
                debug!("Contract unknown, scanning open orders");
                return self.degraded_order(order_id, None, options).await;
            };

            match self.query_order(&contract, order_id, options).await {
                Ok(result) => {
                    self.cache.remember(order_id, &contract, result.clone());
                    Ok(result)
                }
                Err(e) if e.is_fatal() => Err(e),
                Err(e) => {
                    warn!(error = %e, "Live order query failed, falling back");
                    self.degraded_order(order_id, Some(&contract), options).await
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn cancel_order(
        &self,
        order_id: &str,
        symbol: Option<&str>,
        options: CallOptions,
    ) -> ExchangeResult<OrderResult> {
        let contract = match symbol {
            Some(s) => self.contract(s)?,
            None => match self.cache.contract_of(order_id) {
                Some(contract) => contract,
                None => self
                    .find_open_order(order_id, None, options)
                    .await?
                    .map(|o| o.symbol)
                    .ok_or_else(|| {
                        ExchangeError::OrderNotFound(format!(
                            "{} (contract unknown, pass the symbol)",
                            order_id
                        ))
                    })?,
            },
        };
        let span = exchange_span!("cancel_order", self.name(), contract, order_id);

        async {
            let params = [
                ("symbol", contract.clone()),
                ("orderId", order_id.to_string()),
            ];
            let resp: BinanceOrder = self
                .transport
                .signed_delete("/fapi/v1/order", &params, options)
                .await?;

            let result = parse_order(resp);
            self.cache.remember(order_id, &contract, result.clone());
            info!(state = %result.state, "Order cancelled");
            Ok::<_, ExchangeError>(result)
        }
        .instrument(span)
        .await
    }

    async fn cancel_all_orders(&self, symbol: &str, options: CallOptions) -> ExchangeResult<()> {
        let contract = self.contract(symbol)?;
        let span = exchange_span!("cancel_all_orders", self.name(), contract);

        async {
            let resp: BinanceCodeResponse = self
                .transport
                .signed_delete("/fapi/v1/allOpenOrders", &[("symbol", contract.clone())], options)
                .await?;

            if resp.code != 200 {
                return Err(ExchangeError::from_binance_code(resp.code, &resp.msg));
            }

            info!("All open orders cancelled");
            Ok(())
        }
        .instrument(span)
        .await
    }

    async fn get_open_orders(
        &self,
        symbol: Option<&str>,
        options: CallOptions,
    ) -> ExchangeResult<Vec<OrderResult>> {
        let params = match symbol {
            Some(s) => vec![("symbol", self.contract(s)?)],
            None => vec![],
        };

        let resp: Vec<BinanceOrder> = self
            .transport
            .signed_get("/fapi/v1/openOrders", &params, options)
            .await?;

        let orders: Vec<OrderResult> = resp.into_iter().map(parse_order).collect();
        for order in &orders {
            self.cache.remember(&order.order_id, &order.symbol, order.clone());
        }
        Ok(orders)
    }
}
