//! BinanceFuturesClient 통합 테스트.
//!
//! mockito 서버를 거래소 대신 세워 FuturesExchange trait의 public API만 테스트합니다:
//! - 시계 오차 거부 후 재동기화/재서명
//! - 주문 정밀도 보정과 최소 수량 거부
//! - 주문 조회 저하 모드 (캐시 → 미체결 목록 → 체결 가정)
//! - 심볼 없는 주문 취소
//! - 포지션/시세 정규화

use chrono::Utc;
use mockito::{Matcher, Mock, Server, ServerGuard};
use perp_core::{OrderRequest, OrderResult, OrderSource, OrderState, Side, Timeframe};
use perp_exchange::{
    BinanceFuturesClient, BinanceFuturesConfig, CallOptions, ExchangeError, FuturesExchange,
    HmacSha256Signer, RequestSigner, RetryConfig, SignedRequest,
};
use rust_decimal_macros::dec;
use secrecy::SecretString;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const API_KEY: &str = "test-api-key-0123456789";
const API_SECRET: &str = "test-api-secret-0123456789";

// ============================================================================
// 테스트 헬퍼 함수
// ============================================================================

/// 서명에 사용된 타임스탬프를 기록하는 서명기.
struct RecordingSigner {
    inner: HmacSha256Signer,
    timestamps: Mutex<Vec<i64>>,
}

impl RecordingSigner {
    fn new() -> Self {
        Self {
            inner: HmacSha256Signer::new(SecretString::from(API_SECRET.to_string()), 5_000),
            timestamps: Mutex::new(Vec::new()),
        }
    }

    fn timestamps(&self) -> Vec<i64> {
        self.timestamps.lock().unwrap().clone()
    }
}

impl RequestSigner for RecordingSigner {
    fn sign(
        &self,
        params: &[(&str, String)],
        timestamp_ms: i64,
    ) -> perp_exchange::ExchangeResult<SignedRequest> {
        self.timestamps.lock().unwrap().push(timestamp_ms);
        self.inner.sign(params, timestamp_ms)
    }
}

fn fast_retry() -> RetryConfig {
    RetryConfig::default()
        .with_backoff(Duration::from_millis(1), Duration::from_millis(5))
        .with_timeouts(Duration::from_secs(5), Duration::from_secs(1))
}

fn client(server: &ServerGuard) -> BinanceFuturesClient {
    let config = BinanceFuturesConfig::new(API_KEY.to_string(), API_SECRET.to_string())
        .with_base_url(server.url())
        .with_retry(fast_retry());
    BinanceFuturesClient::new(config).unwrap()
}

async fn mock_time(server: &mut ServerGuard, server_time_ms: i64) -> Mock {
    server
        .mock("GET", "/fapi/v1/time")
        .with_status(200)
        .with_body(format!(r#"{{"serverTime":{}}}"#, server_time_ms))
        .expect(1)
        .create_async()
        .await
}

async fn mock_exchange_info(server: &mut ServerGuard) -> Mock {
    server
        .mock("GET", "/fapi/v1/exchangeInfo")
        .with_status(200)
        .with_body(
            r#"{
                "timezone": "UTC",
                "symbols": [
                    {
                        "symbol": "BTCUSDT",
                        "baseAsset": "BTC",
                        "quoteAsset": "USDT",
                        "status": "TRADING",
                        "filters": [
                            {"filterType": "PRICE_FILTER", "minPrice": "556.80", "maxPrice": "4529764", "tickSize": "0.10"},
                            {"filterType": "LOT_SIZE", "minQty": "0.001", "maxQty": "1000", "stepSize": "0.001"},
                            {"filterType": "MIN_NOTIONAL", "notional": "100"}
                        ]
                    },
                    {
                        "symbol": "OLDUSDT",
                        "baseAsset": "OLD",
                        "quoteAsset": "USDT",
                        "status": "SETTLING",
                        "filters": []
                    }
                ]
            }"#,
        )
        .create_async()
        .await
}

/// 계약 보강용 수수료/레버리지 엔드포인트.
async fn mock_enrichment(server: &mut ServerGuard) -> (Mock, Mock) {
    let commission = server
        .mock("GET", "/fapi/v1/commissionRate")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"symbol":"BTCUSDT","makerCommissionRate":"0.0002","takerCommissionRate":"0.0004"}"#)
        .create_async()
        .await;
    let brackets = server
        .mock("GET", "/fapi/v1/leverageBracket")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(
            r#"[{"symbol":"BTCUSDT","brackets":[
                {"bracket":1,"initialLeverage":125,"notionalCap":50000,"notionalFloor":0,"maintMarginRatio":0.004,"cum":0},
                {"bracket":2,"initialLeverage":100,"notionalCap":250000,"notionalFloor":50000,"maintMarginRatio":0.005,"cum":50}
            ]}]"#,
        )
        .create_async()
        .await;
    (commission, brackets)
}

/// 주문 경로에서는 호출되면 안 되는 보강 엔드포인트.
async fn mock_enrichment_unused(server: &mut ServerGuard) -> (Mock, Mock) {
    let commission = server
        .mock("GET", "/fapi/v1/commissionRate")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;
    let brackets = server
        .mock("GET", "/fapi/v1/leverageBracket")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;
    (commission, brackets)
}

fn order_json(order_id: i64, symbol: &str, status: &str) -> String {
    format!(
        r#"{{
            "symbol": "{symbol}",
            "orderId": {order_id},
            "clientOrderId": "pa-test",
            "price": "50000.3",
            "origQty": "0.015",
            "executedQty": "0",
            "avgPrice": "0.00000",
            "status": "{status}",
            "type": "LIMIT",
            "side": "BUY",
            "reduceOnly": false,
            "timeInForce": "GTC",
            "updateTime": 1700000000000
        }}"#
    )
}

fn cached_snapshot(order_id: &str, symbol: &str) -> OrderResult {
    OrderResult {
        state: OrderState::Open,
        side: Some(Side::Sell),
        quantity: dec!(2),
        ..OrderResult::assumed_finished(order_id, symbol)
    }
}

// ============================================================================
// 시계 동기화
// ============================================================================

#[tokio::test]
async fn test_place_order_resyncs_and_resigns_after_clock_drift() {
    let mut server = Server::new_async().await;
    let now = Utc::now().timestamp_millis();

    // 첫 동기화는 1시간 뒤처진 시각, 재동기화는 정확한 시각
    let first_sync = mock_time(&mut server, now - 3_600_000).await;
    let second_sync = mock_time(&mut server, now).await;
    let _info = mock_exchange_info(&mut server).await;

    let rejected = server
        .mock("POST", "/fapi/v1/order")
        .with_status(400)
        .with_body(r#"{"code":-1021,"msg":"Timestamp for this request is outside of the recvWindow."}"#)
        .expect(1)
        .create_async()
        .await;
    let accepted = server
        .mock("POST", "/fapi/v1/order")
        .with_status(200)
        .with_body(order_json(42, "BTCUSDT", "NEW"))
        .expect(1)
        .create_async()
        .await;

    let signer = Arc::new(RecordingSigner::new());
    let client = client(&server).with_signer(signer.clone());

    let result = client
        .place_order(
            &OrderRequest::limit_buy("BTC/USDT:USDT", dec!(0.015), dec!(50000.3)),
            CallOptions::default(),
        )
        .await
        .unwrap();

    first_sync.assert_async().await;
    second_sync.assert_async().await;
    rejected.assert_async().await;
    accepted.assert_async().await;

    assert_eq!(result.order_id, "42");
    assert_eq!(result.state, OrderState::Open);

    // 마지막 두 서명은 같은 주문의 두 시도이며 새 offset으로 다시 서명됨
    let timestamps = signer.timestamps();
    assert!(timestamps.len() >= 2);
    let retried = timestamps[timestamps.len() - 1];
    let rejected_at = timestamps[timestamps.len() - 2];
    assert!(
        retried - rejected_at > 3_000_000,
        "retry must be signed with the resynced clock: {rejected_at} -> {retried}"
    );
}

#[tokio::test]
async fn test_connect_syncs_clock() {
    let mut server = Server::new_async().await;
    let now = Utc::now().timestamp_millis();
    let time = mock_time(&mut server, now + 2_000).await;

    let client = client(&server);
    assert!(!client.is_connected().await);
    client.connect().await.unwrap();

    time.assert_async().await;
    assert!(client.is_connected().await);
    assert!(!client.clock().is_stale());
    assert!(client.clock().offset_ms() > 0);
}

// ============================================================================
// 주문 제출
// ============================================================================

#[tokio::test]
async fn test_place_order_floors_quantity_and_price() {
    let mut server = Server::new_async().await;
    let _time = mock_time(&mut server, Utc::now().timestamp_millis()).await;
    let _info = mock_exchange_info(&mut server).await;
    let (commission, brackets) = mock_enrichment_unused(&mut server).await;

    let order = server
        .mock("POST", "/fapi/v1/order")
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex("symbol=BTCUSDT".to_string()),
            Matcher::Regex("quantity=0\\.015&".to_string()),
            Matcher::Regex("price=50000\\.3&".to_string()),
            Matcher::Regex("timeInForce=GTC".to_string()),
            Matcher::Regex("newClientOrderId=pa[0-9a-f]{32}".to_string()),
            Matcher::Regex("signature=[0-9a-f]{64}$".to_string()),
        ]))
        .with_status(200)
        .with_body(order_json(7, "BTCUSDT", "NEW"))
        .expect(1)
        .create_async()
        .await;

    let client = client(&server);
    let result = client
        .place_order(
            &OrderRequest::limit_buy("btc", dec!(0.0156), dec!(50000.37)),
            CallOptions::default(),
        )
        .await
        .unwrap();

    order.assert_async().await;
    commission.assert_async().await;
    brackets.assert_async().await;
    assert_eq!(result.quantity, dec!(0.015));
    assert_eq!(result.price, Some(dec!(50000.3)));
    assert_eq!(result.average_price, None);
    assert_eq!(client.order_cache().contract_of("7").as_deref(), Some("BTCUSDT"));
}

#[tokio::test]
async fn test_place_order_rejects_sub_minimum_quantity() {
    let mut server = Server::new_async().await;
    let _time = mock_time(&mut server, Utc::now().timestamp_millis()).await;
    let _info = mock_exchange_info(&mut server).await;
    let order = server
        .mock("POST", "/fapi/v1/order")
        .expect(0)
        .create_async()
        .await;

    let err = client(&server)
        .place_order(
            &OrderRequest::market_buy("BTCUSDT", dec!(0.0009)),
            CallOptions::default(),
        )
        .await
        .unwrap_err();

    order.assert_async().await;
    assert!(matches!(err, ExchangeError::InvalidQuantity(_)), "{err:?}");
}

#[tokio::test]
async fn test_place_order_recovers_order_accepted_by_timed_out_attempt() {
    let mut server = Server::new_async().await;
    let _time = mock_time(&mut server, Utc::now().timestamp_millis()).await;
    let _info = mock_exchange_info(&mut server).await;

    // 첫 시도는 응답을 잃었지만 거래소에는 접수됨
    let lost = server
        .mock("POST", "/fapi/v1/order")
        .with_status(503)
        .with_body("Service Unavailable")
        .expect(1)
        .create_async()
        .await;
    let duplicate = server
        .mock("POST", "/fapi/v1/order")
        .match_body(Matcher::Regex("newClientOrderId=pa[0-9a-f]{32}".to_string()))
        .with_status(400)
        .with_body(r#"{"code":-4116,"msg":"ClientOrderId is duplicated."}"#)
        .expect(1)
        .create_async()
        .await;
    let lookup = server
        .mock("GET", "/fapi/v1/order")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("symbol".to_string(), "BTCUSDT".to_string()),
            Matcher::Regex("origClientOrderId=pa[0-9a-f]{32}".to_string()),
        ]))
        .with_status(200)
        .with_body(order_json(9001, "BTCUSDT", "NEW"))
        .expect(1)
        .create_async()
        .await;

    let client = client(&server);
    let result = client
        .place_order(
            &OrderRequest::limit_buy("BTC", dec!(0.015), dec!(50000.3)),
            CallOptions::default(),
        )
        .await
        .unwrap();

    lost.assert_async().await;
    duplicate.assert_async().await;
    lookup.assert_async().await;
    assert_eq!(result.order_id, "9001");
    assert_eq!(result.state, OrderState::Open);
    assert_eq!(client.order_cache().contract_of("9001").as_deref(), Some("BTCUSDT"));
}

#[tokio::test]
async fn test_duplicate_caller_client_id_is_surfaced() {
    let mut server = Server::new_async().await;
    let _time = mock_time(&mut server, Utc::now().timestamp_millis()).await;
    let _info = mock_exchange_info(&mut server).await;
    let duplicate = server
        .mock("POST", "/fapi/v1/order")
        .match_body(Matcher::Regex("newClientOrderId=my-order-1".to_string()))
        .with_status(400)
        .with_body(r#"{"code":-4116,"msg":"ClientOrderId is duplicated."}"#)
        .expect(1)
        .create_async()
        .await;
    let lookup = server
        .mock("GET", "/fapi/v1/order")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let client = client(&server);
    let err = client
        .place_order(
            &OrderRequest::market_buy("BTC", dec!(0.01)).with_client_id("my-order-1"),
            CallOptions::default(),
        )
        .await
        .unwrap_err();

    duplicate.assert_async().await;
    lookup.assert_async().await;
    assert_eq!(err.upstream().map(|(code, _)| code), Some(-4116));
    assert!(client.order_cache().is_empty());
}

#[tokio::test]
async fn test_insufficient_margin_is_not_retried() {
    let mut server = Server::new_async().await;
    let _time = mock_time(&mut server, Utc::now().timestamp_millis()).await;
    let _info = mock_exchange_info(&mut server).await;
    let order = server
        .mock("POST", "/fapi/v1/order")
        .with_status(400)
        .with_body(r#"{"code":-2019,"msg":"Margin is insufficient."}"#)
        .expect(1)
        .create_async()
        .await;

    let err = client(&server)
        .place_order(
            &OrderRequest::market_sell("BTC", dec!(1)),
            CallOptions::attempts(5),
        )
        .await
        .unwrap_err();

    order.assert_async().await;
    assert!(matches!(err, ExchangeError::InsufficientBalance(_)));
    assert!(err.is_fatal());
}

// ============================================================================
// 주문 조회 저하 모드
// ============================================================================

#[tokio::test]
async fn test_get_order_falls_back_to_cache() {
    let mut server = Server::new_async().await;
    let _time = mock_time(&mut server, Utc::now().timestamp_millis()).await;
    let query = server
        .mock("GET", "/fapi/v1/order")
        .match_query(Matcher::Any)
        .with_status(503)
        .with_body("Service Unavailable")
        .expect(2)
        .create_async()
        .await;

    let client = client(&server);
    client
        .order_cache()
        .remember("777", "ETHUSDT", cached_snapshot("777", "ETHUSDT"));

    // 심볼 없이 조회해도 캐시에서 계약을 찾음
    let result = client
        .get_order("777", None, CallOptions::attempts(2))
        .await
        .unwrap();

    query.assert_async().await;
    assert_eq!(result.source, OrderSource::Cache);
    assert_eq!(result.state, OrderState::Open);
    assert_eq!(result.symbol, "ETHUSDT");
    assert_eq!(result.quantity, dec!(2));
}

#[tokio::test]
async fn test_get_order_falls_back_to_open_orders() {
    let mut server = Server::new_async().await;
    let _time = mock_time(&mut server, Utc::now().timestamp_millis()).await;
    let _query = server
        .mock("GET", "/fapi/v1/order")
        .match_query(Matcher::Any)
        .with_status(400)
        .with_body(r#"{"code":-2013,"msg":"Order does not exist."}"#)
        .create_async()
        .await;
    let open = server
        .mock("GET", "/fapi/v1/openOrders")
        .match_query(Matcher::UrlEncoded("symbol".to_string(), "BTCUSDT".to_string()))
        .with_status(200)
        .with_body(format!("[{}]", order_json(555, "BTCUSDT", "PARTIALLY_FILLED")))
        .expect(1)
        .create_async()
        .await;

    let client = client(&server);
    let result = client
        .get_order("555", Some("BTC/USDT"), CallOptions::default())
        .await
        .unwrap();

    open.assert_async().await;
    assert_eq!(result.source, OrderSource::Live);
    assert_eq!(result.state, OrderState::Open);
    assert!(client.order_cache().lookup("555").is_some());
}

#[tokio::test]
async fn test_get_order_assumes_finished_when_unknown() {
    let mut server = Server::new_async().await;
    let _time = mock_time(&mut server, Utc::now().timestamp_millis()).await;
    let _query = server
        .mock("GET", "/fapi/v1/order")
        .match_query(Matcher::Any)
        .with_status(400)
        .with_body(r#"{"code":-2013,"msg":"Order does not exist."}"#)
        .create_async()
        .await;
    let _open = server
        .mock("GET", "/fapi/v1/openOrders")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;

    let result = client(&server)
        .get_order("999", Some("BTCUSDT"), CallOptions::default())
        .await
        .unwrap();

    assert_eq!(result.source, OrderSource::AssumedFinished);
    assert_eq!(result.state, OrderState::Finished);
    assert_eq!(result.order_id, "999");
    assert_eq!(result.symbol, "BTCUSDT");
}

#[tokio::test]
async fn test_get_order_propagates_auth_failure() {
    let mut server = Server::new_async().await;
    let _time = mock_time(&mut server, Utc::now().timestamp_millis()).await;
    let _query = server
        .mock("GET", "/fapi/v1/order")
        .match_query(Matcher::Any)
        .with_status(401)
        .with_body(r#"{"code":-2015,"msg":"Invalid API-key, IP, or permissions for action."}"#)
        .create_async()
        .await;

    let err = client(&server)
        .get_order("1", Some("BTCUSDT"), CallOptions::default())
        .await
        .unwrap_err();

    assert!(err.is_auth_error());
}

// ============================================================================
// 주문 취소
// ============================================================================

#[tokio::test]
async fn test_cancel_order_without_symbol_uses_cache() {
    let mut server = Server::new_async().await;
    let _time = mock_time(&mut server, Utc::now().timestamp_millis()).await;
    let cancel = server
        .mock("DELETE", "/fapi/v1/order")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("symbol".to_string(), "ETHUSDT".to_string()),
            Matcher::UrlEncoded("orderId".to_string(), "321".to_string()),
        ]))
        .with_status(200)
        .with_body(order_json(321, "ETHUSDT", "CANCELED"))
        .expect(1)
        .create_async()
        .await;

    let client = client(&server);
    client
        .order_cache()
        .remember("321", "ETHUSDT", cached_snapshot("321", "ETHUSDT"));

    let result = client
        .cancel_order("321", None, CallOptions::default())
        .await
        .unwrap();

    cancel.assert_async().await;
    assert_eq!(result.state, OrderState::Cancelled);
    assert_eq!(
        client.order_cache().lookup("321").unwrap().snapshot.state,
        OrderState::Cancelled
    );
}

#[tokio::test]
async fn test_cancel_unknown_order_without_symbol_fails() {
    let mut server = Server::new_async().await;
    let _time = mock_time(&mut server, Utc::now().timestamp_millis()).await;
    let _open = server
        .mock("GET", "/fapi/v1/openOrders")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;
    let cancel = server
        .mock("DELETE", "/fapi/v1/order")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let err = client(&server)
        .cancel_order("404", None, CallOptions::default())
        .await
        .unwrap_err();

    cancel.assert_async().await;
    assert!(matches!(err, ExchangeError::OrderNotFound(_)));
}

#[tokio::test]
async fn test_cancel_all_orders() {
    let mut server = Server::new_async().await;
    let _time = mock_time(&mut server, Utc::now().timestamp_millis()).await;
    let cancel = server
        .mock("DELETE", "/fapi/v1/allOpenOrders")
        .match_query(Matcher::UrlEncoded("symbol".to_string(), "BTCUSDT".to_string()))
        .with_status(200)
        .with_body(r#"{"code":200,"msg":"The operation of cancel all open order is done."}"#)
        .expect(1)
        .create_async()
        .await;

    client(&server)
        .cancel_all_orders("BTC", CallOptions::default())
        .await
        .unwrap();

    cancel.assert_async().await;
}

// ============================================================================
// 계좌/시장 데이터
// ============================================================================

#[tokio::test]
async fn test_get_positions_derives_cross_margin() {
    let mut server = Server::new_async().await;
    let _time = mock_time(&mut server, Utc::now().timestamp_millis()).await;
    let _positions = server
        .mock("GET", "/fapi/v2/positionRisk")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(
            r#"[
                {"symbol":"BTCUSDT","positionAmt":"2","entryPrice":"100","markPrice":"110",
                 "unRealizedProfit":"20","liquidationPrice":"55.5","leverage":"10",
                 "isolatedMargin":"0","marginType":"cross","updateTime":1700000000000},
                {"symbol":"ETHUSDT","positionAmt":"0.000","entryPrice":"0.0","markPrice":"3000",
                 "unRealizedProfit":"0","liquidationPrice":"0","leverage":"20",
                 "isolatedMargin":"0","marginType":"cross","updateTime":0}
            ]"#,
        )
        .create_async()
        .await;

    let positions = client(&server)
        .get_positions(CallOptions::default())
        .await
        .unwrap();

    assert_eq!(positions.len(), 1);
    let btc = &positions[0];
    assert_eq!(btc.symbol, "BTCUSDT");
    assert_eq!(btc.margin, dec!(20));
    assert_eq!(btc.leverage, 10);
    assert_eq!(btc.unrealized_pnl, dec!(20));
    assert_eq!(btc.liquidation_price, Some(dec!(55.5)));
}

#[tokio::test]
async fn test_get_contract_info_enriched() {
    let mut server = Server::new_async().await;
    let _time = mock_time(&mut server, Utc::now().timestamp_millis()).await;
    let _info = mock_exchange_info(&mut server).await;
    let _enrich = mock_enrichment(&mut server).await;

    let client = client(&server);
    let meta = client
        .get_contract_info("BTC/USDT:USDT", CallOptions::default())
        .await
        .unwrap();

    assert_eq!(meta.step_size, dec!(0.001));
    assert_eq!(meta.tick_size, dec!(0.1));
    assert_eq!(meta.taker_fee, Some(dec!(0.0004)));
    assert_eq!(meta.max_leverage, Some(125));

    let err = client
        .get_contract_info("DOGE", CallOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ExchangeError::SymbolNotFound(_)));

    let all = client.get_all_contracts(CallOptions::default()).await.unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn test_calculate_quantity_uses_contract_rules() {
    let mut server = Server::new_async().await;
    let _info = mock_exchange_info(&mut server).await;

    // 자격증명 없이도 계약 정보만으로 계산 가능
    let config = BinanceFuturesConfig::public()
        .with_base_url(server.url())
        .with_retry(fast_retry());
    let client = BinanceFuturesClient::new(config).unwrap();

    let quantity = client
        .calculate_quantity("BTC", dec!(100), 10, dec!(30000), CallOptions::default())
        .await
        .unwrap();

    // 100 * 10 / 30000 = 0.0333.. → 0.033
    assert_eq!(quantity, dec!(0.033));
    assert_eq!(
        client.calculate_pnl(dec!(100), dec!(110), dec!(2), Side::Sell),
        dec!(-20)
    );
}

#[tokio::test]
async fn test_get_ticker_merges_book_ticker() {
    let mut server = Server::new_async().await;
    let _stats = server
        .mock("GET", "/fapi/v1/ticker/24hr")
        .match_query(Matcher::UrlEncoded("symbol".to_string(), "ETHUSDT".to_string()))
        .with_status(200)
        .with_body(
            r#"{"symbol":"ETHUSDT","priceChange":"12.5","priceChangePercent":"0.42",
                "lastPrice":"3012.34","highPrice":"3050","lowPrice":"2950",
                "volume":"123456.7","quoteVolume":"371000000","openTime":1699913600000,
                "closeTime":1700000000000,"count":100}"#,
        )
        .create_async()
        .await;
    let _book = server
        .mock("GET", "/fapi/v1/ticker/bookTicker")
        .match_query(Matcher::UrlEncoded("symbol".to_string(), "ETHUSDT".to_string()))
        .with_status(200)
        .with_body(
            r#"{"symbol":"ETHUSDT","bidPrice":"3012.33","bidQty":"10","askPrice":"3012.35","askQty":"8","time":1700000000000}"#,
        )
        .create_async()
        .await;

    let ticker = client(&server)
        .get_ticker("eth/usdt:usdt", CallOptions::default())
        .await
        .unwrap();

    assert_eq!(ticker.symbol, "ETHUSDT");
    assert_eq!(ticker.last, dec!(3012.34));
    assert_eq!(ticker.bid, Some(dec!(3012.33)));
    assert_eq!(ticker.ask, Some(dec!(3012.35)));
    assert_eq!(ticker.change_24h_percent, dec!(0.42));
}

#[tokio::test]
async fn test_get_candles_parses_klines() {
    let mut server = Server::new_async().await;
    let _klines = server
        .mock("GET", "/fapi/v1/klines")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("symbol".to_string(), "BTCUSDT".to_string()),
            Matcher::UrlEncoded("interval".to_string(), "1h".to_string()),
            Matcher::UrlEncoded("limit".to_string(), "2".to_string()),
        ]))
        .with_status(200)
        .with_body(
            r#"[
                [1700000000000,"100","110","95","105","10",1700003599999,"1050",42,"5","525","0"],
                [1700003600000,"105","112","101","111","12",1700007199999,"1300",51,"6","650","0"]
            ]"#,
        )
        .create_async()
        .await;

    let candles = client(&server)
        .get_candles("BTC", Timeframe::H1, Some(2), CallOptions::default())
        .await
        .unwrap();

    assert_eq!(candles.len(), 2);
    assert_eq!(candles[1].close, dec!(111));
    assert_eq!(candles[0].num_trades, Some(42));
}

#[tokio::test]
async fn test_signed_call_without_credentials_is_configuration_error() {
    let server = Server::new_async().await;
    let config = BinanceFuturesConfig::public().with_base_url(server.url());
    let client = BinanceFuturesClient::new(config).unwrap();

    let err = client.get_account(CallOptions::default()).await.unwrap_err();
    assert!(matches!(err, ExchangeError::Configuration(_)));

    let err = client
        .set_leverage("BTC", 0, CallOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ExchangeError::InvalidInput(_)));
}
