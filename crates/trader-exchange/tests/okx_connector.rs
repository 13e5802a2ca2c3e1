//! Integration tests for the OKX connector against a mock REST server.

use chrono::{DateTime, Utc};
use mockito::Matcher;
use rust_decimal_macros::dec;
use trader_core::{Timeframe, TradeAction, TradeDirection, TradeIntent};
use trader_exchange::connector::okx::OkxConfig;
use trader_exchange::{Exchange, OkxConnector};

fn connector(server: &mockito::ServerGuard) -> OkxConnector {
    let mut config = OkxConfig::new("test-key", "test-secret", "test-pass");
    config.rest_url = server.url();
    OkxConnector::new(config)
}

fn ts(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap()
}

#[tokio::test]
async fn submit_sends_signed_limit_order() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/v5/trade/order")
        .match_header("OK-ACCESS-KEY", "test-key")
        .match_header("OK-ACCESS-PASSPHRASE", "test-pass")
        .match_header("content-type", "application/json")
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex(r#""instId":"BTC-USDT-SWAP""#.to_string()),
            Matcher::Regex(r#""ordType":"limit""#.to_string()),
            Matcher::Regex(r#""side":"buy""#.to_string()),
            Matcher::Regex(r#""sz":"2""#.to_string()),
        ]))
        .with_body(r#"{"code":"0","msg":"","data":[{"ordId":"42","sCode":"0","sMsg":""}]}"#)
        .create_async()
        .await;

    let connector = connector(&server);
    let action = TradeAction {
        symbol: "BTC-USDT-SWAP".to_string(),
        direction: TradeDirection::Long,
        intent: TradeIntent::Open,
        price: dec!(30000),
        amount: dec!(2.7),
    };
    let order = connector.submit(&action).await.unwrap();

    mock.assert_async().await;
    assert_eq!(order.order_id, "42");
}

#[tokio::test]
async fn cancel_all_walks_both_order_classes() {
    let mut server = mockito::Server::new_async().await;
    let pending = server
        .mock("GET", "/api/v5/trade/orders-pending")
        .match_query(Matcher::UrlEncoded("instType".into(), "SWAP".into()))
        .with_body(r#"{"code":"0","msg":"","data":[{"instId":"BTC-USDT-SWAP","ordId":"1"}]}"#)
        .create_async()
        .await;
    let cancel_batch = server
        .mock("POST", "/api/v5/trade/cancel-batch-orders")
        .with_body(r#"{"code":"0","msg":"","data":[{"ordId":"1","sCode":"0","sMsg":""}]}"#)
        .create_async()
        .await;
    let pending_algo = server
        .mock("GET", "/api/v5/trade/orders-algo-pending")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("ordType".into(), "conditional".into()),
            Matcher::UrlEncoded("instType".into(), "SWAP".into()),
        ]))
        .with_body(r#"{"code":"0","msg":"","data":[{"instId":"BTC-USDT-SWAP","algoId":"9"}]}"#)
        .create_async()
        .await;
    let cancel_algos = server
        .mock("POST", "/api/v5/trade/cancel-algos")
        .with_body(r#"{"code":"0","msg":"","data":[{"algoId":"9","sCode":"0","sMsg":""}]}"#)
        .create_async()
        .await;

    let connector = connector(&server);
    let cancelled = connector.cancel_all_orders().await.unwrap();

    pending.assert_async().await;
    cancel_batch.assert_async().await;
    pending_algo.assert_async().await;
    cancel_algos.assert_async().await;
    // Nothing was tracked locally, so nothing is returned as evicted.
    assert!(cancelled.is_empty());
}

#[tokio::test]
async fn cancel_all_stops_before_conditional_on_failure() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/api/v5/trade/orders-pending")
        .match_query(Matcher::Any)
        .with_status(429)
        .with_body(r#"{"code":"50011","msg":"Requests too frequent.","data":[]}"#)
        .create_async()
        .await;
    let pending_algo = server
        .mock("GET", "/api/v5/trade/orders-algo-pending")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let connector = connector(&server);
    assert!(connector.cancel_all_orders().await.is_err());
    pending_algo.assert_async().await;
}

#[tokio::test]
async fn kline_chan_streams_history_page() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/v5/market/history-candles")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("instId".into(), "BTC-USDT-SWAP".into()),
            Matcher::UrlEncoded("bar".into(), "1m".into()),
            Matcher::UrlEncoded("before".into(), "60000".into()),
        ]))
        .with_body(
            r#"{"code":"0","msg":"","data":[
                ["120000","2","2","2","2","1","1"],
                ["60000","1","1","1","1","1","1"]
            ]}"#,
        )
        .create_async()
        .await;

    let connector = connector(&server);
    let (mut candles, mut errors) =
        connector.kline_chan("BTC-USDT-SWAP", Timeframe::M1, ts(60), ts(120));

    let mut starts = Vec::new();
    while let Some(candle) = candles.recv().await {
        starts.push(candle.start);
    }
    mock.assert_async().await;
    // Rows arrive newest-first and come back sorted.
    assert_eq!(starts, vec![60, 120]);
    assert!(errors.recv().await.is_none());
}

#[tokio::test]
async fn get_symbols_uses_current_inst_type() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/v5/public/instruments")
        .match_query(Matcher::UrlEncoded("instType".into(), "SPOT".into()))
        .with_body(
            r#"{"code":"0","msg":"","data":[
                {"instType":"SPOT","instId":"BTC-USDT","tickSz":"0.1","lotSz":"0.0001","minSz":"0.0001","state":"live"}
            ]}"#,
        )
        .create_async()
        .await;

    let connector = connector(&server);
    connector.set_inst_type("SPOT");
    let symbols = connector.get_symbols().await.unwrap();

    mock.assert_async().await;
    assert_eq!(symbols.len(), 1);
    assert_eq!(symbols[0].symbol, "BTC-USDT");
    assert_eq!(symbols[0].price_scale, 1);
}
