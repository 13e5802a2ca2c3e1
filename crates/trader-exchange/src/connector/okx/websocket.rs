//! OKX 실시간 WebSocket 클라이언트.
//!
//! 퍼블릭 소켓은 시장 데이터(캔들/호가/체결)를, 프라이빗 소켓은
//! 로그인 후 주문 알림을 수신합니다. 연결이 끊기면 제한된 횟수만큼
//! 재연결하고, 퍼블릭 소켓은 재연결 시 레지스트리의 구독 기록을
//! 그대로 재발행합니다.

use std::collections::HashMap;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use futures::{SinkExt, StreamExt};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::time::interval;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use trader_core::{
    Candle, DepthLevel, DepthSnapshot, ExchangeEvent, ExchangePayload, OrderUpdate, Side,
    TradePrint,
};

use crate::error::{ExchangeError, ExchangeResult};

use super::config::OkxConfig;
use super::subscriptions::SubscriptionRegistry;
use super::wire::candle_from_row;

/// 재연결 최대 시도 횟수.
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// 재연결 대기 시간 (초).
const RECONNECT_DELAY_SECS: u64 = 5;

/// Ping 간격 (초).
const PING_INTERVAL_SECS: u64 = 30;

#[derive(Debug, Deserialize)]
struct WsFrame {
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    arg: Option<WsArg>,
    #[serde(default)]
    data: Option<serde_json::Value>,
    #[serde(default)]
    msg: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WsArg {
    channel: String,
    #[serde(default, rename = "instId")]
    inst_id: String,
}

#[derive(Debug, Deserialize)]
struct WsDepthData {
    asks: Vec<Vec<String>>,
    bids: Vec<Vec<String>>,
    ts: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WsTradeData {
    inst_id: String,
    trade_id: String,
    px: String,
    sz: String,
    side: String,
    ts: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WsOrderData {
    ord_id: String,
    inst_id: String,
    state: String,
    side: String,
    #[serde(default)]
    px: String,
    #[serde(default)]
    sz: String,
    #[serde(default)]
    acc_fill_sz: String,
}

/// 수신 프레임을 도메인 페이로드로 변환합니다.
///
/// 캔들 채널은 현재 진행 중인 봉의 갱신을 계속 내려보내므로,
/// 같은 상품의 더 늦은 봉이 열렸을 때에만 직전 봉을 완성본으로
/// 내보냅니다. 해석할 수 없는 프레임은 경고만 남기고 버립니다.
pub(crate) struct FrameDecoder {
    prev_candle: HashMap<String, Candle>,
}

impl FrameDecoder {
    pub(crate) fn new() -> Self {
        Self {
            prev_candle: HashMap::new(),
        }
    }

    pub(crate) fn decode(&mut self, text: &str) -> Vec<ExchangePayload> {
        if text == "pong" {
            return Vec::new();
        }
        let frame: WsFrame = match serde_json::from_str(text) {
            Ok(f) => f,
            Err(e) => {
                warn!(error = %e, "unreadable websocket frame");
                return Vec::new();
            }
        };

        if let Some(event) = frame.event.as_deref() {
            match event {
                "error" => {
                    let msg = frame.msg.unwrap_or_default();
                    warn!(%msg, "websocket error event");
                    return vec![ExchangePayload::Error(msg)];
                }
                other => {
                    debug!(event = %other, "websocket event");
                    return Vec::new();
                }
            }
        }

        let (arg, data) = match (frame.arg, frame.data) {
            (Some(arg), Some(data)) => (arg, data),
            _ => return Vec::new(),
        };

        if arg.channel.starts_with("candle") {
            self.decode_candles(&arg.inst_id, data)
        } else if arg.channel == "books5" {
            Self::decode_depth(&arg.inst_id, data)
        } else if arg.channel == "trades" {
            Self::decode_trades(data)
        } else if arg.channel == "orders" {
            Self::decode_orders(data)
        } else {
            debug!(channel = %arg.channel, "frame on unexpected channel");
            Vec::new()
        }
    }

    fn decode_candles(&mut self, inst_id: &str, data: serde_json::Value) -> Vec<ExchangePayload> {
        let rows: Vec<Vec<String>> = match serde_json::from_value(data) {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "bad candle frame");
                return Vec::new();
            }
        };
        let mut payloads = Vec::new();
        for row in rows {
            if row.len() < 7 {
                warn!(len = row.len(), "short candle row");
                continue;
            }
            let fixed: [String; 7] = match row[..7].to_vec().try_into() {
                Ok(f) => f,
                Err(_) => continue,
            };
            let candle = match candle_from_row(&fixed) {
                Ok(c) => c,
                Err(e) => {
                    warn!(error = %e, "bad candle row");
                    continue;
                }
            };
            match self.prev_candle.get(inst_id) {
                Some(prev) if candle.start > prev.start => {
                    payloads.push(ExchangePayload::Candle(prev.clone()));
                    self.prev_candle.insert(inst_id.to_string(), candle);
                }
                Some(_) | None => {
                    self.prev_candle.insert(inst_id.to_string(), candle);
                }
            }
        }
        payloads
    }

    fn decode_depth(inst_id: &str, data: serde_json::Value) -> Vec<ExchangePayload> {
        let books: Vec<WsDepthData> = match serde_json::from_value(data) {
            Ok(b) => b,
            Err(e) => {
                warn!(error = %e, "bad depth frame");
                return Vec::new();
            }
        };
        books
            .into_iter()
            .map(|book| {
                ExchangePayload::Depth(DepthSnapshot {
                    inst_id: inst_id.to_string(),
                    asks: parse_levels(&book.asks),
                    bids: parse_levels(&book.bids),
                    timestamp: parse_ts_ms(&book.ts),
                })
            })
            .collect()
    }

    fn decode_trades(data: serde_json::Value) -> Vec<ExchangePayload> {
        let trades: Vec<WsTradeData> = match serde_json::from_value(data) {
            Ok(t) => t,
            Err(e) => {
                warn!(error = %e, "bad trade frame");
                return Vec::new();
            }
        };
        trades
            .into_iter()
            .map(|t| {
                ExchangePayload::Trade(TradePrint {
                    inst_id: t.inst_id,
                    trade_id: t.trade_id,
                    price: t.px.parse().unwrap_or_default(),
                    quantity: t.sz.parse().unwrap_or_default(),
                    side: if t.side == "sell" { Side::Sell } else { Side::Buy },
                    timestamp: parse_ts_ms(&t.ts),
                })
            })
            .collect()
    }

    fn decode_orders(data: serde_json::Value) -> Vec<ExchangePayload> {
        let orders: Vec<WsOrderData> = match serde_json::from_value(data) {
            Ok(o) => o,
            Err(e) => {
                warn!(error = %e, "bad order frame");
                return Vec::new();
            }
        };
        orders
            .into_iter()
            .map(|o| {
                ExchangePayload::OrderUpdate(OrderUpdate {
                    order_id: o.ord_id,
                    inst_id: o.inst_id,
                    state: o.state,
                    side: if o.side == "sell" { Side::Sell } else { Side::Buy },
                    price: o.px.parse().unwrap_or_default(),
                    amount: o.sz.parse().unwrap_or_default(),
                    filled: o.acc_fill_sz.parse().unwrap_or_default(),
                })
            })
            .collect()
    }
}

fn parse_levels(raw: &[Vec<String>]) -> Vec<DepthLevel> {
    raw.iter()
        .filter(|l| l.len() >= 2)
        .map(|l| DepthLevel {
            price: l[0].parse().unwrap_or_default(),
            quantity: l[1].parse().unwrap_or_default(),
        })
        .collect()
}

fn parse_ts_ms(raw: &str) -> DateTime<Utc> {
    raw.parse::<i64>()
        .ok()
        .and_then(DateTime::from_timestamp_millis)
        .unwrap_or_else(Utc::now)
}

/// 프라이빗 소켓 로그인 프레임을 생성합니다.
///
/// 서명 대상은 `timestamp + "GET" + "/users/self/verify"`이며,
/// 타임스탬프는 REST와 달리 epoch 초 문자열입니다.
pub(crate) fn login_frame(config: &OkxConfig, epoch_secs: i64) -> ExchangeResult<String> {
    let timestamp = epoch_secs.to_string();
    let canonical = format!("{}GET/users/self/verify", timestamp);
    let mut mac = Hmac::<Sha256>::new_from_slice(config.api_secret.as_bytes())
        .map_err(|e| ExchangeError::Validation(format!("invalid secret: {}", e)))?;
    mac.update(canonical.as_bytes());
    let sign = BASE64.encode(mac.finalize().into_bytes());

    let frame = json!({
        "op": "login",
        "args": [{
            "apiKey": config.api_key,
            "passphrase": config.passphrase,
            "timestamp": timestamp,
            "sign": sign,
        }],
    });
    serde_json::to_string(&frame)
        .map_err(|e| ExchangeError::Parse(format!("login frame: {}", e)))
}

fn orders_subscribe_frame(inst_type: &str) -> String {
    json!({
        "op": "subscribe",
        "args": [{ "channel": "orders", "instType": inst_type }],
    })
    .to_string()
}

/// 퍼블릭 소켓 루프.
///
/// `cmd_rx`로 들어오는 구독 프레임을 소켓에 쓰고, 수신 프레임을
/// 디코딩해 이벤트 채널로 내보냅니다. 재연결할 때마다 레지스트리의
/// 구독 기록을 재발행합니다.
pub(crate) async fn run_public(
    url: String,
    source: String,
    registry: Arc<Mutex<SubscriptionRegistry>>,
    mut cmd_rx: mpsc::Receiver<String>,
    events: mpsc::Sender<ExchangeEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut decoder = FrameDecoder::new();
    let mut reconnect_attempts = 0u32;

    loop {
        if *shutdown.borrow() {
            return;
        }
        let ws_stream = match connect_async(&url).await {
            Ok((ws, _)) => ws,
            Err(e) => {
                error!(error = %e, "public websocket connect failed");
                reconnect_attempts += 1;
                if reconnect_attempts > MAX_RECONNECT_ATTEMPTS {
                    let _ = events
                        .send(ExchangeEvent::error(&source, format!("public socket gone: {}", e)))
                        .await;
                    return;
                }
                tokio::time::sleep(Duration::from_secs(RECONNECT_DELAY_SECS)).await;
                continue;
            }
        };
        info!(%url, "public websocket connected");

        let (mut write, mut read) = ws_stream.split();

        // 이전에 발행한 구독 복원
        if let Err(e) = registry.lock().await.replay().await {
            warn!(error = %e, "subscription replay failed");
        }

        let mut ping_interval = interval(Duration::from_secs(PING_INTERVAL_SECS));
        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            for payload in decoder.decode(&text) {
                                if events.send(ExchangeEvent::new(&source, payload)).await.is_err() {
                                    return;
                                }
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            let _ = write.send(Message::Pong(data)).await;
                        }
                        Some(Ok(Message::Close(_))) => {
                            warn!("public websocket closed by server");
                            break;
                        }
                        Some(Err(e)) => {
                            error!(error = %e, "public websocket read error");
                            break;
                        }
                        None => {
                            warn!("public websocket stream ended");
                            break;
                        }
                        _ => {}
                    }
                }
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(frame) => {
                            if let Err(e) = write.send(Message::Text(frame)).await {
                                error!(error = %e, "subscribe send failed");
                                break;
                            }
                        }
                        None => return,
                    }
                }
                _ = ping_interval.tick() => {
                    if write.send(Message::Text("ping".to_string())).await.is_err() {
                        break;
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        let _ = write.send(Message::Close(None)).await;
                        return;
                    }
                }
            }
        }

        // 끊긴 연결도 재시도 한도에 포함됩니다.
        reconnect_attempts += 1;
        if reconnect_attempts > MAX_RECONNECT_ATTEMPTS {
            error!(max = MAX_RECONNECT_ATTEMPTS, "public websocket reconnect limit exceeded");
            let _ = events
                .send(ExchangeEvent::error(&source, "public socket gone: too many reconnects"))
                .await;
            return;
        }
        warn!(
            attempt = reconnect_attempts,
            max = MAX_RECONNECT_ATTEMPTS,
            delay_secs = RECONNECT_DELAY_SECS,
            "public websocket dropped, reconnecting after delay"
        );
        tokio::time::sleep(Duration::from_secs(RECONNECT_DELAY_SECS)).await;
    }
}

/// 프라이빗 소켓 루프. 로그인 후 주문 채널을 구독합니다.
pub(crate) async fn run_private(
    url: String,
    source: String,
    config: OkxConfig,
    events: mpsc::Sender<ExchangeEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut decoder = FrameDecoder::new();
    let mut reconnect_attempts = 0u32;

    loop {
        if *shutdown.borrow() {
            return;
        }
        let ws_stream = match connect_async(&url).await {
            Ok((ws, _)) => ws,
            Err(e) => {
                error!(error = %e, "private websocket connect failed");
                reconnect_attempts += 1;
                if reconnect_attempts > MAX_RECONNECT_ATTEMPTS {
                    let _ = events
                        .send(ExchangeEvent::error(&source, format!("private socket gone: {}", e)))
                        .await;
                    return;
                }
                tokio::time::sleep(Duration::from_secs(RECONNECT_DELAY_SECS)).await;
                continue;
            }
        };
        info!(%url, "private websocket connected");

        let (mut write, mut read) = ws_stream.split();

        let frame = match login_frame(&config, Utc::now().timestamp()) {
            Ok(f) => f,
            Err(e) => {
                error!(error = %e, "login frame build failed");
                let _ = events.send(ExchangeEvent::error(&source, e.to_string())).await;
                return;
            }
        };
        let logged_in = write.send(Message::Text(frame)).await.map_err(|e| {
            error!(error = %e, "login send failed");
        });

        let mut ping_interval = interval(Duration::from_secs(PING_INTERVAL_SECS));
        while logged_in.is_ok() {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            // 로그인 확인 후에 주문 채널을 구독합니다.
                            if text.contains("\"event\":\"login\"") {
                                info!("private websocket logged in");
                                let sub = orders_subscribe_frame(&config.inst_type);
                                if let Err(e) = write.send(Message::Text(sub)).await {
                                    error!(error = %e, "orders subscribe failed");
                                    break;
                                }
                                continue;
                            }
                            for payload in decoder.decode(&text) {
                                if events.send(ExchangeEvent::new(&source, payload)).await.is_err() {
                                    return;
                                }
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            let _ = write.send(Message::Pong(data)).await;
                        }
                        Some(Ok(Message::Close(_))) => {
                            warn!("private websocket closed by server");
                            break;
                        }
                        Some(Err(e)) => {
                            error!(error = %e, "private websocket read error");
                            break;
                        }
                        None => {
                            warn!("private websocket stream ended");
                            break;
                        }
                        _ => {}
                    }
                }
                _ = ping_interval.tick() => {
                    if write.send(Message::Text("ping".to_string())).await.is_err() {
                        break;
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        let _ = write.send(Message::Close(None)).await;
                        return;
                    }
                }
            }
        }

        // 끊긴 연결도 재시도 한도에 포함됩니다.
        reconnect_attempts += 1;
        if reconnect_attempts > MAX_RECONNECT_ATTEMPTS {
            error!(max = MAX_RECONNECT_ATTEMPTS, "private websocket reconnect limit exceeded");
            let _ = events
                .send(ExchangeEvent::error(&source, "private socket gone: too many reconnects"))
                .await;
            return;
        }
        warn!(
            attempt = reconnect_attempts,
            max = MAX_RECONNECT_ATTEMPTS,
            delay_secs = RECONNECT_DELAY_SECS,
            "private websocket dropped, reconnecting after delay"
        );
        tokio::time::sleep(Duration::from_secs(RECONNECT_DELAY_SECS)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn candle_frame(inst_id: &str, start_ms: i64, close: &str) -> String {
        format!(
            r#"{{"arg":{{"channel":"candle1m","instId":"{}"}},"data":[["{}","1","2","0.5","{}","10","100","0","0"]]}}"#,
            inst_id, start_ms, close
        )
    }

    #[test]
    fn test_candle_emitted_only_when_next_bar_opens() {
        let mut decoder = FrameDecoder::new();

        // 진행 중인 봉의 갱신은 삼켜집니다.
        assert!(decoder.decode(&candle_frame("BTC-USDT-SWAP", 60_000, "1.1")).is_empty());
        assert!(decoder.decode(&candle_frame("BTC-USDT-SWAP", 60_000, "1.2")).is_empty());

        // 다음 봉이 열리면 직전 봉의 마지막 상태가 나옵니다.
        let payloads = decoder.decode(&candle_frame("BTC-USDT-SWAP", 120_000, "1.3"));
        assert_eq!(payloads.len(), 1);
        match &payloads[0] {
            ExchangePayload::Candle(c) => {
                assert_eq!(c.start, 60);
                assert_eq!(c.close, dec!(1.2));
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn test_candle_dedup_is_per_instrument() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.decode(&candle_frame("BTC-USDT-SWAP", 60_000, "1")).is_empty());
        // 다른 상품의 첫 봉은 BTC의 상태와 무관합니다.
        assert!(decoder.decode(&candle_frame("ETH-USDT-SWAP", 120_000, "2")).is_empty());
        assert_eq!(decoder.decode(&candle_frame("BTC-USDT-SWAP", 120_000, "1")).len(), 1);
    }

    #[test]
    fn test_decode_depth_snapshot() {
        let mut decoder = FrameDecoder::new();
        let text = r#"{"arg":{"channel":"books5","instId":"BTC-USDT-SWAP"},"data":[{"asks":[["30001","5","0","1"],["30002","3","0","1"]],"bids":[["29999","2","0","1"]],"ts":"1597026383085"}]}"#;
        let payloads = decoder.decode(text);
        assert_eq!(payloads.len(), 1);
        match &payloads[0] {
            ExchangePayload::Depth(d) => {
                assert_eq!(d.inst_id, "BTC-USDT-SWAP");
                assert_eq!(d.best_ask().unwrap().price, dec!(30001));
                assert_eq!(d.best_bid().unwrap().quantity, dec!(2));
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn test_decode_trade() {
        let mut decoder = FrameDecoder::new();
        let text = r#"{"arg":{"channel":"trades","instId":"BTC-USDT-SWAP"},"data":[{"instId":"BTC-USDT-SWAP","tradeId":"9","px":"30000.5","sz":"0.1","side":"sell","ts":"1597026383085"}]}"#;
        let payloads = decoder.decode(text);
        assert_eq!(payloads.len(), 1);
        match &payloads[0] {
            ExchangePayload::Trade(t) => {
                assert_eq!(t.trade_id, "9");
                assert_eq!(t.side, Side::Sell);
                assert_eq!(t.price, dec!(30000.5));
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn test_decode_order_update() {
        let mut decoder = FrameDecoder::new();
        let text = r#"{"arg":{"channel":"orders","instType":"SWAP"},"data":[{"ordId":"312269865356374016","instId":"BTC-USDT-SWAP","state":"filled","side":"buy","px":"30000","sz":"2","accFillSz":"2"}]}"#;
        let payloads = decoder.decode(text);
        assert_eq!(payloads.len(), 1);
        match &payloads[0] {
            ExchangePayload::OrderUpdate(u) => {
                assert_eq!(u.order_id, "312269865356374016");
                assert_eq!(u.state, "filled");
                assert_eq!(u.filled, dec!(2));
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn test_event_frames_and_pong_ignored() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.decode("pong").is_empty());
        assert!(decoder
            .decode(r#"{"event":"subscribe","arg":{"channel":"trades","instId":"BTC-USDT-SWAP"}}"#)
            .is_empty());
    }

    #[test]
    fn test_error_event_becomes_payload() {
        let mut decoder = FrameDecoder::new();
        let payloads = decoder.decode(r#"{"event":"error","code":"60012","msg":"Illegal request"}"#);
        assert!(matches!(&payloads[0], ExchangePayload::Error(m) if m == "Illegal request"));
    }

    #[test]
    fn test_garbage_frame_recoverable() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.decode("{{not json").is_empty());
        assert!(decoder.decode(&candle_frame("BTC-USDT-SWAP", 60_000, "1")).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_connection_reconnects_with_delay_then_gives_up() {
        use tokio::net::TcpListener;

        // 핸드셰이크 직후 연결을 끊는 로컬 서버.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let (stream, _) = match listener.accept().await {
                    Ok(pair) => pair,
                    Err(_) => return,
                };
                if let Ok(ws) = tokio_tungstenite::accept_async(stream).await {
                    drop(ws);
                }
            }
        });

        let (sub_tx, _sub_rx) = mpsc::channel(4);
        let registry = Arc::new(Mutex::new(SubscriptionRegistry::new(sub_tx)));
        let (cmd_tx, cmd_rx) = mpsc::channel(4);
        let (event_tx, mut event_rx) = mpsc::channel(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(run_public(
            format!("ws://{}", addr),
            "okx".to_string(),
            registry,
            cmd_rx,
            event_tx,
            shutdown_rx,
        ));

        // 연결이 계속 끊기면 재시도 한도를 넘긴 뒤 에러 이벤트로 끝납니다.
        // 재시도 사이의 대기는 가상 시계로 진행됩니다.
        let event = event_rx.recv().await.expect("terminal error event");
        assert!(matches!(event.payload, ExchangePayload::Error(_)));
        assert!(event_rx.recv().await.is_none());

        drop(cmd_tx);
        drop(shutdown_tx);
    }

    #[test]
    fn test_login_frame_signature() {
        let config = OkxConfig::new("api-key", "22582BD0CFF14C41EDBF1AB98506286D", "pass");
        let frame = login_frame(&config, 1538054050).unwrap();
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["op"], "login");
        let arg = &value["args"][0];
        assert_eq!(arg["apiKey"], "api-key");
        assert_eq!(arg["timestamp"], "1538054050");
        // 고정 키/시각에 대한 서명은 결정적입니다.
        assert_eq!(arg["sign"], login_sign_reference());
    }

    fn login_sign_reference() -> String {
        let mut mac =
            Hmac::<Sha256>::new_from_slice(b"22582BD0CFF14C41EDBF1AB98506286D").unwrap();
        mac.update(b"1538054050GET/users/self/verify");
        BASE64.encode(mac.finalize().into_bytes())
    }
}
