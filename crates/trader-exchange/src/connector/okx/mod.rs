//! OKX 거래소 커넥터.
//!
//! REST(주문/조회)와 WebSocket(실시간 데이터)을 묶은 퍼사드입니다.
//! 실시간 이벤트는 하나의 바운디드 채널로 나가며, 수신자는
//! [`Exchange::take_receiver`]로 한 번만 가져갈 수 있습니다.

mod config;
mod history;
mod orders;
mod rest;
mod sign;
mod subscriptions;
mod websocket;
mod wire;

pub use config::{
    OkxConfig, INST_TYPE_FUTURES, INST_TYPE_MARGIN, INST_TYPE_OPTION, INST_TYPE_SPOT,
    INST_TYPE_SWAP,
};
pub use wire::SymbolInfo;

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::info;

use trader_core::{
    Candle, ExchangeEvent, ExchangeSettings, Order, SubscriptionRequest, Timeframe, TradeAction,
};

use crate::error::{ExchangeError, ExchangeResult};
use crate::traits::Exchange;
use crate::transport::RestTransport;

use orders::OrderLifecycle;
use rest::OkxRestClient;
use sign::OkxSigner;
use subscriptions::SubscriptionRegistry;
use wire::{parse_response, Instrument};

const PATH_INSTRUMENTS: &str = "/api/v5/public/instruments";

/// 아웃바운드 이벤트 채널 용량.
const EVENT_CHAN_CAP: usize = 1024;

/// 구독 명령 채널 용량.
const CMD_CHAN_CAP: usize = 64;

/// OKX 커넥터.
pub struct OkxConnector {
    config: OkxConfig,
    transport: Arc<dyn RestTransport>,
    orders: OrderLifecycle,
    registry: Arc<Mutex<SubscriptionRegistry>>,
    inst_type: RwLock<String>,
    cmd_rx: Option<mpsc::Receiver<String>>,
    // stop() 시 드롭해 아웃바운드 채널을 닫습니다.
    event_tx: Option<mpsc::Sender<ExchangeEvent>>,
    event_rx: Option<mpsc::Receiver<ExchangeEvent>>,
    shutdown_tx: watch::Sender<bool>,
}

impl OkxConnector {
    /// 설정으로 커넥터를 생성합니다.
    pub fn new(config: OkxConfig) -> Self {
        let signer = OkxSigner::new(
            config.api_key.clone(),
            config.api_secret.clone(),
            config.passphrase.clone(),
        );
        let transport: Arc<dyn RestTransport> =
            Arc::new(OkxRestClient::new(config.rest_url.clone(), signer));
        Self::with_transport(config, transport)
    }

    /// 환경 변수에서 커넥터를 생성합니다.
    pub fn from_env() -> Option<Self> {
        OkxConfig::from_env().map(Self::new)
    }

    /// 프레임워크 설정 항목에서 커넥터를 생성합니다.
    pub fn from_settings(name: &str, settings: &ExchangeSettings) -> Self {
        Self::new(OkxConfig::from_settings(name, settings))
    }

    fn with_transport(config: OkxConfig, transport: Arc<dyn RestTransport>) -> Self {
        let orders = OrderLifecycle::new(transport.clone(), config.clone());
        let (cmd_tx, cmd_rx) = mpsc::channel(CMD_CHAN_CAP);
        let registry = Arc::new(Mutex::new(SubscriptionRegistry::new(cmd_tx)));
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHAN_CAP);
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            inst_type: RwLock::new(config.inst_type.clone()),
            config,
            transport,
            orders,
            registry,
            cmd_rx: Some(cmd_rx),
            event_tx: Some(event_tx),
            event_rx: Some(event_rx),
            shutdown_tx,
        }
    }

    /// 이후 조회/구독에 쓰일 상품 유형을 바꿉니다.
    pub fn set_inst_type(&self, inst_type: impl Into<String>) {
        let mut current = self.inst_type.write().unwrap_or_else(|e| e.into_inner());
        *current = inst_type.into();
    }

    fn current_inst_type(&self) -> String {
        self.inst_type
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// 현재 상품 유형의 거래 가능 상품 목록을 조회합니다.
    pub async fn get_symbols(&self) -> ExchangeResult<Vec<SymbolInfo>> {
        let query = format!("instType={}", self.current_inst_type());
        let raw = self
            .transport
            .send_signed(Method::GET, PATH_INSTRUMENTS, &query, None, self.config.query_timeout())
            .await?;
        let instruments = parse_response::<Instrument>(&raw)?.data;

        instruments
            .into_iter()
            .map(|inst| {
                let tick: rust_decimal::Decimal = inst.tick_sz.parse().map_err(|e| {
                    ExchangeError::Parse(format!("tickSz {:?}: {}", inst.tick_sz, e))
                })?;
                Ok(SymbolInfo {
                    symbol: inst.inst_id,
                    exchange: self.config.client_name.clone(),
                    price_scale: tick.normalize().scale(),
                    resolutions: "1m,5m,15m,30m,1h,4h,1d,1w".to_string(),
                })
            })
            .collect()
    }
}

#[async_trait]
impl Exchange for OkxConnector {
    fn name(&self) -> &str {
        &self.config.client_name
    }

    async fn start(&mut self) -> ExchangeResult<()> {
        let cmd_rx = self
            .cmd_rx
            .take()
            .ok_or_else(|| ExchangeError::Validation("connector already started".into()))?;
        let event_tx = self
            .event_tx
            .clone()
            .ok_or_else(|| ExchangeError::Validation("connector already stopped".into()))?;

        info!(name = %self.config.client_name, "starting connector");
        tokio::spawn(websocket::run_public(
            self.config.ws_public_url.clone(),
            self.config.client_name.clone(),
            self.registry.clone(),
            cmd_rx,
            event_tx.clone(),
            self.shutdown_tx.subscribe(),
        ));
        tokio::spawn(websocket::run_private(
            self.config.ws_private_url.clone(),
            self.config.client_name.clone(),
            self.config.clone(),
            event_tx,
            self.shutdown_tx.subscribe(),
        ));
        Ok(())
    }

    async fn stop(&mut self) -> ExchangeResult<()> {
        info!(name = %self.config.client_name, "stopping connector");
        let _ = self.shutdown_tx.send(true);
        // 소켓 태스크가 종료 시그널로 내려가면 남은 송신자도 함께
        // 사라져 수신 측이 스트림 종료를 관측합니다.
        self.event_tx = None;
        Ok(())
    }

    async fn submit(&self, action: &TradeAction) -> ExchangeResult<Order> {
        self.orders.submit(action).await
    }

    async fn cancel_order(&self, order: &Order) -> ExchangeResult<Order> {
        self.orders.cancel(order).await
    }

    async fn cancel_all_orders(&self) -> ExchangeResult<Vec<Order>> {
        self.orders.cancel_all(&self.current_inst_type()).await
    }

    fn kline_chan(
        &self,
        inst_id: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> (mpsc::Receiver<Candle>, mpsc::Receiver<ExchangeError>) {
        history::kline_chan(
            self.transport.clone(),
            inst_id,
            timeframe,
            start,
            end,
            self.config.query_timeout(),
        )
    }

    async fn watch(&self, request: SubscriptionRequest) -> ExchangeResult<()> {
        self.registry.lock().await.watch(&request).await
    }

    fn take_receiver(&mut self) -> Option<mpsc::Receiver<ExchangeEvent>> {
        self.event_rx.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    struct MockTransport {
        responses: StdMutex<VecDeque<Vec<u8>>>,
        queries: StdMutex<Vec<String>>,
    }

    impl MockTransport {
        fn new(responses: Vec<&str>) -> Arc<Self> {
            Arc::new(Self {
                responses: StdMutex::new(
                    responses.into_iter().map(|s| s.as_bytes().to_vec()).collect(),
                ),
                queries: StdMutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl RestTransport for MockTransport {
        async fn send_signed(
            &self,
            _method: Method,
            _path: &str,
            query: &str,
            _body: Option<String>,
            _timeout: Duration,
        ) -> ExchangeResult<Vec<u8>> {
            self.queries.lock().unwrap().push(query.to_string());
            Ok(self.responses.lock().unwrap().pop_front().expect("no response queued"))
        }
    }

    const INSTRUMENTS: &str = r#"{"code":"0","msg":"","data":[
        {"instType":"SWAP","instId":"BTC-USDT-SWAP","tickSz":"0.1","lotSz":"1","minSz":"1","state":"live"},
        {"instType":"SWAP","instId":"ETH-USDT-SWAP","tickSz":"0.01","lotSz":"1","minSz":"1","state":"live"}
    ]}"#;

    #[tokio::test]
    async fn test_get_symbols_maps_tick_size_to_scale() {
        let transport = MockTransport::new(vec![INSTRUMENTS]);
        let connector = OkxConnector::with_transport(
            OkxConfig::new("key", "secret", "pass"),
            transport.clone(),
        );

        let symbols = connector.get_symbols().await.unwrap();
        assert_eq!(symbols.len(), 2);
        assert_eq!(symbols[0].symbol, "BTC-USDT-SWAP");
        assert_eq!(symbols[0].price_scale, 1);
        assert_eq!(symbols[1].price_scale, 2);
        assert_eq!(symbols[0].resolutions, "1m,5m,15m,30m,1h,4h,1d,1w");

        assert_eq!(transport.queries.lock().unwrap()[0], "instType=SWAP");
    }

    #[tokio::test]
    async fn test_set_inst_type_changes_queries() {
        let transport = MockTransport::new(vec![r#"{"code":"0","msg":"","data":[]}"#]);
        let connector = OkxConnector::with_transport(
            OkxConfig::new("key", "secret", "pass"),
            transport.clone(),
        );

        connector.set_inst_type(INST_TYPE_SPOT);
        connector.get_symbols().await.unwrap();
        assert_eq!(transport.queries.lock().unwrap()[0], "instType=SPOT");
    }

    #[tokio::test]
    async fn test_take_receiver_only_once() {
        let transport = MockTransport::new(vec![]);
        let mut connector = OkxConnector::with_transport(
            OkxConfig::new("key", "secret", "pass"),
            transport,
        );
        assert!(connector.take_receiver().is_some());
        assert!(connector.take_receiver().is_none());
    }

    #[tokio::test]
    async fn test_stop_closes_event_channel() {
        let transport = MockTransport::new(vec![]);
        let mut connector = OkxConnector::with_transport(
            OkxConfig::new("key", "secret", "pass"),
            transport,
        );
        let mut rx = connector.take_receiver().unwrap();
        connector.stop().await.unwrap();
        // 종료 후 수신자는 무한 대기하지 않고 스트림 종료를 봅니다.
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_watch_unknown_kind_rejected() {
        let transport = MockTransport::new(vec![]);
        let connector = OkxConnector::with_transport(
            OkxConfig::new("key", "secret", "pass"),
            transport,
        );
        let err = connector
            .watch(SubscriptionRequest::new("ticker", "BTC-USDT-SWAP", "SWAP"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::Validation(_)));
    }
}
