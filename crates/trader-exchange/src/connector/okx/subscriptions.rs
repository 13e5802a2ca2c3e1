//! 실시간 구독 레지스트리.
//!
//! 구독 요청을 검증해 거래소 채널명으로 변환하고, 발행한 요청을
//! 순서대로 기록해 둡니다. 소켓이 재연결되면 기록을 원래 순서
//! 그대로 다시 내보냅니다. 기록은 추가만 되고 지워지지 않습니다.

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

use trader_core::{SubscriptionRequest, WatchKind};

use crate::error::{ExchangeError, ExchangeResult};

/// 소켓으로 나가는 구독 명령.
#[derive(Debug, Clone, Serialize)]
pub struct OpRequest {
    pub op: String,
    pub args: Vec<OpArg>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpArg {
    pub channel: String,
    pub inst_type: String,
    pub inst_id: String,
}

/// 구독 종류를 거래소 채널명으로 변환합니다.
fn channel_for(kind: WatchKind) -> &'static str {
    match kind {
        WatchKind::Candle => "candle1m",
        WatchKind::Depth => "books5",
        WatchKind::Trade => "trades",
    }
}

/// 발행한 구독을 기억하는 레지스트리.
pub struct SubscriptionRegistry {
    log: Vec<OpRequest>,
    ws_tx: mpsc::Sender<String>,
}

impl SubscriptionRegistry {
    pub fn new(ws_tx: mpsc::Sender<String>) -> Self {
        Self { log: Vec::new(), ws_tx }
    }

    /// 구독 요청을 검증하고 발행합니다.
    ///
    /// 알 수 없는 종류는 아무것도 기록하지 않고 거부합니다.
    /// 요청은 먼저 기록된 뒤 소켓으로 나가므로, 전송이 실패해도
    /// 재연결 시 재발행 대상에 포함됩니다.
    pub async fn watch(&mut self, request: &SubscriptionRequest) -> ExchangeResult<()> {
        let kind: WatchKind = request
            .kind
            .parse()
            .map_err(|e: String| ExchangeError::Validation(e))?;

        let op = OpRequest {
            op: "subscribe".to_string(),
            args: vec![OpArg {
                channel: channel_for(kind).to_string(),
                inst_type: request.inst_type.clone(),
                inst_id: request.inst_id.clone(),
            }],
        };
        info!(kind = %kind, inst_id = %request.inst_id, "subscribing");
        self.log.push(op.clone());
        self.send(&op).await
    }

    /// 기록된 구독을 발행 순서대로 다시 내보냅니다.
    pub async fn replay(&self) -> ExchangeResult<()> {
        if !self.log.is_empty() {
            info!(count = self.log.len(), "replaying subscriptions");
        }
        for op in &self.log {
            self.send(op).await?;
        }
        Ok(())
    }

    /// 기록된 구독 수.
    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    async fn send(&self, op: &OpRequest) -> ExchangeResult<()> {
        let frame = serde_json::to_string(op)
            .map_err(|e| ExchangeError::Parse(format!("subscribe frame: {}", e)))?;
        if self.ws_tx.send(frame).await.is_err() {
            warn!("subscription channel closed");
            return Err(ExchangeError::Network("websocket command channel closed".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(cap: usize) -> (SubscriptionRegistry, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(cap);
        (SubscriptionRegistry::new(tx), rx)
    }

    #[tokio::test]
    async fn test_watch_maps_kind_to_channel() {
        let (mut reg, mut rx) = registry(8);
        reg.watch(&SubscriptionRequest::new("candle", "BTC-USDT-SWAP", "SWAP"))
            .await
            .unwrap();
        reg.watch(&SubscriptionRequest::new("depth", "BTC-USDT-SWAP", "SWAP"))
            .await
            .unwrap();
        reg.watch(&SubscriptionRequest::new("trade", "BTC-USDT-SWAP", "SWAP"))
            .await
            .unwrap();

        let frames: Vec<String> = vec![
            rx.recv().await.unwrap(),
            rx.recv().await.unwrap(),
            rx.recv().await.unwrap(),
        ];
        assert!(frames[0].contains("\"channel\":\"candle1m\""));
        assert!(frames[1].contains("\"channel\":\"books5\""));
        assert!(frames[2].contains("\"channel\":\"trades\""));
        assert!(frames[0].contains("\"op\":\"subscribe\""));
        assert!(frames[0].contains("\"instId\":\"BTC-USDT-SWAP\""));
    }

    #[tokio::test]
    async fn test_unknown_kind_rejected_without_logging() {
        let (mut reg, mut rx) = registry(8);
        let err = reg
            .watch(&SubscriptionRequest::new("ticker", "BTC-USDT-SWAP", "SWAP"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::Validation(_)));
        assert!(reg.is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_replay_reissues_in_original_order() {
        let (mut reg, mut rx) = registry(16);
        reg.watch(&SubscriptionRequest::new("depth", "ETH-USDT-SWAP", "SWAP"))
            .await
            .unwrap();
        reg.watch(&SubscriptionRequest::new("candle", "BTC-USDT-SWAP", "SWAP"))
            .await
            .unwrap();
        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();

        reg.replay().await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), first);
        assert_eq!(rx.recv().await.unwrap(), second);
        assert_eq!(reg.len(), 2);
    }
}
