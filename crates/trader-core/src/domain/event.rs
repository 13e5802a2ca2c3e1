//! 아웃바운드 이벤트 래퍼 및 구독 요청 타입.
//!
//! 커넥터는 실시간 시장 데이터와 주문 알림을 단일 바운디드 채널로
//! 내보냅니다. 페이로드는 닫힌 태그드 enum이므로 소비자는 컴파일
//! 타임에 모든 종류를 처리해야 합니다.

use crate::domain::market_data::{Candle, DepthSnapshot, TradePrint};
use crate::domain::order::OrderUpdate;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 이벤트 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// 실시간 캔들
    Candle,
    /// 호가 스냅샷
    Depth,
    /// 실시간 체결
    Trade,
    /// 주문 알림
    Order,
    /// 에러 알림
    Error,
}

/// 이벤트 페이로드.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ExchangePayload {
    /// 실시간 캔들
    Candle(Candle),
    /// 호가 스냅샷
    Depth(DepthSnapshot),
    /// 실시간 체결
    Trade(TradePrint),
    /// 주문 알림
    OrderUpdate(OrderUpdate),
    /// 에러 메시지
    Error(String),
}

impl ExchangePayload {
    /// 페이로드에 해당하는 이벤트 종류를 반환합니다.
    pub fn kind(&self) -> EventKind {
        match self {
            ExchangePayload::Candle(_) => EventKind::Candle,
            ExchangePayload::Depth(_) => EventKind::Depth,
            ExchangePayload::Trade(_) => EventKind::Trade,
            ExchangePayload::OrderUpdate(_) => EventKind::Order,
            ExchangePayload::Error(_) => EventKind::Error,
        }
    }
}

/// 아웃바운드 채널에 실리는 단일 이벤트 래퍼.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeEvent {
    /// 이벤트 종류
    pub kind: EventKind,
    /// 이벤트 출처 (커넥터 이름)
    pub source: String,
    /// 생성 시각
    pub timestamp: DateTime<Utc>,
    /// 페이로드
    pub payload: ExchangePayload,
}

impl ExchangeEvent {
    /// 새 이벤트를 생성합니다.
    pub fn new(source: impl Into<String>, payload: ExchangePayload) -> Self {
        Self {
            kind: payload.kind(),
            source: source.into(),
            timestamp: Utc::now(),
            payload,
        }
    }

    /// 에러 이벤트를 생성합니다.
    pub fn error(source: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::new(source, ExchangePayload::Error(msg.into()))
    }
}

/// 실시간 구독 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchKind {
    /// 1분 실시간 캔들
    Candle,
    /// 상위 5단계 호가 스냅샷
    Depth,
    /// 실시간 체결
    Trade,
}

impl fmt::Display for WatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WatchKind::Candle => "candle",
            WatchKind::Depth => "depth",
            WatchKind::Trade => "trade",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for WatchKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "candle" => Ok(WatchKind::Candle),
            "depth" => Ok(WatchKind::Depth),
            "trade" => Ok(WatchKind::Trade),
            other => Err(format!("unknown watch kind: {}", other)),
        }
    }
}

/// 실시간 구독 요청.
///
/// `kind`는 커넥터가 닫힌 집합 {candle, depth, trade}에 대해 검증합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionRequest {
    /// 구독 종류 (검증 전 문자열)
    pub kind: String,
    /// 상품 ID
    pub inst_id: String,
    /// 상품 유형 (예: "SWAP")
    pub inst_type: String,
}

impl SubscriptionRequest {
    /// 새 구독 요청을 생성합니다.
    pub fn new(
        kind: impl Into<String>,
        inst_id: impl Into<String>,
        inst_type: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            inst_id: inst_id.into(),
            inst_type: inst_type.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_kind() {
        let ev = ExchangeEvent::error("okx", "boom");
        assert_eq!(ev.kind, EventKind::Error);
        assert_eq!(ev.source, "okx");
    }

    #[test]
    fn test_watch_kind_parse() {
        assert_eq!("candle".parse::<WatchKind>(), Ok(WatchKind::Candle));
        assert_eq!("depth".parse::<WatchKind>(), Ok(WatchKind::Depth));
        assert_eq!("trade".parse::<WatchKind>(), Ok(WatchKind::Trade));
        assert!("ticker".parse::<WatchKind>().is_err());
    }
}
