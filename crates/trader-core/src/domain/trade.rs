//! 트레이드 액션 타입.
//!
//! 이 모듈은 전략 계층이 커넥터에 전달하는 불변 주문 요청을 정의합니다:
//! - `TradeDirection` - 포지션 방향 (롱/숏)
//! - `TradeIntent` - 주문 의도 (진입/청산/손절)
//! - `TradeAction` - 불변 주문 요청
//! - `PositionMode` - 단방향/양방향 포지션 모드

use crate::types::{Price, Quantity};
use serde::{Deserialize, Serialize};

/// 포지션 방향.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeDirection {
    /// 롱 포지션
    Long,
    /// 숏 포지션
    Short,
}

/// 주문 의도.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeIntent {
    /// 포지션 진입
    Open,
    /// 포지션 청산
    Close,
    /// 손절 (트리거 주문)
    Stop,
}

/// 커넥터에 전달되는 불변 주문 요청.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeAction {
    /// 상품 ID (예: "BTC-USDT-SWAP")
    pub symbol: String,
    /// 포지션 방향
    pub direction: TradeDirection,
    /// 주문 의도
    pub intent: TradeIntent,
    /// 주문 가격 (손절 주문의 경우 트리거 가격)
    pub price: Price,
    /// 주문 수량
    pub amount: Quantity,
}

impl TradeAction {
    /// 롱 방향 액션인지 확인합니다.
    pub fn is_long(&self) -> bool {
        self.direction == TradeDirection::Long
    }

    /// 진입 액션인지 확인합니다.
    pub fn is_open(&self) -> bool {
        self.intent == TradeIntent::Open
    }

    /// 손절 액션인지 확인합니다.
    pub fn is_stop(&self) -> bool {
        self.intent == TradeIntent::Stop
    }
}

/// 프로세스 전역 포지션 모드.
///
/// 주문 의미는 동일하며 와이어 표현만 달라집니다: 단방향 모드에서는
/// `posSide` 필드가 페이로드에서 완전히 생략됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionMode {
    /// 단방향 (one-way)
    Simple,
    /// 양방향 (hedge)
    Dual,
}

impl Default for PositionMode {
    fn default() -> Self {
        PositionMode::Simple
    }
}
