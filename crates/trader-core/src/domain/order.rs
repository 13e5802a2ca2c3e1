//! 주문 타입 및 관리.
//!
//! 이 모듈은 트레이딩 시스템의 주문 관련 타입을 정의합니다:
//! - `Side` - 주문 방향 (매수/매도)
//! - `PositionSide` - 포지션 방향 태그 (양방향 모드 전용)
//! - `OrderClass` - 주문 부류 (일반/조건부)
//! - `OrderStatusType` - 주문 상태
//! - `Order` - 거래소가 확인한 주문 엔티티
//! - `OrderUpdate` - 프라이빗 소켓으로 수신하는 주문 체결 알림

use crate::types::{Price, Quantity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 주문 방향 (매수 또는 매도).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// 매수
    Buy,
    /// 매도
    Sell,
}

impl Side {
    /// 반대 방향을 반환합니다.
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// 와이어 표현을 반환합니다 ("buy"/"sell").
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 포지션 방향 태그.
///
/// 양방향(hedge) 포지션 모드에서만 와이어 페이로드에 포함됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    /// 롱 포지션
    Long,
    /// 숏 포지션
    Short,
}

impl PositionSide {
    /// 와이어 표현을 반환합니다 ("long"/"short").
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionSide::Long => "long",
            PositionSide::Short => "short",
        }
    }
}

impl std::fmt::Display for PositionSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 주문 부류.
///
/// 거래소는 두 부류의 주문에 서로 다른 ID 공간을 사용합니다.
/// 주문 ID는 자신의 부류 안에서만 유일하며, 두 부류는 절대 병합되지 않습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderClass {
    /// 일반 지정가/시장가 주문 - 제출 즉시 체결 대기
    Immediate,
    /// 조건부(트리거) 주문 - 트리거 가격 도달 시 활성화
    Conditional,
}

/// 주문 상태 유형.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatusType {
    /// 거래소에 제출됨 (대기 중)
    Open,
    /// 부분 체결됨
    PartiallyFilled,
    /// 전량 체결됨
    Filled,
    /// 취소됨
    Cancelled,
}

impl OrderStatusType {
    /// 주문이 여전히 활성 상태인지 확인합니다.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            OrderStatusType::Open | OrderStatusType::PartiallyFilled
        )
    }
}

/// 거래소가 확인한 주문.
///
/// identity는 거래소가 부여한 `order_id`이며, 자신의 `class` 안에서만
/// 유일합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// 거래소가 부여한 주문 ID
    pub order_id: String,
    /// 상품 ID
    pub symbol: String,
    /// 주문 방향
    pub side: Side,
    /// 주문 상태
    pub status: OrderStatusType,
    /// 주문 가격
    pub price: Price,
    /// 주문 수량
    pub amount: Quantity,
    /// 제출 시각
    pub submitted_at: DateTime<Utc>,
    /// 선택적 태그 (예: "stop")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remark: Option<String>,
    /// 주문 부류
    pub class: OrderClass,
}

/// 프라이빗 소켓으로 수신하는 주문 체결 알림.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderUpdate {
    /// 거래소가 부여한 주문 ID
    pub order_id: String,
    /// 상품 ID
    pub inst_id: String,
    /// 거래소 상태 문자열 (예: "live", "filled", "canceled")
    pub state: String,
    /// 주문 방향
    pub side: Side,
    /// 주문 가격
    pub price: Price,
    /// 주문 수량
    pub amount: Quantity,
    /// 누적 체결 수량
    pub filled: Quantity,
}
