//! 시장 데이터 타입 및 구조체.
//!
//! 이 모듈은 시장 데이터 관련 타입을 정의합니다:
//! - `Candle` - OHLCV 캔들스틱 데이터
//! - `DepthSnapshot` - 상위 호가 스냅샷
//! - `TradePrint` - 실시간 체결 데이터

use crate::domain::order::Side;
use crate::types::{Price, Quantity};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// OHLCV 캔들스틱 데이터.
///
/// `start`는 초 단위(포함)이며, 올바르게 생성된 시퀀스는
/// `start`가 순증가하고 중복이 없습니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// 캔들 시작 시간 (초)
    pub start: i64,
    /// 시가
    pub open: Price,
    /// 고가
    pub high: Price,
    /// 저가
    pub low: Price,
    /// 종가
    pub close: Price,
    /// 거래량
    pub volume: Quantity,
    /// 거래대금
    pub turnover: Decimal,
}

impl Candle {
    /// 캔들 시작 시각을 반환합니다.
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.start, 0)
    }

    /// 캔들 범위(고가 - 저가)를 반환합니다.
    pub fn range(&self) -> Decimal {
        self.high - self.low
    }

    /// 양봉(종가 > 시가)인지 확인합니다.
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }
}

/// 호가 레벨 (가격 + 잔량).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepthLevel {
    /// 호가 가격
    pub price: Price,
    /// 호가 잔량
    pub quantity: Quantity,
}

/// 상위 호가 스냅샷 (상위 5단계).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepthSnapshot {
    /// 상품 ID
    pub inst_id: String,
    /// 매도 호가 (가격 오름차순)
    pub asks: Vec<DepthLevel>,
    /// 매수 호가 (가격 내림차순)
    pub bids: Vec<DepthLevel>,
    /// 스냅샷 시각
    pub timestamp: DateTime<Utc>,
}

impl DepthSnapshot {
    /// 최우선 매도 호가를 반환합니다.
    pub fn best_ask(&self) -> Option<&DepthLevel> {
        self.asks.first()
    }

    /// 최우선 매수 호가를 반환합니다.
    pub fn best_bid(&self) -> Option<&DepthLevel> {
        self.bids.first()
    }
}

/// 실시간 체결 데이터.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradePrint {
    /// 상품 ID
    pub inst_id: String,
    /// 체결 ID
    pub trade_id: String,
    /// 체결가
    pub price: Price,
    /// 체결량
    pub quantity: Quantity,
    /// 테이커 방향
    pub side: Side,
    /// 체결 시각
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_candle() -> Candle {
        Candle {
            start: 1700000000,
            open: dec!(100),
            high: dec!(110),
            low: dec!(95),
            close: dec!(105),
            volume: dec!(1234),
            turnover: dec!(127000),
        }
    }

    #[test]
    fn test_candle_helpers() {
        let c = sample_candle();
        assert_eq!(c.range(), dec!(15));
        assert!(c.is_bullish());
        assert!(c.start_time().is_some());
    }

    #[test]
    fn test_depth_best_levels() {
        let snap = DepthSnapshot {
            inst_id: "BTC-USDT-SWAP".to_string(),
            asks: vec![DepthLevel {
                price: dec!(101),
                quantity: dec!(2),
            }],
            bids: vec![DepthLevel {
                price: dec!(99),
                quantity: dec!(3),
            }],
            timestamp: Utc::now(),
        };
        assert_eq!(snap.best_ask().unwrap().price, dec!(101));
        assert_eq!(snap.best_bid().unwrap().price, dec!(99));
    }
}
