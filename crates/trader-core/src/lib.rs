//! # Trader Core
//!
//! 트레이딩 커넥터의 핵심 도메인 모델 및 타입을 제공합니다.
//!
//! 이 크레이트는 거래소 커넥터 전반에서 사용되는 기본 타입을 제공합니다:
//! - 트레이드 액션 및 주문 타입
//! - 캔들/호가/체결 시장 데이터 구조체
//! - 아웃바운드 이벤트 래퍼 (`ExchangeEvent`)
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod types;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
pub use types::*;
