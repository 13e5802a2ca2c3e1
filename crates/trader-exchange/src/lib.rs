//! 거래소 연결 및 시장 데이터 처리.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - Exchange trait: 통합 거래소 인터페이스
//! - OKX 커넥터 (REST + WebSocket)
//! - 요청 서명 (HMAC-SHA256)
//! - 과거 캔들 페이지네이션 파이프라인
//! - 실시간 구독 레지스트리 및 아웃바운드 이벤트 채널

pub mod connector;
pub mod error;
pub mod traits;
pub mod transport;

pub use connector::okx::{OkxConfig, OkxConnector};
pub use error::*;
pub use traits::*;
pub use transport::RestTransport;
