//! 서명된 REST 호출 경계.
//!
//! 커넥터의 주문/조회 로직은 이 trait 뒤에서 동작하므로 테스트에서
//! 실제 HTTP 없이 스크립트된 응답으로 검증할 수 있습니다.
//!
//! 이 trait 구현체는 자체 재시도를 수행하지 않습니다. 모든 재시도
//! 정책은 호출하는 쪽(예: 과거 캔들 파이프라인)에 있습니다.

use crate::error::ExchangeResult;
use async_trait::async_trait;
use reqwest::Method;
use std::time::Duration;

/// 서명된 HTTP 요청을 수행하는 전송 계층.
#[async_trait]
pub trait RestTransport: Send + Sync {
    /// 서명된 요청을 보내고 원본 응답 본문을 반환합니다.
    ///
    /// HTTP 상태와 무관하게 본문을 그대로 반환합니다. 거래소 와이어
    /// 계약상 실패 판정은 본문의 `code` 필드로만 이루어집니다.
    ///
    /// # 인자
    /// * `method` - HTTP 메서드
    /// * `path` - 요청 경로 (예: "/api/v5/trade/order")
    /// * `query` - `?` 없이 인코딩된 쿼리 문자열 (없으면 빈 문자열)
    /// * `body` - 요청 본문 (JSON 문자열, GET에서는 None)
    /// * `timeout` - 이 호출에 대한 타임아웃
    async fn send_signed(
        &self,
        method: Method,
        path: &str,
        query: &str,
        body: Option<String>,
        timeout: Duration,
    ) -> ExchangeResult<Vec<u8>>;
}
