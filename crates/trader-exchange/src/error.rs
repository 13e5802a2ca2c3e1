//! 거래소 에러 타입.

use thiserror::Error;

/// 거래소 응답에서 요청 한도 초과를 나타내는 메시지 조각.
///
/// 과거 캔들 파이프라인은 이 조각으로 재시도 대상을 식별합니다.
pub const RATE_LIMIT_MSG: &str = "Requests too frequent.";

/// 거래소 관련 에러.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// 네트워크/연결 에러
    #[error("Network error: {0}")]
    Network(String),

    /// 요청 타임아웃
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// 거래소 에러 응답 (진단을 위해 원본 본문 그대로 보존)
    #[error("Exchange error response: {0}")]
    Api(String),

    /// 응답 형태 위반 (예: 주문 제출 응답의 항목 수가 1이 아님)
    #[error("Protocol shape error: {0}")]
    ProtocolShape(String),

    /// 요청 한도 초과
    #[error("Rate limit exceeded")]
    RateLimited,

    /// 파싱/역직렬화 에러
    #[error("Parse error: {0}")]
    Parse(String),

    /// 잘못된 호출자 입력 (예: 알 수 없는 구독 종류)
    #[error("Validation error: {0}")]
    Validation(String),
}

/// 거래소 작업을 위한 Result 타입.
pub type ExchangeResult<T> = Result<T, ExchangeError>;

impl ExchangeError {
    /// 요청 한도 초과 응답인지 확인합니다.
    ///
    /// 거래소는 한도 초과를 일반 에러 응답의 메시지로 전달하므로
    /// `Api` 본문의 메시지 조각까지 함께 검사합니다.
    pub fn is_rate_limit(&self) -> bool {
        match self {
            ExchangeError::RateLimited => true,
            ExchangeError::Api(body) => body.contains(RATE_LIMIT_MSG),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_detection() {
        let err = ExchangeError::Api(
            r#"{"code":"50011","msg":"Requests too frequent.","data":[]}"#.to_string(),
        );
        assert!(err.is_rate_limit());
        assert!(ExchangeError::RateLimited.is_rate_limit());
        assert!(!ExchangeError::Network("reset".into()).is_rate_limit());
    }
}
