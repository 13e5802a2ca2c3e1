//! OKX 요청 서명.
//!
//! 서명 문자열은 `timestamp + method + path + payload`이며, `payload`는
//! 읽기 요청에서는 `?`가 붙은 쿼리 문자열, 변경 요청에서는 요청 본문
//! 그대로입니다. 서명은 `Base64(HMAC-SHA256(secret, 서명 문자열))`입니다.
//!
//! 타임스탬프는 호출 구성 시점이 아니라 서명 시점에 생성되는
//! 밀리초 정밀도의 UTC ISO-8601(`Z` 접미사) 문자열입니다.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use sha2::Sha256;

use crate::error::{ExchangeError, ExchangeResult};

type HmacSha256 = Hmac<Sha256>;

/// 인증 헤더를 생성하는 요청 서명기.
#[derive(Clone)]
pub struct OkxSigner {
    api_key: String,
    api_secret: String,
    passphrase: String,
}

impl OkxSigner {
    /// 새 서명기 생성.
    pub fn new(
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        passphrase: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            passphrase: passphrase.into(),
        }
    }

    /// 서명용 타임스탬프 (UTC, 밀리초 정밀도, `Z` 접미사).
    pub fn timestamp() -> String {
        Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
    }

    /// 고정된 타임스탬프로 서명을 계산합니다.
    pub fn sign(&self, timestamp: &str, method: &str, path: &str, payload: &str) -> String {
        let canonical = format!("{}{}{}{}", timestamp, method, path, payload);
        let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes())
            .expect("HMAC accepts any key size");
        mac.update(canonical.as_bytes());
        BASE64.encode(mac.finalize().into_bytes())
    }

    /// 요청의 인증 헤더 집합을 생성합니다.
    ///
    /// 타임스탬프는 이 호출 시점에 생성됩니다. 헤더 값 하나라도
    /// 구성에 실패하면 요청은 서명되지 않은 채 에러를 반환합니다.
    pub fn headers(&self, method: &str, path: &str, payload: &str) -> ExchangeResult<HeaderMap> {
        let timestamp = Self::timestamp();
        let signature = self.sign(&timestamp, method, path, payload);

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("OK-ACCESS-KEY", header_value(&self.api_key)?);
        headers.insert("OK-ACCESS-SIGN", header_value(&signature)?);
        headers.insert("OK-ACCESS-TIMESTAMP", header_value(&timestamp)?);
        headers.insert("OK-ACCESS-PASSPHRASE", header_value(&self.passphrase)?);
        Ok(headers)
    }
}

fn header_value(value: &str) -> ExchangeResult<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| ExchangeError::Validation(format!("invalid header value: {}", e)))
}

impl std::fmt::Debug for OkxSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OkxSigner")
            .field("api_key", &"<redacted>")
            .field("api_secret", &"<redacted>")
            .field("passphrase", &"<redacted>")
            .finish()
    }
}
