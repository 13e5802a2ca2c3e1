//! 서명된 REST 호출을 수행하는 HTTP 전송 계층.

use std::time::Duration;

use reqwest::{Client, Method};
use tracing::debug;

use crate::error::{ExchangeError, ExchangeResult};
use crate::transport::RestTransport;

use super::sign::OkxSigner;

/// REST API 클라이언트.
///
/// 모든 요청에 인증 헤더를 붙이고 호출별 타임아웃을 적용합니다.
/// HTTP 상태 코드와 무관하게 응답 본문을 그대로 반환하며,
/// 본문 해석은 호출자의 몫입니다.
pub struct OkxRestClient {
    base_url: String,
    signer: OkxSigner,
    client: Client,
}

impl OkxRestClient {
    pub fn new(base_url: impl Into<String>, signer: OkxSigner) -> Self {
        Self {
            base_url: base_url.into(),
            signer,
            client: Client::new(),
        }
    }
}

#[async_trait::async_trait]
impl RestTransport for OkxRestClient {
    async fn send_signed(
        &self,
        method: Method,
        path: &str,
        query: &str,
        body: Option<String>,
        timeout: Duration,
    ) -> ExchangeResult<Vec<u8>> {
        // GET은 쿼리 문자열이, POST는 본문이 서명 대상입니다.
        // 빈 쿼리는 `?` 없이 빈 페이로드로 서명합니다.
        let payload = if method == Method::GET {
            if query.is_empty() {
                String::new()
            } else {
                format!("?{}", query)
            }
        } else {
            body.clone().unwrap_or_default()
        };
        let headers = self.signer.headers(method.as_str(), path, &payload)?;

        let url = if query.is_empty() {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}{}?{}", self.base_url, path, query)
        };
        debug!(method = %method, %url, "sending signed request");

        let mut request = self.client.request(method, &url).headers(headers);
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = tokio::time::timeout(timeout, request.send())
            .await
            .map_err(|_| ExchangeError::Timeout(path.to_string()))?
            .map_err(|e| ExchangeError::Network(e.to_string()))?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ExchangeError::Network(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_with_query_hits_server() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v5/market/history-candles")
            .match_query(mockito::Matcher::UrlEncoded("instId".into(), "BTC-USDT".into()))
            .match_header("OK-ACCESS-KEY", "key")
            .match_header("content-type", "application/json")
            .with_body(r#"{"code":"0","msg":"","data":[]}"#)
            .create_async()
            .await;

        let client = OkxRestClient::new(server.url(), OkxSigner::new("key", "secret", "pass"));
        let body = client
            .send_signed(
                Method::GET,
                "/api/v5/market/history-candles",
                "instId=BTC-USDT",
                None,
                Duration::from_secs(3),
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(body, br#"{"code":"0","msg":"","data":[]}"#);
    }

    #[tokio::test]
    async fn test_error_status_body_still_returned() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/v5/trade/order")
            .with_status(400)
            .with_body(r#"{"code":"50011","msg":"Requests too frequent.","data":[]}"#)
            .create_async()
            .await;

        let client = OkxRestClient::new(server.url(), OkxSigner::new("key", "secret", "pass"));
        let body = client
            .send_signed(
                Method::POST,
                "/api/v5/trade/order",
                "",
                Some("{}".to_string()),
                Duration::from_secs(2),
            )
            .await
            .unwrap();

        let text = String::from_utf8(body).unwrap();
        assert!(text.contains("Requests too frequent."));
    }
}
