//! OKX REST 응답/요청의 직렬화 타입.
//!
//! 모든 응답은 `{"code","msg","data":[..]}` 봉투를 따르며,
//! `code != "0"`은 실패입니다. 숫자 필드는 전부 문자열로 옵니다.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use trader_core::Candle;

use crate::error::{ExchangeError, ExchangeResult, RATE_LIMIT_MSG};

/// 공통 응답 봉투.
#[derive(Debug, Deserialize)]
pub struct OkxResponse<T> {
    pub code: String,
    #[serde(default)]
    pub msg: String,
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

/// 응답 본문을 해석하고 봉투 코드를 검사합니다.
///
/// `code != "0"`이면 원문 본문 전체를 담은 [`ExchangeError::Api`]를
/// 반환합니다. 다만 요청 한도 초과 메시지는
/// [`ExchangeError::RateLimited`]로 구분합니다. 본문이 JSON이
/// 아니면 [`ExchangeError::Parse`]입니다.
pub fn parse_response<T: serde::de::DeserializeOwned>(body: &[u8]) -> ExchangeResult<OkxResponse<T>> {
    let resp: OkxResponse<T> = serde_json::from_slice(body)
        .map_err(|e| ExchangeError::Parse(format!("response body: {}", e)))?;
    if resp.code != "0" {
        if resp.msg.contains(RATE_LIMIT_MSG) {
            return Err(ExchangeError::RateLimited);
        }
        return Err(ExchangeError::Api(String::from_utf8_lossy(body).into_owned()));
    }
    Ok(resp)
}

/// 주문 접수 응답 항목. 항목별 결과는 `sCode`/`sMsg`에 담깁니다.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderAck {
    #[serde(default)]
    pub cl_ord_id: String,
    pub ord_id: String,
    #[serde(default)]
    pub tag: String,
    pub s_code: String,
    #[serde(default)]
    pub s_msg: String,
}

/// 조건부 주문 접수 응답 항목.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlgoOrderAck {
    pub algo_id: String,
    pub s_code: String,
    #[serde(default)]
    pub s_msg: String,
}

/// 미체결 일반 주문 조회 항목 (취소 흐름에 필요한 필드만).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingOrder {
    pub inst_id: String,
    pub ord_id: String,
}

/// 미체결 조건부 주문 조회 항목.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingAlgoOrder {
    pub inst_id: String,
    pub algo_id: String,
}

/// 거래 상품 정보.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instrument {
    #[serde(default)]
    pub inst_type: String,
    pub inst_id: String,
    #[serde(default)]
    pub base_ccy: String,
    #[serde(default)]
    pub quote_ccy: String,
    #[serde(default)]
    pub settle_ccy: String,
    #[serde(default)]
    pub ct_val: String,
    #[serde(default)]
    pub tick_sz: String,
    #[serde(default)]
    pub lot_sz: String,
    #[serde(default)]
    pub min_sz: String,
    #[serde(default)]
    pub state: String,
}

/// 상품 조회 결과를 전략에서 쓰기 좋은 형태로 정리한 요약.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolInfo {
    pub symbol: String,
    pub exchange: String,
    /// 가격 소수 자릿수. `tickSz`의 소수부 길이.
    pub price_scale: u32,
    /// 지원하는 캔들 주기 목록.
    pub resolutions: String,
}

/// 일반 주문 요청 본문.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    pub inst_id: String,
    pub td_mode: String,
    pub side: String,
    /// 단일 포지션 모드에서는 생략합니다.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pos_side: Option<String>,
    pub ord_type: String,
    pub px: String,
    pub sz: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

/// 조건부(손절) 주문 요청 본문.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceAlgoOrderRequest {
    pub inst_id: String,
    pub td_mode: String,
    pub side: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pos_side: Option<String>,
    pub ord_type: String,
    pub sz: String,
    pub reduce_only: bool,
    pub sl_trigger_px: String,
    /// `-1`은 트리거 시 시장가 체결을 뜻하는 OKX 규약입니다.
    pub sl_ord_px: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

/// 일반 주문 취소 요청 본문.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelOrderRequest {
    pub inst_id: String,
    pub ord_id: String,
}

/// 조건부 주문 취소 배열의 항목.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelAlgoItem {
    pub inst_id: String,
    pub algo_id: String,
}

/// 캔들 한 행. `[ts, o, h, l, c, vol, volCcy]` 형식의 문자열 배열.
pub type CandleRow = [String; 7];

fn parse_decimal(raw: &str, field: &str) -> ExchangeResult<Decimal> {
    if raw.is_empty() {
        return Ok(Decimal::ZERO);
    }
    raw.parse()
        .map_err(|e| ExchangeError::Parse(format!("candle {}: {} ({:?})", field, e, raw)))
}

/// 캔들 행을 도메인 타입으로 변환합니다. 타임스탬프는 밀리초로
/// 오므로 초 단위로 내립니다.
pub fn candle_from_row(row: &CandleRow) -> ExchangeResult<Candle> {
    let ts_ms: i64 = row[0]
        .parse()
        .map_err(|e| ExchangeError::Parse(format!("candle timestamp: {} ({:?})", e, row[0])))?;
    Ok(Candle {
        start: ts_ms / 1000,
        open: parse_decimal(&row[1], "open")?,
        high: parse_decimal(&row[2], "high")?,
        low: parse_decimal(&row[3], "low")?,
        close: parse_decimal(&row[4], "close")?,
        volume: parse_decimal(&row[5], "volume")?,
        turnover: parse_decimal(&row[6], "turnover")?,
    })
}
