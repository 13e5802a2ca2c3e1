//! 과거 캔들 페이지네이션 파이프라인.
//!
//! 거래소는 한 번에 최대 100개의 캔들을 돌려주므로, 요청 구간을
//! 100분짜리 고정 창으로 잘라 커서를 앞으로 옮기며 가져옵니다.
//! 창이 겹치면서 같은 캔들이 두 번 올 수 있으므로, 직전에 내보낸
//! 캔들보다 시각이 늦은 캔들만 통과시킵니다.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Method;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use trader_core::{Candle, Timeframe};

use crate::error::{ExchangeError, ExchangeResult};
use crate::transport::RestTransport;

use super::wire::{candle_from_row, parse_response, CandleRow};

const PATH_HISTORY_CANDLES: &str = "/api/v5/market/history-candles";

/// 페이지당 캔들 수. 거래소 응답 상한과 같습니다.
const PAGE_BARS: i64 = 100;
/// 1분봉 기준 한 창의 길이 (밀리초).
const PAGE_SPAN_MS: i64 = PAGE_BARS * 60 * 1000;
/// 빈도 제한에 걸렸을 때 같은 창을 재시도하기 전 대기 시간.
const RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(1);

const CANDLE_CHAN_CAP: usize = 1024 * 10;

/// 한 페이지를 정렬·중복 제거하고 커서를 전진시킵니다.
///
/// 반환값은 (내보낼 캔들, 다음 커서 밀리초)입니다. 페이지가 비어
/// 있으면 커서는 창 끝으로 점프하고, 모든 행이 이전 커서 이하라면
/// 커서가 제자리에 머물러 호출 쪽의 정체 감지에 걸립니다.
pub(crate) fn advance_page(
    mut rows: Vec<Candle>,
    prev_cursor: i64,
    cursor: i64,
    window_end: i64,
) -> (Vec<Candle>, i64) {
    if rows.is_empty() {
        return (rows, window_end);
    }
    rows.sort_by_key(|c| c.start);

    let mut next = cursor;
    // 창 경계를 넘어온 중복과 페이지 안의 중복을 같은 문턱으로 거릅니다.
    let mut threshold = prev_cursor;
    let mut emitted = Vec::with_capacity(rows.len());
    for candle in rows {
        if candle.start * 1000 <= threshold {
            continue;
        }
        threshold = candle.start * 1000;
        next = threshold;
        emitted.push(candle);
    }
    (emitted, next)
}

/// 과거 캔들을 채널로 스트리밍합니다.
///
/// 캔들 채널과 에러 채널을 즉시 돌려주고, 백그라운드 태스크가
/// 구간을 다 채우거나 에러가 나면 두 채널을 모두 닫습니다.
/// 빈도 제한 응답은 에러가 아니라 1초 대기 후 같은 창 재시도입니다.
pub fn kline_chan(
    transport: Arc<dyn RestTransport>,
    inst_id: &str,
    timeframe: Timeframe,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    timeout: Duration,
) -> (mpsc::Receiver<Candle>, mpsc::Receiver<ExchangeError>) {
    let (candle_tx, candle_rx) = mpsc::channel(CANDLE_CHAN_CAP);
    let (err_tx, err_rx) = mpsc::channel(1);

    let inst_id = inst_id.to_string();
    tokio::spawn(async move {
        if let Err(e) = run_fetch(transport, &inst_id, timeframe, start, end, timeout, &candle_tx).await {
            warn!(%inst_id, error = %e, "history fetch stopped");
            let _ = err_tx.send(e).await;
        }
    });

    (candle_rx, err_rx)
}

async fn run_fetch(
    transport: Arc<dyn RestTransport>,
    inst_id: &str,
    timeframe: Timeframe,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    timeout: Duration,
    candle_tx: &mpsc::Sender<Candle>,
) -> ExchangeResult<()> {
    let bar = timeframe.to_okx_bar();
    let mut cursor = start.timestamp() * 1000;
    let n_end = end.timestamp() * 1000;
    let mut prev_cursor = 0i64;

    loop {
        let window_end = cursor + PAGE_SPAN_MS;
        let query = format!(
            "instId={}&bar={}&before={}&after={}",
            inst_id, bar, cursor, window_end
        );
        let raw = transport
            .send_signed(Method::GET, PATH_HISTORY_CANDLES, &query, None, timeout)
            .await?;

        let rows = match parse_response::<CandleRow>(&raw) {
            Ok(resp) => resp.data,
            Err(e) if e.is_rate_limit() => {
                debug!(%inst_id, "rate limited, retrying window after backoff");
                tokio::time::sleep(RATE_LIMIT_BACKOFF).await;
                continue;
            }
            Err(e) => return Err(e),
        };
        let candles = rows
            .iter()
            .map(candle_from_row)
            .collect::<ExchangeResult<Vec<_>>>()?;

        let (emitted, next) = advance_page(candles, prev_cursor, cursor, window_end);
        for candle in emitted {
            if candle_tx.send(candle).await.is_err() {
                // 수신 측이 사라졌으면 더 가져올 이유가 없습니다.
                return Ok(());
            }
        }

        cursor = next;
        if cursor >= n_end || cursor <= prev_cursor {
            break;
        }
        prev_cursor = cursor;
    }
    Ok(())
}
