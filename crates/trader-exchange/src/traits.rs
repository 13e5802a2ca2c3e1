//! 거래소 trait 정의.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use trader_core::{
    Candle, ExchangeEvent, Order, SubscriptionRequest, Timeframe, TradeAction,
};

use crate::error::{ExchangeError, ExchangeResult};

/// 통합 거래소 인터페이스를 위한 Exchange trait.
#[async_trait]
pub trait Exchange: Send + Sync {
    /// 거래소 이름 반환.
    fn name(&self) -> &str;

    /// 소켓 연결 및 백그라운드 태스크 시작.
    async fn start(&mut self) -> ExchangeResult<()>;

    /// 커넥터 종료. 아웃바운드 이벤트 채널과 종료 시그널을 닫습니다.
    ///
    /// 호출자는 종료 전에 watch/fetch 호출을 중단해야 합니다.
    async fn stop(&mut self) -> ExchangeResult<()>;

    // === 주문 작업 ===

    /// 트레이드 액션을 분류하고 거래소에 제출합니다.
    ///
    /// 성공 시 거래소가 확인한 주문을 반환하고 해당 부류의 캐시에
    /// 저장합니다. 실패 시 아무것도 캐시되지 않습니다.
    async fn submit(&self, action: &TradeAction) -> ExchangeResult<Order>;

    /// 기존 주문을 취소합니다.
    ///
    /// 거래소가 취소 성공을 확인한 경우에만 캐시에서 제거합니다.
    async fn cancel_order(&self, order: &Order) -> ExchangeResult<Order>;

    /// 대기 중인 전체 주문을 취소합니다.
    ///
    /// 일반 주문 취소가 성공한 경우에만 조건부 주문 취소를 시도합니다
    /// (엄격한 순차 의존, 부분 적용 보상 없음).
    async fn cancel_all_orders(&self) -> ExchangeResult<Vec<Order>>;

    // === 시장 데이터 ===

    /// 과거 캔들을 조회하는 백그라운드 태스크를 시작합니다.
    ///
    /// 캔들 채널과 에러 채널을 반환합니다. 두 채널이 모두 닫히고
    /// 에러가 수신되지 않았다면 스트림이 정상 종료된 것입니다.
    fn kline_chan(
        &self,
        inst_id: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> (mpsc::Receiver<Candle>, mpsc::Receiver<ExchangeError>);

    /// 실시간 구독을 등록합니다.
    ///
    /// 인식되지 않는 종류는 `Validation` 에러로 실패하며 아무것도
    /// 기록되거나 전송되지 않습니다.
    async fn watch(&self, request: SubscriptionRequest) -> ExchangeResult<()>;

    /// 아웃바운드 이벤트 수신 채널을 가져옵니다 (1회만 가능).
    fn take_receiver(&mut self) -> Option<mpsc::Receiver<ExchangeEvent>>;
}
