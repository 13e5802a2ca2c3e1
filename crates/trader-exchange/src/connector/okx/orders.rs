//! 주문 수명주기 관리.
//!
//! 제출된 주문은 종류에 따라 두 개의 분리된 캐시(일반/조건부)에
//! 들어가며, 키는 거래소가 발급한 주문 id입니다. 캐시 항목은
//! 취소가 확인된 경우에만 제거됩니다. 하나의 id는 두 캐시 중
//! 정확히 한 곳에만 존재합니다.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use reqwest::Method;
use tracing::{debug, warn};

use trader_core::{Order, OrderClass, OrderStatusType, PositionSide, Side, TradeAction};

use crate::error::{ExchangeError, ExchangeResult};
use crate::transport::RestTransport;

use super::config::OkxConfig;
use super::wire::{
    parse_response, AlgoOrderAck, CancelAlgoItem, CancelOrderRequest, OrderAck,
    PendingAlgoOrder, PendingOrder, PlaceAlgoOrderRequest, PlaceOrderRequest,
};

const PATH_PLACE_ORDER: &str = "/api/v5/trade/order";
const PATH_PLACE_ALGO: &str = "/api/v5/trade/order-algo";
const PATH_CANCEL_ORDER: &str = "/api/v5/trade/cancel-order";
const PATH_CANCEL_ALGOS: &str = "/api/v5/trade/cancel-algos";
const PATH_CANCEL_BATCH: &str = "/api/v5/trade/cancel-batch-orders";
const PATH_PENDING_ORDERS: &str = "/api/v5/trade/orders-pending";
const PATH_PENDING_ALGOS: &str = "/api/v5/trade/orders-algo-pending";

/// 일반 주문의 방향을 결정합니다.
///
/// 롱이면 진입은 매수, 청산도 매수 방향(side)은 동일하게 `buy`이고
/// 포지션 방향만 달라집니다. 숏은 반대입니다.
pub(crate) fn route_immediate(action: &TradeAction) -> (Side, PositionSide) {
    if action.is_long() {
        let pos = if action.is_open() { PositionSide::Long } else { PositionSide::Short };
        (Side::Buy, pos)
    } else {
        let pos = if action.is_open() { PositionSide::Short } else { PositionSide::Long };
        (Side::Sell, pos)
    }
}

/// 손절 주문의 방향을 결정합니다. 손절은 기존 포지션을 닫는
/// 주문이므로 side와 posSide가 항상 반대입니다.
pub(crate) fn route_conditional(action: &TradeAction) -> (Side, PositionSide) {
    if action.is_long() {
        (Side::Buy, PositionSide::Short)
    } else {
        (Side::Sell, PositionSide::Long)
    }
}

#[derive(Default)]
struct OrderCaches {
    immediate: HashMap<String, Order>,
    conditional: HashMap<String, Order>,
}

/// 주문 제출/취소와 주문 캐시를 관리합니다.
pub struct OrderLifecycle {
    transport: Arc<dyn RestTransport>,
    config: OkxConfig,
    // 두 캐시를 하나의 락으로 묶어 분류 조회가 원자적이 되도록 합니다.
    caches: RwLock<OrderCaches>,
}

impl OrderLifecycle {
    pub fn new(transport: Arc<dyn RestTransport>, config: OkxConfig) -> Self {
        Self {
            transport,
            config,
            caches: RwLock::new(OrderCaches::default()),
        }
    }

    /// 주문 id가 어느 캐시에 있는지 단일 읽기 락으로 판정합니다.
    pub fn classify(&self, order_id: &str) -> Option<OrderClass> {
        let caches = self.caches.read().unwrap_or_else(|e| e.into_inner());
        if caches.immediate.contains_key(order_id) {
            Some(OrderClass::Immediate)
        } else if caches.conditional.contains_key(order_id) {
            Some(OrderClass::Conditional)
        } else {
            None
        }
    }

    /// 추적 중인 주문 수 (일반, 조건부).
    pub fn tracked(&self) -> (usize, usize) {
        let caches = self.caches.read().unwrap_or_else(|e| e.into_inner());
        (caches.immediate.len(), caches.conditional.len())
    }

    /// 트레이드 액션을 주문으로 변환해 제출합니다.
    ///
    /// 손절 의도는 조건부 주문으로, 그 외는 지정가 주문으로
    /// 나갑니다. 거래소가 접수를 확인한 경우에만 캐시에 넣습니다.
    pub async fn submit(&self, action: &TradeAction) -> ExchangeResult<Order> {
        if action.is_stop() {
            self.submit_conditional(action).await
        } else {
            self.submit_immediate(action).await
        }
    }

    async fn submit_immediate(&self, action: &TradeAction) -> ExchangeResult<Order> {
        let (side, pos_side) = route_immediate(action);
        let request = PlaceOrderRequest {
            inst_id: action.symbol.clone(),
            td_mode: self.config.td_mode.clone(),
            side: side.as_str().to_string(),
            pos_side: self.pos_side_field(pos_side),
            ord_type: "limit".to_string(),
            px: action.price.to_string(),
            // 계약 수량은 정수만 유효하므로 소수부를 버립니다.
            sz: action.amount.trunc().to_string(),
            tag: Some(self.config.client_name.clone()),
        };
        let body = serde_json::to_string(&request)
            .map_err(|e| ExchangeError::Parse(format!("order request: {}", e)))?;
        debug!(inst_id = %action.symbol, side = %side.as_str(), "placing limit order");

        let raw = self
            .transport
            .send_signed(Method::POST, PATH_PLACE_ORDER, "", Some(body), self.config.order_timeout())
            .await?;
        let resp = parse_response::<OrderAck>(&raw)?;
        let ack = single_entry(resp.data)?;
        if ack.s_code != "0" {
            return Err(ExchangeError::Api(format!("{} {}", ack.s_code, ack.s_msg)));
        }

        let order = Order {
            order_id: ack.ord_id,
            symbol: action.symbol.clone(),
            side,
            status: OrderStatusType::Open,
            price: action.price,
            amount: action.amount,
            submitted_at: Utc::now(),
            remark: None,
            class: OrderClass::Immediate,
        };
        let mut caches = self.caches.write().unwrap_or_else(|e| e.into_inner());
        caches.immediate.insert(order.order_id.clone(), order.clone());
        Ok(order)
    }

    async fn submit_conditional(&self, action: &TradeAction) -> ExchangeResult<Order> {
        let (side, pos_side) = route_conditional(action);
        let request = PlaceAlgoOrderRequest {
            inst_id: action.symbol.clone(),
            td_mode: self.config.td_mode.clone(),
            side: side.as_str().to_string(),
            pos_side: self.pos_side_field(pos_side),
            ord_type: "conditional".to_string(),
            sz: action.amount.trunc().to_string(),
            reduce_only: true,
            sl_trigger_px: action.price.to_string(),
            sl_ord_px: "-1".to_string(),
            tag: None,
        };
        let body = serde_json::to_string(&request)
            .map_err(|e| ExchangeError::Parse(format!("algo order request: {}", e)))?;
        debug!(inst_id = %action.symbol, side = %side.as_str(), "placing stop order");

        let raw = self
            .transport
            .send_signed(Method::POST, PATH_PLACE_ALGO, "", Some(body), self.config.order_timeout())
            .await?;
        let resp = parse_response::<AlgoOrderAck>(&raw)?;
        let ack = single_entry(resp.data)?;
        if ack.s_code != "0" {
            return Err(ExchangeError::Api(format!("{} {}", ack.s_code, ack.s_msg)));
        }

        let order = Order {
            order_id: ack.algo_id,
            symbol: action.symbol.clone(),
            side,
            status: OrderStatusType::Open,
            price: action.price,
            amount: action.amount,
            submitted_at: Utc::now(),
            remark: Some("stop".to_string()),
            class: OrderClass::Conditional,
        };
        let mut caches = self.caches.write().unwrap_or_else(|e| e.into_inner());
        caches.conditional.insert(order.order_id.clone(), order.clone());
        Ok(order)
    }

    /// 주문 하나를 취소합니다.
    ///
    /// 캐시에 없는 id는 원격 호출 없이 입력을 그대로 돌려줍니다.
    /// 캐시 항목은 거래소가 취소를 확인한 경우에만 제거됩니다.
    pub async fn cancel(&self, order: &Order) -> ExchangeResult<Order> {
        match self.classify(&order.order_id) {
            Some(OrderClass::Immediate) => self.cancel_immediate(order).await,
            Some(OrderClass::Conditional) => self.cancel_conditional(order).await,
            None => {
                warn!(order_id = %order.order_id, "cancel requested for untracked order");
                Ok(order.clone())
            }
        }
    }

    async fn cancel_immediate(&self, order: &Order) -> ExchangeResult<Order> {
        let request = CancelOrderRequest {
            inst_id: order.symbol.clone(),
            ord_id: order.order_id.clone(),
        };
        let body = serde_json::to_string(&request)
            .map_err(|e| ExchangeError::Parse(format!("cancel request: {}", e)))?;
        let raw = self
            .transport
            .send_signed(Method::POST, PATH_CANCEL_ORDER, "", Some(body), self.config.order_timeout())
            .await?;
        let resp = parse_response::<OrderAck>(&raw)?;

        let mut cancelled = order.clone();
        cancelled.status = OrderStatusType::Cancelled;
        if let Some(ack) = resp.data.into_iter().next() {
            cancelled.order_id = ack.ord_id;
        }
        self.evict(&order.order_id);
        Ok(cancelled)
    }

    async fn cancel_conditional(&self, order: &Order) -> ExchangeResult<Order> {
        let items = vec![CancelAlgoItem {
            inst_id: order.symbol.clone(),
            algo_id: order.order_id.clone(),
        }];
        let body = serde_json::to_string(&items)
            .map_err(|e| ExchangeError::Parse(format!("cancel algo request: {}", e)))?;
        let raw = self
            .transport
            .send_signed(Method::POST, PATH_CANCEL_ALGOS, "", Some(body), self.config.order_timeout())
            .await?;
        let resp = parse_response::<AlgoOrderAck>(&raw)?;

        let mut cancelled = order.clone();
        cancelled.status = OrderStatusType::Cancelled;
        if let Some(ack) = resp.data.into_iter().next() {
            cancelled.order_id = ack.algo_id;
        }
        self.evict(&order.order_id);
        Ok(cancelled)
    }

    /// 미체결 주문을 모두 취소합니다.
    ///
    /// 일반 주문을 먼저 취소하고, 그 단계가 성공해야만 조건부
    /// 주문으로 넘어갑니다. 앞 단계가 실패하면 조건부 주문은
    /// 건드리지 않은 채 에러를 반환합니다.
    pub async fn cancel_all(&self, inst_type: &str) -> ExchangeResult<Vec<Order>> {
        let mut cancelled = self.cancel_all_immediate(inst_type).await?;
        cancelled.extend(self.cancel_all_conditional(inst_type).await?);
        Ok(cancelled)
    }

    async fn cancel_all_immediate(&self, inst_type: &str) -> ExchangeResult<Vec<Order>> {
        let query = format!("instType={}", inst_type);
        let raw = self
            .transport
            .send_signed(Method::GET, PATH_PENDING_ORDERS, &query, None, self.config.query_timeout())
            .await?;
        let pending = parse_response::<PendingOrder>(&raw)?.data;
        if pending.is_empty() {
            return Ok(Vec::new());
        }

        let items: Vec<CancelOrderRequest> = pending
            .iter()
            .map(|p| CancelOrderRequest {
                inst_id: p.inst_id.clone(),
                ord_id: p.ord_id.clone(),
            })
            .collect();
        let body = serde_json::to_string(&items)
            .map_err(|e| ExchangeError::Parse(format!("cancel batch request: {}", e)))?;
        let raw = self
            .transport
            .send_signed(Method::POST, PATH_CANCEL_BATCH, "", Some(body), self.config.query_timeout())
            .await?;
        parse_response::<OrderAck>(&raw)?;

        let mut caches = self.caches.write().unwrap_or_else(|e| e.into_inner());
        let evicted = pending
            .iter()
            .filter_map(|p| caches.immediate.remove(&p.ord_id))
            .map(|mut o| {
                o.status = OrderStatusType::Cancelled;
                o
            })
            .collect();
        Ok(evicted)
    }

    async fn cancel_all_conditional(&self, inst_type: &str) -> ExchangeResult<Vec<Order>> {
        let query = format!("ordType=conditional&instType={}", inst_type);
        let raw = self
            .transport
            .send_signed(Method::GET, PATH_PENDING_ALGOS, &query, None, self.config.query_timeout())
            .await?;
        let pending = parse_response::<PendingAlgoOrder>(&raw)?.data;
        if pending.is_empty() {
            return Ok(Vec::new());
        }

        let items: Vec<CancelAlgoItem> = pending
            .iter()
            .map(|p| CancelAlgoItem {
                inst_id: p.inst_id.clone(),
                algo_id: p.algo_id.clone(),
            })
            .collect();
        let body = serde_json::to_string(&items)
            .map_err(|e| ExchangeError::Parse(format!("cancel algos request: {}", e)))?;
        let raw = self
            .transport
            .send_signed(Method::POST, PATH_CANCEL_ALGOS, "", Some(body), self.config.query_timeout())
            .await?;
        parse_response::<AlgoOrderAck>(&raw)?;

        let mut caches = self.caches.write().unwrap_or_else(|e| e.into_inner());
        let evicted = pending
            .iter()
            .filter_map(|p| caches.conditional.remove(&p.algo_id))
            .map(|mut o| {
                o.status = OrderStatusType::Cancelled;
                o
            })
            .collect();
        Ok(evicted)
    }

    fn pos_side_field(&self, pos_side: PositionSide) -> Option<String> {
        if self.config.is_simple_mode() {
            None
        } else {
            Some(pos_side.as_str().to_string())
        }
    }

    fn evict(&self, order_id: &str) {
        let mut caches = self.caches.write().unwrap_or_else(|e| e.into_inner());
        caches.immediate.remove(order_id);
        caches.conditional.remove(order_id);
    }
}

/// 주문 계열 응답은 항목이 정확히 하나여야 합니다.
fn single_entry<T>(mut data: Vec<T>) -> ExchangeResult<T> {
    if data.len() != 1 {
        return Err(ExchangeError::ProtocolShape(format!(
            "expected exactly one entry, got {}",
            data.len()
        )));
    }
    Ok(data.remove(0))
}
