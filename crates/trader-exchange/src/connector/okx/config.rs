//! OKX API 설정.

use std::fmt;
use std::time::Duration;
use trader_core::{ExchangeSettings, PositionMode};

/// 상품 유형: 현물.
pub const INST_TYPE_SPOT: &str = "SPOT";
/// 상품 유형: 마진.
pub const INST_TYPE_MARGIN: &str = "MARGIN";
/// 상품 유형: 무기한 스왑.
pub const INST_TYPE_SWAP: &str = "SWAP";
/// 상품 유형: 만기 선물.
pub const INST_TYPE_FUTURES: &str = "FUTURES";
/// 상품 유형: 옵션.
pub const INST_TYPE_OPTION: &str = "OPTION";

/// OKX 클라이언트 설정.
///
/// # 보안
/// - `Debug` 구현은 민감 정보(`api_key`, `api_secret`, `passphrase`)를 마스킹합니다.
#[derive(Clone)]
pub struct OkxConfig {
    /// API 키
    pub api_key: String,
    /// API 시크릿
    pub api_secret: String,
    /// API 패스프레이즈
    pub passphrase: String,
    /// 거래 모드 (isolated, cross, cash)
    pub td_mode: String,
    /// 포지션 모드 (단방향이면 posSide를 와이어에서 생략)
    pub position_mode: PositionMode,
    /// 기본 상품 유형
    pub inst_type: String,
    /// 주문 태그 및 이벤트 출처로 쓰이는 클라이언트 이름
    pub client_name: String,
    /// REST API 기본 URL
    pub rest_url: String,
    /// 퍼블릭 WebSocket URL
    pub ws_public_url: String,
    /// 프라이빗 WebSocket URL
    pub ws_private_url: String,
    /// 주문 호출 타임아웃 (초)
    pub order_timeout_secs: u64,
    /// 조회 호출 타임아웃 (초)
    pub query_timeout_secs: u64,
}

impl fmt::Debug for OkxConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let masked_key = if self.api_key.len() > 8 {
            format!(
                "{}...{}",
                &self.api_key[..4],
                &self.api_key[self.api_key.len() - 4..]
            )
        } else {
            "***REDACTED***".to_string()
        };

        f.debug_struct("OkxConfig")
            .field("api_key", &masked_key)
            .field("api_secret", &"***REDACTED***")
            .field("passphrase", &"***REDACTED***")
            .field("td_mode", &self.td_mode)
            .field("position_mode", &self.position_mode)
            .field("inst_type", &self.inst_type)
            .field("client_name", &self.client_name)
            .field("rest_url", &self.rest_url)
            .finish()
    }
}

impl OkxConfig {
    /// 새 설정 생성.
    pub fn new(
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        passphrase: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            passphrase: passphrase.into(),
            td_mode: "isolated".to_string(),
            position_mode: PositionMode::Simple,
            inst_type: INST_TYPE_SWAP.to_string(),
            client_name: "okx".to_string(),
            rest_url: "https://www.okx.com".to_string(),
            ws_public_url: "wss://ws.okx.com:8443/ws/v5/public".to_string(),
            ws_private_url: "wss://ws.okx.com:8443/ws/v5/private".to_string(),
            order_timeout_secs: 2,
            query_timeout_secs: 3,
        }
    }

    /// 거래 모드 설정.
    pub fn with_td_mode(mut self, td_mode: impl Into<String>) -> Self {
        self.td_mode = td_mode.into();
        self
    }

    /// 포지션 모드 설정.
    pub fn with_position_mode(mut self, mode: PositionMode) -> Self {
        self.position_mode = mode;
        self
    }

    /// 기본 상품 유형 설정.
    pub fn with_inst_type(mut self, inst_type: impl Into<String>) -> Self {
        self.inst_type = inst_type.into();
        self
    }

    /// 클라이언트 이름 설정.
    pub fn with_client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = name.into();
        self
    }

    /// 환경 변수에서 생성.
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("OKX_API_KEY").ok()?;
        let api_secret = std::env::var("OKX_API_SECRET").ok()?;
        let passphrase = std::env::var("OKX_API_PASSPHRASE").ok()?;

        let mut config = Self::new(api_key, api_secret, passphrase);
        if let Ok(td_mode) = std::env::var("OKX_TD_MODE") {
            config.td_mode = td_mode;
        }
        if std::env::var("OKX_SIMPLE_MODE").map(|v| v.to_lowercase() == "false") == Ok(true) {
            config.position_mode = PositionMode::Dual;
        }
        Some(config)
    }

    /// 프레임워크의 거래소 설정 항목에서 생성.
    pub fn from_settings(name: &str, settings: &ExchangeSettings) -> Self {
        let position_mode = if settings.simple {
            PositionMode::Simple
        } else {
            PositionMode::Dual
        };

        Self::new(
            settings.key.clone(),
            settings.secret.clone(),
            settings.passphrase.clone(),
        )
        .with_td_mode(settings.td_mode.clone())
        .with_position_mode(position_mode)
        .with_inst_type(settings.inst_type.clone())
        .with_client_name(name)
    }

    /// 주문 호출 타임아웃.
    pub fn order_timeout(&self) -> Duration {
        Duration::from_secs(self.order_timeout_secs)
    }

    /// 조회 호출 타임아웃.
    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    /// 단방향 포지션 모드인지 확인합니다.
    pub fn is_simple_mode(&self) -> bool {
        self.position_mode == PositionMode::Simple
    }
}
