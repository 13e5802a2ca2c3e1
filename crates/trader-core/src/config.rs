//! 설정 관리.
//!
//! 이 모듈은 애플리케이션 설정을 정의하고 관리합니다.
//! 설정은 TOML 파일에서 로드되며 `TRADER__` 접두사의 환경 변수로
//! 오버라이드할 수 있습니다.

use crate::error::{TraderError, TraderResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// 애플리케이션 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// 로깅 설정
    #[serde(default)]
    pub logging: LoggingConfig,
    /// 거래소 설정 (이름 → 설정)
    #[serde(default)]
    pub exchanges: HashMap<String, ExchangeSettings>,
    /// HTTP/WebSocket 프록시 URL (선택)
    #[serde(default)]
    pub proxy: Option<String>,
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// 거래소별 자격증명 및 거래 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExchangeSettings {
    /// 이 거래소 활성화 여부
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// API 키
    pub key: String,
    /// API 시크릿
    pub secret: String,
    /// API 패스프레이즈
    #[serde(default)]
    pub passphrase: String,
    /// 거래 모드 (isolated, cross, cash)
    #[serde(default = "default_td_mode")]
    pub td_mode: String,
    /// 단방향 포지션 모드 사용 여부
    #[serde(default = "default_simple")]
    pub simple: bool,
    /// 상품 유형 (SPOT, MARGIN, SWAP, FUTURES, OPTION)
    #[serde(default = "default_inst_type")]
    pub inst_type: String,
}

fn default_enabled() -> bool {
    true
}

fn default_td_mode() -> String {
    "isolated".to_string()
}

fn default_simple() -> bool {
    true
}

fn default_inst_type() -> String {
    "SWAP".to_string()
}

impl AppConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> TraderResult<Self> {
        let builder = config::Config::builder()
            // 기본값으로 시작
            .set_default("logging.level", "info")
            .map_err(|e| TraderError::Config(e.to_string()))?
            .set_default("logging.format", "pretty")
            .map_err(|e| TraderError::Config(e.to_string()))?
            // 파일에서 로드
            .add_source(config::File::from(path.as_ref()))
            // 환경 변수로 오버라이드
            .add_source(
                config::Environment::with_prefix("TRADER")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder
            .build()
            .map_err(|e| TraderError::Config(e.to_string()))?;
        config
            .try_deserialize()
            .map_err(|e| TraderError::Config(e.to_string()))
    }

    /// 기본 경로에서 설정을 로드합니다.
    pub fn load_default() -> TraderResult<Self> {
        Self::load("config/default.toml")
    }

    /// 이름으로 거래소 설정을 조회합니다.
    pub fn exchange(&self, name: &str) -> Option<&ExchangeSettings> {
        self.exchanges.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exchange_settings_defaults() {
        let raw = r#"{"key": "k", "secret": "s", "passphrase": "p"}"#;
        let settings: ExchangeSettings = serde_json::from_str(raw).unwrap();
        assert!(settings.enabled);
        assert_eq!(settings.td_mode, "isolated");
        assert!(settings.simple);
        assert_eq!(settings.inst_type, "SWAP");
    }
}
