//! 설정 관리.
//!
//! 이 모듈은 어댑터 설정을 정의하고 파일/환경 변수에서 로드합니다.
//! 모든 항목에 기본값이 있으므로 빈 설정 파일로도 동작합니다.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// 환경 변수 오버라이드 접두사 (`PERP__RETRY__MAX_ATTEMPTS=5`).
pub const ENV_PREFIX: &str = "PERP";

/// 어댑터 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AdapterConfig {
    /// 거래소 연결 설정
    #[serde(default)]
    pub exchange: ExchangeSettings,
    /// 재시도 설정
    #[serde(default)]
    pub retry: RetrySettings,
    /// 시계 동기화 설정
    #[serde(default)]
    pub clock: ClockSettings,
    /// 주문 상태 캐시 설정
    #[serde(default)]
    pub cache: CacheSettings,
    /// 로깅 설정
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 거래소 연결 설정.
///
/// # 보안
/// - `Debug` 구현은 민감 정보(`api_key`, `api_secret`)를 마스킹합니다.
#[derive(Clone, Deserialize, Serialize)]
pub struct ExchangeSettings {
    /// 거래소 이름
    #[serde(default = "default_exchange_name")]
    pub name: String,
    /// API 키
    #[serde(default)]
    pub api_key: String,
    /// API 시크릿
    #[serde(
        default = "empty_secret",
        deserialize_with = "deserialize_secret",
        skip_serializing
    )]
    pub api_secret: SecretString,
    /// 테스트넷 사용
    #[serde(default)]
    pub testnet: bool,
    /// REST 기본 URL 오버라이드
    #[serde(default)]
    pub rest_base_url: Option<String>,
    /// 수신 윈도우 (밀리초)
    #[serde(default = "default_recv_window_ms")]
    pub recv_window_ms: u64,
    /// HTTP 연결 타임아웃 (초)
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_exchange_name() -> String {
    "binance-futures".to_string()
}
fn empty_secret() -> SecretString {
    SecretString::from(String::new())
}
fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: serde::Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}
fn default_recv_window_ms() -> u64 {
    5_000
}
fn default_connect_timeout_secs() -> u64 {
    10
}

impl Default for ExchangeSettings {
    fn default() -> Self {
        Self {
            name: default_exchange_name(),
            api_key: String::new(),
            api_secret: empty_secret(),
            testnet: false,
            rest_base_url: None,
            recv_window_ms: default_recv_window_ms(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl ExchangeSettings {
    /// API 자격증명이 설정되어 있는지 확인합니다.
    pub fn has_credentials(&self) -> bool {
        !self.api_key.is_empty() && !self.api_secret.expose_secret().is_empty()
    }
}

impl fmt::Debug for ExchangeSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExchangeSettings")
            .field("name", &self.name)
            .field("api_key", &mask_key(&self.api_key))
            .field("api_secret", &"***REDACTED***")
            .field("testnet", &self.testnet)
            .field("rest_base_url", &self.rest_base_url)
            .field("recv_window_ms", &self.recv_window_ms)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

/// API 키를 로그에 남길 수 있도록 앞뒤 4자리만 남깁니다.
pub fn mask_key(key: &str) -> String {
    if key.len() > 8 && key.is_ascii() {
        format!("{}...{}", &key[..4], &key[key.len() - 4..])
    } else {
        "***REDACTED***".to_string()
    }
}

/// 재시도 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrySettings {
    /// 논리 작업당 최대 시도 횟수
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// 첫 시도 타임아웃 (밀리초)
    #[serde(default = "default_base_timeout_ms")]
    pub base_timeout_ms: u64,
    /// 시도마다 늘어나는 타임아웃 (밀리초)
    #[serde(default = "default_timeout_increment_ms")]
    pub timeout_increment_ms: u64,
    /// 백오프 기본 지연 (밀리초)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// 백오프 최대 지연 (밀리초)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_base_timeout_ms() -> u64 {
    10_000
}
fn default_timeout_increment_ms() -> u64 {
    5_000
}
fn default_base_delay_ms() -> u64 {
    500
}
fn default_max_delay_ms() -> u64 {
    2_000
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_timeout_ms: default_base_timeout_ms(),
            timeout_increment_ms: default_timeout_increment_ms(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

/// 시계 동기화 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClockSettings {
    /// 안전 마진 (밀리초). 타임스탬프가 거래소 시계보다 앞서지 않도록 항상 뺍니다.
    #[serde(default = "default_safety_margin_ms")]
    pub safety_margin_ms: i64,
    /// 재동기화 주기 (초)
    #[serde(default = "default_resync_interval_secs")]
    pub resync_interval_secs: u64,
}

fn default_safety_margin_ms() -> i64 {
    1_000
}
fn default_resync_interval_secs() -> u64 {
    30 * 60
}

impl Default for ClockSettings {
    fn default() -> Self {
        Self {
            safety_margin_ms: default_safety_margin_ms(),
            resync_interval_secs: default_resync_interval_secs(),
        }
    }
}

/// 주문 상태 캐시 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheSettings {
    /// 최대 항목 수
    #[serde(default = "default_cache_max_entries")]
    pub max_entries: usize,
    /// 항목 유효 시간 (초)
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_cache_max_entries() -> usize {
    1_000
}
fn default_cache_ttl_secs() -> u64 {
    24 * 60 * 60
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_entries: default_cache_max_entries(),
            ttl_secs: default_cache_ttl_secs(),
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// 로그 레벨
    #[serde(default = "default_log_level")]
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl AdapterConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(Self::env_source())
            .build()?
            .try_deserialize()
    }

    /// 환경 변수만으로 설정을 로드합니다.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(Self::env_source())
            .build()?
            .try_deserialize()
    }

    /// TOML 문자열에서 설정을 로드합니다.
    pub fn from_toml_str(toml: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    fn env_source() -> config::Environment {
        config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true)
    }
}
