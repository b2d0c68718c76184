//! 환경변수 기반 설정 모듈.

use chrono::NaiveDate;
use optchain_core::{ConfigError, ConfigResult, FetchWindow, TickerSpec};
use optchain_data::provider::fmp::FMP_BASE_URL;
use optchain_data::provider::tradier::TRADIER_BASE_URL;
use optchain_data::{DatabaseConfig, RateLimitConfig, RetryPolicy};
use secrecy::SecretString;
use std::collections::HashMap;
use std::time::Duration;

use crate::modules::ScheduleSettings;

/// 허용하는 최대 잔존 일수 (약 10년).
const MAX_DTE_LIMIT: i64 = 3650;

/// 허용하는 최대 호출 한도 윈도우 (1일).
const MAX_RATE_LIMIT_PERIOD_SECS: u64 = 86_400;

/// Collector 전체 설정
#[derive(Debug)]
pub struct CollectorConfig {
    /// 데이터베이스 설정
    pub database: DatabaseConfig,
    /// 수집 대상 티커 스펙 (입력 순서 유지)
    pub tickers: Vec<TickerSpec>,
    /// 옵션 체인 제공자 설정
    pub tradier: ProviderConfig,
    /// ETF 보유 종목 제공자 설정
    pub fmp: ProviderConfig,
    /// 수집 설정
    pub collect: CollectConfig,
    /// 데몬 모드 설정
    pub daemon: DaemonConfig,
    /// 시작 시 기존 테이블 삭제 여부
    pub reset_existing: bool,
}

/// 업스트림 제공자 설정
#[derive(Debug)]
pub struct ProviderConfig {
    /// API 키
    pub api_key: SecretString,
    /// 기본 URL
    pub base_url: String,
    /// 호출 한도
    pub rate_limit: RateLimitConfig,
}

/// 수집 설정
#[derive(Debug, Clone)]
pub struct CollectConfig {
    /// 최소 잔존 일수
    pub min_dte: i64,
    /// 최대 잔존 일수
    pub max_dte: i64,
    /// 동시 조회 티커 수
    pub concurrency: usize,
    /// ETF 보유 종목 기준일 (없으면 매 주기 오늘)
    pub holdings_as_of: Option<NaiveDate>,
    /// 일시적 오류 재시도 정책
    pub retry: RetryPolicy,
    /// HTTP 요청 타임아웃 (초)
    pub http_timeout_secs: u64,
}

/// 데몬 모드 설정
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// 수집 주기 (초 단위)
    pub interval_secs: u64,
}

/// 스키마 준비(`bootstrap`) 전용 설정.
///
/// API 키 없이 로드됩니다. 티커는 선택 사항이며, 있으면 일반 티커별
/// 최근 수집 시각을 보고하는 데 사용합니다.
#[derive(Debug)]
pub struct BootstrapConfig {
    /// 데이터베이스 설정
    pub database: DatabaseConfig,
    /// 기존 테이블 삭제 여부
    pub reset_existing: bool,
    /// 수집 대상 티커 스펙 (`TICKERS`가 없으면 빈 목록)
    pub tickers: Vec<TickerSpec>,
}

/// CLI에서 환경변수보다 우선하는 값.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// 티커 목록 (`TICKERS`)
    pub tickers: Option<String>,
    /// 수집 주기 (`FETCH_INTERVAL_SECS`)
    pub interval_secs: Option<u64>,
    /// 기존 테이블 삭제 (`RESET_EXISTING`)
    pub reset: bool,
}

impl ConfigOverrides {
    fn apply(&self) -> HashMap<&'static str, String> {
        let mut values = HashMap::new();
        if let Some(tickers) = &self.tickers {
            values.insert("TICKERS", tickers.clone());
        }
        if let Some(interval) = self.interval_secs {
            values.insert("FETCH_INTERVAL_SECS", interval.to_string());
        }
        if self.reset {
            values.insert("RESET_EXISTING", "true".to_string());
        }
        values
    }
}

impl CollectorConfig {
    /// 환경변수에서 설정 로드
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_env_with(&ConfigOverrides::default())
    }

    /// 환경변수에서 설정을 로드하고 CLI 값을 덮어씁니다.
    pub fn from_env_with(overrides: &ConfigOverrides) -> ConfigResult<Self> {
        dotenvy::dotenv().ok();
        let overridden = overrides.apply();
        Self::from_lookup(|key| {
            overridden
                .get(key)
                .cloned()
                .or_else(|| std::env::var(key).ok())
        })
    }

    /// 스키마 작업용 설정을 로드합니다. `RESET_EXISTING`은 데몬과 같은 규칙을 따릅니다.
    pub fn bootstrap_from_env_with(overrides: &ConfigOverrides) -> ConfigResult<BootstrapConfig> {
        dotenvy::dotenv().ok();
        let overridden = overrides.apply();
        BootstrapConfig::from_lookup(|key| {
            overridden
                .get(key)
                .cloned()
                .or_else(|| std::env::var(key).ok())
        })
    }

    /// 키 조회 함수로 설정을 구성합니다.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        let env = &lookup;

        let tickers = TickerSpec::parse_list(&required(env, "TICKERS")?)?;

        let period = Duration::from_secs(env_var_parse(env, "RATE_LIMIT_PERIOD_SECS", 60u64)?);
        let tradier_limit: u32 = env_var_parse(env, "TRADIER_RATE_LIMIT", 60)?;
        let fmp_limit: u32 = env_var_parse(env, "FMP_RATE_LIMIT", 60)?;
        ensure_positive("TRADIER_RATE_LIMIT", tradier_limit as u64)?;
        ensure_positive("FMP_RATE_LIMIT", fmp_limit as u64)?;
        ensure_positive("RATE_LIMIT_PERIOD_SECS", period.as_secs())?;
        if period.as_secs() > MAX_RATE_LIMIT_PERIOD_SECS {
            return Err(ConfigError::invalid(
                "RATE_LIMIT_PERIOD_SECS",
                period.as_secs().to_string(),
                format!("{MAX_RATE_LIMIT_PERIOD_SECS}초 이하여야 합니다"),
            ));
        }

        let min_dte: i64 = env_var_parse(env, "MIN_DTE", optchain_core::DEFAULT_MIN_DTE)?;
        let max_dte: i64 = env_var_parse(env, "MAX_DTE", optchain_core::DEFAULT_MAX_DTE)?;
        if max_dte > MAX_DTE_LIMIT {
            return Err(ConfigError::invalid(
                "MAX_DTE",
                max_dte.to_string(),
                format!("{MAX_DTE_LIMIT}일 이하여야 합니다"),
            ));
        }
        let anchor = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or_default();
        FetchWindow::from_today(anchor, min_dte, max_dte)?;

        let concurrency: usize = env_var_parse(env, "COLLECTOR_CONCURRENCY", 4)?;
        ensure_positive("COLLECTOR_CONCURRENCY", concurrency as u64)?;

        let max_attempts: u32 = env_var_parse(env, "RETRY_MAX_ATTEMPTS", 3)?;
        ensure_positive("RETRY_MAX_ATTEMPTS", max_attempts as u64)?;
        let base_delay_ms: u64 = env_var_parse(env, "RETRY_BASE_DELAY_MS", 500)?;

        let holdings_as_of = match env("HOLDINGS_AS_OF").filter(|v| !v.trim().is_empty()) {
            Some(raw) => Some(
                NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
                    ConfigError::invalid("HOLDINGS_AS_OF", raw.clone(), "YYYY-MM-DD 형식이어야 합니다")
                })?,
            ),
            None => None,
        };

        let http_timeout_secs: u64 = env_var_parse(env, "HTTP_TIMEOUT_SECS", 30)?;
        ensure_positive("HTTP_TIMEOUT_SECS", http_timeout_secs)?;

        let interval_secs: u64 = env_var_parse(env, "FETCH_INTERVAL_SECS", 3600)?;
        ensure_positive("FETCH_INTERVAL_SECS", interval_secs)?;

        Ok(Self {
            database: database_from_lookup(env)?,
            tickers,
            tradier: ProviderConfig {
                api_key: SecretString::from(required(env, "TRADIER_API_KEY")?),
                base_url: env("TRADIER_BASE_URL").unwrap_or_else(|| TRADIER_BASE_URL.to_string()),
                rate_limit: RateLimitConfig::new(tradier_limit, period),
            },
            fmp: ProviderConfig {
                api_key: SecretString::from(required(env, "FMP_API_KEY")?),
                base_url: env("FMP_BASE_URL").unwrap_or_else(|| FMP_BASE_URL.to_string()),
                rate_limit: RateLimitConfig::new(fmp_limit, period),
            },
            collect: CollectConfig {
                min_dte,
                max_dte,
                concurrency,
                holdings_as_of,
                retry: RetryPolicy::new(max_attempts, Duration::from_millis(base_delay_ms)),
                http_timeout_secs,
            },
            daemon: DaemonConfig { interval_secs },
            reset_existing: env_var_bool(env, "RESET_EXISTING", false)?,
        })
    }

    /// 스케줄러 설정 생성
    pub fn schedule_settings(&self) -> ScheduleSettings {
        ScheduleSettings {
            tickers: self.tickers.clone(),
            interval: self.daemon.interval(),
            concurrency: self.collect.concurrency,
            min_dte: self.collect.min_dte,
            max_dte: self.collect.max_dte,
            holdings_as_of: self.collect.holdings_as_of,
        }
    }
}

impl BootstrapConfig {
    /// 키 조회 함수로 설정을 구성합니다.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        let env = &lookup;
        let tickers = match env("TICKERS").filter(|v| !v.trim().is_empty()) {
            Some(raw) => TickerSpec::parse_list(&raw)?,
            None => Vec::new(),
        };

        Ok(Self {
            database: database_from_lookup(env)?,
            reset_existing: env_var_bool(env, "RESET_EXISTING", false)?,
            tickers,
        })
    }

    /// 최근 수집 시각을 조회할 일반 티커 심볼
    pub fn plain_symbols(&self) -> impl Iterator<Item = &str> {
        self.tickers
            .iter()
            .filter(|spec| !spec.is_etf())
            .map(TickerSpec::symbol)
    }
}

impl CollectConfig {
    /// HTTP 타임아웃을 Duration으로 반환
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

impl DaemonConfig {
    /// 수집 주기를 Duration으로 반환
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

fn database_from_lookup(env: &dyn Fn(&str) -> Option<String>) -> ConfigResult<DatabaseConfig> {
    let defaults = DatabaseConfig::default();
    let max_connections: u32 = env_var_parse(env, "DB_MAX_CONNECTIONS", defaults.max_connections)?;
    let min_connections: u32 = env_var_parse(env, "DB_MIN_CONNECTIONS", defaults.min_connections)?;
    ensure_positive("DB_MAX_CONNECTIONS", max_connections as u64)?;
    if min_connections > max_connections {
        return Err(ConfigError::invalid(
            "DB_MIN_CONNECTIONS",
            min_connections.to_string(),
            "DB_MAX_CONNECTIONS보다 클 수 없습니다",
        ));
    }

    Ok(DatabaseConfig {
        url: env("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .map(SecretString::from),
        host: env("DB_HOST").unwrap_or(defaults.host),
        port: env_var_parse(env, "DB_PORT", defaults.port)?,
        database: env("DB_NAME").unwrap_or(defaults.database),
        user: env("DB_USER").unwrap_or(defaults.user),
        password: env("DB_PASSWORD").map(SecretString::from),
        max_connections,
        min_connections,
        connect_timeout_secs: env_var_parse(
            env,
            "DB_CONNECT_TIMEOUT_SECS",
            defaults.connect_timeout_secs,
        )?,
        idle_timeout_secs: defaults.idle_timeout_secs,
    })
}

/// 필수 값 조회
fn required(env: &dyn Fn(&str) -> Option<String>, key: &str) -> ConfigResult<String> {
    env(key)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::Missing(key.to_string()))
}

/// 값을 파싱 (없으면 기본값, 파싱 실패는 에러)
fn env_var_parse<T: std::str::FromStr>(
    env: &dyn Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> ConfigResult<T> {
    match env(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::invalid(key, raw.clone(), "숫자 형식이 아닙니다")),
        _ => Ok(default),
    }
}

/// bool 값 파싱
fn env_var_bool(
    env: &dyn Fn(&str) -> Option<String>,
    key: &str,
    default: bool,
) -> ConfigResult<bool> {
    match env(key).map(|v| v.trim().to_lowercase()) {
        None => Ok(default),
        Some(v) if v.is_empty() => Ok(default),
        Some(v) if v == "true" || v == "1" || v == "yes" => Ok(true),
        Some(v) if v == "false" || v == "0" || v == "no" => Ok(false),
        Some(v) => Err(ConfigError::invalid(key, v, "true/false 이어야 합니다")),
    }
}

fn ensure_positive(key: &str, value: u64) -> ConfigResult<()> {
    if value == 0 {
        return Err(ConfigError::invalid(key, "0", "0보다 커야 합니다"));
    }
    Ok(())
}
