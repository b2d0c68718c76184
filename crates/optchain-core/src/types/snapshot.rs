//! 옵션 계약 스냅샷.
//!
//! 한 수집 주기에 관측한 단일 옵션 계약의 시장 데이터입니다.
//! 자연 키 `(underlying, expiration, strike, option_type, fetched_at)`은 유일하며,
//! 한 번 저장된 스냅샷은 변경되지 않습니다.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 옵션 유형.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    Call,
    Put,
}

impl OptionType {
    /// DB 저장용 문자열.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Call => "call",
            Self::Put => "put",
        }
    }
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "call" | "c" => Ok(Self::Call),
            "put" | "p" => Ok(Self::Put),
            _ => Err(format!("Unknown option type: {}", s)),
        }
    }
}

/// 스냅샷 자연 키.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SnapshotKey {
    pub underlying: String,
    pub expiration: NaiveDate,
    pub strike: Decimal,
    pub option_type: OptionType,
    pub fetched_at: DateTime<Utc>,
}

/// 단일 옵션 계약 관측값.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainSnapshot {
    /// 기초자산 심볼 (예: AAPL)
    pub underlying: String,
    /// 만기일
    pub expiration: NaiveDate,
    /// 행사가
    pub strike: Decimal,
    /// 콜/풋
    pub option_type: OptionType,
    /// 매수호가
    pub bid: Option<Decimal>,
    /// 매도호가
    pub ask: Option<Decimal>,
    /// 최종 체결가
    pub last: Option<Decimal>,
    /// 거래량
    pub volume: Option<i64>,
    /// 미결제약정
    pub open_interest: Option<i64>,
    /// 내재변동성
    pub implied_volatility: Option<f64>,
    /// 최종 체결 시각 (제공자 기준)
    pub last_trade_at: Option<DateTime<Utc>>,
    /// 수집 시각
    pub fetched_at: DateTime<Utc>,
}

impl ChainSnapshot {
    /// 자연 키를 반환합니다.
    pub fn key(&self) -> SnapshotKey {
        SnapshotKey {
            underlying: self.underlying.clone(),
            expiration: self.expiration,
            strike: self.strike,
            option_type: self.option_type,
            fetched_at: self.fetched_at,
        }
    }
}
