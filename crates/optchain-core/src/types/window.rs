//! 만기 수집 구간.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// 기본 최소 잔존일수 (DTE)
pub const DEFAULT_MIN_DTE: i64 = 1;
/// 기본 최대 잔존일수 (DTE)
pub const DEFAULT_MAX_DTE: i64 = 90;

/// 수집 대상 만기일 구간 (양 끝 포함).
///
/// 매 수집 주기마다 "오늘"을 기준으로 다시 계산되며 저장되지 않습니다.
/// "오늘"은 [`Clock::today`](crate::Clock::today)의 UTC 날짜입니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchWindow {
    /// 구간 시작 (포함)
    pub start: NaiveDate,
    /// 구간 끝 (포함)
    pub end: NaiveDate,
}

impl FetchWindow {
    /// 오늘 기준 `[today + min_dte, today + max_dte]` 구간을 생성합니다.
    pub fn from_today(today: NaiveDate, min_dte: i64, max_dte: i64) -> Result<Self, ConfigError> {
        if min_dte < 0 || max_dte < min_dte {
            return Err(ConfigError::invalid(
                "MIN_DTE/MAX_DTE",
                format!("{min_dte}/{max_dte}"),
                "0 <= MIN_DTE <= MAX_DTE 이어야 합니다",
            ));
        }
        Ok(Self {
            start: today + Duration::days(min_dte),
            end: today + Duration::days(max_dte),
        })
    }

    /// 기본 DTE 범위(1~90일) 구간.
    pub fn default_for(today: NaiveDate) -> Self {
        Self {
            start: today + Duration::days(DEFAULT_MIN_DTE),
            end: today + Duration::days(DEFAULT_MAX_DTE),
        }
    }

    /// 만기일이 구간 안에 있는지 확인합니다.
    pub fn contains(&self, expiration: NaiveDate) -> bool {
        expiration >= self.start && expiration <= self.end
    }
}

impl std::fmt::Display for FetchWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{} ~ {}]", self.start, self.end)
    }
}
