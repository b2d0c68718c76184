//! 현재 시각 추상화.
//!
//! 수집 구간 계산과 스냅샷 타임스탬프는 모두 `Clock`을 통해 시각을 얻습니다.
//! 테스트에서는 `FixedClock`으로 경계를 고정합니다.

use chrono::{DateTime, NaiveDate, NaiveTime, SubsecRound, Utc};
use std::sync::RwLock;

/// 시각 제공자.
pub trait Clock: Send + Sync {
    /// 현재 UTC 시각.
    fn now(&self) -> DateTime<Utc>;

    /// 오늘 날짜 (UTC 기준).
    ///
    /// 거래소 현지 날짜가 아닙니다. 미국 장 마감 후 UTC 자정을 넘긴 주기
    /// (동부 시간 19~20시 이후)에는 현지 날짜보다 하루 앞선 값이 됩니다.
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// 시스템 시계.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        // PostgreSQL TIMESTAMPTZ 정밀도(마이크로초)에 맞춤
        Utc::now().trunc_subsecs(6)
    }
}

/// 고정 시계 (테스트용).
#[derive(Debug)]
pub struct FixedClock {
    now: RwLock<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    /// 주어진 날짜의 자정(UTC)으로 고정된 시계를 생성합니다.
    pub fn at_date(date: NaiveDate) -> Self {
        Self::new(date.and_time(NaiveTime::MIN).and_utc())
    }

    /// 시각을 변경합니다.
    pub fn set(&self, now: DateTime<Utc>) {
        if let Ok(mut guard) = self.now.write() {
            *guard = now;
        }
    }

    /// 시각을 앞으로 이동합니다.
    pub fn advance(&self, by: chrono::Duration) {
        if let Ok(mut guard) = self.now.write() {
            *guard += by;
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
            .read()
            .map(|guard| *guard)
            .unwrap_or_else(|poisoned| *poisoned.into_inner())
    }
}
