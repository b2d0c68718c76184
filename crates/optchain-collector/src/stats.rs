//! 수집 통계 구조체.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 한 수집 주기의 통계
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionStats {
    /// 해석된 티커 수
    pub total: usize,
    /// 모든 만기를 조회/저장한 티커 수
    pub success: usize,
    /// 일부 만기를 건너뛰고 저장한 티커 수
    pub partial: usize,
    /// 조회는 성공했지만 데이터가 없는 티커 수
    pub empty: usize,
    /// 조회 또는 저장에 실패한 티커 수
    pub errors: usize,
    /// 조회한 스냅샷 수
    pub snapshots: usize,
    /// 새로 저장된 행 수
    pub inserted: u64,
    /// 건너뛴 만기 수
    pub skipped_expirations: usize,
    /// 소요 시간
    #[serde(skip)]
    pub elapsed: Duration,
}

impl CollectionStats {
    /// 새 통계 객체 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 성공률 계산 (%). 부분 성공도 성공으로 셉니다.
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            ((self.success + self.partial) as f64 / self.total as f64) * 100.0
        }
    }

    /// 통계 요약 로그 출력
    pub fn log_summary(&self, operation: &str) {
        tracing::info!(
            operation = operation,
            total = self.total,
            success = self.success,
            partial = self.partial,
            empty = self.empty,
            errors = self.errors,
            snapshots = self.snapshots,
            inserted = self.inserted,
            skipped_expirations = self.skipped_expirations,
            success_rate = format!("{:.1}%", self.success_rate()),
            elapsed = format!("{:.1}s", self.elapsed.as_secs_f64()),
            "수집 완료"
        );
    }
}
