//! Scheduled option chain collector.
//!
//! 이 crate는 옵션 체인을 주기적으로 수집하는 바이너리를 제공합니다:
//! - 티커 유니버스 해석 (ETF → 보유 종목 전개, 중복 제거)
//! - 만기 구간 내 옵션 체인 조회
//! - 스냅샷 저장 및 주기 스케줄링

pub mod config;
pub mod error;
pub mod modules;
pub mod providers;
pub mod stats;

pub use config::{BootstrapConfig, CollectorConfig, ConfigOverrides};
pub use error::{CollectorError, Result};
pub use providers::ProviderSet;
pub use stats::CollectionStats;
