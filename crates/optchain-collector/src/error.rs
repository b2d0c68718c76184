//! 에러 타입 정의.

use optchain_core::ConfigError;
use optchain_data::{FetchError, StoreError};
use thiserror::Error;

/// Collector 에러 타입
#[derive(Debug, Error)]
pub enum CollectorError {
    /// 설정 에러
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// 데이터베이스 에러
    #[error("Database error: {0}")]
    Database(#[from] StoreError),

    /// 데이터 소스 에러 (Tradier, FMP)
    #[error("Data source error: {0}")]
    DataSource(#[from] FetchError),
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, CollectorError>;
