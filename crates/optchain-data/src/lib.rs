//! 옵션 체인 데이터 수집 및 저장.
//!
//! 이 crate는 다음을 제공합니다:
//! - 제공자별 호출 한도를 강제하는 `RateLimiter`와 `RateLimitedClient`
//! - 옵션 체인 제공자(Tradier)와 ETF 보유 종목 제공자(FMP)
//! - 일시적 오류 재시도 정책
//! - PostgreSQL 스냅샷 저장소

pub mod error;
pub mod provider;
pub mod rate_limit;
pub mod storage;

pub use error::{FetchError, FetchResult, StoreError, StoreResult};
pub use provider::{
    ApiCredential, FmpHoldingsProvider, HoldingsProvider, OptionChainProvider, RateLimitedClient,
    RetryPolicy, TradierChainProvider,
};
pub use rate_limit::{RateLimitConfig, RateLimiter};
pub use storage::{ChainStore, DatabaseConfig, SnapshotStore};
