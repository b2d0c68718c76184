//! 업스트림 데이터 제공자.
//!
//! 두 제공자는 모두 `RateLimitedClient`를 통해 호출되며, 수집 로직은
//! 아래 trait에만 의존합니다.

pub mod client;
pub mod fmp;
pub mod retry;
pub mod tradier;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use optchain_core::ChainSnapshot;

use crate::error::FetchResult;

pub use client::{ApiCredential, RateLimitedClient};
pub use fmp::FmpHoldingsProvider;
pub use retry::RetryPolicy;
pub use tradier::TradierChainProvider;

/// 옵션 체인 제공자.
#[async_trait]
pub trait OptionChainProvider: Send + Sync {
    /// Provider 이름.
    fn name(&self) -> &str;

    /// 티커의 상장 만기일 목록.
    async fn expirations(&self, ticker: &str) -> FetchResult<Vec<NaiveDate>>;

    /// 한 만기의 전체 체인 (콜 + 풋).
    ///
    /// 반환되는 스냅샷의 `fetched_at`은 인자로 받은 값입니다.
    async fn chain(
        &self,
        ticker: &str,
        expiration: NaiveDate,
        fetched_at: DateTime<Utc>,
    ) -> FetchResult<Vec<ChainSnapshot>>;
}

/// ETF 보유 종목 제공자.
#[async_trait]
pub trait HoldingsProvider: Send + Sync {
    /// Provider 이름.
    fn name(&self) -> &str;

    /// 기준일 현재 ETF 구성 종목 심볼 목록 (정규화됨, 중복 가능).
    async fn holdings(&self, etf: &str, as_of: NaiveDate) -> FetchResult<Vec<String>>;
}
