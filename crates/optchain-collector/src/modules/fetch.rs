//! 티커별 옵션 체인 조회 모듈.

use chrono::{DateTime, NaiveDate, Utc};
use optchain_core::{ChainSnapshot, FetchWindow};
use optchain_data::{FetchResult, OptionChainProvider, RetryPolicy};
use std::sync::Arc;

/// 한 티커의 한 주기 조회 결과
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickerChain {
    /// 기초자산 심볼
    pub ticker: String,
    /// 구간 내 모든 만기의 스냅샷
    pub snapshots: Vec<ChainSnapshot>,
    /// 조회에 성공한 만기
    pub expirations: Vec<NaiveDate>,
    /// 실패로 건너뛴 만기
    pub skipped_expirations: Vec<NaiveDate>,
}

impl TickerChain {
    fn new(ticker: &str) -> Self {
        Self {
            ticker: ticker.to_string(),
            ..Default::default()
        }
    }

    /// 일부 만기를 건너뛰었는지 여부
    pub fn is_partial(&self) -> bool {
        !self.skipped_expirations.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

/// 옵션 체인 조회기
pub struct ChainFetcher {
    provider: Arc<dyn OptionChainProvider>,
    retry: RetryPolicy,
}

impl ChainFetcher {
    pub fn new(provider: Arc<dyn OptionChainProvider>, retry: RetryPolicy) -> Self {
        Self { provider, retry }
    }

    /// 구간 내 모든 만기의 체인을 조회합니다.
    ///
    /// 만기 목록 조회가 실패하면 에러를 반환합니다. 개별 만기 실패는
    /// 건너뛰고 `skipped_expirations`에 기록합니다.
    pub async fn fetch(
        &self,
        ticker: &str,
        window: &FetchWindow,
        fetched_at: DateTime<Utc>,
    ) -> FetchResult<TickerChain> {
        let provider = &self.provider;
        let label = format!("{} expirations {}", provider.name(), ticker);
        let listed = self
            .retry
            .run(&label, move || provider.expirations(ticker))
            .await?;

        let listed_count = listed.len();
        let targets: Vec<NaiveDate> = listed.into_iter().filter(|d| window.contains(*d)).collect();
        tracing::debug!(
            ticker = ticker,
            listed = listed_count,
            in_window = targets.len(),
            window = %window,
            "만기 목록 조회"
        );

        let mut chain = TickerChain::new(ticker);

        for expiration in targets {
            let label = format!("{} chain {} {}", provider.name(), ticker, expiration);
            let result = self
                .retry
                .run(&label, move || provider.chain(ticker, expiration, fetched_at))
                .await;

            match result {
                Ok(snapshots) => {
                    let before = chain.snapshots.len();
                    chain.snapshots.extend(
                        snapshots
                            .into_iter()
                            .filter(|s| window.contains(s.expiration)),
                    );
                    tracing::debug!(
                        ticker = ticker,
                        expiration = %expiration,
                        contracts = chain.snapshots.len() - before,
                        "체인 조회"
                    );
                    chain.expirations.push(expiration);
                }
                Err(e) => {
                    tracing::warn!(
                        ticker = ticker,
                        expiration = %expiration,
                        retryable = e.is_retryable(),
                        error = %e,
                        "만기 체인 조회 실패, 건너뜀"
                    );
                    chain.skipped_expirations.push(expiration);
                }
            }
        }

        Ok(chain)
    }
}
