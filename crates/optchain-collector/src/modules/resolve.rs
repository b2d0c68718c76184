//! 티커 유니버스 해석 모듈.
//!
//! 입력 순서대로 스펙을 순회하며 ETF는 보유 종목으로 전개합니다.
//! 이미 본 심볼은 출처와 무관하게 다시 추가하지 않습니다.

use chrono::NaiveDate;
use optchain_core::{normalize_symbol, ResolvedUniverse, TickerSpec};
use optchain_data::{HoldingsProvider, RetryPolicy};
use std::sync::Arc;

/// 티커 유니버스 해석기
pub struct TickerResolver {
    holdings: Arc<dyn HoldingsProvider>,
    retry: RetryPolicy,
}

impl TickerResolver {
    pub fn new(holdings: Arc<dyn HoldingsProvider>, retry: RetryPolicy) -> Self {
        Self { holdings, retry }
    }

    /// 스펙 목록을 중복 없는 티커 목록으로 해석합니다.
    ///
    /// ETF 보유 종목 조회가 실패하면 해당 ETF만 건너뜁니다.
    /// ETF 심볼 자체는 결과에 포함하지 않습니다.
    pub async fn resolve(&self, specs: &[TickerSpec], as_of: NaiveDate) -> ResolvedUniverse {
        let mut universe = ResolvedUniverse::new();

        for spec in specs {
            match spec {
                TickerSpec::Plain(symbol) => {
                    if !universe.insert(symbol.as_str()) {
                        tracing::debug!(ticker = %symbol, "중복 티커 무시");
                    }
                }
                TickerSpec::Etf(etf) => {
                    let holdings = &self.holdings;
                    let label = format!("{} holdings {}", holdings.name(), etf);
                    let result = self
                        .retry
                        .run(&label, move || holdings.holdings(etf, as_of))
                        .await;

                    match result {
                        Ok(constituents) => {
                            if constituents.is_empty() {
                                tracing::warn!(etf = %etf, as_of = %as_of, "ETF 보유 종목이 없습니다");
                                continue;
                            }

                            let total = constituents.len();
                            let added = constituents
                                .iter()
                                .filter_map(|s| normalize_symbol(s))
                                .filter(|s| universe.insert(s.as_str()))
                                .count();
                            tracing::info!(
                                etf = %etf,
                                holdings = total,
                                added,
                                "ETF 보유 종목 전개"
                            );
                        }
                        Err(e) => {
                            tracing::error!(
                                etf = %etf,
                                retryable = e.is_retryable(),
                                error = %e,
                                "ETF 보유 종목 조회 실패, 건너뜀"
                            );
                        }
                    }
                }
            }
        }

        tracing::info!(tickers = universe.len(), specs = specs.len(), "티커 유니버스 해석 완료");
        universe
    }
}
