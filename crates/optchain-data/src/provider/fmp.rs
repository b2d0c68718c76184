//! Financial Modeling Prep ETF 보유 종목 제공자.
//!
//! `GET /api/v4/etf-holdings?symbol=&date=&apikey=`
//!
//! 응답은 보유 종목 객체 배열입니다. 현금/선물 등 심볼이 없는 항목은 건너뜁니다.

use async_trait::async_trait;
use chrono::NaiveDate;
use optchain_core::normalize_symbol;
use serde::Deserialize;

use super::client::RateLimitedClient;
use super::HoldingsProvider;
use crate::error::{FetchError, FetchResult};

/// FMP 운영 API 기본 URL.
pub const FMP_BASE_URL: &str = "https://financialmodelingprep.com";

const HOLDINGS_ENDPOINT: &str = "api/v4/etf-holdings";

#[derive(Debug, Deserialize)]
struct RawHolding {
    #[serde(default)]
    symbol: Option<String>,
}

/// FMP 기반 ETF 보유 종목 제공자.
#[derive(Debug)]
pub struct FmpHoldingsProvider {
    client: RateLimitedClient,
}

impl FmpHoldingsProvider {
    pub fn new(client: RateLimitedClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HoldingsProvider for FmpHoldingsProvider {
    fn name(&self) -> &str {
        "fmp"
    }

    async fn holdings(&self, etf: &str, as_of: NaiveDate) -> FetchResult<Vec<String>> {
        let date = as_of.format("%Y-%m-%d").to_string();
        let body = self
            .client
            .call(HOLDINGS_ENDPOINT, &[("symbol", etf), ("date", date.as_str())])
            .await?;

        let symbols = parse_holdings(body)?;
        tracing::debug!(etf = etf, as_of = %as_of, count = symbols.len(), "ETF 보유 종목 조회");
        Ok(symbols)
    }
}

fn parse_holdings(body: serde_json::Value) -> FetchResult<Vec<String>> {
    if !body.is_array() {
        // FMP는 오류를 200 + {"Error Message": "..."} 형태로 돌려주기도 함
        return Err(FetchError::Permanent(format!(
            "ETF 보유 종목 응답이 배열이 아닙니다: {}",
            body.to_string().chars().take(200).collect::<String>()
        )));
    }

    let holdings: Vec<RawHolding> = serde_json::from_value(body)?;
    Ok(holdings
        .into_iter()
        .filter_map(|h| h.symbol.as_deref().and_then(normalize_symbol))
        .collect())
}
