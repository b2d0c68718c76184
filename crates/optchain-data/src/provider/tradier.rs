//! Tradier 옵션 체인 제공자.
//!
//! # 엔드포인트
//!
//! - `GET /markets/options/expirations?symbol=` - 만기일 목록
//! - `GET /markets/options/chains?symbol=&expiration=&greeks=true` - 만기별 체인
//!
//! 응답은 항목이 하나일 때 배열 대신 단일 객체를 돌려주고, 데이터가 없을 때는
//! `null`을 돌려주므로 두 경우 모두 허용합니다.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use optchain_core::{ChainSnapshot, OptionType};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;

use super::client::RateLimitedClient;
use super::OptionChainProvider;
use crate::error::{FetchError, FetchResult};

/// Tradier 운영 API 기본 URL.
pub const TRADIER_BASE_URL: &str = "https://api.tradier.com/v1";

const EXPIRATIONS_ENDPOINT: &str = "markets/options/expirations";
const CHAINS_ENDPOINT: &str = "markets/options/chains";

/// 단일 객체 또는 배열.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Self::Many(v) => v,
            Self::One(v) => vec![v],
        }
    }
}

#[derive(Debug, Deserialize)]
struct ExpirationsEnvelope {
    expirations: Option<ExpirationsNode>,
}

#[derive(Debug, Deserialize)]
struct ExpirationsNode {
    #[serde(default)]
    date: Option<OneOrMany<String>>,
}

#[derive(Debug, Deserialize)]
struct ChainEnvelope {
    options: Option<ChainNode>,
}

#[derive(Debug, Deserialize)]
struct ChainNode {
    #[serde(default)]
    option: Option<OneOrMany<RawOption>>,
}

#[derive(Debug, Deserialize)]
struct RawOption {
    #[serde(default)]
    symbol: Option<String>,
    strike: Option<f64>,
    option_type: Option<String>,
    #[serde(default)]
    expiration_date: Option<String>,
    #[serde(default)]
    bid: Option<f64>,
    #[serde(default)]
    ask: Option<f64>,
    #[serde(default)]
    last: Option<f64>,
    #[serde(default)]
    volume: Option<i64>,
    #[serde(default)]
    open_interest: Option<i64>,
    /// 최종 체결 시각 (epoch 밀리초, 체결 없으면 0)
    #[serde(default)]
    trade_date: Option<i64>,
    #[serde(default)]
    greeks: Option<RawGreeks>,
}

#[derive(Debug, Deserialize)]
struct RawGreeks {
    #[serde(default)]
    mid_iv: Option<f64>,
    #[serde(default)]
    smv_vol: Option<f64>,
}

/// Tradier 기반 옵션 체인 제공자.
#[derive(Debug)]
pub struct TradierChainProvider {
    client: RateLimitedClient,
}

impl TradierChainProvider {
    pub fn new(client: RateLimitedClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &RateLimitedClient {
        &self.client
    }
}

#[async_trait]
impl OptionChainProvider for TradierChainProvider {
    fn name(&self) -> &str {
        "tradier"
    }

    async fn expirations(&self, ticker: &str) -> FetchResult<Vec<NaiveDate>> {
        let body = self
            .client
            .call(EXPIRATIONS_ENDPOINT, &[("symbol", ticker)])
            .await?;
        parse_expirations(body)
    }

    async fn chain(
        &self,
        ticker: &str,
        expiration: NaiveDate,
        fetched_at: DateTime<Utc>,
    ) -> FetchResult<Vec<ChainSnapshot>> {
        let expiration_str = expiration.format("%Y-%m-%d").to_string();
        let body = self
            .client
            .call(
                CHAINS_ENDPOINT,
                &[
                    ("symbol", ticker),
                    ("expiration", expiration_str.as_str()),
                    ("greeks", "true"),
                ],
            )
            .await?;

        let snapshots = parse_chain(body, ticker, expiration, fetched_at)?;
        if snapshots.is_empty() {
            tracing::warn!(
                ticker = ticker,
                expiration = %expiration,
                "옵션 데이터 없음"
            );
        }
        Ok(snapshots)
    }
}

fn parse_expirations(body: serde_json::Value) -> FetchResult<Vec<NaiveDate>> {
    let envelope: ExpirationsEnvelope = serde_json::from_value(body)?;

    let raw_dates = envelope
        .expirations
        .and_then(|node| node.date)
        .map(OneOrMany::into_vec)
        .unwrap_or_default();

    let mut dates = raw_dates
        .iter()
        .map(|d| {
            NaiveDate::parse_from_str(d, "%Y-%m-%d")
                .map_err(|e| FetchError::Permanent(format!("잘못된 만기일 '{d}': {e}")))
        })
        .collect::<FetchResult<Vec<_>>>()?;

    dates.sort();
    dates.dedup();
    Ok(dates)
}

fn parse_chain(
    body: serde_json::Value,
    ticker: &str,
    expiration: NaiveDate,
    fetched_at: DateTime<Utc>,
) -> FetchResult<Vec<ChainSnapshot>> {
    let envelope: ChainEnvelope = serde_json::from_value(body)?;

    let raw = envelope
        .options
        .and_then(|node| node.option)
        .map(OneOrMany::into_vec)
        .unwrap_or_default();

    let snapshots = raw
        .into_iter()
        .filter_map(|opt| {
            let snapshot = to_snapshot(&opt, ticker, expiration, fetched_at);
            if snapshot.is_none() {
                tracing::debug!(
                    ticker = ticker,
                    contract = ?opt.symbol,
                    "행사가/옵션 유형 누락, 계약 건너뜀"
                );
            }
            snapshot
        })
        .collect();

    Ok(snapshots)
}

fn to_snapshot(
    opt: &RawOption,
    ticker: &str,
    expiration: NaiveDate,
    fetched_at: DateTime<Utc>,
) -> Option<ChainSnapshot> {
    let strike = opt.strike.and_then(decimal)?;
    let option_type: OptionType = opt.option_type.as_deref()?.parse().ok()?;

    let expiration = opt
        .expiration_date
        .as_deref()
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        .unwrap_or(expiration);

    let implied_volatility = opt
        .greeks
        .as_ref()
        .and_then(|g| g.mid_iv.or(g.smv_vol));

    let last_trade_at = opt
        .trade_date
        .filter(|ms| *ms > 0)
        .and_then(DateTime::from_timestamp_millis);

    Some(ChainSnapshot {
        underlying: ticker.to_string(),
        expiration,
        strike,
        option_type,
        bid: opt.bid.and_then(decimal),
        ask: opt.ask.and_then(decimal),
        last: opt.last.and_then(decimal),
        volume: opt.volume,
        open_interest: opt.open_interest,
        implied_volatility,
        last_trade_at,
        fetched_at,
    })
}

fn decimal(value: f64) -> Option<Decimal> {
    Decimal::from_f64(value).map(|d| d.normalize())
}
