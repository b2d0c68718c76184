//! 설정으로부터 업스트림 제공자를 구성합니다.

use optchain_data::{
    ApiCredential, FmpHoldingsProvider, HoldingsProvider, OptionChainProvider, RateLimitedClient,
    RateLimiter, TradierChainProvider,
};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;

use crate::config::CollectorConfig;
use crate::Result;

/// 수집에 사용하는 제공자 묶음.
///
/// 제공자마다 호출 한도 객체가 하나씩 있으며, 해당 제공자를 호출하는 모든
/// 작업이 이를 공유합니다.
#[derive(Clone)]
pub struct ProviderSet {
    pub chains: Arc<dyn OptionChainProvider>,
    pub holdings: Arc<dyn HoldingsProvider>,
}

impl ProviderSet {
    pub fn new(
        chains: Arc<dyn OptionChainProvider>,
        holdings: Arc<dyn HoldingsProvider>,
    ) -> Self {
        Self { chains, holdings }
    }

    /// Tradier(체인)와 FMP(보유 종목) 클라이언트를 생성합니다.
    pub fn from_config(config: &CollectorConfig) -> Result<Self> {
        let timeout = config.collect.http_timeout();

        let tradier = RateLimitedClient::new(
            config.tradier.base_url.clone(),
            ApiCredential::Bearer(SecretString::from(
                config.tradier.api_key.expose_secret().to_string(),
            )),
            RateLimiter::shared("tradier", config.tradier.rate_limit.clone()),
            timeout,
        )?;

        let fmp = RateLimitedClient::new(
            config.fmp.base_url.clone(),
            ApiCredential::QueryParam {
                name: "apikey",
                value: SecretString::from(config.fmp.api_key.expose_secret().to_string()),
            },
            RateLimiter::shared("fmp", config.fmp.rate_limit.clone()),
            timeout,
        )?;

        tracing::info!(
            tradier_url = %config.tradier.base_url,
            tradier_limit = config.tradier.rate_limit.max_calls,
            fmp_url = %config.fmp.base_url,
            fmp_limit = config.fmp.rate_limit.max_calls,
            period_secs = config.tradier.rate_limit.period.as_secs(),
            "업스트림 제공자 구성 완료"
        );

        Ok(Self::new(
            Arc::new(TradierChainProvider::new(tradier)),
            Arc::new(FmpHoldingsProvider::new(fmp)),
        ))
    }
}

impl std::fmt::Debug for ProviderSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSet")
            .field("chains", &self.chains.name())
            .field("holdings", &self.holdings.name())
            .finish()
    }
}
