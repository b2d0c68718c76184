//! 수집 파이프라인 통합 테스트.
//!
//! 업스트림 제공자와 저장소를 메모리 구현으로 대체하고,
//! tokio 가상 시계로 주기 대기를 건너뜁니다.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use optchain_collector::modules::{
    ChainFetcher, ScheduleSettings, Scheduler, SchedulerState, TickerResolver,
};
use optchain_core::{ChainSnapshot, Clock, FixedClock, OptionType, SnapshotKey, TickerSpec};
use optchain_data::{
    FetchError, FetchResult, HoldingsProvider, OptionChainProvider, RateLimitConfig, RateLimiter,
    RetryPolicy, SnapshotStore, StoreError, StoreResult,
};
use rust_decimal_macros::dec;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
}

fn days(n: i64) -> NaiveDate {
    today() + chrono::Duration::days(n)
}

// ==================== Fakes ====================

/// 티커별 만기/실패를 설정할 수 있는 체인 제공자
#[derive(Default)]
struct FakeChains {
    expirations: HashMap<String, Vec<NaiveDate>>,
    failing_tickers: HashSet<String>,
    failing_chains: HashSet<(String, NaiveDate)>,
    limiter: Option<Arc<RateLimiter>>,
    call_times: Mutex<Vec<tokio::time::Instant>>,
}

impl FakeChains {
    fn ticker(mut self, ticker: &str, expirations: &[NaiveDate]) -> Self {
        self.expirations
            .insert(ticker.to_string(), expirations.to_vec());
        self
    }

    fn failing_ticker(mut self, ticker: &str) -> Self {
        self.failing_tickers.insert(ticker.to_string());
        self
    }

    fn failing_chain(mut self, ticker: &str, expiration: NaiveDate) -> Self {
        self.failing_chains.insert((ticker.to_string(), expiration));
        self
    }

    fn limited(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    async fn record_call(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.acquire().await;
        }
        self.call_times
            .lock()
            .unwrap()
            .push(tokio::time::Instant::now());
    }
}

#[async_trait]
impl OptionChainProvider for FakeChains {
    fn name(&self) -> &str {
        "fake-chains"
    }

    async fn expirations(&self, ticker: &str) -> FetchResult<Vec<NaiveDate>> {
        self.record_call().await;
        if self.failing_tickers.contains(ticker) {
            return Err(FetchError::Permanent(format!("{ticker}: 404")));
        }
        Ok(self.expirations.get(ticker).cloned().unwrap_or_default())
    }

    async fn chain(
        &self,
        ticker: &str,
        expiration: NaiveDate,
        fetched_at: DateTime<Utc>,
    ) -> FetchResult<Vec<ChainSnapshot>> {
        self.record_call().await;
        if self
            .failing_chains
            .contains(&(ticker.to_string(), expiration))
        {
            return Err(FetchError::Permanent("400 bad expiration".into()));
        }
        Ok([dec!(95), dec!(100)]
            .into_iter()
            .flat_map(|strike| {
                [OptionType::Call, OptionType::Put].map(|option_type| ChainSnapshot {
                    underlying: ticker.to_string(),
                    expiration,
                    strike,
                    option_type,
                    bid: Some(dec!(1.10)),
                    ask: Some(dec!(1.20)),
                    last: Some(dec!(1.15)),
                    volume: Some(42),
                    open_interest: Some(420),
                    implied_volatility: Some(0.25),
                    last_trade_at: None,
                    fetched_at,
                })
            })
            .collect())
    }
}

#[derive(Default)]
struct FakeHoldings {
    holdings: HashMap<String, Vec<String>>,
}

impl FakeHoldings {
    fn etf(mut self, etf: &str, symbols: &[&str]) -> Self {
        self.holdings.insert(
            etf.to_string(),
            symbols.iter().map(|s| s.to_string()).collect(),
        );
        self
    }
}

#[async_trait]
impl HoldingsProvider for FakeHoldings {
    fn name(&self) -> &str {
        "fake-holdings"
    }

    async fn holdings(&self, etf: &str, _as_of: NaiveDate) -> FetchResult<Vec<String>> {
        self.holdings
            .get(etf)
            .cloned()
            .ok_or_else(|| FetchError::Permanent(format!("{etf}: unknown ETF")))
    }
}

/// 자연 키로 중복을 무시하는 메모리 저장소
#[derive(Default)]
struct MemoryStore {
    rows: Mutex<HashSet<SnapshotKey>>,
    batches: Mutex<Vec<String>>,
    failing_tickers: HashSet<String>,
    /// 설정되면 upsert가 끝나지 않음 (진행 중 취소 테스트용)
    hang: bool,
}

impl MemoryStore {
    fn failing(ticker: &str) -> Self {
        Self {
            failing_tickers: [ticker.to_string()].into_iter().collect(),
            ..Default::default()
        }
    }

    fn hanging() -> Self {
        Self {
            hang: true,
            ..Default::default()
        }
    }

    fn row_count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    fn tickers(&self) -> Vec<String> {
        let mut tickers = self.batches.lock().unwrap().clone();
        tickers.sort();
        tickers
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn upsert(&self, snapshots: &[ChainSnapshot]) -> StoreResult<u64> {
        let ticker = snapshots
            .first()
            .map(|s| s.underlying.clone())
            .unwrap_or_default();

        if self.failing_tickers.contains(&ticker) {
            return Err(StoreError::Query("deadlock detected".into()));
        }
        if self.hang {
            std::future::pending::<()>().await;
        }

        // 배치 단위 원자성: 모두 계산한 뒤 한 번에 반영
        let mut rows = self.rows.lock().unwrap();
        let inserted = snapshots
            .iter()
            .filter(|s| rows.insert(s.key()))
            .count();
        self.batches.lock().unwrap().push(ticker);
        Ok(inserted as u64)
    }
}

// ==================== Helpers ====================

fn settings(tickers: &str) -> ScheduleSettings {
    ScheduleSettings {
        tickers: TickerSpec::parse_list(tickers).unwrap(),
        interval: Duration::from_secs(3600),
        concurrency: 4,
        min_dte: 1,
        max_dte: 90,
        holdings_as_of: None,
    }
}

fn build(
    settings: ScheduleSettings,
    chains: FakeChains,
    holdings: FakeHoldings,
    store: Arc<MemoryStore>,
    clock: Arc<FixedClock>,
) -> Scheduler {
    let retry = RetryPolicy::new(2, Duration::from_millis(50));
    Scheduler::new(
        settings,
        TickerResolver::new(Arc::new(holdings), retry.clone()),
        ChainFetcher::new(Arc::new(chains), retry),
        store,
        clock,
    )
    .unwrap()
}

fn fixed_clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::at_date(today()))
}

// ==================== Tests ====================

#[tokio::test]
async fn test_etf_holdings_are_collected_once() {
    let chains = FakeChains::default()
        .ticker("AAPL", &[days(7)])
        .ticker("MSFT", &[days(7)])
        .ticker("GOOG", &[days(7)]);
    let holdings = FakeHoldings::default().etf("SPY", &["AAPL", "GOOG"]);
    let store = Arc::new(MemoryStore::default());

    let scheduler = build(
        settings("AAPL,MSFT,SPY.ETF"),
        chains,
        holdings,
        store.clone(),
        fixed_clock(),
    );
    let stats = scheduler.run_tick().await;

    assert_eq!(stats.total, 3);
    assert_eq!(stats.success, 3);
    assert_eq!(store.tickers(), vec!["AAPL", "GOOG", "MSFT"]);
    // 티커당 1만기 × 행사가 2 × 콜/풋
    assert_eq!(store.row_count(), 12);
}

#[tokio::test]
async fn test_failed_ticker_does_not_block_others() {
    let chains = FakeChains::default()
        .ticker("AAPL", &[days(7)])
        .ticker("MSFT", &[days(7)])
        .failing_ticker("DELISTED");
    let store = Arc::new(MemoryStore::default());

    let scheduler = build(
        settings("AAPL,DELISTED,MSFT"),
        chains,
        FakeHoldings::default(),
        store.clone(),
        fixed_clock(),
    );
    let stats = scheduler.run_tick().await;

    assert_eq!(stats.total, 3);
    assert_eq!(stats.success, 2);
    assert_eq!(stats.errors, 1);
    assert_eq!(store.tickers(), vec!["AAPL", "MSFT"]);
}

#[tokio::test]
async fn test_failed_expiration_yields_partial_batch() {
    let chains = FakeChains::default()
        .ticker("AAPL", &[days(7), days(14), days(21)])
        .failing_chain("AAPL", days(14));
    let store = Arc::new(MemoryStore::default());

    let scheduler = build(
        settings("AAPL"),
        chains,
        FakeHoldings::default(),
        store.clone(),
        fixed_clock(),
    );
    let stats = scheduler.run_tick().await;

    assert_eq!(stats.partial, 1);
    assert_eq!(stats.success, 0);
    assert_eq!(stats.skipped_expirations, 1);
    assert_eq!(stats.snapshots, 8);
    assert_eq!(stats.inserted, 8);

    let expirations: HashSet<NaiveDate> = store
        .rows
        .lock()
        .unwrap()
        .iter()
        .map(|k| k.expiration)
        .collect();
    assert_eq!(expirations, [days(7), days(21)].into_iter().collect());
}

#[tokio::test]
async fn test_only_window_expirations_are_persisted() {
    let chains = FakeChains::default().ticker("AAPL", &[today(), days(30), days(91), days(365)]);
    let store = Arc::new(MemoryStore::default());

    let scheduler = build(
        settings("AAPL"),
        chains,
        FakeHoldings::default(),
        store.clone(),
        fixed_clock(),
    );
    scheduler.run_tick().await;

    assert!(store
        .rows
        .lock()
        .unwrap()
        .iter()
        .all(|k| k.expiration == days(30)));
    assert_eq!(store.row_count(), 4);
}

#[tokio::test]
async fn test_store_failure_is_contained() {
    let chains = FakeChains::default()
        .ticker("AAPL", &[days(7)])
        .ticker("MSFT", &[days(7)]);
    let store = Arc::new(MemoryStore::failing("AAPL"));

    let scheduler = build(
        settings("AAPL,MSFT"),
        chains,
        FakeHoldings::default(),
        store.clone(),
        fixed_clock(),
    );
    let stats = scheduler.run_tick().await;

    assert_eq!(stats.errors, 1);
    assert_eq!(stats.success, 1);
    assert_eq!(store.tickers(), vec!["MSFT"]);
}

#[tokio::test]
async fn test_ticker_without_options_counts_as_empty() {
    let chains = FakeChains::default().ticker("BRK.A", &[]);
    let store = Arc::new(MemoryStore::default());

    let scheduler = build(
        settings("BRK.A"),
        chains,
        FakeHoldings::default(),
        store.clone(),
        fixed_clock(),
    );
    let stats = scheduler.run_tick().await;

    assert_eq!(stats.empty, 1);
    assert_eq!(store.row_count(), 0);
    assert!(store.tickers().is_empty());
}

#[tokio::test]
async fn test_same_fetch_time_is_not_duplicated() {
    let chains = FakeChains::default().ticker("AAPL", &[days(7)]);
    let store = Arc::new(MemoryStore::default());
    let clock = fixed_clock();

    let scheduler = build(
        settings("AAPL"),
        chains,
        FakeHoldings::default(),
        store.clone(),
        clock.clone(),
    );

    assert_eq!(scheduler.run_tick().await.inserted, 4);
    assert_eq!(scheduler.run_tick().await.inserted, 0);

    // 다음 주기(새 수집 시각)는 새 행을 추가
    clock.advance(chrono::Duration::hours(1));
    assert_eq!(scheduler.run_tick().await.inserted, 4);
    assert_eq!(store.row_count(), 8);
}

#[tokio::test(start_paused = true)]
async fn test_daemon_runs_ticks_until_cancelled() {
    let chains = FakeChains::default().ticker("AAPL", &[days(7)]);
    let store = Arc::new(MemoryStore::default());
    let mut settings = settings("AAPL");
    settings.interval = Duration::from_secs(60);

    let scheduler = Arc::new(build(
        settings,
        chains,
        FakeHoldings::default(),
        store.clone(),
        fixed_clock(),
    ));
    let shutdown = CancellationToken::new();

    let handle = tokio::spawn({
        let scheduler = scheduler.clone();
        let shutdown = shutdown.clone();
        async move { scheduler.run(shutdown).await }
    });

    // 가상 시계: 3주기 + 여유
    tokio::time::sleep(Duration::from_secs(150)).await;
    shutdown.cancel();

    let ticks = handle.await.unwrap();
    assert_eq!(ticks, 3);
    assert_eq!(store.batches.lock().unwrap().len(), 3);
    assert_eq!(scheduler.state(), SchedulerState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_persist_leaves_no_rows() {
    let chains = FakeChains::default().ticker("AAPL", &[days(7)]);
    let store = Arc::new(MemoryStore::hanging());

    let scheduler = Arc::new(build(
        settings("AAPL"),
        chains,
        FakeHoldings::default(),
        store.clone(),
        fixed_clock(),
    ));
    let mut state = scheduler.subscribe();
    let shutdown = CancellationToken::new();

    let handle = tokio::spawn({
        let scheduler = scheduler.clone();
        let shutdown = shutdown.clone();
        async move { scheduler.run(shutdown).await }
    });

    state
        .wait_for(|s| *s == SchedulerState::Persisting)
        .await
        .unwrap();
    shutdown.cancel();

    assert_eq!(handle.await.unwrap(), 0);
    assert_eq!(store.row_count(), 0);
    assert_eq!(scheduler.state(), SchedulerState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_shared_rate_limit_holds_under_concurrency() {
    let limiter = RateLimiter::shared("fake", RateLimitConfig::new(5, Duration::from_secs(1)));
    let tickers = ["A", "B", "C", "D", "E", "F"];
    let mut chains = FakeChains::default().limited(limiter.clone());
    for ticker in tickers {
        chains = chains.ticker(ticker, &[days(7), days(14), days(21)]);
    }
    let chains = Arc::new(chains);
    let store = Arc::new(MemoryStore::default());

    let retry = RetryPolicy::no_retry();
    let scheduler = Scheduler::new(
        settings(&tickers.join(",")),
        TickerResolver::new(Arc::new(FakeHoldings::default()), retry.clone()),
        ChainFetcher::new(chains.clone(), retry),
        store.clone(),
        fixed_clock(),
    )
    .unwrap();

    let stats = scheduler.run_tick().await;
    assert_eq!(stats.success, 6);

    // 만기 목록 6회 + 체인 18회
    let times = chains.call_times.lock().unwrap().clone();
    assert_eq!(times.len(), 24);
    for (i, start) in times.iter().enumerate() {
        let in_window = times[i..]
            .iter()
            .filter(|t| t.duration_since(*start) < Duration::from_secs(1))
            .count();
        assert!(in_window <= 5, "1초 안에 {in_window}회 호출");
    }
}

#[tokio::test]
async fn test_clock_drives_fetch_time() {
    let chains = FakeChains::default().ticker("AAPL", &[days(7)]);
    let store = Arc::new(MemoryStore::default());
    let clock = fixed_clock();

    let scheduler = build(
        settings("AAPL"),
        chains,
        FakeHoldings::default(),
        store.clone(),
        clock.clone(),
    );
    scheduler.run_tick().await;

    assert!(store
        .rows
        .lock()
        .unwrap()
        .iter()
        .all(|k| k.fetched_at == clock.now()));
}
