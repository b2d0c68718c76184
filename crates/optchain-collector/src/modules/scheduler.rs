//! 수집 주기 스케줄러.
//!
//! 주기마다 해석 → 조회 → 저장을 실행하고 설정된 간격만큼 대기합니다.
//! 티커 조회는 제한된 개수만 동시에 실행되며, 결과는 도착하는 대로
//! 제어 루프가 하나씩 저장합니다.

use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use optchain_core::{collect_span, Clock, ConfigError, ConfigResult, FetchWindow, TickerSpec};
use optchain_data::SnapshotStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::fetch::{ChainFetcher, TickerChain};
use super::resolve::TickerResolver;
use crate::CollectionStats;

/// 스케줄러 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// 시작 전
    Idle,
    /// 티커 유니버스 해석 중
    Resolving,
    /// 체인 조회 중
    Fetching,
    /// 배치 저장 중
    Persisting,
    /// 다음 주기 대기 중
    Sleeping,
    /// 종료됨
    Stopped,
}

/// 스케줄러 설정
#[derive(Debug, Clone)]
pub struct ScheduleSettings {
    /// 수집 대상 스펙
    pub tickers: Vec<TickerSpec>,
    /// 주기 간 대기 시간
    pub interval: Duration,
    /// 동시 조회 티커 수
    pub concurrency: usize,
    /// 최소 잔존 일수
    pub min_dte: i64,
    /// 최대 잔존 일수
    pub max_dte: i64,
    /// ETF 보유 종목 기준일 (없으면 오늘)
    pub holdings_as_of: Option<NaiveDate>,
}

/// 옵션 체인 수집 스케줄러
pub struct Scheduler {
    settings: ScheduleSettings,
    resolver: TickerResolver,
    fetcher: ChainFetcher,
    store: Arc<dyn SnapshotStore>,
    clock: Arc<dyn Clock>,
    state: watch::Sender<SchedulerState>,
}

impl Scheduler {
    pub fn new(
        settings: ScheduleSettings,
        resolver: TickerResolver,
        fetcher: ChainFetcher,
        store: Arc<dyn SnapshotStore>,
        clock: Arc<dyn Clock>,
    ) -> ConfigResult<Self> {
        if settings.concurrency == 0 {
            return Err(ConfigError::invalid(
                "COLLECTOR_CONCURRENCY",
                "0",
                "0보다 커야 합니다",
            ));
        }
        // 구간 설정은 여기서 한 번 검증
        FetchWindow::from_today(clock.today(), settings.min_dte, settings.max_dte)?;

        let (state, _) = watch::channel(SchedulerState::Idle);
        Ok(Self {
            settings,
            resolver,
            fetcher,
            store,
            clock,
            state,
        })
    }

    /// 상태 변경 구독
    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    /// 현재 상태
    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    fn set_state(&self, state: SchedulerState) {
        self.state.send_replace(state);
    }

    /// 한 주기를 실행합니다.
    ///
    /// 티커 단위 실패는 통계에만 반영되고 주기는 계속됩니다.
    pub async fn run_tick(&self) -> CollectionStats {
        let started = tokio::time::Instant::now();
        let mut stats = CollectionStats::new();

        // 한 주기의 모든 스냅샷은 같은 수집 시각을 공유
        let fetched_at = self.clock.now();
        let today = self.clock.today();
        let window = FetchWindow::from_today(today, self.settings.min_dte, self.settings.max_dte)
            .unwrap_or_else(|_| FetchWindow::default_for(today));
        let as_of = self.settings.holdings_as_of.unwrap_or(today);

        self.set_state(SchedulerState::Resolving);
        let universe = self.resolver.resolve(&self.settings.tickers, as_of).await;
        stats.total = universe.len();

        if universe.is_empty() {
            tracing::warn!("수집할 티커가 없습니다");
        }

        tracing::info!(
            tickers = universe.len(),
            window = %window,
            fetched_at = %fetched_at,
            "=== 수집 주기 시작 ==="
        );

        self.set_state(SchedulerState::Fetching);
        let fetcher = &self.fetcher;
        let window = &window;
        let mut results = stream::iter(universe.into_vec())
            .map(|ticker: String| async move {
                let result = fetcher
                    .fetch(&ticker, window, fetched_at)
                    .instrument(collect_span!("fetch_chain", ticker))
                    .await;
                (ticker, result)
            })
            .buffer_unordered(self.settings.concurrency);

        while let Some((ticker, result)) = results.next().await {
            match result {
                Ok(chain) => {
                    self.set_state(SchedulerState::Persisting);
                    self.persist(chain, &mut stats).await;
                    self.set_state(SchedulerState::Fetching);
                }
                Err(e) => {
                    stats.errors += 1;
                    tracing::error!(
                        ticker = %ticker,
                        retryable = e.is_retryable(),
                        error = %e,
                        "만기 목록 조회 실패, 이번 주기에서 제외"
                    );
                }
            }
        }

        stats.elapsed = started.elapsed();
        stats
    }

    async fn persist(&self, chain: TickerChain, stats: &mut CollectionStats) {
        stats.snapshots += chain.snapshots.len();
        stats.skipped_expirations += chain.skipped_expirations.len();

        if chain.is_empty() {
            if chain.is_partial() {
                // 조회한 만기가 모두 실패
                stats.errors += 1;
                tracing::warn!(
                    ticker = %chain.ticker,
                    skipped = chain.skipped_expirations.len(),
                    "모든 만기 조회 실패"
                );
            } else {
                stats.empty += 1;
                tracing::warn!(ticker = %chain.ticker, "구간 내 옵션 데이터 없음");
            }
            return;
        }

        match self.store.upsert(&chain.snapshots).await {
            Ok(inserted) => {
                stats.inserted += inserted;
                if chain.is_partial() {
                    stats.partial += 1;
                } else {
                    stats.success += 1;
                }
                tracing::info!(
                    ticker = %chain.ticker,
                    expirations = chain.expirations.len(),
                    skipped = chain.skipped_expirations.len(),
                    snapshots = chain.snapshots.len(),
                    inserted,
                    "체인 저장 완료"
                );
            }
            Err(e) => {
                stats.errors += 1;
                tracing::error!(
                    ticker = %chain.ticker,
                    snapshots = chain.snapshots.len(),
                    error = %e,
                    "체인 저장 실패"
                );
            }
        }
    }

    /// 취소될 때까지 주기를 반복합니다.
    ///
    /// 진행 중인 주기는 취소 시 즉시 중단되며, 커밋되지 않은 배치는
    /// 롤백됩니다. 완료된 주기 수를 반환합니다.
    pub async fn run(&self, shutdown: CancellationToken) -> u64 {
        let mut ticks = 0u64;
        tracing::info!(
            interval_secs = self.settings.interval.as_secs(),
            specs = self.settings.tickers.len(),
            concurrency = self.settings.concurrency,
            "=== 수집 스케줄러 시작 ==="
        );

        loop {
            let stats = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    tracing::info!("종료 신호 수신, 진행 중인 주기 중단");
                    break;
                }
                stats = self.run_tick() => stats,
            };

            ticks += 1;
            stats.log_summary("옵션 체인 수집");

            self.set_state(SchedulerState::Sleeping);
            tracing::info!(
                tick = ticks,
                next_in_secs = self.settings.interval.as_secs(),
                "=== 수집 주기 완료, 다음 주기 대기 ==="
            );

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    tracing::info!("종료 신호 수신, 스케줄러 종료 중...");
                    break;
                }
                _ = tokio::time::sleep(self.settings.interval) => {}
            }
        }

        self.set_state(SchedulerState::Stopped);
        tracing::info!(ticks, "수집 스케줄러 종료");
        ticks
    }
}
