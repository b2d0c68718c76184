//! Option chain collector CLI.

use anyhow::Context;
use clap::{Parser, Subcommand};
use optchain_collector::modules::{ChainFetcher, Scheduler, TickerResolver};
use optchain_collector::{CollectorConfig, ConfigOverrides, ProviderSet};
use optchain_core::{init_logging, Clock, LogConfig, SystemClock};
use optchain_data::{ChainStore, SnapshotStore};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "optchain-collector")]
#[command(about = "Option chain collector", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// 로그 레벨 (trace, debug, info, warn, error). 지정하면 RUST_LOG보다 우선
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// 수집 티커 목록 (쉼표로 구분, 예: "AAPL,MSFT,SPY.ETF")
    #[arg(long, global = true)]
    tickers: Option<String>,

    /// 수집 주기 (초)
    #[arg(long, global = true)]
    interval: Option<u64>,

    /// 시작 시 기존 스냅샷 테이블 삭제 후 재생성
    #[arg(long, global = true)]
    reset: bool,
}

#[derive(Subcommand, Clone, Copy, PartialEq, Eq)]
enum Commands {
    /// 데몬 모드: 종료 신호까지 주기적으로 수집 (기본)
    Daemon,

    /// 한 주기만 실행 후 종료
    RunOnce,

    /// 스키마만 준비
    Bootstrap,

    /// 해석된 티커 유니버스 출력
    Resolve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    // 로깅 초기화
    let mut log_config = LogConfig::from_env();
    if let Some(level) = &cli.log_level {
        log_config = log_config.with_level(level.as_str());
    }
    init_logging(log_config).map_err(|e| anyhow::anyhow!("로깅 초기화 실패: {e}"))?;

    tracing::info!("Option Chain Collector 시작");

    let overrides = ConfigOverrides {
        tickers: cli.tickers,
        interval_secs: cli.interval,
        reset: cli.reset,
    };

    match cli.command.unwrap_or(Commands::Daemon) {
        Commands::Bootstrap => {
            let config = CollectorConfig::bootstrap_from_env_with(&overrides)?;
            let store = ChainStore::connect(&config.database)
                .await
                .context("데이터베이스 연결 실패")?;
            store
                .bootstrap(config.reset_existing)
                .await
                .context("스키마 준비 실패")?;
            let rows = store.count_snapshots(None).await?;
            tracing::info!(
                table = store.table(),
                rows,
                reset = config.reset_existing,
                "스키마 준비 완료"
            );

            for symbol in config.plain_symbols() {
                match store.latest_fetch_time(symbol).await? {
                    Some(fetched_at) => println!("{symbol}\t{}", fetched_at.to_rfc3339()),
                    None => println!("{symbol}\t-"),
                }
            }
            store.close().await;
        }
        Commands::Resolve => {
            let config = CollectorConfig::from_env_with(&overrides)?;
            let providers = ProviderSet::from_config(&config)?;
            let resolver = TickerResolver::new(providers.holdings, config.collect.retry.clone());
            let as_of = config
                .collect
                .holdings_as_of
                .unwrap_or_else(|| SystemClock.today());

            let universe = resolver.resolve(&config.tickers, as_of).await;
            for symbol in universe.iter() {
                println!("{symbol}");
            }
        }
        command @ (Commands::Daemon | Commands::RunOnce) => {
            let config = CollectorConfig::from_env_with(&overrides)?;
            tracing::debug!(
                database = %config.database.describe(),
                specs = config.tickers.len(),
                "설정 로드 완료"
            );

            // DB 연결 및 스키마 준비 실패는 시작 실패
            let store = ChainStore::connect(&config.database)
                .await
                .context("데이터베이스 연결 실패")?;
            store.health_check().await.context("데이터베이스 상태 확인 실패")?;
            store
                .bootstrap(config.reset_existing)
                .await
                .context("스키마 준비 실패")?;

            let providers = ProviderSet::from_config(&config)?;
            let scheduler = Scheduler::new(
                config.schedule_settings(),
                TickerResolver::new(providers.holdings, config.collect.retry.clone()),
                ChainFetcher::new(providers.chains, config.collect.retry.clone()),
                Arc::new(store.clone()) as Arc<dyn SnapshotStore>,
                Arc::new(SystemClock),
            )?;

            if command == Commands::RunOnce {
                let stats = scheduler.run_tick().await;
                stats.log_summary("옵션 체인 수집");
            } else {
                let shutdown = CancellationToken::new();
                tokio::spawn(shutdown_signal(shutdown.clone()));
                scheduler.run(shutdown).await;
            }

            store.close().await;
        }
    }

    tracing::info!("Option Chain Collector 종료");
    Ok(())
}

/// Ctrl+C 또는 SIGTERM 수신 시 종료 토큰을 취소합니다.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Ctrl+C 핸들러 설치 실패");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "SIGTERM 핸들러 설치 실패");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::warn!("Ctrl+C 수신, 종료 중...");
        }
        _ = terminate => {
            tracing::warn!("SIGTERM 수신, 종료 중...");
        }
    }

    shutdown.cancel();
}
