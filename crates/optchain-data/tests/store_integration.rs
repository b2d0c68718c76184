//! ChainStore 통합 테스트.
//!
//! PostgreSQL이 필요하므로 기본적으로 무시됩니다.
//! `DATABASE_URL` 설정 후 `cargo test -- --ignored`로 실행하세요.
//! 테스트마다 별도 테이블을 사용하므로 병렬 실행해도 서로 간섭하지 않습니다.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use optchain_core::{ChainSnapshot, OptionType};
use optchain_data::{ChainStore, SnapshotStore};
use rust_decimal_macros::dec;
use sqlx::postgres::PgPoolOptions;

async fn store_for(table: &str) -> ChainStore {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL 미설정");
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await
        .expect("데이터베이스 연결 실패");
    let store = ChainStore::from_pool(pool).with_table(table).unwrap();
    store.bootstrap(true).await.unwrap();
    store
}

async fn column_names(store: &ChainStore) -> Vec<String> {
    sqlx::query_scalar(
        "SELECT column_name::text FROM information_schema.columns \
         WHERE table_schema = current_schema() AND table_name = $1 \
         ORDER BY ordinal_position",
    )
    .bind(store.table())
    .fetch_all(store.pool())
    .await
    .unwrap()
}

async fn primary_key_columns(store: &ChainStore) -> Vec<String> {
    sqlx::query_scalar(
        "SELECT k.column_name::text \
         FROM information_schema.table_constraints c \
         JOIN information_schema.key_column_usage k \
           ON k.constraint_name = c.constraint_name AND k.table_schema = c.table_schema \
         WHERE c.constraint_type = 'PRIMARY KEY' \
           AND c.table_schema = current_schema() AND c.table_name = $1 \
         ORDER BY k.ordinal_position",
    )
    .bind(store.table())
    .fetch_all(store.pool())
    .await
    .unwrap()
}

const SNAPSHOT_COLUMNS: [&str; 12] = [
    "symbol",
    "expiration",
    "strike",
    "option_type",
    "bid",
    "ask",
    "last_price",
    "volume",
    "open_interest",
    "implied_volatility",
    "last_trade_date",
    "fetched_at",
];

fn fetched_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 2, 15, 30, 0).unwrap()
}

fn snapshot(strike: rust_decimal::Decimal, option_type: OptionType) -> ChainSnapshot {
    ChainSnapshot {
        underlying: "AAPL".to_string(),
        expiration: NaiveDate::from_ymd_opt(2024, 1, 19).unwrap(),
        strike,
        option_type,
        bid: Some(dec!(1.20)),
        ask: Some(dec!(1.25)),
        last: Some(dec!(1.22)),
        volume: Some(1500),
        open_interest: Some(12000),
        implied_volatility: Some(0.245),
        last_trade_at: Some(Utc.with_ymd_and_hms(2024, 1, 2, 15, 29, 58).unwrap()),
        fetched_at: fetched_at(),
    }
}

fn batch() -> Vec<ChainSnapshot> {
    vec![
        snapshot(dec!(185), OptionType::Call),
        snapshot(dec!(185), OptionType::Put),
        snapshot(dec!(190), OptionType::Call),
    ]
}

#[tokio::test]
#[ignore] // DB 연결 필요
async fn test_upsert_is_idempotent() {
    let store = store_for("it_chains_idempotent").await;

    assert_eq!(store.upsert(&batch()).await.unwrap(), 3);
    // 같은 배치 재전송은 새 행을 만들지 않음
    assert_eq!(store.upsert(&batch()).await.unwrap(), 0);
    assert_eq!(store.count_snapshots(None).await.unwrap(), 3);
}

#[tokio::test]
#[ignore] // DB 연결 필요
async fn test_new_fetch_time_adds_rows() {
    let store = store_for("it_chains_history").await;

    store.upsert(&batch()).await.unwrap();

    let later: Vec<ChainSnapshot> = batch()
        .into_iter()
        .map(|mut s| {
            s.fetched_at = fetched_at() + chrono::Duration::hours(1);
            s
        })
        .collect();
    assert_eq!(store.upsert(&later).await.unwrap(), 3);

    assert_eq!(store.count_snapshots(Some("AAPL")).await.unwrap(), 6);
    assert_eq!(store.count_snapshots(Some("MSFT")).await.unwrap(), 0);
    assert_eq!(
        store.latest_fetch_time("AAPL").await.unwrap(),
        Some(fetched_at() + chrono::Duration::hours(1))
    );
    assert_eq!(store.latest_fetch_time("MSFT").await.unwrap(), None);
}

#[tokio::test]
#[ignore] // DB 연결 필요
async fn test_bootstrap_reset_clears_rows() {
    let store = store_for("it_chains_reset").await;

    store.upsert(&batch()).await.unwrap();

    store.bootstrap(false).await.unwrap();
    assert_eq!(store.count_snapshots(None).await.unwrap(), 3);

    store.bootstrap(true).await.unwrap();
    assert_eq!(store.count_snapshots(None).await.unwrap(), 0);
}

#[tokio::test]
#[ignore] // DB 연결 필요
async fn test_bootstrap_reset_recreates_schema() {
    let store = store_for("it_chains_schema").await;

    assert_eq!(column_names(&store).await, SNAPSHOT_COLUMNS);
    assert_eq!(
        primary_key_columns(&store).await,
        ["symbol", "expiration", "strike", "option_type", "fetched_at"]
    );

    // 스키마를 변형한 뒤 reset 없이 준비하면 그대로 남음
    sqlx::query("ALTER TABLE it_chains_schema DROP COLUMN bid")
        .execute(store.pool())
        .await
        .unwrap();
    sqlx::query("ALTER TABLE it_chains_schema ADD COLUMN stale_note TEXT")
        .execute(store.pool())
        .await
        .unwrap();
    store.bootstrap(false).await.unwrap();
    let columns = column_names(&store).await;
    assert!(!columns.iter().any(|c| c == "bid"));
    assert!(columns.iter().any(|c| c == "stale_note"));

    // reset이면 정확히 같은 컬럼과 기본 키로 재생성
    store.bootstrap(true).await.unwrap();
    assert_eq!(column_names(&store).await, SNAPSHOT_COLUMNS);
    assert_eq!(
        primary_key_columns(&store).await,
        ["symbol", "expiration", "strike", "option_type", "fetched_at"]
    );
}

#[tokio::test]
#[ignore] // DB 연결 필요
async fn test_absent_fields_are_stored_as_null() {
    let store = store_for("it_chains_nulls").await;

    let mut sparse = snapshot(dec!(200), OptionType::Put);
    sparse.bid = None;
    sparse.ask = None;
    sparse.last = None;
    sparse.volume = None;
    sparse.open_interest = None;
    sparse.implied_volatility = None;
    sparse.last_trade_at = None;
    assert_eq!(store.upsert(&[sparse]).await.unwrap(), 1);

    let nulls: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM it_chains_nulls WHERE bid IS NULL AND volume IS NULL \
         AND implied_volatility IS NULL AND last_trade_date IS NULL",
    )
    .fetch_one(store.pool())
    .await
    .unwrap();
    assert_eq!(nulls, 1);
}

#[tokio::test]
#[ignore] // DB 연결 필요
async fn test_health_check() {
    let store = store_for("it_chains_health").await;
    store.health_check().await.unwrap();
}
