//! 옵션 체인 스냅샷 저장소.
//!
//! 한 행은 (symbol, expiration, strike, option_type, fetched_at) 키로 식별됩니다.
//! 같은 배치를 다시 저장해도 중복 행이 생기지 않습니다.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use optchain_core::ChainSnapshot;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{debug, info, warn};

use super::{connect_pool, DatabaseConfig};
use crate::error::{StoreError, StoreResult};

/// 기본 스냅샷 테이블 이름.
pub const DEFAULT_TABLE: &str = "options_chains";

/// 한 INSERT 문에 담을 최대 행 수 (12 컬럼 × 1000 < 65535 바인드 한도).
const UPSERT_CHUNK_SIZE: usize = 1000;

const INSERT_COLUMNS: &str = "symbol, expiration, strike, option_type, bid, ask, last_price, \
     volume, open_interest, implied_volatility, last_trade_date, fetched_at";

/// 스냅샷 배치 저장 인터페이스.
///
/// 수집 루프는 이 trait만 의존하므로 테스트에서 메모리 저장소로 대체할 수 있습니다.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// 배치를 저장하고 새로 삽입된 행 수를 반환합니다.
    ///
    /// 배치는 원자적으로 저장됩니다. 실패하거나 취소되면 아무 행도 남지 않습니다.
    async fn upsert(&self, snapshots: &[ChainSnapshot]) -> StoreResult<u64>;
}

/// PostgreSQL 기반 스냅샷 저장소.
#[derive(Debug, Clone)]
pub struct ChainStore {
    pool: PgPool,
    table: String,
}

impl ChainStore {
    /// 설정으로 연결 풀을 만들고 저장소를 생성합니다.
    pub async fn connect(config: &DatabaseConfig) -> StoreResult<Self> {
        Ok(Self::from_pool(connect_pool(config).await?))
    }

    /// 기존 풀로 저장소를 생성합니다.
    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            table: DEFAULT_TABLE.to_string(),
        }
    }

    /// 다른 테이블을 사용합니다.
    ///
    /// 테이블 이름은 SQL에 직접 들어가므로 `[a-z_][a-z0-9_]*`만 허용합니다.
    pub fn with_table(mut self, table: &str) -> StoreResult<Self> {
        let valid = table
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_lowercase() || c == '_')
            && table
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
            && table.len() <= 48;
        if !valid {
            return Err(StoreError::Schema(format!(
                "잘못된 테이블 이름: {table}"
            )));
        }
        self.table = table.to_string();
        Ok(self)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// 연결 상태 확인.
    pub async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// 스키마를 준비합니다.
    ///
    /// `reset_existing`이면 기존 테이블과 데이터를 모두 삭제하고 새로 만듭니다.
    /// 그렇지 않으면 이미 있는 테이블은 그대로 둡니다.
    pub async fn bootstrap(&self, reset_existing: bool) -> StoreResult<()> {
        let table = &self.table;
        let mut tx = self.pool.begin().await?;

        if reset_existing {
            warn!(table = %table, "기존 스냅샷 테이블 삭제");
            sqlx::query(&format!("DROP TABLE IF EXISTS {table}"))
                .execute(&mut *tx)
                .await
                .map_err(schema_error)?;
        }

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                symbol              VARCHAR(16)     NOT NULL,
                expiration          DATE            NOT NULL,
                strike              NUMERIC(14, 4)  NOT NULL,
                option_type         VARCHAR(4)      NOT NULL CHECK (option_type IN ('call', 'put')),
                bid                 NUMERIC(14, 4),
                ask                 NUMERIC(14, 4),
                last_price          NUMERIC(14, 4),
                volume              BIGINT,
                open_interest       BIGINT,
                implied_volatility  DOUBLE PRECISION,
                last_trade_date     TIMESTAMPTZ,
                fetched_at          TIMESTAMPTZ     NOT NULL,
                PRIMARY KEY (symbol, expiration, strike, option_type, fetched_at)
            )
            "#
        ))
        .execute(&mut *tx)
        .await
        .map_err(schema_error)?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_symbol_fetched ON {table} (symbol, fetched_at DESC)"
        ))
        .execute(&mut *tx)
        .await
        .map_err(schema_error)?;

        tx.commit().await?;
        info!(table = %table, reset = reset_existing, "스냅샷 스키마 준비 완료");
        Ok(())
    }

    /// 저장된 행 수. `symbol`이 있으면 해당 기초자산만 셉니다.
    pub async fn count_snapshots(&self, symbol: Option<&str>) -> StoreResult<i64> {
        let count: i64 = match symbol {
            Some(symbol) => {
                sqlx::query_scalar(&format!(
                    "SELECT COUNT(*) FROM {} WHERE symbol = $1",
                    self.table
                ))
                .bind(symbol)
                .fetch_one(&self.pool)
                .await?
            }
            None => {
                sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", self.table))
                    .fetch_one(&self.pool)
                    .await?
            }
        };
        Ok(count)
    }

    /// 기초자산의 가장 최근 수집 시각.
    pub async fn latest_fetch_time(&self, symbol: &str) -> StoreResult<Option<DateTime<Utc>>> {
        let latest: Option<DateTime<Utc>> = sqlx::query_scalar(&format!(
            "SELECT MAX(fetched_at) FROM {} WHERE symbol = $1",
            self.table
        ))
        .bind(symbol)
        .fetch_one(&self.pool)
        .await?;
        Ok(latest)
    }

    /// 연결 풀 종료.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl SnapshotStore for ChainStore {
    async fn upsert(&self, snapshots: &[ChainSnapshot]) -> StoreResult<u64> {
        if snapshots.is_empty() {
            return Ok(0);
        }

        // 트랜잭션은 커밋 전에 drop되면 롤백됨
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0u64;

        for chunk in snapshots.chunks(UPSERT_CHUNK_SIZE) {
            let mut builder: QueryBuilder<Postgres> =
                QueryBuilder::new(format!("INSERT INTO {} ({}) ", self.table, INSERT_COLUMNS));

            builder.push_values(chunk, |mut row, s| {
                row.push_bind(s.underlying.as_str())
                    .push_bind(s.expiration)
                    .push_bind(s.strike)
                    .push_bind(s.option_type.as_str())
                    .push_bind(s.bid)
                    .push_bind(s.ask)
                    .push_bind(s.last)
                    .push_bind(s.volume)
                    .push_bind(s.open_interest)
                    .push_bind(s.implied_volatility)
                    .push_bind(s.last_trade_at)
                    .push_bind(s.fetched_at);
            });
            builder.push(
                " ON CONFLICT (symbol, expiration, strike, option_type, fetched_at) DO NOTHING",
            );

            let result = builder.build().execute(&mut *tx).await?;
            inserted += result.rows_affected();
        }

        tx.commit().await?;

        debug!(
            table = %self.table,
            batch = snapshots.len(),
            inserted,
            "스냅샷 배치 저장"
        );
        Ok(inserted)
    }
}

fn schema_error(err: sqlx::Error) -> StoreError {
    match StoreError::from(err) {
        StoreError::Query(msg) => StoreError::Schema(msg),
        other => other,
    }
}
