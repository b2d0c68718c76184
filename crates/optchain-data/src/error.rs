//! 데이터 모듈 오류 타입.

use reqwest::StatusCode;
use thiserror::Error;

/// 업스트림 제공자 호출 오류.
///
/// 호출 한도 소진은 오류가 아니라 대기(backpressure)로 처리되므로 여기에 없습니다.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// 일시적 오류 (5xx, 408, 429, 타임아웃, 연결 실패) - 재시도 가능
    #[error("Transient fetch error: {0}")]
    Transient(String),

    /// 영구 오류 (그 외 4xx, 잘못된 응답 형식) - 재시도 금지
    #[error("Permanent fetch error: {0}")]
    Permanent(String),
}

impl FetchError {
    /// 재시도 가능한 에러인지 확인.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Transient(_))
    }

    /// HTTP 상태 코드로 에러를 분류합니다.
    pub fn from_status(status: StatusCode, context: &str) -> Self {
        let message = format!("{context}: HTTP {status}");
        if status.is_server_error()
            || status == StatusCode::TOO_MANY_REQUESTS
            || status == StatusCode::REQUEST_TIMEOUT
        {
            FetchError::Transient(message)
        } else {
            FetchError::Permanent(message)
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return FetchError::from_status(status, "request failed");
        }
        if err.is_decode() || err.is_builder() {
            FetchError::Permanent(err.to_string())
        } else {
            // 타임아웃, 연결 실패, 전송 중 끊김
            FetchError::Transient(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Permanent(format!("Malformed response: {err}"))
    }
}

pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// 저장소 오류.
#[derive(Debug, Error)]
pub enum StoreError {
    /// 데이터베이스 연결 오류
    #[error("Database connection error: {0}")]
    Connection(String),

    /// 쿼리 실행 오류
    #[error("Query error: {0}")]
    Query(String),

    /// 스키마 생성/초기화 오류
    #[error("Schema error: {0}")]
    Schema(String),

    /// 연결 풀 소진
    #[error("Connection pool exhausted")]
    PoolExhausted,
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => StoreError::PoolExhausted,
            sqlx::Error::Io(e) => StoreError::Connection(e.to_string()),
            sqlx::Error::Tls(e) => StoreError::Connection(e.to_string()),
            sqlx::Error::Database(db_err) => StoreError::Query(db_err.message().to_string()),
            _ => StoreError::Query(err.to_string()),
        }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
