//! 호출 한도가 적용된 HTTP/JSON 클라이언트.
//!
//! 모든 업스트림 요청은 이 클라이언트를 거칩니다. 요청 전에 제공자 단위
//! `RateLimiter`에서 슬롯을 얻고, 응답을 일시적/영구 오류로 분류합니다.

use reqwest::header::ACCEPT;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{FetchError, FetchResult};
use crate::rate_limit::RateLimiter;

/// 오류 메시지에 포함할 응답 본문 최대 길이.
const MAX_ERROR_BODY: usize = 200;

/// API 인증 방식.
pub enum ApiCredential {
    /// `Authorization: Bearer <token>` 헤더
    Bearer(SecretString),
    /// 쿼리 파라미터 (예: `apikey=...`)
    QueryParam {
        name: &'static str,
        value: SecretString,
    },
    /// 인증 없음
    None,
}

impl std::fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bearer(_) => write!(f, "Bearer([REDACTED])"),
            Self::QueryParam { name, .. } => write!(f, "QueryParam({name}=[REDACTED])"),
            Self::None => write!(f, "None"),
        }
    }
}

/// 호출 한도가 적용된 업스트림 클라이언트.
#[derive(Debug)]
pub struct RateLimitedClient {
    http: reqwest::Client,
    base_url: String,
    credential: ApiCredential,
    limiter: Arc<RateLimiter>,
}

impl RateLimitedClient {
    /// 새 클라이언트 생성.
    ///
    /// # Arguments
    /// * `base_url` - API 기본 URL (예: `https://api.tradier.com/v1`)
    /// * `credential` - 인증 방식
    /// * `limiter` - 같은 제공자를 호출하는 모든 곳이 공유하는 호출 예산
    /// * `timeout` - 요청 타임아웃
    pub fn new(
        base_url: impl Into<String>,
        credential: ApiCredential,
        limiter: Arc<RateLimiter>,
        timeout: Duration,
    ) -> FetchResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Permanent(format!("HTTP 클라이언트 생성 실패: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credential,
            limiter,
        })
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET 요청을 실행하고 JSON 본문을 반환합니다.
    ///
    /// 호출 예산이 소진된 경우 슬롯이 빌 때까지 대기합니다.
    pub async fn call(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> FetchResult<serde_json::Value> {
        self.limiter.acquire().await;

        let url = format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'));
        tracing::debug!(
            provider = %self.limiter.name(),
            url = %url,
            params = ?params,
            "업스트림 요청"
        );

        let mut request = self
            .http
            .get(&url)
            .query(params)
            .header(ACCEPT, "application/json");

        request = match &self.credential {
            ApiCredential::Bearer(token) => request.bearer_auth(token.expose_secret()),
            ApiCredential::QueryParam { name, value } => {
                request.query(&[(*name, value.expose_secret())])
            }
            ApiCredential::None => request,
        };

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(MAX_ERROR_BODY).collect();
            let err = FetchError::from_status(
                status,
                &format!("{} {} ({})", self.limiter.name(), endpoint, body.trim()),
            );
            tracing::debug!(
                provider = %self.limiter.name(),
                status = status.as_u16(),
                retryable = err.is_retryable(),
                "업스트림 오류 응답"
            );
            return Err(err);
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(FetchError::from)
    }
}
