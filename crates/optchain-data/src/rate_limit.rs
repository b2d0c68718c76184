//! 업스트림 호출 한도 관리.
//!
//! 슬라이딩 윈도우 기반 rate limiting을 제공합니다. 제공자마다 하나의
//! `RateLimiter`를 만들어 `Arc`로 모든 호출 지점에 공유합니다.
//! 한도가 소진되면 호출자는 에러를 받지 않고 슬롯이 빌 때까지 대기합니다.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Rate Limiter 설정.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// 윈도우당 최대 호출 수
    pub max_calls: u32,
    /// 윈도우 길이
    pub period: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_calls: 60, // 분당 60회
            period: Duration::from_secs(60),
        }
    }
}

impl RateLimitConfig {
    /// 새 설정 생성.
    pub fn new(max_calls: u32, period: Duration) -> Self {
        Self { max_calls, period }
    }

    /// 분당 호출 수 기준 설정.
    pub fn per_minute(max_calls: u32) -> Self {
        Self::new(max_calls, Duration::from_secs(60))
    }
}

/// 최근 호출 시각 기록.
#[derive(Debug, Default)]
struct CallWindow {
    calls: VecDeque<Instant>,
}

impl CallWindow {
    /// 슬롯 획득 시도.
    ///
    /// 성공하면 `Ok(())`, 한도 초과 시 다음 슬롯까지 대기 시간을 반환.
    fn try_acquire(&mut self, now: Instant, config: &RateLimitConfig) -> Result<(), Duration> {
        self.prune(now, config.period);

        if self.calls.len() < config.max_calls as usize {
            self.calls.push_back(now);
            return Ok(());
        }

        match self.calls.front() {
            Some(oldest) => Err(oldest
                .checked_add(config.period)
                .map_or(config.period, |free_at| free_at.saturating_duration_since(now))),
            None => Err(config.period),
        }
    }

    /// 윈도우를 벗어난 기록 제거.
    fn prune(&mut self, now: Instant, period: Duration) {
        while let Some(oldest) = self.calls.front() {
            if now.saturating_duration_since(*oldest) >= period {
                self.calls.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Rate Limit 확인 결과.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitResult {
    /// 호출 허용됨 (슬롯 소비)
    Allowed,
    /// 한도 초과
    Limited {
        /// 다음 슬롯까지 대기 시간
        retry_after: Duration,
    },
}

/// 제공자 단위 호출 예산.
///
/// 모든 동시 호출자가 같은 인스턴스를 공유해야 합니다.
#[derive(Debug)]
pub struct RateLimiter {
    name: String,
    config: RateLimitConfig,
    window: Mutex<CallWindow>,
    total_calls: AtomicU64,
    total_waits: AtomicU64,
}

impl RateLimiter {
    /// 새 Rate Limiter 생성.
    pub fn new(name: impl Into<String>, config: RateLimitConfig) -> Self {
        Self {
            name: name.into(),
            config,
            window: Mutex::new(CallWindow::default()),
            total_calls: AtomicU64::new(0),
            total_waits: AtomicU64::new(0),
        }
    }

    /// 공유용 `Arc`로 생성.
    pub fn shared(name: impl Into<String>, config: RateLimitConfig) -> Arc<Self> {
        Arc::new(Self::new(name, config))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// 대기 없이 슬롯 획득 시도.
    pub async fn check(&self) -> RateLimitResult {
        let mut window = self.window.lock().await;
        match window.try_acquire(Instant::now(), &self.config) {
            Ok(()) => {
                self.total_calls.fetch_add(1, Ordering::SeqCst);
                RateLimitResult::Allowed
            }
            Err(retry_after) => RateLimitResult::Limited { retry_after },
        }
    }

    /// 슬롯을 얻을 때까지 대기.
    ///
    /// 대기 중 future가 drop되면 슬롯은 소비되지 않습니다.
    pub async fn acquire(&self) {
        loop {
            let wait = match self.check().await {
                RateLimitResult::Allowed => return,
                RateLimitResult::Limited { retry_after } => retry_after,
            };

            self.total_waits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                provider = %self.name,
                wait_ms = wait.as_millis() as u64,
                "호출 한도 도달, 대기"
            );
            tokio::time::sleep(wait).await;
        }
    }

    /// 지금까지 허용된 총 호출 수.
    pub fn total_calls(&self) -> u64 {
        self.total_calls.load(Ordering::SeqCst)
    }

    /// 한도 때문에 대기한 횟수.
    pub fn total_waits(&self) -> u64 {
        self.total_waits.load(Ordering::Relaxed)
    }
}
