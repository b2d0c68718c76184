//! 수집 파이프라인 모듈.

pub mod fetch;
pub mod resolve;
pub mod scheduler;

pub use fetch::{ChainFetcher, TickerChain};
pub use resolve::TickerResolver;
pub use scheduler::{ScheduleSettings, Scheduler, SchedulerState};
