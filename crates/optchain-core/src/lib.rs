//! # OptChain Core
//!
//! 옵션 체인 수집기의 핵심 도메인 타입을 제공합니다.
//!
//! - 티커 입력 스펙 및 중복 제거된 티커 유니버스
//! - 옵션 계약 스냅샷 (`ChainSnapshot`)
//! - 만기 수집 구간 (`FetchWindow`) 및 시계 추상화 (`Clock`)
//! - 설정 에러 타입
//! - 로깅 인프라

pub mod error;
pub mod logging;
pub mod types;

pub use error::*;
pub use logging::*;
pub use types::*;
