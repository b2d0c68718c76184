//! 설정 에러 타입.
//!
//! 설정 에러는 모두 시작 시점에 치명적입니다. 첫 번째 수집 주기 전에
//! 프로세스를 중단시킵니다.

use thiserror::Error;

/// 설정 및 입력 검증 에러.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// 필수 설정 값 누락
    #[error("설정 누락: {0}")]
    Missing(String),

    /// 잘못된 설정 값
    #[error("잘못된 설정 값 {key}={value}: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },

    /// 잘못된 티커 스펙
    #[error("잘못된 티커 스펙 '{0}'")]
    InvalidTicker(String),
}

impl ConfigError {
    /// `Invalid` 에러를 생성합니다.
    pub fn invalid(
        key: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Invalid {
            key: key.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}

/// 설정 작업을 위한 Result 타입.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_display() {
        let err = ConfigError::invalid("MAX_DTE", "abc", "정수가 아닙니다");
        assert_eq!(
            err.to_string(),
            "잘못된 설정 값 MAX_DTE=abc: 정수가 아닙니다"
        );
    }
}
