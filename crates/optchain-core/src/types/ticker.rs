//! 티커 입력 스펙 및 티커 유니버스.
//!
//! - `TickerSpec` - 설정에서 읽은 원시 입력 (일반 티커 또는 ETF 마커)
//! - `ResolvedUniverse` - ETF를 구성 종목으로 펼친 뒤 중복 제거된 티커 목록

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// ETF 마커 접미사 (예: `SPY.ETF`).
pub const ETF_SUFFIX: &str = ".ETF";

/// 설정에서 파싱한 티커 입력.
///
/// 심볼은 항상 비어있지 않으며 대문자로 정규화됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "symbol", rename_all = "snake_case")]
pub enum TickerSpec {
    /// 일반 티커 (예: AAPL)
    Plain(String),
    /// ETF 마커, 수집 시 보유 종목으로 펼쳐짐 (예: SPY.ETF)
    Etf(String),
}

impl TickerSpec {
    /// 일반 티커 스펙을 생성합니다.
    pub fn plain(symbol: &str) -> Result<Self, ConfigError> {
        normalize_symbol(symbol)
            .map(Self::Plain)
            .ok_or_else(|| ConfigError::InvalidTicker(symbol.to_string()))
    }

    /// ETF 스펙을 생성합니다.
    pub fn etf(symbol: &str) -> Result<Self, ConfigError> {
        normalize_symbol(symbol)
            .map(Self::Etf)
            .ok_or_else(|| ConfigError::InvalidTicker(format!("{symbol}{ETF_SUFFIX}")))
    }

    /// 심볼 문자열.
    pub fn symbol(&self) -> &str {
        match self {
            Self::Plain(s) | Self::Etf(s) => s,
        }
    }

    /// ETF 스펙인지 확인합니다.
    pub fn is_etf(&self) -> bool {
        matches!(self, Self::Etf(_))
    }

    /// 쉼표로 구분된 목록을 파싱합니다 (예: `"AAPL,MSFT,SPY.ETF"`).
    ///
    /// 빈 항목(후행 쉼표 등)은 무시합니다. 결과가 비어 있으면 에러입니다.
    pub fn parse_list(input: &str) -> Result<Vec<Self>, ConfigError> {
        let specs = input
            .split(',')
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(str::parse)
            .collect::<Result<Vec<Self>, _>>()?;

        if specs.is_empty() {
            return Err(ConfigError::Missing("티커 목록이 비어 있습니다".to_string()));
        }
        Ok(specs)
    }
}

impl FromStr for TickerSpec {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        let upper = token.to_uppercase();
        match upper.strip_suffix(ETF_SUFFIX) {
            Some(base) => Self::etf(base),
            None => Self::plain(token),
        }
    }
}

impl fmt::Display for TickerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(s) => write!(f, "{s}"),
            Self::Etf(s) => write!(f, "{s}{ETF_SUFFIX}"),
        }
    }
}

/// 심볼 정규화 (공백 제거, 대문자 변환). 유효하지 않으면 `None`.
pub fn normalize_symbol(raw: &str) -> Option<String> {
    let symbol = raw.trim().to_uppercase();
    if symbol.is_empty() || symbol.contains(|c: char| c.is_whitespace() || c == ',') {
        None
    } else {
        Some(symbol)
    }
}

/// 한 수집 주기에 처리할 중복 없는 티커 목록.
///
/// 처음 등장한 순서를 유지하며, 같은 심볼은 두 번 들어가지 않습니다.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedUniverse {
    symbols: Vec<String>,
    seen: HashSet<String>,
}

impl ResolvedUniverse {
    pub fn new() -> Self {
        Self::default()
    }

    /// 심볼을 추가합니다. 이미 존재하면 `false`.
    pub fn insert(&mut self, symbol: impl Into<String>) -> bool {
        let symbol = symbol.into();
        if self.seen.contains(&symbol) {
            return false;
        }
        self.seen.insert(symbol.clone());
        self.symbols.push(symbol);
        true
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.seen.contains(symbol)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.symbols.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.symbols
    }

    pub fn into_vec(self) -> Vec<String> {
        self.symbols
    }
}

impl<S: Into<String>> FromIterator<S> for ResolvedUniverse {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut universe = Self::new();
        for symbol in iter {
            universe.insert(symbol);
        }
        universe
    }
}
