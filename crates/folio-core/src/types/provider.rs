//! 가격 데이터 제공자 식별자.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 지원하는 가격 데이터 제공자.
///
/// 순서가 있는 제공자 체인(`Vec<ProviderId>`)으로 사용되며,
/// 캐시 키와 감사 맵(`provider_by_symbol`)에는 소문자 이름이 들어갑니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    /// Yahoo Finance chart API (키 불필요, 가장 넓은 과거 데이터)
    Yahoo,
    /// Finnhub candle API (API 키 필요)
    Finnhub,
    /// Financial Modeling Prep historical-price API (API 키 필요)
    Fmp,
    /// Polygon aggregates API (API 키 필요)
    Polygon,
}

impl ProviderId {
    /// 캐시 키와 로그에 사용하는 소문자 이름.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Yahoo => "yahoo",
            ProviderId::Finnhub => "finnhub",
            ProviderId::Fmp => "fmp",
            ProviderId::Polygon => "polygon",
        }
    }

    /// 기본 제공자 체인 (우선순위 순).
    ///
    /// 키가 필요 없는 Yahoo를 먼저 시도하고, 이후 키 기반 제공자로
    /// 넘어갑니다.
    pub fn default_chain() -> Vec<ProviderId> {
        vec![
            ProviderId::Yahoo,
            ProviderId::Finnhub,
            ProviderId::Fmp,
            ProviderId::Polygon,
        ]
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "yahoo" => Ok(ProviderId::Yahoo),
            "finnhub" => Ok(ProviderId::Finnhub),
            "fmp" => Ok(ProviderId::Fmp),
            "polygon" => Ok(ProviderId::Polygon),
            _ => Err(format!("Unknown provider: {}", s)),
        }
    }
}
