//! Financial Modeling Prep historical-price API 어댑터.
//!
//! API 키(`apikey` 쿼리 파라미터)가 필요합니다. 벤더는 날짜
//! 내림차순으로 응답하므로 공통 정규화가 오름차순으로 되돌립니다.
//! 수정 종가(adjClose)를 우선 사용하고 없으면 close로 대체합니다.

use crate::error::ProviderError;
use crate::provider::{normalize_points, PriceProvider};
use async_trait::async_trait;
use chrono::NaiveDate;
use folio_core::{PricePoint, ProviderId};
use serde::Deserialize;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://financialmodelingprep.com";

/// FMP historical-price API 클라이언트.
pub struct FmpProvider {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
}

/// historical-price-full 응답.
#[derive(Debug, Deserialize)]
struct HistoricalResponse {
    #[serde(default)]
    historical: Vec<RawBar>,
}

#[derive(Debug, Deserialize)]
struct RawBar {
    /// ISO 날짜 (YYYY-MM-DD)
    date: String,
    #[serde(default)]
    close: Option<f64>,
    #[serde(rename = "adjClose", default)]
    adj_close: Option<f64>,
}

impl FmpProvider {
    pub fn new(client: reqwest::Client, api_key: Option<String>) -> Self {
        Self {
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Base URL 교체 (테스트용).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl PriceProvider for FmpProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Fmp
    }

    async fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>, ProviderError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(ProviderError::CredentialsMissing(ProviderId::Fmp))?;

        let url = format!(
            "{}/api/v3/historical-price-full/{}",
            self.base_url,
            urlencoding::encode(symbol)
        );

        debug!(symbol = symbol, start = %start, end = %end, "FMP historical API 요청");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("from", start.to_string()),
                ("to", end.to_string()),
                ("apikey", api_key.to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Http(format!("{}: {}", status, body)));
        }

        let historical: HistoricalResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        if historical.historical.is_empty() {
            return Err(ProviderError::Empty);
        }

        let points: Vec<PricePoint> = historical
            .historical
            .iter()
            .filter_map(|bar| {
                let date = NaiveDate::parse_from_str(&bar.date, "%Y-%m-%d").ok()?;
                // adjClose 우선, 없으면 원 종가
                let close = bar.adj_close.or(bar.close)?;
                Some(PricePoint::new(date, close))
            })
            .collect();

        let points = normalize_points(points);
        if points.is_empty() {
            return Err(ProviderError::Empty);
        }

        debug!(symbol = symbol, count = points.len(), "FMP 시세 조회 완료");
        Ok(points)
    }
}
