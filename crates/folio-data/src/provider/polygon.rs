//! Polygon aggregates API 어댑터.
//!
//! API 키(`apiKey` 쿼리 파라미터)가 필요하며, 타임스탬프는 Unix
//! 밀리초입니다. 일 단위 aggregate의 종가를 사용합니다.

use crate::error::ProviderError;
use crate::provider::{normalize_points, ts_millis_to_date, PriceProvider};
use async_trait::async_trait;
use chrono::NaiveDate;
use folio_core::{PricePoint, ProviderId};
use serde::Deserialize;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://api.polygon.io";

/// Polygon aggregates API 클라이언트.
pub struct PolygonProvider {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
}

/// aggregates 응답.
#[derive(Debug, Deserialize)]
struct AggsResponse {
    #[serde(default)]
    results: Vec<RawAgg>,
}

#[derive(Debug, Deserialize)]
struct RawAgg {
    /// 윈도우 시작 Unix 밀리초
    t: i64,
    /// 종가
    c: f64,
}

impl PolygonProvider {
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
impl PriceProvider for PolygonProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Polygon
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
            .ok_or(ProviderError::CredentialsMissing(ProviderId::Polygon))?;

        let url = format!(
            "{}/v2/aggs/ticker/{}/range/1/day/{}/{}",
            self.base_url,
            urlencoding::encode(symbol),
            start,
            end
        );

        debug!(symbol = symbol, start = %start, end = %end, "Polygon aggregates API 요청");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("adjusted", "true"),
                ("sort", "asc"),
                ("limit", "50000"),
                ("apiKey", api_key),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Http(format!("{}: {}", status, body)));
        }

        let aggs: AggsResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        if aggs.results.is_empty() {
            return Err(ProviderError::Empty);
        }

        let points: Vec<PricePoint> = aggs
            .results
            .iter()
            .filter_map(|agg| {
                let date = ts_millis_to_date(agg.t)?;
                Some(PricePoint::new(date, agg.c))
            })
            .collect();

        let points = normalize_points(points);
        if points.is_empty() {
            return Err(ProviderError::Empty);
        }

        debug!(symbol = symbol, count = points.len(), "Polygon 시세 조회 완료");
        Ok(points)
    }
}
