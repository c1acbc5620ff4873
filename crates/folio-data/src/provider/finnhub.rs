//! Finnhub candle API 어댑터.
//!
//! API 키(`token` 쿼리 파라미터)가 필요하며, 키가 없으면
//! `CredentialsMissing`으로 즉시 실패해 체인의 다음 제공자로
//! 넘어갑니다. 응답의 `s` 필드가 `"ok"`가 아니면 실패입니다.

use crate::error::ProviderError;
use crate::provider::{day_end_ts, day_start_ts, normalize_points, ts_to_date, PriceProvider};
use async_trait::async_trait;
use chrono::NaiveDate;
use folio_core::{PricePoint, ProviderId};
use serde::Deserialize;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://finnhub.io";

/// Finnhub candle API 클라이언트.
pub struct FinnhubProvider {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
}

/// candle 응답.
#[derive(Debug, Deserialize)]
struct CandleResponse {
    /// 상태 ("ok" | "no_data")
    s: String,
    /// Unix 초 타임스탬프
    #[serde(default)]
    t: Vec<i64>,
    /// 종가
    #[serde(default)]
    c: Vec<f64>,
}

impl FinnhubProvider {
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
impl PriceProvider for FinnhubProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Finnhub
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
            .ok_or(ProviderError::CredentialsMissing(ProviderId::Finnhub))?;

        let url = format!("{}/api/v1/stock/candle", self.base_url);

        debug!(symbol = symbol, start = %start, end = %end, "Finnhub candle API 요청");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("symbol", symbol.to_string()),
                ("resolution", "D".to_string()),
                ("from", day_start_ts(start).to_string()),
                ("to", day_end_ts(end).to_string()),
                ("token", api_key.to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Http(format!("{}: {}", status, body)));
        }

        let candle: CandleResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        if candle.s != "ok" {
            return Err(ProviderError::Status(format!("candle status: {}", candle.s)));
        }

        let points: Vec<PricePoint> = candle
            .t
            .iter()
            .zip(candle.c.iter())
            .filter_map(|(&ts, &close)| {
                let date = ts_to_date(ts)?;
                Some(PricePoint::new(date, close))
            })
            .collect();

        let points = normalize_points(points);
        if points.is_empty() {
            return Err(ProviderError::Empty);
        }

        debug!(symbol = symbol, count = points.len(), "Finnhub 시세 조회 완료");
        Ok(points)
    }
}
