//! Yahoo Finance chart API 어댑터.
//!
//! 키 없이 사용할 수 있고 과거 데이터 범위가 가장 넓어 기본 체인의
//! 첫 번째 제공자입니다. chart 응답의 수정 종가(adjclose)를 우선
//! 사용하고, 해당 날짜에 adjclose가 없으면 원 종가(close)로
//! 대체합니다.

use crate::error::ProviderError;
use crate::provider::{day_end_ts, day_start_ts, normalize_points, ts_to_date, PriceProvider};
use async_trait::async_trait;
use chrono::NaiveDate;
use folio_core::{PricePoint, ProviderId};
use serde::Deserialize;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";

/// Yahoo Finance chart API 클라이언트.
pub struct YahooProvider {
    client: reqwest::Client,
    base_url: String,
}

/// chart 응답 래퍼.
#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteBlock>,
    #[serde(default)]
    adjclose: Vec<AdjCloseBlock>,
}

#[derive(Debug, Deserialize)]
struct QuoteBlock {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseBlock {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

impl YahooProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
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
impl PriceProvider for YahooProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Yahoo
    }

    async fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>, ProviderError> {
        let url = format!(
            "{}/v8/finance/chart/{}",
            self.base_url,
            urlencoding::encode(symbol)
        );

        debug!(symbol = symbol, start = %start, end = %end, "Yahoo chart API 요청");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("period1", day_start_ts(start).to_string()),
                ("period2", day_end_ts(end).to_string()),
                ("interval", "1d".to_string()),
                ("includeAdjustedClose", "true".to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Http(format!("{}: {}", status, body)));
        }

        let envelope: ChartEnvelope = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        let result = envelope
            .chart
            .result
            .and_then(|mut r| if r.is_empty() { None } else { Some(r.remove(0)) })
            .ok_or_else(|| ProviderError::Malformed("missing chart result envelope".to_string()))?;

        if result.timestamp.is_empty() {
            return Err(ProviderError::Empty);
        }

        let closes = result
            .indicators
            .quote
            .first()
            .map(|q| q.close.as_slice())
            .unwrap_or(&[]);
        let adjcloses = result
            .indicators
            .adjclose
            .first()
            .map(|a| a.adjclose.as_slice())
            .unwrap_or(&[]);

        let points: Vec<PricePoint> = result
            .timestamp
            .iter()
            .enumerate()
            .filter_map(|(i, &ts)| {
                let date = ts_to_date(ts)?;
                // adjclose 우선, 없으면 원 종가
                let close = adjcloses
                    .get(i)
                    .copied()
                    .flatten()
                    .or_else(|| closes.get(i).copied().flatten())?;
                Some(PricePoint::new(date, close))
            })
            .collect();

        let points = normalize_points(points);
        if points.is_empty() {
            return Err(ProviderError::Empty);
        }

        debug!(symbol = symbol, count = points.len(), "Yahoo 시세 조회 완료");
        Ok(points)
    }
}
