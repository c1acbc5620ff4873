//! 벤더별 가격 제공자 어댑터.
//!
//! 각 어댑터는 (symbol, start, end) 요청을 날짜 오름차순의
//! `PricePoint` 목록으로 변환하거나 유형화된 `ProviderError`로
//! 실패합니다. 반환 전 정규화(정렬/중복 제거/무효 종가 제거)는
//! 어댑터 책임입니다.

pub mod finnhub;
pub mod fmp;
pub mod polygon;
pub mod yahoo;

pub use finnhub::FinnhubProvider;
pub use fmp::FmpProvider;
pub use polygon::PolygonProvider;
pub use yahoo::YahooProvider;

use crate::error::ProviderError;
use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use folio_core::{PricePoint, ProviderId};

/// 가격 시계열 제공자.
#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// 제공자 식별자.
    fn id(&self) -> ProviderId;

    /// `[start, end]` (양끝 포함) 범위의 일별 수정 종가를 조회합니다.
    ///
    /// 성공 시 정규화된(날짜 오름차순, 중복 없음, 양의 유한 종가만)
    /// 비어 있지 않은 목록을 반환합니다. 정규화 후 남는 점이 없으면
    /// `ProviderError::Empty`입니다.
    async fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>, ProviderError>;
}

/// 제공자 자격증명.
///
/// 세 개의 키 기반 벤더용 API 키를 환경 변수에서 읽습니다. 키가 없는
/// 제공자는 체인에서 개별 실패로 처리되고 다음 제공자로 넘어갑니다.
#[derive(Debug, Clone, Default)]
pub struct ProviderCredentials {
    pub finnhub_api_key: Option<String>,
    pub fmp_api_key: Option<String>,
    pub polygon_api_key: Option<String>,
}

impl ProviderCredentials {
    /// 환경 변수에서 자격증명을 로드합니다.
    ///
    /// `FINNHUB_API_KEY`, `FMP_API_KEY`, `POLYGON_API_KEY`를 읽으며,
    /// 없는 키는 `None`으로 남습니다.
    pub fn from_env() -> Self {
        Self {
            finnhub_api_key: std::env::var("FINNHUB_API_KEY").ok(),
            fmp_api_key: std::env::var("FMP_API_KEY").ok(),
            polygon_api_key: std::env::var("POLYGON_API_KEY").ok(),
        }
    }
}

/// 체인 식별자로 어댑터를 생성합니다.
pub fn build_provider(
    id: ProviderId,
    client: reqwest::Client,
    credentials: &ProviderCredentials,
) -> Box<dyn PriceProvider> {
    match id {
        ProviderId::Yahoo => Box::new(YahooProvider::new(client)),
        ProviderId::Finnhub => Box::new(FinnhubProvider::new(
            client,
            credentials.finnhub_api_key.clone(),
        )),
        ProviderId::Fmp => Box::new(FmpProvider::new(client, credentials.fmp_api_key.clone())),
        ProviderId::Polygon => Box::new(PolygonProvider::new(
            client,
            credentials.polygon_api_key.clone(),
        )),
    }
}

/// 어댑터 공통 정규화.
///
/// 무효 종가(비유한/0 이하) 제거 → 날짜 오름차순 정렬 → 날짜 중복
/// 제거(먼저 온 점 유지).
pub(crate) fn normalize_points(mut points: Vec<PricePoint>) -> Vec<PricePoint> {
    points.retain(|p| p.is_valid());
    points.sort_by_key(|p| p.date);
    points.dedup_by_key(|p| p.date);
    points
}

/// 날짜의 UTC 자정 Unix 초.
pub(crate) fn day_start_ts(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default()
}

/// 날짜의 UTC 23:59:59 Unix 초 (양끝 포함 범위의 끝).
pub(crate) fn day_end_ts(date: NaiveDate) -> i64 {
    date.and_hms_opt(23, 59, 59)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default()
}

/// Unix 초를 UTC 달력 날짜로 변환.
pub(crate) fn ts_to_date(ts: i64) -> Option<NaiveDate> {
    Utc.timestamp_opt(ts, 0).single().map(|dt| dt.date_naive())
}

/// Unix 밀리초를 UTC 달력 날짜로 변환.
pub(crate) fn ts_millis_to_date(ts: i64) -> Option<NaiveDate> {
    Utc.timestamp_millis_opt(ts)
        .single()
        .map(|dt| dt.date_naive())
}
