//! 캐시 우선 + 순서 기반 제공자 폴백 수집기.
//!
//! 하나의 벤더는 언제든 요청 한도 초과, 심볼 누락, 미인증 상태일 수
//! 있으므로, 호출자가 정한 우선순위 체인을 따라 투명하게 폴백하고
//! 성공한 결과를 캐시합니다.
//!
//! # 동작 흐름
//!
//! ```text
//! 요청 (symbol, start, end)
//!         │
//!         ▼  체인의 제공자마다 순서대로
//! ┌─────────────────────┐
//! │ 1. 제공자별 캐시 키  │ ← 키는 제공자 단위로 분리
//! └─────────┬───────────┘
//!           │
//!     ┌─────┴──────┐
//!     │ 캐시 적중?  │── YES → 즉시 반환 (남은 제공자 건너뜀)
//!     └─────┬──────┘
//!        NO │
//!           ▼
//! ┌─────────────────────┐
//! │ 2. 제공자 호출       │ ← 시도당 타임아웃
//! └─────────┬───────────┘
//!     성공  │  실패 → 기록 후 다음 제공자로
//!           ▼
//! ┌─────────────────────┐
//! │ 3. 캐시 저장 후 반환 │ ← 빈 결과는 캐시하지 않음
//! └─────────────────────┘
//!
//! 체인 소진 → AllProvidersFailed (시도 목록 + 마지막 원인)
//! ```

use crate::cache::{candles_cache_key, CacheStore};
use crate::error::{DataError, ProviderError, Result};
use crate::provider::{build_provider, PriceProvider, ProviderCredentials};
use chrono::NaiveDate;
use folio_core::{PricePoint, ProviderId};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// 수집 결과.
#[derive(Debug)]
pub struct FetchedSeries {
    /// 정규화된 가격 시계열 (비어 있지 않음)
    pub points: Vec<PricePoint>,
    /// 데이터를 공급한 제공자
    pub provider: ProviderId,
    /// 캐시에서 읽었는지 여부
    pub cache_hit: bool,
}

/// 캐시 우선 다중 제공자 수집기.
pub struct SeriesFetcher {
    providers: Vec<Box<dyn PriceProvider>>,
    cache: Option<Arc<dyn CacheStore>>,
    cache_ttl_secs: u64,
    timeout: Duration,
}

impl SeriesFetcher {
    /// 기본 타임아웃 (초). 초과한 시도는 실패로 간주하고 체인을
    /// 진행합니다.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 12;

    /// 기본 캐시 TTL (초). 벤더가 분할/배당 후 수정 종가를 소급
    /// 재계산하므로 항목은 만료되어야 합니다.
    pub const DEFAULT_CACHE_TTL_SECS: u64 = 86_400;

    /// 자격증명과 제공자 체인으로 수집기를 생성합니다.
    ///
    /// `chain`은 호출자가 정한 우선순위 순서이며 비어 있으면 안
    /// 됩니다. 캐시는 선택 사항으로, 없으면 모든 호출이 제공자로
    /// 직행합니다.
    pub fn new(credentials: &ProviderCredentials, chain: &[ProviderId]) -> Self {
        let client = reqwest::Client::new();
        let providers = chain
            .iter()
            .map(|&id| build_provider(id, client.clone(), credentials))
            .collect();

        Self {
            providers,
            cache: None,
            cache_ttl_secs: Self::DEFAULT_CACHE_TTL_SECS,
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
        }
    }

    /// 캐시 저장소를 연결합니다.
    pub fn with_cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// 캐시 TTL을 설정합니다.
    pub fn with_cache_ttl(mut self, ttl_secs: u64) -> Self {
        self.cache_ttl_secs = ttl_secs;
        self
    }

    /// 제공자별 요청 타임아웃을 설정합니다.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// 제공자 목록을 교체합니다 (커스텀 어댑터/테스트용).
    pub fn with_providers(mut self, providers: Vec<Box<dyn PriceProvider>>) -> Self {
        self.providers = providers;
        self
    }

    /// 한 종목의 가격 시계열을 조회합니다.
    ///
    /// 체인의 제공자를 순서대로 시도합니다. 제공자마다 먼저 해당
    /// 제공자 범위의 캐시를 확인하고, 비어 있지 않은 적중이면 남은
    /// 제공자를 건너뛰고 즉시 반환합니다. TTL 만료는 저장소가
    /// 책임지므로 적중은 그 자체로 신뢰합니다.
    ///
    /// 모든 제공자가 실패하면 시도한 제공자 목록과 마지막 원인을 담은
    /// `DataError::AllProvidersFailed`를 반환합니다.
    #[instrument(skip(self))]
    pub async fn fetch_series(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchedSeries> {
        let mut attempted: Vec<ProviderId> = Vec::with_capacity(self.providers.len());
        let mut last_error: Option<ProviderError> = None;

        for provider in &self.providers {
            let id = provider.id();
            attempted.push(id);
            let key = candles_cache_key(id, symbol, start, end);

            // 1. 캐시 확인 (읽기 실패는 미스로 간주)
            if let Some(cache) = &self.cache {
                match cache.get(&key).await {
                    Ok(Some(json)) => match serde_json::from_str::<Vec<PricePoint>>(&json) {
                        Ok(points) if !points.is_empty() => {
                            debug!(symbol = symbol, provider = %id, count = points.len(), "캐시 적중");
                            return Ok(FetchedSeries {
                                points,
                                provider: id,
                                cache_hit: true,
                            });
                        }
                        Ok(_) => {}
                        Err(e) => {
                            warn!(symbol = symbol, provider = %id, error = %e, "캐시 항목 역직렬화 실패, 미스로 간주");
                        }
                    },
                    Ok(None) => {}
                    Err(e) => {
                        warn!(symbol = symbol, provider = %id, error = %e, "캐시 조회 실패, 미스로 간주");
                    }
                }
            }

            // 2. 제공자 호출 (시도당 타임아웃)
            let outcome = tokio::time::timeout(self.timeout, provider.fetch(symbol, start, end)).await;

            match outcome {
                Err(_) => {
                    let err = ProviderError::Timeout(self.timeout.as_secs());
                    warn!(symbol = symbol, provider = %id, error = %err, "제공자 타임아웃, 다음 제공자로 진행");
                    last_error = Some(err);
                }
                Ok(Err(err)) => {
                    warn!(symbol = symbol, provider = %id, error = %err, "제공자 실패, 다음 제공자로 진행");
                    last_error = Some(err);
                }
                Ok(Ok(points)) => {
                    // 3. 캐시 저장 (빈 결과는 어댑터 계약상 오지 않음;
                    //    저장 실패는 성공적인 조회를 깨지 않는다)
                    if let Some(cache) = &self.cache {
                        match serde_json::to_string(&points) {
                            Ok(json) => {
                                if let Err(e) = cache.put(&key, &json, self.cache_ttl_secs).await {
                                    warn!(symbol = symbol, provider = %id, error = %e, "캐시 저장 실패");
                                }
                            }
                            Err(e) => {
                                warn!(symbol = symbol, provider = %id, error = %e, "캐시 직렬화 실패");
                            }
                        }
                    }

                    info!(symbol = symbol, provider = %id, count = points.len(), "시세 조회 완료");
                    return Ok(FetchedSeries {
                        points,
                        provider: id,
                        cache_hit: false,
                    });
                }
            }
        }

        Err(DataError::AllProvidersFailed {
            attempted,
            last: last_error.unwrap_or(ProviderError::Empty),
        })
    }

    /// 여러 종목을 동시에 조회합니다.
    ///
    /// 종목 간 순서나 공정성은 보장하지 않습니다. 동시성 상한이
    /// 필요한 호출자는 직접 배치를 나눠야 합니다.
    pub async fn fetch_many(
        &self,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Vec<(String, Result<FetchedSeries>)> {
        let futures = symbols.iter().map(|symbol| async move {
            let result = self.fetch_series(symbol, start, end).await;
            (symbol.clone(), result)
        });

        futures::future::join_all(futures).await
    }
}
