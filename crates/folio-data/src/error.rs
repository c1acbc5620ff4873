//! 데이터 수집 모듈 오류 타입.

use folio_core::ProviderId;
use thiserror::Error;

/// 제공자 한 번의 시도에 대한 유형화된 실패.
///
/// 폴백 체인은 시도마다 이 타입을 기록하며, 체인에 후보가 남아 있는
/// 동안에는 로그로만 남기고 다음 제공자로 진행합니다.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// 해당 제공자의 API 키가 설정되지 않음
    #[error("Credentials missing for provider: {0}")]
    CredentialsMissing(ProviderId),

    /// HTTP 전송/응답 오류
    #[error("HTTP error: {0}")]
    Http(String),

    /// 벤더가 실패 상태를 반환함 (예: Finnhub `s != "ok"`)
    #[error("Upstream status: {0}")]
    Status(String),

    /// 요청 타임아웃 (시도 취소 후 다음 제공자로 진행)
    #[error("Request timed out after {0}s")]
    Timeout(u64),

    /// 응답 본문을 해석할 수 없음
    #[error("Malformed payload: {0}")]
    Malformed(String),

    /// 정규화 후 유효한 가격이 하나도 없음
    #[error("Empty result set")]
    Empty,
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ProviderError::Malformed(err.to_string())
        } else {
            ProviderError::Http(err.to_string())
        }
    }
}

/// 수집 레이어 오류.
#[derive(Debug, Error)]
pub enum DataError {
    /// 체인의 모든 제공자가 실패함
    ///
    /// 시도한 제공자 목록(순서 그대로)과 마지막 실패 원인을 담습니다.
    #[error("All providers failed [{}]: {last}", .attempted.iter().map(|p| p.as_str()).collect::<Vec<_>>().join(", "))]
    AllProvidersFailed {
        attempted: Vec<ProviderId>,
        #[source]
        last: ProviderError,
    },

    /// 캐시 오류
    #[error("Cache error: {0}")]
    CacheError(String),

    /// 직렬화/역직렬화 오류
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<redis::RedisError> for DataError {
    fn from(err: redis::RedisError) -> Self {
        DataError::CacheError(err.to_string())
    }
}

impl From<serde_json::Error> for DataError {
    fn from(err: serde_json::Error) -> Self {
        DataError::SerializationError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DataError>;
