//! TTL 기반 키-값 캐시.
//!
//! 수집 레이어는 캐시를 구체적인 데이터베이스가 아니라 주입된
//! 능력(capability)으로 다룹니다. 값은 JSON 문자열이고 만료는
//! 저장소가 책임집니다. 운영환경은 Redis, 테스트는 인메모리 구현을
//! 사용합니다.

pub mod memory;
pub mod redis;

pub use memory::MemoryCache;
pub use redis::{RedisCache, RedisConfig};

use crate::error::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use folio_core::ProviderId;

/// JSON 값 + TTL 키-값 저장소 능력.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// 키에 해당하는 JSON 값을 가져옵니다. 만료되었거나 없으면 `None`.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// TTL과 함께 JSON 값을 저장합니다.
    async fn put(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()>;

    /// 키를 삭제합니다. 존재했다면 `true`.
    async fn delete(&self, key: &str) -> Result<bool>;
}

/// 캔들 캐시 키.
///
/// 키는 제공자 단위로 분리됩니다. 같은 종목/범위라도 벤더마다 값이
/// 다를 수 있으므로, 키를 합치면 오래된 다른 벤더의 답이 정상 벤더를
/// 가리게 됩니다.
pub fn candles_cache_key(
    provider: ProviderId,
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> String {
    format!(
        "cache:stocks:candles:v1:{}:{}:{}:{}",
        provider, symbol, start, end
    )
}
