//! 제공자 어댑터 통합 테스트.
//!
//! mockito로 벤더 응답을 흉내 내어 와이어 파싱과 폴백 체인을
//! 종단 간으로 검증합니다.

use chrono::NaiveDate;
use folio_core::ProviderId;
use folio_data::{
    candles_cache_key, CacheStore, FinnhubProvider, FmpProvider, MemoryCache, PolygonProvider,
    PriceProvider, ProviderCredentials, SeriesFetcher, YahooProvider,
};
use mockito::Matcher;
use std::sync::Arc;

fn d(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

fn client() -> reqwest::Client {
    reqwest::Client::new()
}

// ============================================================================
// Yahoo
// ============================================================================

/// 2024-01-02 ~ 2024-01-04 3거래일치 chart 응답.
fn yahoo_chart_body() -> String {
    serde_json::json!({
        "chart": {
            "result": [{
                "timestamp": [1704153600i64, 1704240000i64, 1704326400i64],
                "indicators": {
                    "quote": [{ "close": [186.0, 184.5, 182.0] }],
                    "adjclose": [{ "adjclose": [185.6, null, 181.7] }]
                }
            }]
        }
    })
    .to_string()
}

#[tokio::test]
async fn test_yahoo_prefers_adjclose_with_close_fallback() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", Matcher::Regex(r"^/v8/finance/chart/AAPL.*".to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(yahoo_chart_body())
        .create_async()
        .await;

    let provider = YahooProvider::new(client()).with_base_url(server.url());
    let points = provider
        .fetch("AAPL", d("2024-01-01"), d("2024-01-31"))
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(points.len(), 3);
    assert_eq!(points[0].date, d("2024-01-02"));
    assert_eq!(points[0].close, 185.6); // adjclose
    assert_eq!(points[1].close, 184.5); // adjclose null → 원 종가
    assert_eq!(points[2].close, 181.7);
}

#[tokio::test]
async fn test_yahoo_missing_result_envelope_fails() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", Matcher::Regex(r"^/v8/finance/chart/.*".to_string()))
        .with_status(200)
        .with_body(r#"{"chart":{"result":null}}"#)
        .create_async()
        .await;

    let provider = YahooProvider::new(client()).with_base_url(server.url());
    let err = provider
        .fetch("NOPE", d("2024-01-01"), d("2024-01-31"))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("result envelope"));
}

#[tokio::test]
async fn test_yahoo_class_share_symbol_is_percent_encoded() {
    let mut server = mockito::Server::new_async().await;
    // "BRK/B" 같은 구분자는 경로에 그대로 들어가면 안 된다
    let mock = server
        .mock(
            "GET",
            Matcher::Regex(r"^/v8/finance/chart/BRK%2FB.*".to_string()),
        )
        .with_status(200)
        .with_body(yahoo_chart_body())
        .create_async()
        .await;

    let provider = YahooProvider::new(client()).with_base_url(server.url());
    provider
        .fetch("BRK/B", d("2024-01-01"), d("2024-01-31"))
        .await
        .unwrap();

    mock.assert_async().await;
}

// ============================================================================
// Finnhub
// ============================================================================

#[tokio::test]
async fn test_finnhub_parses_candles() {
    let mut server = mockito::Server::new_async().await;
    let body = serde_json::json!({
        "s": "ok",
        "t": [1704153600i64, 1704240000i64],
        "c": [186.0, 184.5]
    })
    .to_string();
    server
        .mock("GET", Matcher::Regex(r"^/api/v1/stock/candle.*".to_string()))
        .with_status(200)
        .with_body(body)
        .create_async()
        .await;

    let provider = FinnhubProvider::new(client(), Some("test-key".to_string()))
        .with_base_url(server.url());
    let points = provider
        .fetch("AAPL", d("2024-01-01"), d("2024-01-31"))
        .await
        .unwrap();

    assert_eq!(points.len(), 2);
    assert_eq!(points[0].date, d("2024-01-02"));
    assert_eq!(points[1].close, 184.5);
}

#[tokio::test]
async fn test_finnhub_non_ok_status_fails() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", Matcher::Regex(r"^/api/v1/stock/candle.*".to_string()))
        .with_status(200)
        .with_body(r#"{"s":"no_data","t":[],"c":[]}"#)
        .create_async()
        .await;

    let provider = FinnhubProvider::new(client(), Some("test-key".to_string()))
        .with_base_url(server.url());
    let err = provider
        .fetch("NOPE", d("2024-01-01"), d("2024-01-31"))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("no_data"));
}

#[tokio::test]
async fn test_finnhub_without_key_fails_before_any_request() {
    // base_url이 가리키는 서버가 없어도 키 검사가 먼저 실패해야 한다
    let provider =
        FinnhubProvider::new(client(), None).with_base_url("http://127.0.0.1:1".to_string());
    let err = provider
        .fetch("AAPL", d("2024-01-01"), d("2024-01-31"))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("Credentials missing"));
}

// ============================================================================
// FMP
// ============================================================================

#[tokio::test]
async fn test_fmp_descending_dates_are_normalized_ascending() {
    let mut server = mockito::Server::new_async().await;
    let body = serde_json::json!({
        "symbol": "AAPL",
        "historical": [
            { "date": "2024-01-04", "close": 182.0, "adjClose": 181.7 },
            { "date": "2024-01-03", "close": 184.5 },
            { "date": "2024-01-02", "close": 186.0, "adjClose": 185.6 }
        ]
    })
    .to_string();
    server
        .mock(
            "GET",
            Matcher::Regex(r"^/api/v3/historical-price-full/AAPL.*".to_string()),
        )
        .with_status(200)
        .with_body(body)
        .create_async()
        .await;

    let provider =
        FmpProvider::new(client(), Some("test-key".to_string())).with_base_url(server.url());
    let points = provider
        .fetch("AAPL", d("2024-01-01"), d("2024-01-31"))
        .await
        .unwrap();

    assert_eq!(points.len(), 3);
    assert_eq!(points[0].date, d("2024-01-02"));
    assert_eq!(points[0].close, 185.6); // adjClose
    assert_eq!(points[1].close, 184.5); // adjClose 없음 → close
    assert_eq!(points[2].date, d("2024-01-04"));
}

#[tokio::test]
async fn test_fmp_empty_historical_fails() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock(
            "GET",
            Matcher::Regex(r"^/api/v3/historical-price-full/.*".to_string()),
        )
        .with_status(200)
        .with_body(r#"{"symbol":"NOPE","historical":[]}"#)
        .create_async()
        .await;

    let provider =
        FmpProvider::new(client(), Some("test-key".to_string())).with_base_url(server.url());
    let err = provider
        .fetch("NOPE", d("2024-01-01"), d("2024-01-31"))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("Empty"));
}

// ============================================================================
// Polygon
// ============================================================================

#[tokio::test]
async fn test_polygon_parses_millisecond_timestamps() {
    let mut server = mockito::Server::new_async().await;
    let body = serde_json::json!({
        "results": [
            { "t": 1704153600000i64, "c": 186.0 },
            { "t": 1704240000000i64, "c": 184.5 }
        ]
    })
    .to_string();
    server
        .mock(
            "GET",
            Matcher::Regex(r"^/v2/aggs/ticker/AAPL/range/1/day/.*".to_string()),
        )
        .with_status(200)
        .with_body(body)
        .create_async()
        .await;

    let provider =
        PolygonProvider::new(client(), Some("test-key".to_string())).with_base_url(server.url());
    let points = provider
        .fetch("AAPL", d("2024-01-01"), d("2024-01-31"))
        .await
        .unwrap();

    assert_eq!(points.len(), 2);
    assert_eq!(points[0].date, d("2024-01-02"));
    assert_eq!(points[1].date, d("2024-01-03"));
}

// ============================================================================
// 폴백 체인 종단 간
// ============================================================================

#[tokio::test]
async fn test_chain_falls_back_from_http_error_and_caches_winner() {
    let mut server = mockito::Server::new_async().await;

    // Yahoo는 500, Finnhub는 정상 응답
    server
        .mock("GET", Matcher::Regex(r"^/v8/finance/chart/.*".to_string()))
        .with_status(500)
        .with_body("upstream exploded")
        .create_async()
        .await;
    let finnhub_mock = server
        .mock("GET", Matcher::Regex(r"^/api/v1/stock/candle.*".to_string()))
        .with_status(200)
        .with_body(r#"{"s":"ok","t":[1704153600,1704240000],"c":[186.0,184.5]}"#)
        .expect(1)
        .create_async()
        .await;

    let providers: Vec<Box<dyn PriceProvider>> = vec![
        Box::new(YahooProvider::new(client()).with_base_url(server.url())),
        Box::new(
            FinnhubProvider::new(client(), Some("test-key".to_string()))
                .with_base_url(server.url()),
        ),
    ];

    let cache = Arc::new(MemoryCache::new());
    let fetcher = SeriesFetcher::new(&ProviderCredentials::default(), &[])
        .with_providers(providers)
        .with_cache(cache.clone());

    let fetched = fetcher
        .fetch_series("AAPL", d("2024-01-01"), d("2024-01-31"))
        .await
        .unwrap();

    assert_eq!(fetched.provider, ProviderId::Finnhub);
    assert!(!fetched.cache_hit);

    // 성공한 제공자의 키만 캐시된다
    assert_eq!(cache.len().await, 1);
    let finnhub_key =
        candles_cache_key(ProviderId::Finnhub, "AAPL", d("2024-01-01"), d("2024-01-31"));
    assert!(cache.get(&finnhub_key).await.unwrap().is_some());

    // 두 번째 호출은 캐시 적중으로 HTTP를 타지 않는다
    let again = fetcher
        .fetch_series("AAPL", d("2024-01-01"), d("2024-01-31"))
        .await
        .unwrap();
    assert!(again.cache_hit);
    finnhub_mock.assert_async().await;
}
