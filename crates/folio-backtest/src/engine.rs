//! 백테스트 시뮬레이션 엔진.
//!
//! 목표 비중과 종목별 가격 시계열로 포트폴리오를 하루 단위로
//! 시뮬레이션합니다. 시뮬레이션 달력은 모든 종목의 거래일 합집합이라
//! 종목끼리 달력을 공유할 필요가 없고, 윈도우 중간에 상장된 종목은
//! 처음 가격이 생기는 날 편입(entry)되어 그 시점에 전체 리밸런싱이
//! 일어납니다.
//!
//! # 사용 예시
//!
//! ```rust,ignore
//! use folio_backtest::{run_backtest, BacktestRequest};
//! use folio_core::TargetWeight;
//!
//! let request = BacktestRequest::new(
//!     vec![TargetWeight::new("VTI", 0.7), TargetWeight::new("BND", 0.3)],
//!     start,
//!     end,
//!     series_by_symbol,
//! );
//!
//! let report = run_backtest(&request)?;
//! println!("{}", report.summary());
//! ```

use crate::metrics;
use chrono::{Months, NaiveDate, Utc};
use folio_core::{DrawdownInfo, EntryEvent, PricePoint, TargetWeight, ValuePoint};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use thiserror::Error;
use tracing::debug;

/// 백테스트 오류.
///
/// 셋 모두 요청 자체가 충족 불가능함을 뜻하므로 재시도하지 않고
/// 호출자가 요청을 고쳐야 합니다. 기본값/0 결과로 강등되지 않습니다.
#[derive(Debug, Error)]
pub enum BacktestError {
    /// 비중 합이 0 이하이거나 유한하지 않음
    #[error("잘못된 비중: 비중 합이 0보다 커야 합니다 (합={0})")]
    InvalidWeight(f64),

    /// 요청/클램핑된 범위 안에 사용할 수 있는 가격이 없는 종목
    #[error("가격 데이터 없음: {0}")]
    NoDataForSymbol(String),

    /// 거래일 또는 NAV 포인트가 2개 미만
    #[error("거래일 부족: 최소 2일의 데이터가 필요합니다")]
    InsufficientTradingDays,
}

/// 백테스트 결과 타입.
pub type BacktestResult<T> = Result<T, BacktestError>;

/// 백테스트 요청.
#[derive(Debug, Clone)]
pub struct BacktestRequest {
    /// 목표 비중 (정규화 전; 합이 1일 필요 없음)
    pub weights: Vec<TargetWeight>,
    /// 요청 시작일 (클램핑 대상)
    pub start_date: NaiveDate,
    /// 요청 종료일 (그대로 사용)
    pub end_date: NaiveDate,
    /// 종목별 가격 시계열 (수집 레이어가 채움)
    pub series_by_symbol: HashMap<String, Vec<PricePoint>>,
    /// 종목별 데이터 출처 감사 맵
    pub provider_by_symbol: HashMap<String, String>,
    /// 시작일 클램핑 한도 (년, 기본 30)
    pub clamp_years: Option<i32>,
    /// 결과에 먼저 실을 노트
    pub notes: Vec<String>,
}

impl BacktestRequest {
    /// 새로운 백테스트 요청을 생성합니다.
    pub fn new(
        weights: Vec<TargetWeight>,
        start_date: NaiveDate,
        end_date: NaiveDate,
        series_by_symbol: HashMap<String, Vec<PricePoint>>,
    ) -> Self {
        Self {
            weights,
            start_date,
            end_date,
            series_by_symbol,
            provider_by_symbol: HashMap::new(),
            clamp_years: None,
            notes: Vec::new(),
        }
    }

    /// 데이터 출처 감사 맵 설정.
    pub fn with_provider_map(mut self, provider_by_symbol: HashMap<String, String>) -> Self {
        self.provider_by_symbol = provider_by_symbol;
        self
    }

    /// 클램핑 한도 설정.
    pub fn with_clamp_years(mut self, years: i32) -> Self {
        self.clamp_years = Some(years);
        self
    }

    /// 노트 추가.
    pub fn with_notes(mut self, notes: Vec<String>) -> Self {
        self.notes = notes;
        self
    }
}

/// 백테스트 실행 리포트.
///
/// 모든 숫자 필드는 유한합니다 (퇴화 입력에서 나온 비유한 값은 0으로
/// 강제). 그대로 JSON으로 직렬화해 응답 본문으로 쓸 수 있습니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestReport {
    /// 연평균 성장률 (%)
    pub cagr: f64,
    /// 총 수익률 (%)
    pub total_return: f64,
    /// 최대 낙폭 (%)
    pub max_drawdown: f64,
    /// 샤프 비율 (252일 연율화)
    pub sharpe_ratio: f64,
    /// 클램핑/필터링 후 실제 시작일
    pub actual_start_date: NaiveDate,
    /// 실제 종료일
    pub actual_end_date: NaiveDate,
    /// 종목별 데이터 출처
    pub provider_by_symbol: HashMap<String, String>,
    /// 사람이 읽는 노트
    pub notes: Vec<String>,
    /// NAV 시계열 (첫 값 1.0)
    pub value_series: Vec<ValuePoint>,
    /// 최대 낙폭 상세 (고점/저점 쌍 + 회복일)
    pub max_drawdown_info: DrawdownInfo,
    /// 종목 편입 이벤트 (발생 순)
    pub entry_events: Vec<EntryEvent>,
}

impl BacktestReport {
    /// 요약 문자열 반환.
    pub fn summary(&self) -> String {
        let duration_days = (self.actual_end_date - self.actual_start_date).num_days();

        format!(
            "백테스트 결과 요약\n\
             ═══════════════════════════════════════\n\
             기간: {} → {} ({} 일)\n\
             NAV 포인트: {}\n\
             ───────────────────────────────────────\n\
             총 수익률: {:.2}%\n\
             CAGR: {:.2}%\n\
             샤프 비율: {:.2}\n\
             최대 낙폭: {:.2}%\n\
             ───────────────────────────────────────\n\
             편입 이벤트: {}\n",
            self.actual_start_date,
            self.actual_end_date,
            duration_days,
            self.value_series.len(),
            self.total_return,
            self.cagr,
            self.sharpe_ratio,
            self.max_drawdown,
            self.entry_events.len(),
        )
    }
}

/// 시뮬레이션 상태.
///
/// "이 종목을 처음 봤다" 식의 임시 플래그 대신, 달력 날짜마다
/// 전이하는 명시적 상태로 관리합니다.
struct SimState {
    /// 편입된 종목 (편입 순서 무관, 조회용)
    active: BTreeSet<String>,
    /// 종목별 보유 수량
    shares: HashMap<String, f64>,
    /// 마지막으로 확정된 포트폴리오 가치
    portfolio_value: f64,
}

impl SimState {
    fn new() -> Self {
        Self {
            active: BTreeSet::new(),
            shares: HashMap::new(),
            portfolio_value: 1.0,
        }
    }
}

/// 백테스트를 실행합니다.
///
/// 순수 동기 함수이며 같은 입력에 같은 결과를 반환합니다. 시작일
/// 클램핑의 기준 날짜만 현재 UTC 날짜를 사용합니다.
pub fn run_backtest(request: &BacktestRequest) -> BacktestResult<BacktestReport> {
    run_backtest_at(request, Utc::now().date_naive())
}

/// 기준 날짜를 지정해 백테스트를 실행합니다 (클램핑 결정성 확보용).
pub fn run_backtest_at(
    request: &BacktestRequest,
    today: NaiveDate,
) -> BacktestResult<BacktestReport> {
    // 1. 비중 정규화
    let normalized = normalize_weights(&request.weights)?;

    // 2. 시작일 클램핑: 재계산 비용을 묶고 세기 단위 윈도우를 막는다
    let clamp_years = request.clamp_years.unwrap_or(30).max(0) as u32;
    let cutoff = today
        .checked_sub_months(Months::new(clamp_years * 12))
        .unwrap_or(today);
    let effective_start = request.start_date.max(cutoff);
    let end = request.end_date;

    // 3. 종목별 인덱싱: 범위 필터 + 정렬, 첫 거래일 기록
    let mut prices_by_symbol: HashMap<&str, BTreeMap<NaiveDate, f64>> = HashMap::new();
    for symbol in normalized.keys() {
        let series = request
            .series_by_symbol
            .get(symbol.as_str())
            .ok_or_else(|| BacktestError::NoDataForSymbol(symbol.clone()))?;

        let filtered: BTreeMap<NaiveDate, f64> = series
            .iter()
            .filter(|p| p.is_valid() && p.date >= effective_start && p.date <= end)
            .map(|p| (p.date, p.close))
            .collect();

        if filtered.is_empty() {
            // 가격을 매길 수 없는 자산은 편입할 수 없다
            return Err(BacktestError::NoDataForSymbol(symbol.clone()));
        }

        prices_by_symbol.insert(symbol.as_str(), filtered);
    }

    // 4. 거래일 합집합
    let calendar: BTreeSet<NaiveDate> = prices_by_symbol
        .values()
        .flat_map(|prices| prices.keys().copied())
        .collect();
    if calendar.len() < 2 {
        return Err(BacktestError::InsufficientTradingDays);
    }

    // 정렬된 종목 목록 (같은 날 편입 이벤트의 결정적 순서)
    let symbols: Vec<&str> = {
        let mut s: Vec<&str> = normalized.keys().map(String::as_str).collect();
        s.sort_unstable();
        s
    };

    // 5. 하루 단위 시뮬레이션
    let mut state = SimState::new();
    let mut value_series: Vec<ValuePoint> = Vec::with_capacity(calendar.len());
    let mut entry_events: Vec<EntryEvent> = Vec::new();

    for &date in &calendar {
        let price_of = |symbol: &str| -> Option<f64> {
            prices_by_symbol.get(symbol).and_then(|m| m.get(&date)).copied()
        };

        // 오늘 처음 가격이 생긴 종목 = 편입 이벤트
        let new_entries: Vec<&str> = symbols
            .iter()
            .copied()
            .filter(|s| !state.active.contains(*s) && price_of(s).is_some())
            .collect();

        if !new_entries.is_empty() {
            // 기존 보유분이 있으면 먼저 오늘 가격으로 재평가해
            // 리밸런싱 직전 포트폴리오 가치를 확정한다
            if !state.active.is_empty() {
                let revalued: f64 = state
                    .active
                    .iter()
                    .filter_map(|s| {
                        let price = price_of(s)?;
                        Some(state.shares.get(s.as_str()).copied().unwrap_or(0.0) * price)
                    })
                    .sum();
                if revalued > 0.0 {
                    state.portfolio_value = revalued;
                }
            }

            for symbol in &new_entries {
                entry_events.push(EntryEvent {
                    date,
                    symbol: (*symbol).to_string(),
                });
                state.active.insert((*symbol).to_string());
            }

            // 편입이 있었던 날은 전체 리밸런싱: 오늘 가격이 있는 편입
            // 종목들만으로 목표 비중을 다시 1로 정규화한다
            let priced_active: Vec<&str> = symbols
                .iter()
                .copied()
                .filter(|s| state.active.contains(*s) && price_of(s).is_some())
                .collect();
            let weight_total: f64 = priced_active
                .iter()
                .map(|s| normalized.get(*s).copied().unwrap_or(0.0))
                .sum();

            if weight_total > 0.0 {
                debug!(date = %date, entries = new_entries.len(), "편입 리밸런싱");
                for symbol in &priced_active {
                    let weight = normalized.get(*symbol).copied().unwrap_or(0.0) / weight_total;
                    // price_of는 priced_active 구성상 항상 Some이다
                    if let Some(price) = price_of(symbol) {
                        state
                            .shares
                            .insert((*symbol).to_string(), state.portfolio_value * weight / price);
                    }
                }
            }
        }

        // 오늘 가격이 있는 편입 종목들로 포트폴리오 가치 계산
        let value: f64 = state
            .active
            .iter()
            .filter_map(|s| {
                let price = price_of(s)?;
                Some(state.shares.get(s.as_str()).copied().unwrap_or(0.0) * price)
            })
            .sum();

        // 기여하는 가격이 없는 날은 기록하지 않는다 (0이나 이월값 금지)
        if value > 0.0 {
            value_series.push(ValuePoint { date, value });
            state.portfolio_value = value;
        }
    }

    if value_series.len() < 2 {
        return Err(BacktestError::InsufficientTradingDays);
    }

    // 6. 파생 지표
    let total_return = metrics::total_return_pct(&value_series);
    let cagr = metrics::cagr_pct(&value_series);
    let drawdown_info = metrics::max_drawdown(&value_series);
    let sharpe = metrics::sharpe_ratio(&value_series);

    // 7. 노트: 출처는 항상, 동적 편입은 복수 이벤트일 때만
    let mut notes = request.notes.clone();
    notes.push(provenance_note(&symbols, &request.provider_by_symbol));
    if entry_events.len() > 1 {
        notes.push(format!(
            "고정 초기 바스켓이 아닌 동적 편입 시뮬레이션입니다: {}개 종목이 서로 다른 시점에 편입되었습니다.",
            entry_events.len()
        ));
    }

    let actual_start_date = value_series[0].date;
    let actual_end_date = value_series[value_series.len() - 1].date;

    Ok(BacktestReport {
        cagr,
        total_return,
        max_drawdown: drawdown_info.drawdown_pct,
        sharpe_ratio: sharpe,
        actual_start_date,
        actual_end_date,
        provider_by_symbol: request.provider_by_symbol.clone(),
        notes,
        value_series,
        max_drawdown_info: drawdown_info,
        entry_events,
    })
}

/// 비중 정규화.
///
/// 비유한 비중은 0으로 취급해 합산하고, 합이 0 이하이면
/// `InvalidWeight`입니다. 같은 종목이 여러 번 나오면 비중을
/// 합칩니다.
fn normalize_weights(weights: &[TargetWeight]) -> BacktestResult<HashMap<String, f64>> {
    let total: f64 = weights
        .iter()
        .map(|w| if w.weight.is_finite() { w.weight } else { 0.0 })
        .sum();

    if !(total > 0.0) {
        return Err(BacktestError::InvalidWeight(total));
    }

    let mut normalized: HashMap<String, f64> = HashMap::new();
    for w in weights {
        let weight = if w.weight.is_finite() { w.weight } else { 0.0 };
        *normalized.entry(w.symbol.clone()).or_insert(0.0) += weight / total;
    }

    Ok(normalized)
}

/// 데이터 출처 노트.
fn provenance_note(symbols: &[&str], provider_by_symbol: &HashMap<String, String>) -> String {
    let mut sources: Vec<String> = symbols
        .iter()
        .map(|s| {
            let provider = provider_by_symbol
                .get(*s)
                .map(String::as_str)
                .unwrap_or("미상");
            format!("{}={}", s, provider)
        })
        .collect();
    sources.sort_unstable();

    format!("가격 데이터 출처: {}", sources.join(", "))
}
