//! 성과 지표 계산 모듈.
//!
//! 완성된 NAV 시계열에서 파생 지표를 계산합니다:
//! - 총 수익률 / CAGR (연평균 성장률)
//! - 최대 낙폭 (고점-저점 쌍 + 회복일)
//! - 샤프 비율 (일일 단순 수익률 기준, 252일 연율화)
//!
//! 퇴화된 입력(길이 0 윈도우 등)에서 나오는 비유한 값은 결과 경계에서
//! 0으로 강제되어, 출력은 항상 유한한 숫자 레코드입니다.

use chrono::NaiveDate;
use folio_core::{DrawdownInfo, ValuePoint};

/// 연간 거래일 수 (연율화 계산에 사용).
///
/// 원 시스템이 관측 거래일 수와 무관하게 고정 252일을 사용하므로
/// 그대로 유지합니다. 바꾸면 기존 결과와 통계가 달라집니다.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// 비유한 값을 0으로 강제합니다.
pub fn sanitize(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// 총 수익률 (%).
///
/// 첫 NAV가 1.0이므로 `(최종값 − 1) × 100`.
pub fn total_return_pct(series: &[ValuePoint]) -> f64 {
    match series.last() {
        Some(last) => sanitize((last.value - 1.0) * 100.0),
        None => 0.0,
    }
}

/// CAGR (%).
///
/// `years = 경과일 / 365.25`, `(최종값^(1/years) − 1) × 100`.
/// 경과 기간이 0이면 0입니다.
pub fn cagr_pct(series: &[ValuePoint]) -> f64 {
    let (first, last) = match (series.first(), series.last()) {
        (Some(f), Some(l)) => (f, l),
        _ => return 0.0,
    };

    let days = (last.date - first.date).num_days() as f64;
    let years = days / 365.25;
    if years <= 0.0 {
        return 0.0;
    }

    sanitize((last.value.powf(1.0 / years) - 1.0) * 100.0)
}

/// 최대 낙폭과 해당 고점/저점/회복일.
///
/// 단일 전방 패스로 진행 중인 고점을 추적하면서, 낙폭이 지금까지의
/// 최댓값을 넘어설 때마다 *현재* 고점의 날짜/값과 현재 날짜를
/// 후보 쌍으로 기록합니다. 이렇게 하면 보고되는 고점/저점이 인과적으로
/// 짝을 이루며, 서로 독립적으로 고른 전역 최대/최소가 되지 않습니다.
///
/// 회복일은 저점 이후 NAV가 짝을 이룬 고점 값 이상이 된 첫 날이고,
/// 없으면 `None`입니다. 하락이 전혀 없는 시계열은 첫 점 기준의
/// 0% 낙폭으로 보고됩니다.
pub fn max_drawdown(series: &[ValuePoint]) -> DrawdownInfo {
    let first = match series.first() {
        Some(f) => *f,
        None => {
            return DrawdownInfo {
                peak_date: NaiveDate::default(),
                trough_date: NaiveDate::default(),
                recovery_date: None,
                drawdown_pct: 0.0,
            }
        }
    };

    let mut running_peak_value = first.value;
    let mut running_peak_date = first.date;

    let mut best_ratio = 0.0_f64;
    let mut best_peak_date = first.date;
    let mut best_peak_value = first.value;
    let mut best_trough_date = first.date;
    let mut best_trough_index = 0_usize;

    for (i, point) in series.iter().enumerate() {
        if point.value > running_peak_value {
            running_peak_value = point.value;
            running_peak_date = point.date;
        }

        let drawdown = if running_peak_value > 0.0 {
            (running_peak_value - point.value) / running_peak_value
        } else {
            0.0
        };

        if drawdown > best_ratio {
            best_ratio = drawdown;
            best_peak_date = running_peak_date;
            best_peak_value = running_peak_value;
            best_trough_date = point.date;
            best_trough_index = i;
        }
    }

    // 저점 이후 짝을 이룬 고점 값을 회복한 첫 날짜
    let recovery_date = series[best_trough_index + 1..]
        .iter()
        .find(|p| p.value >= best_peak_value)
        .map(|p| p.date);

    DrawdownInfo {
        peak_date: best_peak_date,
        trough_date: best_trough_date,
        recovery_date,
        drawdown_pct: sanitize(best_ratio * 100.0),
    }
}

/// 샤프 비율.
///
/// 일일 단순 수익률의 평균과 표본 표준편차(N−1)를 사용해
/// `(mean × 252) / (std × √252)`로 계산합니다. 변동이 없거나 수익률이
/// 하나뿐이면 NaN 대신 정확히 0입니다.
pub fn sharpe_ratio(series: &[ValuePoint]) -> f64 {
    let returns: Vec<f64> = series
        .windows(2)
        .filter_map(|w| {
            if w[0].value != 0.0 {
                Some(w[1].value / w[0].value - 1.0)
            } else {
                None
            }
        })
        .collect();

    if returns.len() < 2 {
        return 0.0;
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let std_dev = variance.sqrt();

    if std_dev > 0.0 {
        sanitize((mean * TRADING_DAYS_PER_YEAR) / (std_dev * TRADING_DAYS_PER_YEAR.sqrt()))
    } else {
        0.0
    }
}
