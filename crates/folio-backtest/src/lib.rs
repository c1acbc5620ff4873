//! 포트폴리오 백테스트 시뮬레이터.
//!
//! 이미 수집된 종목별 가격 시계열과 목표 비중을 받아 포트폴리오
//! 가치 시계열과 위험/수익 지표를 계산합니다. 전체가 순수 동기
//! 함수이므로 어떤 스레드에서든 잠금 없이 실행할 수 있습니다.

pub mod engine;
pub mod metrics;

pub use engine::{
    run_backtest, BacktestError, BacktestReport, BacktestRequest, BacktestResult,
};
pub use metrics::TRADING_DAYS_PER_YEAR;
