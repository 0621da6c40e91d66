use super::aggregate::MonthlyInflow;
use super::config::ScoringConfig;

pub(crate) struct ScoreComponents {
    pub income_score: f64,
    pub consistency_score: f64,
    pub trust_score: u8,
    pub borrow_limit: u64,
}

/// Rounds only once, on the final weighted sum and on the limit.
pub(crate) fn score_inflow(inflow: &MonthlyInflow, config: &ScoringConfig) -> ScoreComponents {
    let income_score = (inflow.monthly_inflow / config.income_cap * 100.0).min(100.0);

    let consistency_score = if inflow.max_month > 0.0 {
        let spread = (inflow.max_month - inflow.min_month) / inflow.max_month * 100.0;
        (100.0 - spread).clamp(0.0, 100.0)
    } else {
        0.0
    };

    let weighted =
        income_score * config.income_weight + consistency_score * config.consistency_weight;
    let trust_score = round_half_up(weighted).clamp(0.0, 100.0) as u8;
    let borrow_limit = round_half_up(inflow.monthly_inflow * config.limit_ratio).max(0.0) as u64;

    ScoreComponents {
        income_score,
        consistency_score,
        trust_score,
        borrow_limit,
    }
}

/// Inputs are never negative here, so away-from-zero rounding is half-up.
pub(crate) fn round_half_up(value: f64) -> f64 {
    if value.is_finite() {
        value.round()
    } else {
        0.0
    }
}
