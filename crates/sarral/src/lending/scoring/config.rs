use serde::{Deserialize, Serialize};

/// Weights and caps behind the SARRAL score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Monthly inflow at which the income component saturates at 100.
    pub income_cap: f64,
    pub income_weight: f64,
    pub consistency_weight: f64,
    /// Share of monthly inflow granted as the borrow limit.
    pub limit_ratio: f64,
    /// Fixed number of months the lookback total is spread over, populated or not.
    pub month_divisor: u32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            income_cap: 60_000.0,
            income_weight: 0.30,
            consistency_weight: 0.70,
            limit_ratio: 0.30,
            month_divisor: 6,
        }
    }
}
