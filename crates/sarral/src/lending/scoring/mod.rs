mod aggregate;
mod config;
mod rules;

pub use aggregate::{MonthlyBucket, MonthlyInflow};
pub use config::ScoringConfig;
pub(crate) use rules::round_half_up;

use serde::{Deserialize, Serialize};

use super::domain::Transaction;

/// Stateless calculator turning a payment history into a trust score and borrow limit.
#[derive(Debug, Clone, Default)]
pub struct ScoringEngine {
    config: ScoringConfig,
}

impl ScoringEngine {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn aggregate(&self, transactions: &[Transaction]) -> MonthlyInflow {
        MonthlyInflow::from_transactions(transactions, self.config.month_divisor)
    }

    /// Score a history. An empty history is reported as such rather than as a zero score.
    pub fn score(&self, transactions: &[Transaction]) -> ScoreOutcome {
        let inflow = self.aggregate(transactions);
        if inflow.is_empty() {
            return ScoreOutcome::InsufficientHistory;
        }
        ScoreOutcome::Scored(self.score_inflow(inflow))
    }

    /// Score pre-aggregated statistics. Callers must have checked for an empty history.
    pub fn score_inflow(&self, inflow: MonthlyInflow) -> ScoreCard {
        let components = rules::score_inflow(&inflow, &self.config);

        ScoreCard {
            income_score: components.income_score,
            consistency_score: components.consistency_score,
            trust_score: components.trust_score,
            borrow_limit: components.borrow_limit,
            inflow,
        }
    }

    /// Score a list of month totals directly, as produced by the sample history seeder.
    pub fn expected_score(&self, monthly_amounts: &[f64]) -> ScoreOutcome {
        if monthly_amounts.is_empty() {
            return ScoreOutcome::InsufficientHistory;
        }

        let buckets = monthly_amounts
            .iter()
            .enumerate()
            .map(|(index, total)| MonthlyBucket {
                month_key: format!("m{:02}", index + 1),
                total: *total,
            })
            .collect();
        let inflow =
            MonthlyInflow::from_buckets(buckets, monthly_amounts.len(), self.config.month_divisor);
        ScoreOutcome::Scored(self.score_inflow(inflow))
    }
}

/// Result of a scoring run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ScoreOutcome {
    Scored(ScoreCard),
    InsufficientHistory,
}

impl ScoreOutcome {
    pub fn card(&self) -> Option<&ScoreCard> {
        match self {
            ScoreOutcome::Scored(card) => Some(card),
            ScoreOutcome::InsufficientHistory => None,
        }
    }
}

/// Computed score with the components that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreCard {
    pub trust_score: u8,
    pub borrow_limit: u64,
    pub income_score: f64,
    pub consistency_score: f64,
    pub inflow: MonthlyInflow,
}
