use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::super::domain::Transaction;

/// Calendar-month total. Rebuilt on every scoring run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyBucket {
    pub month_key: String,
    pub total: f64,
}

/// Monthly inflow statistics feeding the score calculator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyInflow {
    pub buckets: Vec<MonthlyBucket>,
    pub monthly_inflow: f64,
    pub max_month: f64,
    pub min_month: f64,
    pub transaction_count: usize,
}

impl MonthlyInflow {
    /// Group transactions by UTC calendar month (`YYYY-MM`).
    pub(crate) fn from_transactions(transactions: &[Transaction], month_divisor: u32) -> Self {
        let mut totals: BTreeMap<String, f64> = BTreeMap::new();
        for transaction in transactions {
            let month_key = transaction.timestamp.format("%Y-%m").to_string();
            *totals.entry(month_key).or_insert(0.0) += transaction.amount;
        }

        let buckets = totals
            .into_iter()
            .map(|(month_key, total)| MonthlyBucket { month_key, total })
            .collect();

        Self::from_buckets(buckets, transactions.len(), month_divisor)
    }

    pub(crate) fn from_buckets(
        buckets: Vec<MonthlyBucket>,
        transaction_count: usize,
        month_divisor: u32,
    ) -> Self {
        if buckets.is_empty() {
            return Self {
                buckets,
                monthly_inflow: 0.0,
                max_month: 0.0,
                min_month: 0.0,
                transaction_count,
            };
        }

        let sum: f64 = buckets.iter().map(|bucket| bucket.total).sum();
        let max_month = buckets
            .iter()
            .map(|bucket| bucket.total)
            .fold(f64::NEG_INFINITY, f64::max);
        let min_month = buckets
            .iter()
            .map(|bucket| bucket.total)
            .fold(f64::INFINITY, f64::min);

        Self {
            buckets,
            monthly_inflow: sum / f64::from(month_divisor.max(1)),
            max_month,
            min_month,
            transaction_count,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.transaction_count == 0
    }

    pub fn total_inflow(&self) -> f64 {
        self.buckets.iter().map(|bucket| bucket.total).sum()
    }
}
