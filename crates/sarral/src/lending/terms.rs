use serde::{Deserialize, Serialize};

use super::domain::LoanOffer;
use super::ingest::{percentage, ValidationError};
use super::scoring::round_half_up;

/// Repayment convention: every month counts as 30 days, regardless of the calendar.
pub const DAYS_PER_MONTH: u32 = 30;

/// Repayment figures shown at review time and snapshotted onto the loan request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoanTerms {
    pub principal: u64,
    pub rate_total_percent: f64,
    pub tenure_months: u32,
    pub tenure_days: u32,
    pub total_interest: u64,
    pub total_repayable: u64,
    /// Daily installment.
    pub periodic_installment: u64,
}

impl LoanTerms {
    pub fn calculate(
        principal: u64,
        rate_total_percent: f64,
        tenure_months: u32,
    ) -> Result<Self, ValidationError> {
        if principal == 0 {
            return Err(ValidationError::NonPositive {
                field: "principal",
                found: 0,
            });
        }
        let rate_total_percent = percentage(rate_total_percent, "rate_total_percent")?;
        if tenure_months == 0 {
            return Err(ValidationError::NonPositive {
                field: "tenure_months",
                found: 0,
            });
        }

        let total_interest = round_half_up(principal as f64 * rate_total_percent / 100.0) as u64;
        let total_repayable = principal.saturating_add(total_interest);
        let tenure_days = tenure_months.saturating_mul(DAYS_PER_MONTH);
        let periodic_installment = if tenure_days > 0 {
            round_half_up(total_repayable as f64 / f64::from(tenure_days)) as u64
        } else {
            0
        };

        Ok(Self {
            principal,
            rate_total_percent,
            tenure_months,
            tenure_days,
            total_interest,
            total_repayable,
            periodic_installment,
        })
    }

    /// Terms for borrowing an offer's full principal.
    pub fn for_offer(offer: &LoanOffer) -> Result<Self, ValidationError> {
        Self::calculate(
            offer.principal,
            offer.rate.effective_total_percent(),
            offer.tenure_months,
        )
    }
}
