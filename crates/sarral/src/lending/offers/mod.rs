//! Lender offers: publication rules and best-fit ranking for borrowers.

mod ranking;

pub use ranking::{
    rank_offers, recommend, total_interest_payable, BorrowerStanding, RankedOffer,
    Recommendation,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{LoanOffer, OfferId, OfferRate, OfferStatus, UserId};
use super::ingest::{minimum_score, percentage, positive, ValidationError};

/// Offer terms as entered by a lender, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferDraft {
    pub principal: i64,
    pub rate_total_percent: f64,
    pub tenure_months: i64,
    #[serde(default)]
    pub min_score_required: Option<i64>,
}

impl OfferDraft {
    pub fn into_offer(
        self,
        id: OfferId,
        lender_id: UserId,
        lender_name: String,
        created_at: DateTime<Utc>,
        max_principal: u64,
    ) -> Result<LoanOffer, ValidationError> {
        let principal = positive(self.principal, "principal")?;
        if principal > max_principal {
            return Err(ValidationError::PrincipalAboveCap {
                max: max_principal,
                found: principal,
            });
        }

        let rate = percentage(self.rate_total_percent, "rate_total_percent")?;
        let tenure_months = u32::try_from(positive(self.tenure_months, "tenure_months")?)
            .map_err(|_| ValidationError::NonPositive {
                field: "tenure_months",
                found: self.tenure_months,
            })?;
        let min_score_required = self
            .min_score_required
            .map(minimum_score)
            .transpose()?
            .unwrap_or(0);

        Ok(LoanOffer {
            id,
            lender_id,
            lender_name,
            principal,
            rate: OfferRate::Total(rate),
            tenure_months,
            min_score_required,
            status: OfferStatus::Available,
            created_at,
        })
    }
}
