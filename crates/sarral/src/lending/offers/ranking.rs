use serde::{Deserialize, Serialize};

use super::super::domain::{LoanOffer, OfferRate, OfferStatus, UserId};
use super::super::ingest::ValidationError;

/// What the ranker needs to know about the borrower.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BorrowerStanding {
    pub borrower_id: UserId,
    pub trust_score: u8,
    pub borrow_limit: u64,
}

/// Eligible offer with the figures it was ranked on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedOffer {
    pub offer: LoanOffer,
    pub difference_from_desired: u64,
    pub total_interest_payable: f64,
}

/// Best-fit result. An empty eligible set is an expected outcome, not a fault.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Recommendation {
    Recommended(RankedOffer),
    NoEligibleOffer,
}

impl Recommendation {
    pub fn offer(&self) -> Option<&LoanOffer> {
        match self {
            Recommendation::Recommended(ranked) => Some(&ranked.offer),
            Recommendation::NoEligibleOffer => None,
        }
    }
}

/// Interest over the whole tenure, used to break ties between equally close offers.
pub fn total_interest_payable(offer: &LoanOffer) -> f64 {
    let principal = offer.principal as f64;
    match offer.rate {
        OfferRate::Total(percent) => principal * (percent / 100.0),
        OfferRate::PerAnnum(percent) => {
            principal * (percent / 100.0) * (f64::from(offer.tenure_months) / 12.0)
        }
        OfferRate::Unspecified => 0.0,
    }
}

pub(crate) fn is_eligible(standing: &BorrowerStanding, offer: &LoanOffer) -> bool {
    offer.status == OfferStatus::Available
        && offer.lender_id != standing.borrower_id
        && offer.principal <= standing.borrow_limit
        && offer.min_score_required <= standing.trust_score
}

/// Eligible offers, closest to the desired amount first and cheapest first among equals.
pub fn rank_offers(
    standing: &BorrowerStanding,
    desired_amount: u64,
    offers: &[LoanOffer],
) -> Result<Vec<RankedOffer>, ValidationError> {
    if desired_amount == 0 {
        return Err(ValidationError::NonPositive {
            field: "desired_amount",
            found: 0,
        });
    }

    let mut ranked: Vec<RankedOffer> = offers
        .iter()
        .filter(|offer| is_eligible(standing, offer))
        .map(|offer| RankedOffer {
            offer: offer.clone(),
            difference_from_desired: offer.principal.abs_diff(desired_amount),
            total_interest_payable: total_interest_payable(offer),
        })
        .collect();

    ranked.sort_by(|left, right| {
        left.difference_from_desired
            .cmp(&right.difference_from_desired)
            .then_with(|| {
                left.total_interest_payable
                    .total_cmp(&right.total_interest_payable)
            })
    });

    Ok(ranked)
}

pub fn recommend(
    standing: &BorrowerStanding,
    desired_amount: u64,
    offers: &[LoanOffer],
) -> Result<Recommendation, ValidationError> {
    let ranked = rank_offers(standing, desired_amount, offers)?;
    Ok(match ranked.into_iter().next() {
        Some(top) => Recommendation::Recommended(top),
        None => Recommendation::NoEligibleOffer,
    })
}
