use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Account identifier shared by borrowers and lenders.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OfferId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LoanRequestId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActiveLoanId(pub String);

impl ActiveLoanId {
    /// Active loans are keyed by the approved request so a retried create cannot duplicate.
    pub fn for_request(request_id: &LoanRequestId) -> Self {
        Self(format!("loan-{}", request_id.0))
    }
}

/// Incoming payment credited to a borrower.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub amount: f64,
    pub timestamp: DateTime<Utc>,
}

/// Scoring snapshot owned by the borrower and refreshed by score write-back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowerProfile {
    pub borrower_id: UserId,
    pub display_name: String,
    /// Payment handle (UPI id) shown to lenders. The inflow feed is keyed by `borrower_id`,
    /// not by this handle.
    pub payment_handle: String,
    pub trust_score: u8,
    pub borrow_limit: u64,
    pub last_score_update: Option<DateTime<Utc>>,
}

/// How an offer expresses its interest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "percent", rename_all = "snake_case")]
pub enum OfferRate {
    /// Flat percentage of principal charged over the whole tenure.
    Total(f64),
    /// Annualised percentage, prorated over the tenure.
    PerAnnum(f64),
    Unspecified,
}

impl OfferRate {
    /// Rate carried onto a loan request; per-annum rates are taken at face value.
    pub fn effective_total_percent(self) -> f64 {
        match self {
            OfferRate::Total(percent) | OfferRate::PerAnnum(percent) => percent,
            OfferRate::Unspecified => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
    Available,
    Inactive,
}

impl OfferStatus {
    pub const fn label(self) -> &'static str {
        match self {
            OfferStatus::Available => "available",
            OfferStatus::Inactive => "inactive",
        }
    }
}

/// Loan terms published by a lender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanOffer {
    pub id: OfferId,
    pub lender_id: UserId,
    pub lender_name: String,
    pub principal: u64,
    pub rate: OfferRate,
    pub tenure_months: u32,
    pub min_score_required: u8,
    pub status: OfferStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanRequestStatus {
    Pending,
    Approved,
    Rejected,
    Withdrawn,
}

impl LoanRequestStatus {
    pub const fn label(self) -> &'static str {
        match self {
            LoanRequestStatus::Pending => "pending",
            LoanRequestStatus::Approved => "approved",
            LoanRequestStatus::Rejected => "rejected",
            LoanRequestStatus::Withdrawn => "withdrawn",
        }
    }

    pub const fn is_terminal(self) -> bool {
        !matches!(self, LoanRequestStatus::Pending)
    }
}

impl fmt::Display for LoanRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A borrower's application against one offer. Terms are a snapshot taken at submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanRequest {
    pub id: LoanRequestId,
    pub borrower_id: UserId,
    pub lender_id: UserId,
    pub lender_name: String,
    pub offer_id: OfferId,
    pub principal: u64,
    pub rate_total_percent: f64,
    pub tenure_months: u32,
    pub tenure_days: u32,
    pub total_interest: u64,
    pub total_repayable: u64,
    pub periodic_installment: u64,
    pub status: LoanRequestStatus,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActiveLoanStatus {
    Ongoing,
    Closed,
}

/// Repayment obligation created when a request is approved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveLoan {
    pub id: ActiveLoanId,
    pub request_id: LoanRequestId,
    pub borrower_id: UserId,
    pub lender_id: UserId,
    pub principal: u64,
    pub rate_total_percent: f64,
    pub tenure_months: u32,
    pub tenure_days: u32,
    pub start_date: DateTime<Utc>,
    pub status: ActiveLoanStatus,
}

impl ActiveLoan {
    pub fn from_approved(request: &LoanRequest, start_date: DateTime<Utc>) -> Self {
        Self {
            id: ActiveLoanId::for_request(&request.id),
            request_id: request.id.clone(),
            borrower_id: request.borrower_id.clone(),
            lender_id: request.lender_id.clone(),
            principal: request.principal,
            rate_total_percent: request.rate_total_percent,
            tenure_months: request.tenure_months,
            tenure_days: request.tenure_days,
            start_date,
            status: ActiveLoanStatus::Ongoing,
        }
    }
}
