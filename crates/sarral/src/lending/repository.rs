use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    ActiveLoan, ActiveLoanId, BorrowerProfile, LoanOffer, LoanRequest, LoanRequestId,
    LoanRequestStatus, OfferId, OfferStatus, UserId,
};
use super::ingest::TransactionRecord;

/// Data-access contract with the document store and identity provider.
///
/// Implementations must make `transition_loan_request` a compare-and-swap on the status
/// field and must refuse a second active loan with the same id.
pub trait LendingStore: Send + Sync {
    /// Inflow feed for a borrower, keyed by the borrower's account id.
    fn fetch_transactions(
        &self,
        external_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<TransactionRecord>, StoreError>;

    fn fetch_borrower_profile(
        &self,
        borrower_id: &UserId,
    ) -> Result<Option<BorrowerProfile>, StoreError>;

    fn write_borrower_score(
        &self,
        borrower_id: &UserId,
        trust_score: u8,
        borrow_limit: u64,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Offers with `status = available` only.
    fn fetch_available_offers(&self) -> Result<Vec<LoanOffer>, StoreError>;

    fn fetch_offer(&self, offer_id: &OfferId) -> Result<Option<LoanOffer>, StoreError>;

    fn create_offer(&self, offer: LoanOffer) -> Result<OfferId, StoreError>;

    fn set_offer_status(&self, offer_id: &OfferId, status: OfferStatus)
        -> Result<(), StoreError>;

    fn create_loan_request(&self, request: LoanRequest) -> Result<LoanRequestId, StoreError>;

    fn fetch_loan_request(
        &self,
        request_id: &LoanRequestId,
    ) -> Result<Option<LoanRequest>, StoreError>;

    /// Move a request to `next` only if its stored status is still `expected`.
    fn transition_loan_request(
        &self,
        request_id: &LoanRequestId,
        next: LoanRequestStatus,
        expected: LoanRequestStatus,
        decided_at: DateTime<Utc>,
    ) -> Result<StatusSwap, StoreError>;

    fn requests_for_lender(&self, lender_id: &UserId) -> Result<Vec<LoanRequest>, StoreError>;

    fn requests_for_borrower(&self, borrower_id: &UserId)
        -> Result<Vec<LoanRequest>, StoreError>;

    /// Fails with [`StoreError::Conflict`] when a loan with the same id already exists.
    fn create_active_loan(&self, loan: ActiveLoan) -> Result<ActiveLoanId, StoreError>;

    fn active_loan_for_request(
        &self,
        request_id: &LoanRequestId,
    ) -> Result<Option<ActiveLoan>, StoreError>;

    fn active_loans_for_lender(&self, lender_id: &UserId) -> Result<Vec<ActiveLoan>, StoreError>;

    fn display_name(&self, user_id: &UserId) -> Result<Option<String>, StoreError>;
}

/// Result of a conditional status write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StatusSwap {
    Applied(LoanRequest),
    Conflict { current: LoanRequestStatus },
}

/// Error enumeration for store failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}
