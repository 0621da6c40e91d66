use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use super::domain::{
    ActiveLoan, ActiveLoanId, BorrowerProfile, LoanOffer, LoanRequest, LoanRequestId,
    LoanRequestStatus, OfferId, OfferStatus, UserId,
};
use super::ingest::TransactionRecord;
use super::repository::{LendingStore, StatusSwap, StoreError};

/// Mutex-backed store used by the demo CLI, the HTTP service, and tests.
#[derive(Debug, Default)]
pub struct InMemoryLendingStore {
    state: Mutex<StoreState>,
}

#[derive(Debug, Default)]
struct StoreState {
    profiles: HashMap<UserId, BorrowerProfile>,
    names: HashMap<UserId, String>,
    transactions: HashMap<String, Vec<TransactionRecord>>,
    offers: Vec<LoanOffer>,
    requests: HashMap<LoanRequestId, LoanRequest>,
    active_loans: HashMap<ActiveLoanId, ActiveLoan>,
}

impl InMemoryLendingStore {
    fn state(&self) -> Result<MutexGuard<'_, StoreState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("store mutex poisoned".to_string()))
    }

    /// Register a borrower; the display name doubles as the directory entry.
    pub fn insert_profile(&self, profile: BorrowerProfile) -> Result<(), StoreError> {
        let mut state = self.state()?;
        state
            .names
            .insert(profile.borrower_id.clone(), profile.display_name.clone());
        state.profiles.insert(profile.borrower_id.clone(), profile);
        Ok(())
    }

    pub fn insert_user(&self, user_id: UserId, display_name: &str) -> Result<(), StoreError> {
        self.state()?.names.insert(user_id, display_name.to_string());
        Ok(())
    }

    pub fn insert_transactions(
        &self,
        external_id: &str,
        records: impl IntoIterator<Item = TransactionRecord>,
    ) -> Result<(), StoreError> {
        self.state()?
            .transactions
            .entry(external_id.to_string())
            .or_default()
            .extend(records);
        Ok(())
    }

    pub fn active_loan_count(&self) -> Result<usize, StoreError> {
        Ok(self.state()?.active_loans.len())
    }
}

impl LendingStore for InMemoryLendingStore {
    fn fetch_transactions(
        &self,
        external_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<TransactionRecord>, StoreError> {
        let state = self.state()?;
        Ok(state
            .transactions
            .get(external_id)
            .map(|records| {
                records
                    .iter()
                    .filter(|record| record.timestamp.map_or(true, |at| at >= since))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn fetch_borrower_profile(
        &self,
        borrower_id: &UserId,
    ) -> Result<Option<BorrowerProfile>, StoreError> {
        Ok(self.state()?.profiles.get(borrower_id).cloned())
    }

    fn write_borrower_score(
        &self,
        borrower_id: &UserId,
        trust_score: u8,
        borrow_limit: u64,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut state = self.state()?;
        let profile = state
            .profiles
            .get_mut(borrower_id)
            .ok_or(StoreError::NotFound)?;
        profile.trust_score = trust_score;
        profile.borrow_limit = borrow_limit;
        profile.last_score_update = Some(updated_at);
        Ok(())
    }

    fn fetch_available_offers(&self) -> Result<Vec<LoanOffer>, StoreError> {
        Ok(self
            .state()?
            .offers
            .iter()
            .filter(|offer| offer.status == OfferStatus::Available)
            .cloned()
            .collect())
    }

    fn fetch_offer(&self, offer_id: &OfferId) -> Result<Option<LoanOffer>, StoreError> {
        Ok(self
            .state()?
            .offers
            .iter()
            .find(|offer| &offer.id == offer_id)
            .cloned())
    }

    fn create_offer(&self, offer: LoanOffer) -> Result<OfferId, StoreError> {
        let mut state = self.state()?;
        if state.offers.iter().any(|existing| existing.id == offer.id) {
            return Err(StoreError::Conflict);
        }
        let id = offer.id.clone();
        state.offers.push(offer);
        Ok(id)
    }

    fn set_offer_status(
        &self,
        offer_id: &OfferId,
        status: OfferStatus,
    ) -> Result<(), StoreError> {
        let mut state = self.state()?;
        let offer = state
            .offers
            .iter_mut()
            .find(|offer| &offer.id == offer_id)
            .ok_or(StoreError::NotFound)?;
        offer.status = status;
        Ok(())
    }

    fn create_loan_request(&self, request: LoanRequest) -> Result<LoanRequestId, StoreError> {
        let mut state = self.state()?;
        if state.requests.contains_key(&request.id) {
            return Err(StoreError::Conflict);
        }
        let id = request.id.clone();
        state.requests.insert(id.clone(), request);
        Ok(id)
    }

    fn fetch_loan_request(
        &self,
        request_id: &LoanRequestId,
    ) -> Result<Option<LoanRequest>, StoreError> {
        Ok(self.state()?.requests.get(request_id).cloned())
    }

    fn transition_loan_request(
        &self,
        request_id: &LoanRequestId,
        next: LoanRequestStatus,
        expected: LoanRequestStatus,
        decided_at: DateTime<Utc>,
    ) -> Result<StatusSwap, StoreError> {
        let mut state = self.state()?;
        let request = state
            .requests
            .get_mut(request_id)
            .ok_or(StoreError::NotFound)?;

        if request.status != expected {
            return Ok(StatusSwap::Conflict {
                current: request.status,
            });
        }

        request.status = next;
        request.decided_at = Some(decided_at);
        Ok(StatusSwap::Applied(request.clone()))
    }

    fn requests_for_lender(&self, lender_id: &UserId) -> Result<Vec<LoanRequest>, StoreError> {
        let state = self.state()?;
        let mut requests: Vec<LoanRequest> = state
            .requests
            .values()
            .filter(|request| &request.lender_id == lender_id)
            .cloned()
            .collect();
        requests.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        Ok(requests)
    }

    fn requests_for_borrower(
        &self,
        borrower_id: &UserId,
    ) -> Result<Vec<LoanRequest>, StoreError> {
        let state = self.state()?;
        let mut requests: Vec<LoanRequest> = state
            .requests
            .values()
            .filter(|request| &request.borrower_id == borrower_id)
            .cloned()
            .collect();
        requests.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        Ok(requests)
    }

    fn create_active_loan(&self, loan: ActiveLoan) -> Result<ActiveLoanId, StoreError> {
        let mut state = self.state()?;
        if state.active_loans.contains_key(&loan.id) {
            return Err(StoreError::Conflict);
        }
        let id = loan.id.clone();
        state.active_loans.insert(id.clone(), loan);
        Ok(id)
    }

    fn active_loan_for_request(
        &self,
        request_id: &LoanRequestId,
    ) -> Result<Option<ActiveLoan>, StoreError> {
        Ok(self
            .state()?
            .active_loans
            .values()
            .find(|loan| &loan.request_id == request_id)
            .cloned())
    }

    fn active_loans_for_lender(&self, lender_id: &UserId) -> Result<Vec<ActiveLoan>, StoreError> {
        let state = self.state()?;
        let mut loans: Vec<ActiveLoan> = state
            .active_loans
            .values()
            .filter(|loan| &loan.lender_id == lender_id)
            .cloned()
            .collect();
        loans.sort_by(|left, right| right.start_date.cmp(&left.start_date));
        Ok(loans)
    }

    fn display_name(&self, user_id: &UserId) -> Result<Option<String>, StoreError> {
        Ok(self.state()?.names.get(user_id).cloned())
    }
}
