use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::config::LendingConfig;
use crate::lending::domain::{
    ActiveLoan, ActiveLoanId, BorrowerProfile, LoanOffer, LoanRequest, LoanRequestId,
    LoanRequestStatus, OfferId, OfferRate, OfferStatus, Transaction, UserId,
};
use crate::lending::ingest::TransactionRecord;
use crate::lending::memory::InMemoryLendingStore;
use crate::lending::repository::{LendingStore, StatusSwap, StoreError};
use crate::lending::seed::{sample_history, SAMPLE_MONTHLY_AMOUNTS};
use crate::lending::service::LendingService;
use crate::lending::{lending_router, BorrowerStanding};

pub(super) const BORROWER: &str = "borrower-asha";
pub(super) const LENDER: &str = "lender-ravi";
pub(super) const OTHER_LENDER: &str = "lender-meena";

pub(super) fn user(id: &str) -> UserId {
    UserId(id.to_string())
}

pub(super) fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 12, 0, 0)
        .single()
        .expect("valid timestamp")
}

/// One transaction per listed month of 2025, starting in January.
pub(super) fn monthly_transactions(amounts: &[f64]) -> Vec<Transaction> {
    amounts
        .iter()
        .enumerate()
        .map(|(index, amount)| Transaction {
            amount: *amount,
            timestamp: at(2025, index as u32 + 1, 10),
        })
        .collect()
}

pub(super) fn standing(trust_score: u8, borrow_limit: u64) -> BorrowerStanding {
    BorrowerStanding {
        borrower_id: user(BORROWER),
        trust_score,
        borrow_limit,
    }
}

pub(super) fn offer(id: &str, lender: &str, principal: u64, rate: f64, months: u32) -> LoanOffer {
    LoanOffer {
        id: OfferId(id.to_string()),
        lender_id: user(lender),
        lender_name: format!("{lender} name"),
        principal,
        rate: OfferRate::Total(rate),
        tenure_months: months,
        min_score_required: 0,
        status: OfferStatus::Available,
        created_at: at(2025, 9, 1),
    }
}

pub(super) fn profile(id: &str, trust_score: u8, borrow_limit: u64) -> BorrowerProfile {
    BorrowerProfile {
        borrower_id: user(id),
        display_name: "Asha".to_string(),
        payment_handle: "asha@upi".to_string(),
        trust_score,
        borrow_limit,
        last_score_update: None,
    }
}

pub(super) fn lending_config() -> LendingConfig {
    LendingConfig {
        lookback_days: 400,
        ..LendingConfig::default()
    }
}

/// Borrower with limit 3000, two lenders, and three offers.
pub(super) fn seeded_store() -> InMemoryLendingStore {
    let store = InMemoryLendingStore::default();
    store
        .insert_profile(profile(BORROWER, 60, 3000))
        .expect("profile stored");
    store.insert_user(user(LENDER), "Ravi").expect("lender stored");
    store
        .insert_user(user(OTHER_LENDER), "Meena")
        .expect("lender stored");
    for offer in [
        offer("offer-a", LENDER, 2500, 10.0, 3),
        offer("offer-b", OTHER_LENDER, 2000, 8.0, 2),
        offer("offer-big", LENDER, 9000, 5.0, 6),
    ] {
        store.create_offer(offer).expect("offer stored");
    }
    store
}

pub(super) fn seed_sample_history(store: &InMemoryLendingStore, borrower: &str) {
    store
        .insert_transactions(borrower, sample_history(Utc::now(), &SAMPLE_MONTHLY_AMOUNTS))
        .expect("history stored");
}

pub(super) fn build_service<S>(store: Arc<S>) -> LendingService<S>
where
    S: LendingStore + 'static,
{
    LendingService::new(store, lending_config())
}

pub(super) fn router_with_store(store: InMemoryLendingStore) -> axum::Router {
    lending_router(Arc::new(build_service(Arc::new(store))))
}

pub(super) fn pending_request(
    service: &LendingService<impl LendingStore + 'static>,
) -> LoanRequest {
    service
        .submit_request(&user(BORROWER), &OfferId("offer-a".to_string()))
        .expect("request created")
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

/// Wraps the in-memory store and injects failures into selected operations.
#[derive(Default)]
pub(super) struct FlakyStore {
    pub(super) inner: InMemoryLendingStore,
    pub(super) active_loan_failures: AtomicUsize,
    pub(super) fail_score_writes: AtomicBool,
    pub(super) fail_name_lookups: AtomicBool,
}

impl FlakyStore {
    pub(super) fn wrapping(inner: InMemoryLendingStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    fn unavailable(operation: &str) -> StoreError {
        StoreError::Unavailable(format!("{operation} timed out"))
    }
}

impl LendingStore for FlakyStore {
    fn fetch_transactions(
        &self,
        external_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<TransactionRecord>, StoreError> {
        self.inner.fetch_transactions(external_id, since)
    }

    fn fetch_borrower_profile(
        &self,
        borrower_id: &UserId,
    ) -> Result<Option<BorrowerProfile>, StoreError> {
        self.inner.fetch_borrower_profile(borrower_id)
    }

    fn write_borrower_score(
        &self,
        borrower_id: &UserId,
        trust_score: u8,
        borrow_limit: u64,
        updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        if self.fail_score_writes.load(Ordering::SeqCst) {
            return Err(Self::unavailable("score write"));
        }
        self.inner
            .write_borrower_score(borrower_id, trust_score, borrow_limit, updated_at)
    }

    fn fetch_available_offers(&self) -> Result<Vec<LoanOffer>, StoreError> {
        self.inner.fetch_available_offers()
    }

    fn fetch_offer(&self, offer_id: &OfferId) -> Result<Option<LoanOffer>, StoreError> {
        self.inner.fetch_offer(offer_id)
    }

    fn create_offer(&self, offer: LoanOffer) -> Result<OfferId, StoreError> {
        self.inner.create_offer(offer)
    }

    fn set_offer_status(&self, offer_id: &OfferId, status: OfferStatus) -> Result<(), StoreError> {
        self.inner.set_offer_status(offer_id, status)
    }

    fn create_loan_request(&self, request: LoanRequest) -> Result<LoanRequestId, StoreError> {
        self.inner.create_loan_request(request)
    }

    fn fetch_loan_request(
        &self,
        request_id: &LoanRequestId,
    ) -> Result<Option<LoanRequest>, StoreError> {
        self.inner.fetch_loan_request(request_id)
    }

    fn transition_loan_request(
        &self,
        request_id: &LoanRequestId,
        next: LoanRequestStatus,
        expected: LoanRequestStatus,
        decided_at: DateTime<Utc>,
    ) -> Result<StatusSwap, StoreError> {
        self.inner
            .transition_loan_request(request_id, next, expected, decided_at)
    }

    fn requests_for_lender(&self, lender_id: &UserId) -> Result<Vec<LoanRequest>, StoreError> {
        self.inner.requests_for_lender(lender_id)
    }

    fn requests_for_borrower(&self, borrower_id: &UserId) -> Result<Vec<LoanRequest>, StoreError> {
        self.inner.requests_for_borrower(borrower_id)
    }

    fn create_active_loan(&self, loan: ActiveLoan) -> Result<ActiveLoanId, StoreError> {
        let remaining = self.active_loan_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.active_loan_failures
                .store(remaining - 1, Ordering::SeqCst);
            return Err(Self::unavailable("active loan write"));
        }
        self.inner.create_active_loan(loan)
    }

    fn active_loan_for_request(
        &self,
        request_id: &LoanRequestId,
    ) -> Result<Option<ActiveLoan>, StoreError> {
        self.inner.active_loan_for_request(request_id)
    }

    fn active_loans_for_lender(&self, lender_id: &UserId) -> Result<Vec<ActiveLoan>, StoreError> {
        self.inner.active_loans_for_lender(lender_id)
    }

    fn display_name(&self, user_id: &UserId) -> Result<Option<String>, StoreError> {
        if self.fail_name_lookups.load(Ordering::SeqCst) {
            return Err(Self::unavailable("directory lookup"));
        }
        self.inner.display_name(user_id)
    }
}
