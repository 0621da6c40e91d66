//! Loan request state machine.
//!
//! ```text
//! pending ──approve──▶ approved  (+ one ongoing active loan)
//!    │ ────reject───▶ rejected
//!    └────withdraw──▶ withdrawn
//! ```
//!
//! Every terminal state is final. Status changes go through the store's compare-and-swap,
//! so a repeated or concurrent action finds the request already decided and reports
//! [`TransitionOutcome::AlreadyProcessed`] instead of failing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::domain::{
    ActiveLoan, LoanRequest, LoanRequestId, LoanRequestStatus, OfferId, OfferStatus, UserId,
};
use super::ingest::ValidationError;
use super::repository::{LendingStore, StatusSwap, StoreError};
use super::terms::LoanTerms;

static REQUEST_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_request_id() -> LoanRequestId {
    let id = REQUEST_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    LoanRequestId(format!("req-{id:06}"))
}

/// Step a participant can take on a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleAction {
    Approve,
    Reject,
    Withdraw,
    /// Repair an approved request whose active loan is missing.
    Reconcile,
}

impl LifecycleAction {
    pub const fn target(self) -> LoanRequestStatus {
        match self {
            LifecycleAction::Approve | LifecycleAction::Reconcile => LoanRequestStatus::Approved,
            LifecycleAction::Reject => LoanRequestStatus::Rejected,
            LifecycleAction::Withdraw => LoanRequestStatus::Withdrawn,
        }
    }

    /// Lenders decide and reconcile; borrowers may only pull their own request back.
    fn actor_on<'a>(self, request: &'a LoanRequest) -> &'a UserId {
        match self {
            LifecycleAction::Approve | LifecycleAction::Reject | LifecycleAction::Reconcile => {
                &request.lender_id
            }
            LifecycleAction::Withdraw => &request.borrower_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TransitionOutcome {
    Applied {
        request: LoanRequest,
        #[serde(skip_serializing_if = "Option::is_none")]
        active_loan: Option<ActiveLoan>,
    },
    AlreadyProcessed {
        current: LoanRequestStatus,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    Created(ActiveLoan),
    AlreadyPresent(ActiveLoan),
}

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("requested principal {requested} exceeds the current borrow limit {limit}")]
    LimitExceeded { requested: u64, limit: u64 },
    #[error("borrowers cannot request their own offers")]
    SelfLending,
    #[error("offer {offer_id} is no longer available")]
    OfferUnavailable { offer_id: String },
    #[error("user {actor} may not {action:?} request {request_id}")]
    NotAuthorized {
        actor: String,
        action: LifecycleAction,
        request_id: String,
    },
    #[error("{0} not found")]
    NotFound(String),
    #[error("request {request_id} is {current} and cannot be reconciled")]
    NotApproved {
        request_id: String,
        current: LoanRequestStatus,
    },
    #[error(
        "request {request_id} was approved but its active loan could not be created; manual reconciliation required: {source}"
    )]
    PartialCommit {
        request_id: String,
        #[source]
        source: StoreError,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Drives loan requests through their states against a [`LendingStore`].
pub struct RequestLifecycle<S> {
    store: Arc<S>,
    active_loan_attempts: u8,
}

impl<S> RequestLifecycle<S>
where
    S: LendingStore + 'static,
{
    pub fn new(store: Arc<S>, active_loan_attempts: u8) -> Self {
        Self {
            store,
            active_loan_attempts: active_loan_attempts.max(1),
        }
    }

    /// Open a pending request for the full principal of an offer.
    ///
    /// Eligibility is checked against the stored profile, never a caller-supplied limit.
    pub fn create(
        &self,
        borrower_id: &UserId,
        offer_id: &OfferId,
    ) -> Result<LoanRequest, LifecycleError> {
        let profile = self
            .store
            .fetch_borrower_profile(borrower_id)?
            .ok_or_else(|| LifecycleError::NotFound(format!("borrower {}", borrower_id.0)))?;
        let offer = self
            .store
            .fetch_offer(offer_id)?
            .ok_or_else(|| LifecycleError::NotFound(format!("offer {}", offer_id.0)))?;

        if offer.status != OfferStatus::Available {
            return Err(LifecycleError::OfferUnavailable {
                offer_id: offer.id.0,
            });
        }
        if &offer.lender_id == borrower_id {
            return Err(LifecycleError::SelfLending);
        }
        if offer.principal > profile.borrow_limit {
            return Err(LifecycleError::LimitExceeded {
                requested: offer.principal,
                limit: profile.borrow_limit,
            });
        }

        let terms = LoanTerms::for_offer(&offer)?;
        let request = LoanRequest {
            id: next_request_id(),
            borrower_id: borrower_id.clone(),
            lender_id: offer.lender_id,
            lender_name: offer.lender_name,
            offer_id: offer.id,
            principal: terms.principal,
            rate_total_percent: terms.rate_total_percent,
            tenure_months: terms.tenure_months,
            tenure_days: terms.tenure_days,
            total_interest: terms.total_interest,
            total_repayable: terms.total_repayable,
            periodic_installment: terms.periodic_installment,
            status: LoanRequestStatus::Pending,
            created_at: Utc::now(),
            decided_at: None,
        };

        self.store.create_loan_request(request.clone())?;
        info!(
            request_id = %request.id.0,
            borrower = %request.borrower_id.0,
            lender = %request.lender_id.0,
            principal = request.principal,
            "loan request submitted"
        );
        Ok(request)
    }

    pub fn approve(
        &self,
        request_id: &LoanRequestId,
        lender_id: &UserId,
    ) -> Result<TransitionOutcome, LifecycleError> {
        let request = match self.decide(request_id, lender_id, LifecycleAction::Approve)? {
            StatusSwap::Applied(request) => request,
            StatusSwap::Conflict { current } => {
                return Ok(TransitionOutcome::AlreadyProcessed { current })
            }
        };

        let active_loan = self.open_active_loan(&request)?;
        Ok(TransitionOutcome::Applied {
            request,
            active_loan: Some(active_loan),
        })
    }

    pub fn reject(
        &self,
        request_id: &LoanRequestId,
        lender_id: &UserId,
    ) -> Result<TransitionOutcome, LifecycleError> {
        self.settle(request_id, lender_id, LifecycleAction::Reject)
    }

    /// Withdrawn requests are kept and marked rather than deleted.
    pub fn withdraw(
        &self,
        request_id: &LoanRequestId,
        borrower_id: &UserId,
    ) -> Result<TransitionOutcome, LifecycleError> {
        self.settle(request_id, borrower_id, LifecycleAction::Withdraw)
    }

    /// Create the missing active loan for a request left approved by a partial commit.
    ///
    /// Only the request's lender may reconcile it.
    pub fn reconcile_approved(
        &self,
        request_id: &LoanRequestId,
        lender_id: &UserId,
    ) -> Result<ReconcileOutcome, LifecycleError> {
        let request = self.fetch(request_id)?;
        let action = LifecycleAction::Reconcile;
        if action.actor_on(&request) != lender_id {
            return Err(LifecycleError::NotAuthorized {
                actor: lender_id.0.clone(),
                action,
                request_id: request.id.0,
            });
        }
        if request.status != LoanRequestStatus::Approved {
            return Err(LifecycleError::NotApproved {
                request_id: request.id.0,
                current: request.status,
            });
        }

        if let Some(existing) = self.store.active_loan_for_request(request_id)? {
            return Ok(ReconcileOutcome::AlreadyPresent(existing));
        }

        let loan = self.open_active_loan(&request)?;
        info!(request_id = %request_id.0, "reconciled approved request");
        Ok(ReconcileOutcome::Created(loan))
    }

    fn settle(
        &self,
        request_id: &LoanRequestId,
        actor: &UserId,
        action: LifecycleAction,
    ) -> Result<TransitionOutcome, LifecycleError> {
        Ok(match self.decide(request_id, actor, action)? {
            StatusSwap::Applied(request) => TransitionOutcome::Applied {
                request,
                active_loan: None,
            },
            StatusSwap::Conflict { current } => TransitionOutcome::AlreadyProcessed { current },
        })
    }

    fn decide(
        &self,
        request_id: &LoanRequestId,
        actor: &UserId,
        action: LifecycleAction,
    ) -> Result<StatusSwap, LifecycleError> {
        let request = self.fetch(request_id)?;
        if action.actor_on(&request) != actor {
            return Err(LifecycleError::NotAuthorized {
                actor: actor.0.clone(),
                action,
                request_id: request.id.0,
            });
        }

        if request.status.is_terminal() {
            info!(
                request_id = %request_id.0,
                current = request.status.label(),
                ?action,
                "request already processed"
            );
            return Ok(StatusSwap::Conflict {
                current: request.status,
            });
        }

        let swap = self.store.transition_loan_request(
            request_id,
            action.target(),
            LoanRequestStatus::Pending,
            Utc::now(),
        )?;

        match &swap {
            StatusSwap::Applied(updated) => info!(
                request_id = %request_id.0,
                status = updated.status.label(),
                "loan request transitioned"
            ),
            StatusSwap::Conflict { current } => warn!(
                request_id = %request_id.0,
                current = current.label(),
                ?action,
                "lost status race; request already processed"
            ),
        }

        Ok(swap)
    }

    /// Retries transient failures. A conflict means an earlier attempt already landed.
    fn open_active_loan(&self, request: &LoanRequest) -> Result<ActiveLoan, LifecycleError> {
        let start_date = request.decided_at.unwrap_or_else(Utc::now);
        let loan = ActiveLoan::from_approved(request, start_date);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.store.create_active_loan(loan.clone()) {
                Ok(_) => {
                    info!(request_id = %request.id.0, loan_id = %loan.id.0, "active loan opened");
                    return Ok(loan);
                }
                Err(StoreError::Conflict) => {
                    return self
                        .store
                        .active_loan_for_request(&request.id)?
                        .ok_or_else(|| LifecycleError::PartialCommit {
                            request_id: request.id.0.clone(),
                            source: StoreError::Conflict,
                        });
                }
                Err(err) if err.is_retryable() && attempt < self.active_loan_attempts => {
                    warn!(
                        request_id = %request.id.0,
                        attempt,
                        error = %err,
                        "retrying active loan creation"
                    );
                }
                Err(err) => {
                    error!(
                        request_id = %request.id.0,
                        attempt,
                        error = %err,
                        "approved request has no active loan; manual reconciliation required"
                    );
                    return Err(LifecycleError::PartialCommit {
                        request_id: request.id.0.clone(),
                        source: err,
                    });
                }
            }
        }
    }

    fn fetch(&self, request_id: &LoanRequestId) -> Result<LoanRequest, LifecycleError> {
        self.store
            .fetch_loan_request(request_id)?
            .ok_or_else(|| LifecycleError::NotFound(format!("loan request {}", request_id.0)))
    }
}
