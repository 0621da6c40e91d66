//! Peer-to-peer lending: inflow-based trust scoring, offer matching, repayment terms, and
//! the loan request lifecycle.
//!
//! The calculators ([`ScoringEngine`], [`rank_offers`], [`LoanTerms`]) are pure and
//! synchronous. [`LendingService`] composes them with a [`LendingStore`] and owns the
//! concurrent reads and the sequenced writes.

pub mod domain;
pub mod ingest;
pub mod lifecycle;
pub mod memory;
pub mod offers;
pub mod repository;
pub mod router;
pub mod scoring;
pub mod seed;
pub mod service;
pub mod terms;

#[cfg(test)]
mod tests;

pub use domain::{
    ActiveLoan, ActiveLoanId, ActiveLoanStatus, BorrowerProfile, LoanOffer, LoanRequest,
    LoanRequestId, LoanRequestStatus, OfferId, OfferRate, OfferStatus, Transaction, UserId,
};
pub use ingest::{
    import_transactions_csv, usable_transactions, OfferDocument, TransactionImportError,
    TransactionRecord, ValidationError,
};
pub use lifecycle::{
    LifecycleAction, LifecycleError, ReconcileOutcome, RequestLifecycle, TransitionOutcome,
};
pub use memory::InMemoryLendingStore;
pub use offers::{rank_offers, recommend, BorrowerStanding, OfferDraft, RankedOffer, Recommendation};
pub use repository::{LendingStore, StatusSwap, StoreError};
pub use router::lending_router;
pub use scoring::{
    MonthlyBucket, MonthlyInflow, ScoreCard, ScoreOutcome, ScoringConfig, ScoringEngine,
};
pub use seed::{sample_history, SAMPLE_MONTHLY_AMOUNTS};
pub use service::{
    ActiveLoanView, BorrowerDashboard, LendingService, LendingServiceError, RequestView,
    ScoreRefresh, UNKNOWN_USER,
};
pub use terms::LoanTerms;
