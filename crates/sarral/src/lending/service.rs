use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::LendingConfig;

use super::domain::{
    ActiveLoan, BorrowerProfile, LoanOffer, LoanRequest, LoanRequestId, OfferId, OfferStatus,
    UserId,
};
use super::ingest::{usable_transactions, ValidationError};
use super::lifecycle::{LifecycleError, ReconcileOutcome, RequestLifecycle, TransitionOutcome};
use super::offers::{rank_offers, BorrowerStanding, OfferDraft, RankedOffer, Recommendation};
use super::repository::{LendingStore, StoreError};
use super::scoring::{ScoreCard, ScoreOutcome, ScoringEngine};
use super::terms::LoanTerms;

/// Shown in place of a participant whose directory entry could not be resolved.
pub const UNKNOWN_USER: &str = "Unknown User";

static OFFER_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_offer_id() -> OfferId {
    let id = OFFER_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    OfferId(format!("offer-{id:06}"))
}

/// Service composing the store, scoring engine, offer ranking, and request lifecycle.
pub struct LendingService<S> {
    store: Arc<S>,
    engine: Arc<ScoringEngine>,
    lifecycle: RequestLifecycle<S>,
    config: LendingConfig,
}

/// Freshly computed score and whether it reached the borrower's profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRefresh {
    pub borrower_id: UserId,
    pub score: ScoreOutcome,
    pub persisted: bool,
}

/// Everything the borrower home screen needs in one call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BorrowerDashboard {
    pub profile: BorrowerProfile,
    pub score: ScoreOutcome,
    pub score_persisted: bool,
    pub recommendation: Recommendation,
    pub eligible_offers: Vec<RankedOffer>,
}

/// Loan request paired with the name of the other party.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestView {
    pub request: LoanRequest,
    pub counterparty_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveLoanView {
    pub loan: ActiveLoan,
    pub borrower_name: String,
}

#[derive(Debug, thiserror::Error)]
pub enum LendingServiceError {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{0} not found")]
    NotFound(String),
    #[error("user {actor} does not own offer {offer_id}")]
    NotAuthorized { actor: String, offer_id: String },
}

impl<S> LendingService<S>
where
    S: LendingStore + 'static,
{
    pub fn new(store: Arc<S>, config: LendingConfig) -> Self {
        let engine = Arc::new(ScoringEngine::new(config.scoring.clone()));
        let lifecycle = RequestLifecycle::new(Arc::clone(&store), config.active_loan_attempts);

        Self {
            store,
            engine,
            lifecycle,
            config,
        }
    }

    pub fn config(&self) -> &LendingConfig {
        &self.config
    }

    pub fn engine(&self) -> &ScoringEngine {
        &self.engine
    }

    /// Recompute a borrower's score from recent inflows and write it back.
    ///
    /// A failed write-back is logged and the computed score is still returned.
    pub fn refresh_score(&self, borrower_id: &UserId) -> Result<ScoreRefresh, LendingServiceError> {
        self.profile(borrower_id)?;
        let since = Utc::now() - Duration::days(self.config.lookback_days);
        let records = self.store.fetch_transactions(&borrower_id.0, since)?;
        let score = self.engine.score(&usable_transactions(&records)?);

        let persisted = match score.card() {
            Some(card) => {
                let written = self.store.write_borrower_score(
                    borrower_id,
                    card.trust_score,
                    card.borrow_limit,
                    Utc::now(),
                );
                note_write_back(borrower_id, card, written)
            }
            None => {
                info!(borrower = %borrower_id.0, "insufficient history to score borrower");
                false
            }
        };

        Ok(ScoreRefresh {
            borrower_id: borrower_id.clone(),
            score,
            persisted,
        })
    }

    /// Best-fit offer for a desired amount, judged on the borrower's stored score.
    pub fn recommend(
        &self,
        borrower_id: &UserId,
        desired_amount: u64,
    ) -> Result<Recommendation, LendingServiceError> {
        let profile = self.profile(borrower_id)?;
        let offers = self.store.fetch_available_offers()?;
        let ranked = rank_offers(&standing_of(&profile), desired_amount, &offers)?;
        Ok(top_of(ranked))
    }

    /// Repayment terms for borrowing an offer's full principal.
    pub fn review_offer(&self, offer_id: &OfferId) -> Result<LoanTerms, LendingServiceError> {
        let offer = self.offer(offer_id)?;
        Ok(LoanTerms::for_offer(&offer)?)
    }

    pub fn submit_request(
        &self,
        borrower_id: &UserId,
        offer_id: &OfferId,
    ) -> Result<LoanRequest, LendingServiceError> {
        Ok(self.lifecycle.create(borrower_id, offer_id)?)
    }

    pub fn approve(
        &self,
        request_id: &LoanRequestId,
        lender_id: &UserId,
    ) -> Result<TransitionOutcome, LendingServiceError> {
        Ok(self.lifecycle.approve(request_id, lender_id)?)
    }

    pub fn reject(
        &self,
        request_id: &LoanRequestId,
        lender_id: &UserId,
    ) -> Result<TransitionOutcome, LendingServiceError> {
        Ok(self.lifecycle.reject(request_id, lender_id)?)
    }

    pub fn withdraw(
        &self,
        request_id: &LoanRequestId,
        borrower_id: &UserId,
    ) -> Result<TransitionOutcome, LendingServiceError> {
        Ok(self.lifecycle.withdraw(request_id, borrower_id)?)
    }

    pub fn reconcile(
        &self,
        request_id: &LoanRequestId,
        lender_id: &UserId,
    ) -> Result<ReconcileOutcome, LendingServiceError> {
        Ok(self.lifecycle.reconcile_approved(request_id, lender_id)?)
    }

    /// Publish a new offer under the lender's directory name.
    pub fn create_offer(
        &self,
        lender_id: &UserId,
        draft: OfferDraft,
    ) -> Result<LoanOffer, LendingServiceError> {
        let lender_name = self
            .store
            .display_name(lender_id)?
            .unwrap_or_else(|| UNKNOWN_USER.to_string());
        let offer = draft.into_offer(
            next_offer_id(),
            lender_id.clone(),
            lender_name,
            Utc::now(),
            self.config.max_offer_principal,
        )?;

        self.store.create_offer(offer.clone())?;
        info!(
            offer_id = %offer.id.0,
            lender = %lender_id.0,
            principal = offer.principal,
            "offer published"
        );
        Ok(offer)
    }

    /// Withdraw an offer from the marketplace. Repeating the call is harmless.
    pub fn deactivate_offer(
        &self,
        lender_id: &UserId,
        offer_id: &OfferId,
    ) -> Result<LoanOffer, LendingServiceError> {
        let mut offer = self.offer(offer_id)?;
        if &offer.lender_id != lender_id {
            return Err(LendingServiceError::NotAuthorized {
                actor: lender_id.0.clone(),
                offer_id: offer_id.0.clone(),
            });
        }
        if offer.status == OfferStatus::Inactive {
            return Ok(offer);
        }

        self.store.set_offer_status(offer_id, OfferStatus::Inactive)?;
        offer.status = OfferStatus::Inactive;
        info!(offer_id = %offer_id.0, "offer deactivated");
        Ok(offer)
    }

    /// Score, write back, and rank for the home screen. Profile, inflows, and offers are read
    /// concurrently.
    ///
    /// A fresh score is written to the profile before ranking so a recommended offer passes the
    /// limit check on submission. Borrowers without enough history are ranked on their stored
    /// score.
    pub async fn dashboard(
        &self,
        borrower_id: &UserId,
        desired_amount: u64,
    ) -> Result<BorrowerDashboard, LendingServiceError> {
        let since = Utc::now() - Duration::days(self.config.lookback_days);
        let profile_id = borrower_id.clone();
        let feed_id = borrower_id.0.clone();

        let (profile, records, offers) = tokio::try_join!(
            self.blocking(move |store| store.fetch_borrower_profile(&profile_id)),
            self.blocking(move |store| store.fetch_transactions(&feed_id, since)),
            self.blocking(|store| store.fetch_available_offers()),
        )?;
        let mut profile = profile
            .ok_or_else(|| LendingServiceError::NotFound(format!("borrower {}", borrower_id.0)))?;

        let score = self.engine.score(&usable_transactions(&records)?);
        let score_persisted = match score.card() {
            Some(card) => {
                let scored_at = Utc::now();
                let persisted = self.write_score(borrower_id, card, scored_at).await;
                if persisted {
                    profile.trust_score = card.trust_score;
                    profile.borrow_limit = card.borrow_limit;
                    profile.last_score_update = Some(scored_at);
                }
                persisted
            }
            None => false,
        };

        let standing = match score.card() {
            Some(card) => BorrowerStanding {
                borrower_id: borrower_id.clone(),
                trust_score: card.trust_score,
                borrow_limit: card.borrow_limit,
            },
            None => standing_of(&profile),
        };
        let eligible_offers = rank_offers(&standing, desired_amount, &offers)?;
        let recommendation = top_of(eligible_offers.clone());

        Ok(BorrowerDashboard {
            profile,
            score,
            score_persisted,
            recommendation,
            eligible_offers,
        })
    }

    /// Requests addressed to a lender, each with the borrower's name.
    pub async fn lender_inbox(
        &self,
        lender_id: &UserId,
    ) -> Result<Vec<RequestView>, LendingServiceError> {
        let lender = lender_id.clone();
        let requests = self
            .blocking(move |store| store.requests_for_lender(&lender))
            .await?;
        let names = self
            .display_names(requests.iter().map(|request| request.borrower_id.clone()))
            .await;

        Ok(requests
            .into_iter()
            .map(|request| RequestView {
                counterparty_name: name_for(&names, &request.borrower_id),
                request,
            })
            .collect())
    }

    /// A borrower's own requests, each with the lender's current name.
    pub async fn borrower_requests(
        &self,
        borrower_id: &UserId,
    ) -> Result<Vec<RequestView>, LendingServiceError> {
        let borrower = borrower_id.clone();
        let requests = self
            .blocking(move |store| store.requests_for_borrower(&borrower))
            .await?;
        let names = self
            .display_names(requests.iter().map(|request| request.lender_id.clone()))
            .await;

        Ok(requests
            .into_iter()
            .map(|request| RequestView {
                counterparty_name: name_for(&names, &request.lender_id),
                request,
            })
            .collect())
    }

    pub async fn lender_active_loans(
        &self,
        lender_id: &UserId,
    ) -> Result<Vec<ActiveLoanView>, LendingServiceError> {
        let lender = lender_id.clone();
        let loans = self
            .blocking(move |store| store.active_loans_for_lender(&lender))
            .await?;
        let names = self
            .display_names(loans.iter().map(|loan| loan.borrower_id.clone()))
            .await;

        Ok(loans
            .into_iter()
            .map(|loan| ActiveLoanView {
                borrower_name: name_for(&names, &loan.borrower_id),
                loan,
            })
            .collect())
    }

    /// Resolve each distinct user once, concurrently. Failed lookups fall back to
    /// [`UNKNOWN_USER`].
    async fn display_names(
        &self,
        user_ids: impl IntoIterator<Item = UserId>,
    ) -> HashMap<UserId, String> {
        let distinct: BTreeSet<UserId> = user_ids.into_iter().collect();
        let lookups = distinct.into_iter().map(|user_id| async move {
            let lookup_id = user_id.clone();
            let name = match self
                .blocking(move |store| store.display_name(&lookup_id))
                .await
            {
                Ok(Some(name)) => name,
                Ok(None) => UNKNOWN_USER.to_string(),
                Err(err) => {
                    warn!(user = %user_id.0, error = %err, "display name lookup failed");
                    UNKNOWN_USER.to_string()
                }
            };
            (user_id, name)
        });

        join_all(lookups).await.into_iter().collect()
    }

    async fn write_score(
        &self,
        borrower_id: &UserId,
        card: &ScoreCard,
        scored_at: DateTime<Utc>,
    ) -> bool {
        let owner = borrower_id.clone();
        let (trust_score, borrow_limit) = (card.trust_score, card.borrow_limit);
        let written = self
            .blocking(move |store| {
                store.write_borrower_score(&owner, trust_score, borrow_limit, scored_at)
            })
            .await;
        note_write_back(borrower_id, card, written)
    }

    async fn blocking<T, F>(&self, read: F) -> Result<T, LendingServiceError>
    where
        F: FnOnce(&S) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || read(store.as_ref()))
            .await
            .map_err(|err| StoreError::Unavailable(err.to_string()))?
            .map_err(LendingServiceError::from)
    }

    fn profile(&self, borrower_id: &UserId) -> Result<BorrowerProfile, LendingServiceError> {
        self.store
            .fetch_borrower_profile(borrower_id)?
            .ok_or_else(|| LendingServiceError::NotFound(format!("borrower {}", borrower_id.0)))
    }

    fn offer(&self, offer_id: &OfferId) -> Result<LoanOffer, LendingServiceError> {
        self.store
            .fetch_offer(offer_id)?
            .ok_or_else(|| LendingServiceError::NotFound(format!("offer {}", offer_id.0)))
    }
}

fn note_write_back<E: std::fmt::Display>(
    borrower_id: &UserId,
    card: &ScoreCard,
    written: Result<(), E>,
) -> bool {
    match written {
        Ok(()) => {
            info!(
                borrower = %borrower_id.0,
                trust_score = card.trust_score,
                borrow_limit = card.borrow_limit,
                "borrower score refreshed"
            );
            true
        }
        Err(err) => {
            warn!(borrower = %borrower_id.0, error = %err, "score write-back failed");
            false
        }
    }
}

fn standing_of(profile: &BorrowerProfile) -> BorrowerStanding {
    BorrowerStanding {
        borrower_id: profile.borrower_id.clone(),
        trust_score: profile.trust_score,
        borrow_limit: profile.borrow_limit,
    }
}

fn top_of(ranked: Vec<RankedOffer>) -> Recommendation {
    match ranked.into_iter().next() {
        Some(top) => Recommendation::Recommended(top),
        None => Recommendation::NoEligibleOffer,
    }
}

fn name_for(names: &HashMap<UserId, String>, user_id: &UserId) -> String {
    names
        .get(user_id)
        .cloned()
        .unwrap_or_else(|| UNKNOWN_USER.to_string())
}
