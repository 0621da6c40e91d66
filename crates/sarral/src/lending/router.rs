use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{LoanRequestId, OfferId, UserId};
use super::lifecycle::LifecycleError;
use super::offers::OfferDraft;
use super::repository::{LendingStore, StoreError};
use super::service::{LendingService, LendingServiceError};

/// Router builder exposing scoring, matching, offer, and request lifecycle endpoints.
pub fn lending_router<S>(service: Arc<LendingService<S>>) -> Router
where
    S: LendingStore + 'static,
{
    Router::new()
        .route(
            "/api/v1/borrowers/:borrower_id/score",
            post(refresh_score_handler::<S>),
        )
        .route(
            "/api/v1/borrowers/:borrower_id/recommendation",
            get(recommendation_handler::<S>),
        )
        .route(
            "/api/v1/borrowers/:borrower_id/dashboard",
            get(dashboard_handler::<S>),
        )
        .route(
            "/api/v1/borrowers/:borrower_id/requests",
            get(borrower_requests_handler::<S>),
        )
        .route("/api/v1/offers/:offer_id/terms", get(terms_handler::<S>))
        .route(
            "/api/v1/lenders/:lender_id/offers",
            post(create_offer_handler::<S>),
        )
        .route(
            "/api/v1/lenders/:lender_id/offers/:offer_id/deactivate",
            post(deactivate_offer_handler::<S>),
        )
        .route(
            "/api/v1/lenders/:lender_id/requests",
            get(lender_inbox_handler::<S>),
        )
        .route(
            "/api/v1/lenders/:lender_id/loans",
            get(lender_loans_handler::<S>),
        )
        .route("/api/v1/requests", post(submit_request_handler::<S>))
        .route(
            "/api/v1/requests/:request_id/approve",
            post(approve_handler::<S>),
        )
        .route(
            "/api/v1/requests/:request_id/reject",
            post(reject_handler::<S>),
        )
        .route(
            "/api/v1/requests/:request_id/withdraw",
            post(withdraw_handler::<S>),
        )
        .route(
            "/api/v1/requests/:request_id/reconcile",
            post(reconcile_handler::<S>),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct AmountQuery {
    pub(crate) amount: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubmitRequestBody {
    pub(crate) borrower_id: String,
    pub(crate) offer_id: String,
}

/// Identifies who is acting on a request.
#[derive(Debug, Deserialize)]
pub(crate) struct ActorBody {
    pub(crate) actor_id: String,
}

type Shared<S> = State<Arc<LendingService<S>>>;

pub(crate) async fn refresh_score_handler<S>(
    State(service): Shared<S>,
    Path(borrower_id): Path<String>,
) -> Result<Response, LendingServiceError>
where
    S: LendingStore + 'static,
{
    let refresh = service.refresh_score(&UserId(borrower_id))?;
    Ok((StatusCode::OK, Json(refresh)).into_response())
}

pub(crate) async fn recommendation_handler<S>(
    State(service): Shared<S>,
    Path(borrower_id): Path<String>,
    Query(query): Query<AmountQuery>,
) -> Result<Response, LendingServiceError>
where
    S: LendingStore + 'static,
{
    let recommendation = service.recommend(&UserId(borrower_id), query.amount)?;
    Ok((StatusCode::OK, Json(recommendation)).into_response())
}

pub(crate) async fn dashboard_handler<S>(
    State(service): Shared<S>,
    Path(borrower_id): Path<String>,
    Query(query): Query<AmountQuery>,
) -> Result<Response, LendingServiceError>
where
    S: LendingStore + 'static,
{
    let dashboard = service
        .dashboard(&UserId(borrower_id), query.amount)
        .await?;
    Ok((StatusCode::OK, Json(dashboard)).into_response())
}

pub(crate) async fn borrower_requests_handler<S>(
    State(service): Shared<S>,
    Path(borrower_id): Path<String>,
) -> Result<Response, LendingServiceError>
where
    S: LendingStore + 'static,
{
    let requests = service.borrower_requests(&UserId(borrower_id)).await?;
    Ok((StatusCode::OK, Json(requests)).into_response())
}

pub(crate) async fn terms_handler<S>(
    State(service): Shared<S>,
    Path(offer_id): Path<String>,
) -> Result<Response, LendingServiceError>
where
    S: LendingStore + 'static,
{
    let terms = service.review_offer(&OfferId(offer_id))?;
    Ok((StatusCode::OK, Json(terms)).into_response())
}

pub(crate) async fn create_offer_handler<S>(
    State(service): Shared<S>,
    Path(lender_id): Path<String>,
    Json(draft): Json<OfferDraft>,
) -> Result<Response, LendingServiceError>
where
    S: LendingStore + 'static,
{
    let offer = service.create_offer(&UserId(lender_id), draft)?;
    Ok((StatusCode::CREATED, Json(offer)).into_response())
}

pub(crate) async fn deactivate_offer_handler<S>(
    State(service): Shared<S>,
    Path((lender_id, offer_id)): Path<(String, String)>,
) -> Result<Response, LendingServiceError>
where
    S: LendingStore + 'static,
{
    let offer = service.deactivate_offer(&UserId(lender_id), &OfferId(offer_id))?;
    Ok((StatusCode::OK, Json(offer)).into_response())
}

pub(crate) async fn lender_inbox_handler<S>(
    State(service): Shared<S>,
    Path(lender_id): Path<String>,
) -> Result<Response, LendingServiceError>
where
    S: LendingStore + 'static,
{
    let inbox = service.lender_inbox(&UserId(lender_id)).await?;
    Ok((StatusCode::OK, Json(inbox)).into_response())
}

pub(crate) async fn lender_loans_handler<S>(
    State(service): Shared<S>,
    Path(lender_id): Path<String>,
) -> Result<Response, LendingServiceError>
where
    S: LendingStore + 'static,
{
    let loans = service.lender_active_loans(&UserId(lender_id)).await?;
    Ok((StatusCode::OK, Json(loans)).into_response())
}

pub(crate) async fn submit_request_handler<S>(
    State(service): Shared<S>,
    Json(body): Json<SubmitRequestBody>,
) -> Result<Response, LendingServiceError>
where
    S: LendingStore + 'static,
{
    let request = service.submit_request(&UserId(body.borrower_id), &OfferId(body.offer_id))?;
    Ok((StatusCode::CREATED, Json(request)).into_response())
}

pub(crate) async fn approve_handler<S>(
    State(service): Shared<S>,
    Path(request_id): Path<String>,
    Json(body): Json<ActorBody>,
) -> Result<Response, LendingServiceError>
where
    S: LendingStore + 'static,
{
    let outcome = service.approve(&LoanRequestId(request_id), &UserId(body.actor_id))?;
    Ok((StatusCode::OK, Json(outcome)).into_response())
}

pub(crate) async fn reject_handler<S>(
    State(service): Shared<S>,
    Path(request_id): Path<String>,
    Json(body): Json<ActorBody>,
) -> Result<Response, LendingServiceError>
where
    S: LendingStore + 'static,
{
    let outcome = service.reject(&LoanRequestId(request_id), &UserId(body.actor_id))?;
    Ok((StatusCode::OK, Json(outcome)).into_response())
}

pub(crate) async fn withdraw_handler<S>(
    State(service): Shared<S>,
    Path(request_id): Path<String>,
    Json(body): Json<ActorBody>,
) -> Result<Response, LendingServiceError>
where
    S: LendingStore + 'static,
{
    let outcome = service.withdraw(&LoanRequestId(request_id), &UserId(body.actor_id))?;
    Ok((StatusCode::OK, Json(outcome)).into_response())
}

pub(crate) async fn reconcile_handler<S>(
    State(service): Shared<S>,
    Path(request_id): Path<String>,
    Json(body): Json<ActorBody>,
) -> Result<Response, LendingServiceError>
where
    S: LendingStore + 'static,
{
    let outcome = service.reconcile(&LoanRequestId(request_id), &UserId(body.actor_id))?;
    Ok((StatusCode::OK, Json(outcome)).into_response())
}

impl LendingServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            LendingServiceError::Validation(_)
            | LendingServiceError::Lifecycle(
                LifecycleError::Validation(_)
                | LifecycleError::LimitExceeded { .. }
                | LifecycleError::SelfLending,
            ) => StatusCode::UNPROCESSABLE_ENTITY,
            LendingServiceError::NotAuthorized { .. }
            | LendingServiceError::Lifecycle(LifecycleError::NotAuthorized { .. }) => {
                StatusCode::FORBIDDEN
            }
            LendingServiceError::NotFound(_)
            | LendingServiceError::Lifecycle(LifecycleError::NotFound(_))
            | LendingServiceError::Store(StoreError::NotFound)
            | LendingServiceError::Lifecycle(LifecycleError::Store(StoreError::NotFound)) => {
                StatusCode::NOT_FOUND
            }
            LendingServiceError::Lifecycle(
                LifecycleError::OfferUnavailable { .. } | LifecycleError::NotApproved { .. },
            )
            | LendingServiceError::Store(StoreError::Conflict)
            | LendingServiceError::Lifecycle(LifecycleError::Store(StoreError::Conflict)) => {
                StatusCode::CONFLICT
            }
            LendingServiceError::Store(StoreError::Unavailable(_))
            | LendingServiceError::Lifecycle(LifecycleError::Store(StoreError::Unavailable(_))) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            LendingServiceError::Lifecycle(LifecycleError::PartialCommit { .. }) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for LendingServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let payload = match &self {
            LendingServiceError::Lifecycle(LifecycleError::PartialCommit { request_id, .. }) => {
                json!({
                    "error": self.to_string(),
                    "request_id": request_id,
                    "reconcile": format!("/api/v1/requests/{request_id}/reconcile"),
                })
            }
            _ => json!({ "error": self.to_string() }),
        };

        (status, Json(payload)).into_response()
    }
}
