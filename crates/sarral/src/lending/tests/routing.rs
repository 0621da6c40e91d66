use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, Request, StatusCode};
use axum::Json;
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::*;
use crate::lending::router::{approve_handler, ActorBody};
use crate::lending::{lending_router, LendingService};

fn post_json(uri: &str, payload: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .expect("request builds")
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).expect("request builds")
}

#[tokio::test]
async fn score_route_returns_refreshed_card() {
    let store = seeded_store();
    seed_sample_history(&store, BORROWER);
    let router = router_with_store(store);

    let response = router
        .oneshot(post_json(
            &format!("/api/v1/borrowers/{BORROWER}/score"),
            json!({}),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["score"]["outcome"], "scored");
    assert_eq!(body["score"]["trust_score"], 60);
    assert_eq!(body["score"]["borrow_limit"], 2685);
    assert_eq!(body["persisted"], true);
}

#[tokio::test]
async fn recommendation_route_reads_amount_from_query() {
    let router = router_with_store(seeded_store());

    let response = router
        .oneshot(get(&format!(
            "/api/v1/borrowers/{BORROWER}/recommendation?amount=2000"
        )))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["outcome"], "recommended");
    assert_eq!(body["offer"]["id"], "offer-b");
    assert_eq!(body["difference_from_desired"], 0);
}

#[tokio::test]
async fn request_lifecycle_over_http() {
    let router = router_with_store(seeded_store());

    let created = router
        .clone()
        .oneshot(post_json(
            "/api/v1/requests",
            json!({ "borrower_id": BORROWER, "offer_id": "offer-a" }),
        ))
        .await
        .expect("router responds");
    assert_eq!(created.status(), StatusCode::CREATED);
    let created = read_json_body(created).await;
    assert_eq!(created["status"], "pending");
    let request_id = created["id"].as_str().expect("request id").to_string();
    let approve_uri = format!("/api/v1/requests/{request_id}/approve");

    let forbidden = router
        .clone()
        .oneshot(post_json(&approve_uri, json!({ "actor_id": OTHER_LENDER })))
        .await
        .expect("router responds");
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

    let approved = router
        .clone()
        .oneshot(post_json(&approve_uri, json!({ "actor_id": LENDER })))
        .await
        .expect("router responds");
    assert_eq!(approved.status(), StatusCode::OK);
    let approved = read_json_body(approved).await;
    assert_eq!(approved["outcome"], "applied");
    assert_eq!(approved["request"]["status"], "approved");
    assert_eq!(approved["active_loan"]["status"], "ongoing");

    let repeated = router
        .clone()
        .oneshot(post_json(&approve_uri, json!({ "actor_id": LENDER })))
        .await
        .expect("router responds");
    assert_eq!(repeated.status(), StatusCode::OK);
    let repeated = read_json_body(repeated).await;
    assert_eq!(repeated["outcome"], "already_processed");
    assert_eq!(repeated["current"], "approved");

    let loans = router
        .oneshot(get(&format!("/api/v1/lenders/{LENDER}/loans")))
        .await
        .expect("router responds");
    let loans = read_json_body(loans).await;
    assert_eq!(loans.as_array().map(Vec::len), Some(1));
    assert_eq!(loans[0]["borrower_name"], "Asha");
}

#[tokio::test]
async fn request_above_limit_is_unprocessable() {
    let router = router_with_store(seeded_store());

    let response = router
        .oneshot(post_json(
            "/api/v1/requests",
            json!({ "borrower_id": BORROWER, "offer_id": "offer-big" }),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = read_json_body(response).await;
    assert!(body["error"]
        .as_str()
        .expect("error message")
        .contains("borrow limit"));
}

#[tokio::test]
async fn unknown_offer_terms_are_not_found() {
    let router = router_with_store(seeded_store());

    let response = router
        .oneshot(get("/api/v1/offers/offer-missing/terms"))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn offer_publication_validates_the_draft() {
    let router = router_with_store(seeded_store());
    let uri = format!("/api/v1/lenders/{LENDER}/offers");

    let too_big = router
        .clone()
        .oneshot(post_json(
            &uri,
            json!({ "principal": 75000, "rate_total_percent": 10.0, "tenure_months": 3 }),
        ))
        .await
        .expect("router responds");
    let published = router
        .oneshot(post_json(
            &uri,
            json!({ "principal": 1500, "rate_total_percent": 10.0, "tenure_months": 3 }),
        ))
        .await
        .expect("router responds");

    assert_eq!(too_big.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(published.status(), StatusCode::CREATED);
    let body = read_json_body(published).await;
    assert_eq!(body["lender_name"], "Ravi");
    assert_eq!(body["rate"]["kind"], "total");
}

#[tokio::test]
async fn reconciling_a_pending_request_conflicts() {
    let store = Arc::new(seeded_store());
    let service = Arc::new(build_service(Arc::clone(&store)));
    let request = pending_request(&service);
    let router = lending_router(Arc::clone(&service));

    let response = router
        .oneshot(post_json(
            &format!("/api/v1/requests/{}/reconcile", request.id.0),
            json!({ "actor_id": LENDER }),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn reconcile_route_rejects_other_lenders() {
    let store = Arc::new(seeded_store());
    let service = Arc::new(build_service(Arc::clone(&store)));
    let request = pending_request(&service);
    let router = lending_router(Arc::clone(&service));

    let response = router
        .oneshot(post_json(
            &format!("/api/v1/requests/{}/reconcile", request.id.0),
            json!({ "actor_id": OTHER_LENDER }),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn approve_handler_reports_partial_commit_with_request_id() {
    let store = Arc::new(FlakyStore::wrapping(seeded_store()));
    let service: Arc<LendingService<FlakyStore>> = Arc::new(build_service(Arc::clone(&store)));
    let request = pending_request(&service);
    store.active_loan_failures.store(10, Ordering::SeqCst);

    let response = approve_handler::<FlakyStore>(
        State(Arc::clone(&service)),
        Path(request.id.0.clone()),
        Json(ActorBody {
            actor_id: LENDER.to_string(),
        }),
    )
    .await
    .expect_err("partial commit");
    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

    let response = axum::response::IntoResponse::into_response(response);
    let body = read_json_body(response).await;
    assert_eq!(body["request_id"], request.id.0);
    assert!(body["reconcile"]
        .as_str()
        .expect("reconcile link")
        .ends_with("/reconcile"));
}

#[tokio::test]
async fn lender_inbox_route_lists_named_requests() {
    let store = Arc::new(seeded_store());
    let service = Arc::new(build_service(Arc::clone(&store)));
    pending_request(&service);
    let router = lending_router(service);

    let response = router
        .oneshot(get(&format!("/api/v1/lenders/{LENDER}/requests")))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body[0]["counterparty_name"], "Asha");
    assert_eq!(body[0]["request"]["status"], "pending");
}

#[tokio::test]
async fn missing_amount_query_is_rejected() {
    let router = router_with_store(seeded_store());

    let response = router
        .oneshot(get(&format!("/api/v1/borrowers/{BORROWER}/dashboard")))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
