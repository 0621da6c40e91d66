use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use sarral::error::AppError;
use sarral::lending::{
    import_transactions_csv, lending_router, usable_transactions, LendingStore, LendingService,
    ScoreOutcome, ScoringConfig, ScoringEngine,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::io::Cursor;
use std::sync::Arc;

/// Ad-hoc scoring of a pasted statement; nothing is stored.
#[derive(Debug, Deserialize)]
pub(crate) struct StatementScoreRequest {
    pub(crate) csv: String,
    #[serde(default)]
    pub(crate) month_divisor: Option<u32>,
}

#[derive(Debug, Serialize)]
pub(crate) struct StatementScoreResponse {
    pub(crate) rows: usize,
    pub(crate) usable_transactions: usize,
    pub(crate) score: ScoreOutcome,
}

pub(crate) fn with_lending_routes<S>(service: Arc<LendingService<S>>) -> axum::Router
where
    S: LendingStore + 'static,
{
    lending_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/statements/score",
            axum::routing::post(statement_score_endpoint),
        )
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn statement_score_endpoint(
    Json(payload): Json<StatementScoreRequest>,
) -> Result<Json<StatementScoreResponse>, AppError> {
    let StatementScoreRequest { csv, month_divisor } = payload;

    let records = import_transactions_csv(Cursor::new(csv.into_bytes()))?;
    let transactions = usable_transactions(&records)?;

    let defaults = ScoringConfig::default();
    let config = ScoringConfig {
        month_divisor: month_divisor
            .filter(|divisor| *divisor > 0)
            .unwrap_or(defaults.month_divisor),
        ..defaults
    };
    let score = ScoringEngine::new(config).score(&transactions);

    Ok(Json(StatementScoreResponse {
        rows: records.len(),
        usable_transactions: transactions.len(),
        score,
    }))
}
