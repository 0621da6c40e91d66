use crate::cli::ServeArgs;
use crate::infra::{seed_sample_marketplace, AppState};
use crate::routes::with_lending_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use chrono::Utc;
use sarral::config::{AppConfig, AppEnvironment};
use sarral::error::AppError;
use sarral::lending::{
    InMemoryLendingStore, LendingService, LendingServiceError, SAMPLE_MONTHLY_AMOUNTS,
};
use sarral::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(InMemoryLendingStore::default());
    if !args.no_seed && config.environment != AppEnvironment::Production {
        seed_sample_marketplace(&store, Utc::now(), &SAMPLE_MONTHLY_AMOUNTS)
            .map_err(LendingServiceError::from)?;
        info!("seeded sample borrower and offers");
    }
    let lending_service = Arc::new(LendingService::new(store, config.lending.clone()));

    let app = with_lending_routes(lending_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "sarral lending service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
