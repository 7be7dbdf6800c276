// Dependencies the binary reaches only through the library are acknowledged
// explicitly to keep dependency lints quiet.
use chrono as _;
use dotenvy as _;
use once_cell as _;
use prometheus as _;
use serde as _;
use serde_json as _;
use thiserror as _;
use tower_http as _;
use uuid as _;

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use pdp_service::config::AppConfig;
use pdp_service::metrics::PdpMetricsHelper;
use pdp_service::{app, bootstrap, ingestion, tasks, ApiDoc};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env();
    let state = bootstrap(&config)?;

    let loaded = ingestion::loader_for(&config, &state).load()?;
    PdpMetricsHelper::record_ingestion(config.ingestion.name(), loaded);
    tracing::info!(loaded, strategy = config.ingestion.name(), "Policy ingestion finished");

    tasks::spawn_violation_retention_cleaner(
        state.violations.clone(),
        config.violation_retention_days,
        config.cron_job_owner,
    );
    tasks::spawn_missing_service_provider_validator(
        state.policies.clone(),
        state.registry.clone(),
        state.parser.clone(),
        Arc::new(tasks::LogMailBox),
    );

    let app = app(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/openapi.json", ApiDoc::openapi()));

    let listener = TcpListener::bind(config.bind_addr).await?;
    tracing::info!("pdp-service listening on {}", config.bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}
