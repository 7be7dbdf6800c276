#![forbid(unsafe_code)]
#![deny(rust_2018_idioms, future_incompatible)]

use std::sync::Arc;

use axum::{
    http,
    middleware,
    routing::get,
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

pub mod access;
pub mod config;
pub mod context;
pub mod definition;
pub mod documentation;
pub mod errors;
pub mod handlers;
pub mod ingestion;
pub mod metrics;
pub mod models;
pub mod registry;
pub mod store;
pub mod tasks;
pub mod validation;
pub mod xacml;

use crate::access::PolicyAccessEnforcer;
use crate::config::AppConfig;
use crate::definition::PolicyDefinitionParser;
use crate::errors::AppError;
use crate::registry::{FileServiceRegistry, ServiceRegistry};
use crate::store::{MemoryPolicyStore, MemoryViolationStore, PolicyStore, ViolationStore};

pub use documentation::ApiDoc;

/// Shared state behind every request handler.
pub struct AppState {
    pub policies: Arc<dyn PolicyStore>,
    pub violations: Arc<dyn ViolationStore>,
    pub registry: Arc<dyn ServiceRegistry>,
    pub parser: PolicyDefinitionParser,
    pub enforcer: PolicyAccessEnforcer,
}

impl AppState {
    /// Wires the decision components around the given registry, with
    /// in-memory stores.
    pub fn new(registry: Arc<dyn ServiceRegistry>) -> Self {
        Self {
            policies: Arc::new(MemoryPolicyStore::new()),
            violations: Arc::new(MemoryViolationStore::new()),
            parser: PolicyDefinitionParser::default(),
            enforcer: PolicyAccessEnforcer::new(registry.clone()),
            registry,
        }
    }
}

/// Builds the application state from configuration: registry fixtures from
/// disk, in-memory stores, and the decision components wired together.
pub fn bootstrap(config: &AppConfig) -> Result<Arc<AppState>, AppError> {
    let registry: Arc<dyn ServiceRegistry> = Arc::new(FileServiceRegistry::from_files(
        &config.idp_registry_path,
        &config.sp_registry_path,
    )?);
    registry.set_allow_all(config.registry_allow_all);
    Ok(Arc::new(AppState::new(registry)))
}

pub fn app(state: Arc<AppState>) -> Router {
    let cors = match std::env::var("ALLOWED_ORIGINS") {
        Ok(origins) if !origins.trim().is_empty() => {
            let mut layer = CorsLayer::new();
            for o in origins.split(',') {
                if let Ok(origin) = o.trim().parse::<http::HeaderValue>() {
                    layer = layer.allow_origin(origin);
                }
            }
            layer
        }
        _ => {
            // Default to no origins unless explicitly configured
            CorsLayer::new()
        }
    };

    // Every policy and violation route requires a forwarded federated
    // identity; health and metrics stay open.
    let protected = Router::new()
        .route(
            "/v1/policies",
            get(handlers::list_policies).post(handlers::create_policy),
        )
        .route(
            "/v1/policies/:id",
            get(handlers::get_policy).delete(handlers::delete_policy),
        )
        .route("/v1/violations", get(handlers::list_violations))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            context::federated_principal_middleware,
        ));

    Router::new()
        .merge(protected)
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::get_metrics))
        .layer(middleware::from_fn(metrics::pdp_metrics_middleware))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
