use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
    Modify, OpenApi,
};

use crate::models::{LoA, PolicyAccess, PolicyDefinition, PolicySubmission, PolicyViolation};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "PDP Service API",
        version = "1.0.0",
        description = "Policy decision point for a federated identity environment",
        contact(
            name = "Security Team",
            email = "security@example.com"
        ),
        license(
            name = "Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:8081", description = "Local development server"),
        (url = "https://pdp.example.com", description = "Production server")
    ),
    paths(
        crate::handlers::list_policies,
        crate::handlers::get_policy,
        crate::handlers::create_policy,
        crate::handlers::delete_policy,
        crate::handlers::list_violations,
        crate::handlers::health_check,
        crate::handlers::get_metrics,
    ),
    components(
        schemas(
            PolicyDefinition,
            PolicySubmission,
            PolicyViolation,
            PolicyAccess,
            LoA,
            HealthCheckResponse,
            ErrorResponse,
            ErrorDetails,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "policies", description = "Policy definition operations"),
        (name = "violations", description = "Policy violation records"),
        (name = "health", description = "Health check operations"),
        (name = "metrics", description = "Metrics operations")
    )
)]
pub struct ApiDoc;

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            // The authentication layer forwards the federated identity in
            // these headers; the entity id header stands in for the scheme.
            components.add_security_scheme(
                "federated_identity",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-IDP-ENTITY-ID"))),
            );
        }
    }
}

#[derive(serde::Serialize, serde::Deserialize, utoipa::ToSchema)]
pub struct HealthCheckResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

#[derive(serde::Serialize, serde::Deserialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(serde::Serialize, serde::Deserialize, utoipa::ToSchema)]
pub struct ErrorDetails {
    #[schema(example = "mismatch_service_provider")]
    pub r#type: String,
    #[schema(example = "Service provider X is not owned by the institution of the current user")]
    pub message: String,
    #[schema(example = 403)]
    pub status: u16,
}
