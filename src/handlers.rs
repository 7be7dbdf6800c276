//! HTTP request handlers for the policy decision point

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use uuid::Uuid;

use crate::context::CurrentPrincipal;
use crate::errors::{AccessError, AppError};
use crate::metrics::{pdp_metrics_handler, PdpMetricsHelper};
use crate::models::{
    FederatedPrincipal, Policy, PolicyAccess, PolicyDefinition, PolicySubmission, PolicyViolation,
};
use crate::validation::validate_policy_submission;
use crate::AppState;

#[utoipa::path(
    get,
    path = "/v1/policies",
    tag = "policies",
    responses(
        (status = 200, description = "Definitions of the policies readable by the current user", body = Vec<PolicyDefinition>),
        (status = 401, description = "No federated identity on the request", body = crate::documentation::ErrorResponse)
    ),
    security(("federated_identity" = []))
)]
/// List the definitions of every policy the current user may read
///
/// Listing filters on readability instead of failing the whole call; stored
/// policies the user does not own are simply omitted.
pub async fn list_policies(
    State(state): State<Arc<AppState>>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> Result<Json<Vec<PolicyDefinition>>, AppError> {
    let mut definitions = Vec::new();
    for policy in state.policies.all() {
        let definition = match state.parser.parse(&policy) {
            Ok(definition) => definition,
            Err(e) => {
                tracing::warn!(policy = %policy.name, error = %e, "Skipping stored policy with invalid document");
                continue;
            }
        };
        if decide(&state, &principal, Some(&policy), PolicyAccess::Read, Some(&definition)).is_ok()
        {
            definitions.push(definition);
        }
    }
    Ok(Json(definitions))
}

#[utoipa::path(
    get,
    path = "/v1/policies/{id}",
    tag = "policies",
    params(("id" = String, Path, description = "Policy id")),
    responses(
        (status = 200, description = "Definition of the requested policy", body = PolicyDefinition),
        (status = 403, description = "Policy not accessible to the current user", body = crate::documentation::ErrorResponse),
        (status = 404, description = "Unknown policy id", body = crate::documentation::ErrorResponse)
    ),
    security(("federated_identity" = []))
)]
/// Fetch one policy definition
pub async fn get_policy(
    State(state): State<Arc<AppState>>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<String>,
) -> Result<Json<PolicyDefinition>, AppError> {
    let policy = state
        .policies
        .get(&id)
        .ok_or(AppError::PolicyNotFound { id })?;
    let definition = state.parser.parse(&policy)?;
    enforce_or_record(
        &state,
        &principal,
        Some(&policy),
        PolicyAccess::Read,
        Some(&definition),
    )?;
    Ok(Json(definition))
}

#[utoipa::path(
    post,
    path = "/v1/policies",
    tag = "policies",
    request_body = PolicySubmission,
    responses(
        (status = 201, description = "Policy stored; its definition is returned", body = PolicyDefinition),
        (status = 400, description = "Document failed structural validation and was not stored", body = crate::documentation::ErrorResponse),
        (status = 403, description = "Policy targets entities the current user does not own", body = crate::documentation::ErrorResponse)
    ),
    security(("federated_identity" = []))
)]
/// Create or update a policy
///
/// The document is validated before anything else: a structurally invalid
/// document blocks persistence entirely. On update the policy keeps its
/// original anchoring identity provider.
pub async fn create_policy(
    State(state): State<Arc<AppState>>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Json(body): Json<PolicySubmission>,
) -> Result<(StatusCode, Json<PolicyDefinition>), AppError> {
    validate_policy_submission(&body)?;

    let existing = body.id.as_deref().and_then(|id| state.policies.get(id));
    let policy = Policy {
        id: Some(
            body.id
                .clone()
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
        ),
        name: body.name.trim().to_string(),
        policy_document: body.policy_document,
        active: body.active,
        authenticating_authority: existing
            .as_ref()
            .map(|p| p.authenticating_authority.clone())
            .unwrap_or_else(|| principal.authenticating_authority().to_string()),
        created_by: existing
            .as_ref()
            .map(|p| p.created_by.clone())
            .unwrap_or_else(|| principal.username().to_string()),
        created_by_display_name: existing
            .as_ref()
            .map(|p| p.created_by_display_name.clone())
            .unwrap_or_else(|| principal.user_display_name().to_string()),
        policy_type: body.policy_type,
        no_target_sp: body.no_target_sp,
        created_at: existing.as_ref().map(|p| p.created_at).unwrap_or_else(Utc::now),
    };

    let definition = state.parser.parse(&policy).map_err(|e| {
        PdpMetricsHelper::record_parse_failure(e.reason());
        tracing::warn!(policy = %policy.name, reason = %e, "Rejected policy document");
        e
    })?;

    enforce_or_record(
        &state,
        &principal,
        Some(&policy),
        PolicyAccess::Write,
        Some(&definition),
    )?;

    let stored = state.policies.save(policy);
    tracing::info!(
        policy = %stored.name,
        user = %principal.username(),
        "Policy saved"
    );

    let definition = PolicyDefinition {
        policy_id: stored.id.clone(),
        ..definition
    };
    Ok((StatusCode::CREATED, Json(definition)))
}

#[utoipa::path(
    delete,
    path = "/v1/policies/{id}",
    tag = "policies",
    params(("id" = String, Path, description = "Policy id")),
    responses(
        (status = 204, description = "Policy deleted"),
        (status = 403, description = "Policy not accessible to the current user", body = crate::documentation::ErrorResponse),
        (status = 404, description = "Unknown policy id", body = crate::documentation::ErrorResponse)
    ),
    security(("federated_identity" = []))
)]
/// Delete a policy
pub async fn delete_policy(
    State(state): State<Arc<AppState>>,
    CurrentPrincipal(principal): CurrentPrincipal,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let policy = state
        .policies
        .get(&id)
        .ok_or_else(|| AppError::PolicyNotFound { id: id.clone() })?;
    let definition = state.parser.parse(&policy).ok();
    enforce_or_record(
        &state,
        &principal,
        Some(&policy),
        PolicyAccess::Write,
        definition.as_ref(),
    )?;

    state.policies.delete(&id);
    tracing::info!(policy = %policy.name, user = %principal.username(), "Policy deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/v1/violations",
    tag = "violations",
    responses(
        (status = 200, description = "All recorded policy violations", body = Vec<PolicyViolation>),
        (status = 401, description = "No federated identity on the request", body = crate::documentation::ErrorResponse)
    ),
    security(("federated_identity" = []))
)]
/// List recorded policy violations
pub async fn list_violations(
    State(state): State<Arc<AppState>>,
    CurrentPrincipal(principal): CurrentPrincipal,
) -> Result<Json<Vec<PolicyViolation>>, AppError> {
    enforce_or_record(&state, &principal, None, PolicyAccess::Violations, None)?;
    Ok(Json(state.violations.all()))
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = crate::documentation::HealthCheckResponse)
    )
)]
/// Health check endpoint
pub async fn health_check() -> Json<crate::documentation::HealthCheckResponse> {
    Json(crate::documentation::HealthCheckResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

#[utoipa::path(
    get,
    path = "/metrics",
    tag = "metrics",
    responses(
        (status = 200, description = "Prometheus metrics", content_type = "text/plain"),
        (status = 500, description = "Failed to gather metrics")
    )
)]
/// Metrics endpoint
pub async fn get_metrics() -> impl axum::response::IntoResponse {
    pdp_metrics_handler().await
}

/// Runs the enforcement decision against the targets the definition names.
///
/// The enforcer takes a single target service provider per call; a
/// definition naming several is checked per provider, short-circuiting on
/// the first mismatch.
fn decide(
    state: &AppState,
    principal: &FederatedPrincipal,
    policy: Option<&Policy>,
    access: PolicyAccess,
    definition: Option<&PolicyDefinition>,
) -> Result<(), AccessError> {
    let service_provider_ids = definition
        .map(|d| d.service_provider_ids.as_slice())
        .unwrap_or_default();
    let identity_provider_ids = definition
        .map(|d| d.identity_provider_ids.clone())
        .unwrap_or_default();

    if service_provider_ids.is_empty() {
        return state
            .enforcer
            .action_allowed(principal, policy, access, None, &identity_provider_ids);
    }
    for service_provider_id in service_provider_ids {
        state.enforcer.action_allowed(
            principal,
            policy,
            access,
            Some(service_provider_id.as_str()),
            &identity_provider_ids,
        )?;
    }
    Ok(())
}

/// Decides, and on denial appends a violation record carrying the error kind
/// as its reason code before surfacing the denial.
fn enforce_or_record(
    state: &AppState,
    principal: &FederatedPrincipal,
    policy: Option<&Policy>,
    access: PolicyAccess,
    definition: Option<&PolicyDefinition>,
) -> Result<(), AppError> {
    match decide(state, principal, policy, access, definition) {
        Ok(()) => {
            PdpMetricsHelper::record_decision("allow", access.as_str());
            Ok(())
        }
        Err(denial) => {
            PdpMetricsHelper::record_decision("deny", access.as_str());
            PdpMetricsHelper::record_denial(denial.kind());
            PdpMetricsHelper::record_violation(access.as_str());

            state.violations.append(PolicyViolation {
                policy_id: policy.and_then(|p| p.id.clone()),
                policy_name: policy.map(|p| p.name.clone()).unwrap_or_default(),
                access,
                reason: denial.kind().to_string(),
                principal: principal.username().to_string(),
                created_at: Utc::now(),
            });

            tracing::warn!(
                user = %principal.username(),
                access = %access.as_str(),
                reason = %denial,
                "Policy action denied"
            );
            Err(denial.into())
        }
    }
}
