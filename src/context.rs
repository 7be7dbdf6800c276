//! Per-request federated principal context.
//!
//! The external authentication layer forwards the authenticated identity in
//! request headers; this module materializes it into a [`FederatedPrincipal`]
//! once per request and hands it to handlers through an extractor. The
//! principal is never shared or cached across requests.

use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::errors::AppError;
use crate::models::FederatedPrincipal;
use crate::registry::ServiceRegistry;
use crate::AppState;

pub const IDP_ENTITY_ID_HEADER: &str = "x-idp-entity-id";
pub const NAME_ID_HEADER: &str = "x-unspecified-name-id";
pub const DISPLAY_NAME_HEADER: &str = "x-display-name";

/// Builds the federated principal for this request and stores it as a
/// request extension. Requests without a forwarded identity never reach a
/// handler.
pub async fn federated_principal_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let principal = match principal_from_headers(req.headers(), state.registry.as_ref()) {
        Ok(principal) => principal,
        Err(e) => return e.into_response(),
    };
    req.extensions_mut().insert(Arc::new(principal));
    next.run(req).await
}

/// Resolves the owned entity sets through the registry: the principal owns
/// every entity registered under the institution of the identity provider
/// that authenticated them.
pub(crate) fn principal_from_headers(
    headers: &HeaderMap,
    registry: &dyn ServiceRegistry,
) -> Result<FederatedPrincipal, AppError> {
    let authenticating_authority = required_header(headers, IDP_ENTITY_ID_HEADER)?;
    let identifier = required_header(headers, NAME_ID_HEADER)?;
    let display_name = required_header(headers, DISPLAY_NAME_HEADER)?;

    let institution_id = registry
        .identity_provider(&authenticating_authority)
        .and_then(|e| e.institution_id);

    let (idp_entities, sp_entities) = match institution_id.as_deref() {
        Some(institution) => (
            registry
                .owned_identity_providers(institution)
                .into_iter()
                .collect(),
            registry
                .owned_service_providers(institution)
                .into_iter()
                .collect(),
        ),
        // The authenticating IdP is unknown to the registry; the principal
        // is authenticated but owns nothing locally.
        None => (HashSet::new(), HashSet::new()),
    };

    Ok(FederatedPrincipal::new(
        identifier,
        display_name,
        authenticating_authority,
        institution_id,
        idp_entities,
        sp_entities,
        true,
    ))
}

fn required_header(headers: &HeaderMap, name: &str) -> Result<String, AppError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::Unauthenticated {
            reason: format!("missing {name} header"),
        })
}

/// Extractor handing handlers the principal established for this request.
pub struct CurrentPrincipal(pub Arc<FederatedPrincipal>);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CurrentPrincipal {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Arc<FederatedPrincipal>>()
            .cloned()
            .map(CurrentPrincipal)
            .ok_or_else(|| AppError::Unauthenticated {
                reason: "no federated principal established for this request".to_string(),
            })
    }
}
