use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Enforcement failures. Each kind names the offending entity so callers can
/// build a remediation message and a violation record from it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    #[error("Service provider {entity_id} is not owned by the institution of the current user")]
    MismatchServiceProvider { entity_id: String },

    #[error("Identity provider {entity_id} is not owned by the institution of the current user")]
    MismatchIdentityProviders { entity_id: String },

    #[error("Policy is anchored to identity provider {authority} which the current user neither owns nor authenticated through")]
    OriginatingIdentityProviderMismatch { authority: String },
}

impl AccessError {
    /// Stable reason code recorded on policy violations and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MismatchServiceProvider { .. } => "mismatch_service_provider",
            Self::MismatchIdentityProviders { .. } => "mismatch_identity_providers",
            Self::OriginatingIdentityProviderMismatch { .. } => {
                "originating_identity_provider_mismatch"
            }
        }
    }
}

/// Structural validation failures of a policy document. A failing document is
/// rejected whole; it is never persisted or evaluated partially.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Policy document of '{name}' is malformed: {reason}")]
    MalformedDocument { name: String, reason: String },

    #[error("Policy '{name}' does not contain a deny rule carrying advice")]
    MissingDenyAdvice { name: String },

    #[error("Advice on rule '{rule_id}' of policy '{name}' lacks the user-facing deny notice")]
    MissingDenyNotice { name: String, rule_id: String },

    #[error("Rule '{rule_id}' of policy '{name}' matches any service provider")]
    UnboundedTarget { name: String, rule_id: String },

    #[error("Assignment '{attribute_id}' on rule '{rule_id}' of policy '{name}' does not resolve to a level of assurance")]
    UnresolvedAssignment {
        name: String,
        rule_id: String,
        attribute_id: String,
    },
}

impl ParseError {
    /// Stable sub-reason code for metrics and logs.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::MalformedDocument { .. } => "malformed_document",
            Self::MissingDenyAdvice { .. } => "missing_deny_advice",
            Self::MissingDenyNotice { .. } => "missing_notice",
            Self::UnboundedTarget { .. } => "unbounded_target",
            Self::UnresolvedAssignment { .. } => "unresolved_assignment",
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Policy not found: {id}")]
    PolicyNotFound { id: String },

    #[error("No federated principal on this request: {reason}")]
    Unauthenticated { reason: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON processing error")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    #[error("Internal server error: {context}")]
    Internal { context: String },
}

impl AppError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn internal(context: impl Into<String>) -> Self {
        Self::Internal {
            context: context.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Access(_) => StatusCode::FORBIDDEN,

            AppError::Parse(_) | AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,

            AppError::PolicyNotFound { .. } => StatusCode::NOT_FOUND,

            AppError::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,

            AppError::Io { .. } | AppError::Json { .. } | AppError::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            AppError::Access(e) => e.kind(),
            AppError::Parse(_) => "parse_error",
            AppError::PolicyNotFound { .. } => "policy_not_found",
            AppError::Unauthenticated { .. } => "unauthenticated",
            AppError::InvalidInput(_) => "invalid_input",
            AppError::Io { .. } => "io_error",
            AppError::Json { .. } => "json_error",
            AppError::Internal { .. } => "internal_error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_type = self.error_type();
        let error_message = self.to_string();

        let body = Json(json!({
            "error": {
                "type": error_type,
                "message": error_message,
                "status": status.as_u16(),
            }
        }));

        (status, body).into_response()
    }
}
