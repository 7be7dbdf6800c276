//! Data models and types for the policy decision point

use std::collections::HashSet;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One identity or service provider known to the federation.
///
/// Identity is the entity id; the institution and display metadata do not
/// participate in equality.
#[derive(Debug, Clone, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FederationEntity {
    /// Globally unique entity id, typically a URI
    pub entity_id: String,
    /// Id of the institution owning this entity
    #[serde(default)]
    pub institution_id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl FederationEntity {
    pub fn new(entity_id: impl Into<String>, institution_id: Option<&str>) -> Self {
        Self {
            entity_id: entity_id.into(),
            institution_id: institution_id.map(str::to_string),
            display_name: None,
        }
    }
}

impl PartialEq for FederationEntity {
    fn eq(&self, other: &Self) -> bool {
        self.entity_id == other.entity_id
    }
}

impl Hash for FederationEntity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.entity_id.hash(state);
    }
}

/// The authenticated actor on whose behalf a policy action is performed.
///
/// Built once per request by the context layer and never mutated afterward;
/// all fields are reachable through read accessors only.
#[derive(Debug, Clone)]
pub struct FederatedPrincipal {
    identifier: String,
    display_name: String,
    authenticating_authority: String,
    institution_id: Option<String>,
    idp_entities: HashSet<FederationEntity>,
    sp_entities: HashSet<FederationEntity>,
    policy_enforcement_required: bool,
}

impl FederatedPrincipal {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        identifier: impl Into<String>,
        display_name: impl Into<String>,
        authenticating_authority: impl Into<String>,
        institution_id: Option<String>,
        idp_entities: HashSet<FederationEntity>,
        sp_entities: HashSet<FederationEntity>,
        policy_enforcement_required: bool,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            display_name: display_name.into(),
            authenticating_authority: authenticating_authority.into(),
            institution_id,
            idp_entities,
            sp_entities,
            policy_enforcement_required,
        }
    }

    pub fn username(&self) -> &str {
        &self.identifier
    }

    pub fn user_display_name(&self) -> &str {
        &self.display_name
    }

    /// Entity id of the identity provider that authenticated this principal.
    pub fn authenticating_authority(&self) -> &str {
        &self.authenticating_authority
    }

    pub fn institution_id(&self) -> Option<&str> {
        self.institution_id.as_deref()
    }

    pub fn idp_entities(&self) -> &HashSet<FederationEntity> {
        &self.idp_entities
    }

    pub fn sp_entities(&self) -> &HashSet<FederationEntity> {
        &self.sp_entities
    }

    /// Whether entity-ownership enforcement applies to this principal.
    /// Administrators and other exempt principals skip every ownership check.
    pub fn policy_enforcement_required(&self) -> bool {
        self.policy_enforcement_required
    }
}

/// A named, access-controllable policy record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    pub id: Option<String>,
    pub name: String,
    /// Raw policy document text in the JSON rendering of the policy language
    pub policy_document: String,
    pub active: bool,
    /// Identity provider this policy is anchored to; set at creation and used
    /// as the anchor for ownership checks
    pub authenticating_authority: String,
    pub created_by: String,
    pub created_by_display_name: String,
    #[serde(default)]
    pub policy_type: Option<String>,
    /// Narrow exemption: the document may omit concrete service-provider
    /// targets without being rejected as unbounded
    #[serde(default)]
    pub no_target_sp: bool,
    pub created_at: DateTime<Utc>,
}

/// A level-of-assurance step-up constraint extracted from a policy rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LoA {
    /// Full assurance identifier as it appears in the document
    pub identifier: String,
    /// Numeric assurance level the identifier ranks at
    pub level: u32,
}

/// The validated, structured result of parsing a policy's raw document.
///
/// Derived only: it exists solely for documents that passed every structural
/// rule, and is regenerated whenever the raw document changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PolicyDefinition {
    pub policy_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub service_provider_ids: Vec<String>,
    pub identity_provider_ids: Vec<String>,
    /// Step-up constraints in document rule order, duplicates permitted
    pub loas: Vec<LoA>,
    pub active: bool,
    pub policy_type: Option<String>,
}

/// Access level requested for an action on a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyAccess {
    Read,
    Write,
    /// Viewing violation records; requires authentication only, not entity
    /// ownership
    Violations,
}

impl PolicyAccess {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "READ",
            Self::Write => "WRITE",
            Self::Violations => "VIOLATIONS",
        }
    }
}

/// One denied policy action, recorded by the HTTP layer when enforcement
/// fails. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PolicyViolation {
    pub policy_id: Option<String>,
    pub policy_name: String,
    pub access: PolicyAccess,
    /// Stable reason code taken from the enforcement error kind
    pub reason: String,
    pub principal: String,
    pub created_at: DateTime<Utc>,
}

/// Body of a policy create/update request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PolicySubmission {
    /// Omitted for new policies; set to update an existing one
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub policy_document: String,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub policy_type: Option<String>,
    #[serde(default)]
    pub no_target_sp: bool,
}

fn default_active() -> bool {
    true
}
