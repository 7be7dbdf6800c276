//! Structural types of the policy language and the reader boundary that
//! produces them.
//!
//! The definition parser never touches raw document text itself; it consumes
//! the [`RuleSet`] a [`PolicyDocumentReader`] hands it, so the validation
//! rules are testable against synthetic rule sets.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Advice attribute id marking the localized notice a deny decision must
/// display to the end user.
pub const DENY_NOTICE_ATTRIBUTE: &str = "urn:federation:pdp:advice:deny-message:nl";

/// Assignment attribute id carrying a level-of-assurance step-up obligation.
pub const LOA_ATTRIBUTE: &str = "urn:federation:pdp:obligation:level-of-assurance";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Permit,
    Deny,
}

/// Entity references a rule applies to. An empty service-provider list means
/// the rule matches any service provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Target {
    pub service_providers: Vec<String>,
    pub identity_providers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdviceAttribute {
    pub id: String,
    pub value: String,
}

/// Non-blocking obligation/notice accompanying a decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Advice {
    pub id: String,
    #[serde(default)]
    pub attributes: Vec<AdviceAttribute>,
}

/// Binds an obligation value to a decision, e.g. a required level of
/// assurance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub attribute_id: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub rule_id: String,
    pub effect: Effect,
    #[serde(default)]
    pub target: Target,
    #[serde(default)]
    pub advice: Vec<Advice>,
    #[serde(default)]
    pub assignments: Vec<Assignment>,
}

/// Structured form of one policy document, rules in document order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSet {
    pub policy_id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("document is not a valid policy: {0}")]
    Invalid(String),
}

/// Low-level reader turning raw document text into a [`RuleSet`].
pub trait PolicyDocumentReader: Send + Sync {
    fn parse_document(&self, raw: &str) -> Result<RuleSet, DocumentError>;
}

/// Reader for the JSON rendering of the policy language.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonDocumentReader;

impl PolicyDocumentReader for JsonDocumentReader {
    fn parse_document(&self, raw: &str) -> Result<RuleSet, DocumentError> {
        serde_json::from_str(raw).map_err(|e| DocumentError::Invalid(e.to_string()))
    }
}
