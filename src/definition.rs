//! Turns a stored policy into a validated, structured definition.

use std::sync::Arc;

use crate::errors::ParseError;
use crate::models::{LoA, Policy, PolicyDefinition};
use crate::xacml::{
    Assignment, Effect, JsonDocumentReader, PolicyDocumentReader, Rule, DENY_NOTICE_ATTRIBUTE,
    LOA_ATTRIBUTE,
};

/// Validates policy documents and extracts their definitions.
///
/// Pure per call: no I/O and no shared mutable state, safe to share across
/// concurrent requests.
#[derive(Clone)]
pub struct PolicyDefinitionParser {
    reader: Arc<dyn PolicyDocumentReader>,
}

impl Default for PolicyDefinitionParser {
    fn default() -> Self {
        Self::new(Arc::new(JsonDocumentReader))
    }
}

impl PolicyDefinitionParser {
    pub fn new(reader: Arc<dyn PolicyDocumentReader>) -> Self {
        Self { reader }
    }

    /// Validates the policy's raw document and extracts its definition.
    ///
    /// The whole document is rejected on the first violating rule; a
    /// definition is never partially valid.
    pub fn parse(&self, policy: &Policy) -> Result<PolicyDefinition, ParseError> {
        let rule_set = self
            .reader
            .parse_document(&policy.policy_document)
            .map_err(|e| ParseError::MalformedDocument {
                name: policy.name.clone(),
                reason: e.to_string(),
            })?;

        // A policy without an explicit, advised deny path would fail open.
        if !rule_set
            .rules
            .iter()
            .any(|r| r.effect == Effect::Deny && !r.advice.is_empty())
        {
            return Err(ParseError::MissingDenyAdvice {
                name: policy.name.clone(),
            });
        }

        let mut service_provider_ids: Vec<String> = Vec::new();
        let mut identity_provider_ids: Vec<String> = Vec::new();
        let mut loas = Vec::new();

        for rule in &rule_set.rules {
            validate_advice(policy, rule)?;
            validate_target(policy, rule)?;

            for assignment in &rule.assignments {
                loas.push(resolve_loa(policy, rule, assignment)?);
            }

            for sp in &rule.target.service_providers {
                if !service_provider_ids.contains(sp) {
                    service_provider_ids.push(sp.clone());
                }
            }
            for idp in &rule.target.identity_providers {
                if !identity_provider_ids.contains(idp) {
                    identity_provider_ids.push(idp.clone());
                }
            }
        }

        Ok(PolicyDefinition {
            policy_id: policy.id.clone(),
            name: policy.name.clone(),
            description: rule_set.description,
            service_provider_ids,
            identity_provider_ids,
            loas,
            active: policy.active,
            policy_type: policy.policy_type.clone(),
        })
    }
}

/// Every advice element must carry the localized notice shown to the user on
/// deny.
fn validate_advice(policy: &Policy, rule: &Rule) -> Result<(), ParseError> {
    for advice in &rule.advice {
        if !advice
            .attributes
            .iter()
            .any(|a| a.id == DENY_NOTICE_ATTRIBUTE)
        {
            return Err(ParseError::MissingDenyNotice {
                name: policy.name.clone(),
                rule_id: rule.rule_id.clone(),
            });
        }
    }
    Ok(())
}

/// A rule matching any service provider defeats entity-scoped enforcement,
/// unless the policy carries the explicit no-target exemption.
fn validate_target(policy: &Policy, rule: &Rule) -> Result<(), ParseError> {
    if rule.target.service_providers.is_empty() && !policy.no_target_sp {
        return Err(ParseError::UnboundedTarget {
            name: policy.name.clone(),
            rule_id: rule.rule_id.clone(),
        });
    }
    Ok(())
}

fn resolve_loa(policy: &Policy, rule: &Rule, assignment: &Assignment) -> Result<LoA, ParseError> {
    let unresolved = || ParseError::UnresolvedAssignment {
        name: policy.name.clone(),
        rule_id: rule.rule_id.clone(),
        attribute_id: assignment.attribute_id.clone(),
    };

    if assignment.attribute_id != LOA_ATTRIBUTE {
        return Err(unresolved());
    }
    let level = loa_level(&assignment.value).ok_or_else(unresolved)?;
    Ok(LoA {
        identifier: assignment.value.clone(),
        level,
    })
}

/// Assurance identifiers rank by their trailing digits, e.g. `.../loa2` is
/// level 2.
fn loa_level(identifier: &str) -> Option<u32> {
    let start = identifier
        .rfind(|c: char| !c.is_ascii_digit())
        .map_or(0, |i| i + 1);
    identifier[start..].parse().ok()
}
