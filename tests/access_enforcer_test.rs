// Dev dependencies used by other test targets (acknowledged to prevent
// clippy warnings)
use futures as _;
use reqwest as _;
use tempfile as _;

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use pdp_service::access::PolicyAccessEnforcer;
use pdp_service::errors::AccessError;
use pdp_service::models::{FederatedPrincipal, FederationEntity, Policy, PolicyAccess};
use pdp_service::registry::{FileServiceRegistry, ServiceRegistry};

const AUTHENTICATING_AUTHORITY: &str = "http://mock-idp";
const INSTITUTION: &str = "MOCK";
const IDENTITY_PROVIDER_IDS: [&str; 2] = [AUTHENTICATING_AUTHORITY, "http://mock-idp2"];
const SERVICE_PROVIDER_IDS: [&str; 2] = ["http://mock-sp", "http://mock-sp2"];
const NOT_OWNED_IDP: &str = "http://not-owned-idp";
const NOT_OWNED_SP: &str = "http://not-owned-sp";

fn entities(entity_ids: &[&str]) -> HashSet<FederationEntity> {
    entity_ids
        .iter()
        .map(|id| FederationEntity::new(*id, Some(INSTITUTION)))
        .collect()
}

fn principal(
    enforcement_required: bool,
    idp_entity_ids: &[&str],
    sp_entity_ids: &[&str],
) -> FederatedPrincipal {
    FederatedPrincipal::new(
        "uid",
        "John Doe",
        AUTHENTICATING_AUTHORITY,
        Some(INSTITUTION.to_string()),
        entities(idp_entity_ids),
        entities(sp_entity_ids),
        enforcement_required,
    )
}

fn registry() -> Arc<FileServiceRegistry> {
    Arc::new(FileServiceRegistry::from_entities(
        IDENTITY_PROVIDER_IDS
            .iter()
            .map(|id| FederationEntity::new(*id, Some(INSTITUTION)))
            .collect(),
        SERVICE_PROVIDER_IDS
            .iter()
            .map(|id| FederationEntity::new(*id, Some(INSTITUTION)))
            .collect(),
    ))
}

fn policy() -> Policy {
    policy_anchored_at(AUTHENTICATING_AUTHORITY)
}

fn policy_anchored_at(authority: &str) -> Policy {
    Policy {
        id: Some("p1".to_string()),
        name: "pdpPolicyName".to_string(),
        policy_document: "{}".to_string(),
        active: true,
        authenticating_authority: authority.to_string(),
        created_by: "uid".to_string(),
        created_by_display_name: "John Doe".to_string(),
        policy_type: None,
        no_target_sp: false,
        created_at: Utc::now(),
    }
}

fn idps(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

#[test]
fn action_allowed_happy_flow_no_idps() {
    let subject = PolicyAccessEnforcer::new(registry());
    let principal = principal(true, &IDENTITY_PROVIDER_IDS, &SERVICE_PROVIDER_IDS);
    subject
        .action_allowed(
            &principal,
            Some(&policy()),
            PolicyAccess::Write,
            Some(SERVICE_PROVIDER_IDS[0]),
            &[],
        )
        .unwrap();
}

#[test]
fn action_allowed_happy_flow_owned_idps() {
    let subject = PolicyAccessEnforcer::new(registry());
    let principal = principal(true, &IDENTITY_PROVIDER_IDS, &SERVICE_PROVIDER_IDS);
    subject
        .action_allowed(
            &principal,
            Some(&policy()),
            PolicyAccess::Write,
            Some(SERVICE_PROVIDER_IDS[0]),
            &idps(&IDENTITY_PROVIDER_IDS),
        )
        .unwrap();
}

#[test]
fn action_not_allowed_sp_does_not_match() {
    // The registry is empty here so the owned-set miss has no fallback.
    let subject = PolicyAccessEnforcer::new(Arc::new(FileServiceRegistry::from_entities(
        vec![],
        vec![],
    )));
    let principal = principal(true, &IDENTITY_PROVIDER_IDS, &[NOT_OWNED_SP]);
    let err = subject
        .action_allowed(
            &principal,
            Some(&policy()),
            PolicyAccess::Write,
            Some(SERVICE_PROVIDER_IDS[0]),
            &[],
        )
        .unwrap_err();
    assert_eq!(
        err,
        AccessError::MismatchServiceProvider {
            entity_id: SERVICE_PROVIDER_IDS[0].to_string()
        }
    );
}

#[test]
fn action_not_allowed_idps_do_not_match() {
    let subject = PolicyAccessEnforcer::new(registry());
    let principal = principal(true, &IDENTITY_PROVIDER_IDS, &SERVICE_PROVIDER_IDS);
    let err = subject
        .action_allowed(
            &principal,
            Some(&policy()),
            PolicyAccess::Write,
            Some(SERVICE_PROVIDER_IDS[0]),
            &idps(&[NOT_OWNED_IDP]),
        )
        .unwrap_err();
    assert_eq!(
        err,
        AccessError::MismatchIdentityProviders {
            entity_id: NOT_OWNED_IDP.to_string()
        }
    );
}

#[test]
fn first_unowned_idp_is_named() {
    let subject = PolicyAccessEnforcer::new(registry());
    let principal = principal(true, &IDENTITY_PROVIDER_IDS, &SERVICE_PROVIDER_IDS);
    let err = subject
        .action_allowed(
            &principal,
            None,
            PolicyAccess::Write,
            None,
            &idps(&[IDENTITY_PROVIDER_IDS[0], NOT_OWNED_IDP, "http://second-unowned"]),
        )
        .unwrap_err();
    assert_eq!(
        err,
        AccessError::MismatchIdentityProviders {
            entity_id: NOT_OWNED_IDP.to_string()
        }
    );
}

#[test]
fn action_not_allowed_wrong_authenticating_authority() {
    let subject = PolicyAccessEnforcer::new(registry());
    let principal = principal(true, &IDENTITY_PROVIDER_IDS, &SERVICE_PROVIDER_IDS);
    let err = subject
        .action_allowed(
            &principal,
            Some(&policy_anchored_at(NOT_OWNED_IDP)),
            PolicyAccess::Write,
            Some(SERVICE_PROVIDER_IDS[0]),
            &[],
        )
        .unwrap_err();
    assert_eq!(
        err,
        AccessError::OriginatingIdentityProviderMismatch {
            authority: NOT_OWNED_IDP.to_string()
        }
    );
}

#[test]
fn anchoring_check_applies_even_without_targets() {
    let subject = PolicyAccessEnforcer::new(registry());
    let principal = principal(true, &IDENTITY_PROVIDER_IDS, &SERVICE_PROVIDER_IDS);
    let err = subject
        .action_allowed(
            &principal,
            Some(&policy_anchored_at(NOT_OWNED_IDP)),
            PolicyAccess::Write,
            None,
            &[],
        )
        .unwrap_err();
    assert_eq!(
        err,
        AccessError::OriginatingIdentityProviderMismatch {
            authority: NOT_OWNED_IDP.to_string()
        }
    );
}

#[test]
fn policy_anchored_at_owned_idp_other_than_authority_is_allowed() {
    let subject = PolicyAccessEnforcer::new(registry());
    // The anchoring IdP is not the authenticating authority, but it is in
    // the principal's owned IdP set.
    let principal = principal(
        true,
        &[IDENTITY_PROVIDER_IDS[0], NOT_OWNED_IDP],
        &SERVICE_PROVIDER_IDS,
    );
    subject
        .action_allowed(
            &principal,
            Some(&policy_anchored_at(NOT_OWNED_IDP)),
            PolicyAccess::Write,
            Some(SERVICE_PROVIDER_IDS[0]),
            &[],
        )
        .unwrap();
}

#[test]
fn no_enforcement_for_user_allows_everything() {
    let subject = PolicyAccessEnforcer::new(Arc::new(FileServiceRegistry::from_entities(
        vec![],
        vec![],
    )));
    let principal = principal(false, &[], &[]);
    subject
        .action_allowed(
            &principal,
            Some(&policy_anchored_at(NOT_OWNED_IDP)),
            PolicyAccess::Write,
            Some(NOT_OWNED_SP),
            &idps(&[NOT_OWNED_IDP]),
        )
        .unwrap();
}

#[test]
fn violations_access_requires_no_ownership() {
    let subject = PolicyAccessEnforcer::new(Arc::new(FileServiceRegistry::from_entities(
        vec![],
        vec![],
    )));
    let principal = principal(true, &[], &[]);
    subject
        .action_allowed(&principal, None, PolicyAccess::Violations, None, &[])
        .unwrap();
    subject
        .action_allowed(
            &principal,
            Some(&policy_anchored_at(NOT_OWNED_IDP)),
            PolicyAccess::Violations,
            Some(NOT_OWNED_SP),
            &idps(&[NOT_OWNED_IDP]),
        )
        .unwrap();
}

#[test]
fn allow_all_registry_override_grants_unowned_entities() {
    let registry = registry();
    registry.set_allow_all(true);
    let subject = PolicyAccessEnforcer::new(registry);
    let principal = principal(true, &IDENTITY_PROVIDER_IDS, &SERVICE_PROVIDER_IDS);
    subject
        .action_allowed(
            &principal,
            Some(&policy()),
            PolicyAccess::Read,
            Some(NOT_OWNED_SP),
            &[],
        )
        .unwrap();
}

#[test]
fn registry_fallback_covers_entities_missing_from_the_session() {
    // The principal's session carries no owned service providers, but the
    // registry knows the institution owns the target.
    let subject = PolicyAccessEnforcer::new(registry());
    let principal = principal(true, &IDENTITY_PROVIDER_IDS, &[]);
    subject
        .action_allowed(
            &principal,
            Some(&policy()),
            PolicyAccess::Write,
            Some(SERVICE_PROVIDER_IDS[0]),
            &[],
        )
        .unwrap();
}

#[test]
fn empty_idp_list_always_passes() {
    let subject = PolicyAccessEnforcer::new(registry());
    let principal = principal(true, &IDENTITY_PROVIDER_IDS, &SERVICE_PROVIDER_IDS);
    subject
        .action_allowed(&principal, None, PolicyAccess::Write, None, &[])
        .unwrap();
}

#[test]
fn principal_accessors_expose_the_acting_identity() {
    let principal = principal(true, &IDENTITY_PROVIDER_IDS, &SERVICE_PROVIDER_IDS);
    assert_eq!(principal.authenticating_authority(), AUTHENTICATING_AUTHORITY);
    assert_eq!(principal.username(), "uid");
    assert_eq!(principal.user_display_name(), "John Doe");
}
