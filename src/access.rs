//! Access enforcement for actions on policies.

use std::collections::HashSet;
use std::sync::Arc;

use crate::errors::AccessError;
use crate::models::{FederatedPrincipal, FederationEntity, Policy, PolicyAccess};
use crate::registry::ServiceRegistry;

/// Decides whether the acting federated principal may perform an action on a
/// policy, based on the federation entities the principal's institution owns.
///
/// Stateless and synchronous; every invocation is independent, sharing only
/// the read-only registry.
#[derive(Clone)]
pub struct PolicyAccessEnforcer {
    registry: Arc<dyn ServiceRegistry>,
}

impl PolicyAccessEnforcer {
    pub fn new(registry: Arc<dyn ServiceRegistry>) -> Self {
        Self { registry }
    }

    /// Checks run in a fixed order and short-circuit on the first applicable
    /// rule; the error names the entity the caller should report.
    pub fn action_allowed(
        &self,
        principal: &FederatedPrincipal,
        policy: Option<&Policy>,
        access: PolicyAccess,
        service_provider_id: Option<&str>,
        identity_provider_ids: &[String],
    ) -> Result<(), AccessError> {
        // Viewing violation records only requires authentication.
        if access == PolicyAccess::Violations {
            return Ok(());
        }

        // Enforcement is attached to the principal, not the policy.
        if !principal.policy_enforcement_required() {
            return Ok(());
        }

        if let Some(entity_id) = service_provider_id {
            if !self.owns(principal, principal.sp_entities(), entity_id) {
                return Err(AccessError::MismatchServiceProvider {
                    entity_id: entity_id.to_string(),
                });
            }
        }

        for entity_id in identity_provider_ids {
            if !self.owns(principal, principal.idp_entities(), entity_id) {
                return Err(AccessError::MismatchIdentityProviders {
                    entity_id: entity_id.clone(),
                });
            }
        }

        if let Some(policy) = policy {
            let authority = policy.authenticating_authority.as_str();
            let anchored_to_owned_idp = principal
                .idp_entities()
                .iter()
                .any(|e| e.entity_id == authority)
                || principal.authenticating_authority() == authority;
            if !anchored_to_owned_idp {
                return Err(AccessError::OriginatingIdentityProviderMismatch {
                    authority: authority.to_string(),
                });
            }
        }

        Ok(())
    }

    // Owned-set membership first; the registry is only consulted when local
    // ownership is inconclusive. Registry failures read as not owned.
    fn owns(
        &self,
        principal: &FederatedPrincipal,
        owned: &HashSet<FederationEntity>,
        entity_id: &str,
    ) -> bool {
        if owned.iter().any(|e| e.entity_id == entity_id) {
            return true;
        }
        principal
            .institution_id()
            .is_some_and(|institution| self.registry.owns_entity(institution, entity_id))
    }
}
