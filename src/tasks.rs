//! Periodic maintenance jobs.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;

use crate::definition::PolicyDefinitionParser;
use crate::metrics::PdpMetricsHelper;
use crate::registry::ServiceRegistry;
use crate::store::{PolicyStore, ViolationStore};

const DAILY: Duration = Duration::from_secs(24 * 60 * 60);

/// Deletes violation records past the retention period.
///
/// The owner flag is a cooperative, cluster-wide agreement: exactly one node
/// is configured as owner and performs the deletion; every other node's task
/// is a no-op.
pub fn spawn_violation_retention_cleaner(
    violations: Arc<dyn ViolationStore>,
    retention_days: u32,
    cron_job_owner: bool,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if !cron_job_owner {
            tracing::info!("Violation retention cleanup left to the owning node");
            return;
        }
        let mut interval = tokio::time::interval(DAILY);
        loop {
            interval.tick().await;
            let cutoff = Utc::now() - chrono::Duration::days(i64::from(retention_days));
            let deleted = violations.delete_older_than(cutoff);
            PdpMetricsHelper::record_background_task("violation_retention", "success");
            tracing::info!(deleted, retention_days, "Violation retention cleanup finished");
        }
    })
}

/// Notification sink for maintenance alerts. Delivery transport is
/// deployment wiring; the default implementation logs.
pub trait MailBox: Send + Sync {
    fn missing_service_providers(&self, policy_name: &str, missing: &[String]);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailBox;

impl MailBox for LogMailBox {
    fn missing_service_providers(&self, policy_name: &str, missing: &[String]) {
        tracing::warn!(
            policy = %policy_name,
            missing = ?missing,
            "Policy references service providers unknown to the registry"
        );
    }
}

/// Periodically reports policies whose referenced service providers no
/// longer resolve in the registry.
pub fn spawn_missing_service_provider_validator(
    policies: Arc<dyn PolicyStore>,
    registry: Arc<dyn ServiceRegistry>,
    parser: PolicyDefinitionParser,
    mailbox: Arc<dyn MailBox>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(DAILY);
        loop {
            interval.tick().await;
            let flagged = validate_service_providers(
                policies.as_ref(),
                registry.as_ref(),
                &parser,
                mailbox.as_ref(),
            );
            PdpMetricsHelper::record_background_task("missing_sp_validation", "success");
            tracing::info!(flagged, "Missing service provider validation finished");
        }
    })
}

/// Reports every policy with unresolvable service-provider references and
/// returns how many policies were flagged.
pub fn validate_service_providers(
    policies: &dyn PolicyStore,
    registry: &dyn ServiceRegistry,
    parser: &PolicyDefinitionParser,
    mailbox: &dyn MailBox,
) -> usize {
    let mut flagged = 0;
    for policy in policies.all() {
        let Ok(definition) = parser.parse(&policy) else {
            continue;
        };
        let missing: Vec<String> = definition
            .service_provider_ids
            .iter()
            .filter(|sp| !registry.service_provider_exists(sp))
            .cloned()
            .collect();
        if !missing.is_empty() {
            mailbox.missing_service_providers(&policy.name, &missing);
            flagged += 1;
        }
    }
    flagged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FederationEntity, Policy, PolicyViolation};
    use crate::registry::FileServiceRegistry;
    use crate::store::{MemoryPolicyStore, MemoryViolationStore};
    use crate::xacml::DENY_NOTICE_ATTRIBUTE;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingMailBox {
        reports: Mutex<Vec<(String, Vec<String>)>>,
    }

    impl MailBox for RecordingMailBox {
        fn missing_service_providers(&self, policy_name: &str, missing: &[String]) {
            self.reports
                .lock()
                .unwrap()
                .push((policy_name.to_string(), missing.to_vec()));
        }
    }

    fn policy_targeting(name: &str, service_provider: &str) -> Policy {
        let document = serde_json::json!({
            "policyId": format!("urn:federation:pdp:policy:{name}"),
            "rules": [{
                "ruleId": "deny",
                "effect": "Deny",
                "target": {"serviceProviders": [service_provider]},
                "advice": [{"id": "notice", "attributes": [
                    {"id": DENY_NOTICE_ATTRIBUTE, "value": "Geen toegang"}
                ]}]
            }]
        });
        Policy {
            id: Some(name.to_string()),
            name: name.to_string(),
            policy_document: document.to_string(),
            active: true,
            authenticating_authority: "http://mock-idp".to_string(),
            created_by: "uid".to_string(),
            created_by_display_name: "John Doe".to_string(),
            policy_type: None,
            no_target_sp: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn reports_only_unresolvable_references() {
        let policies = MemoryPolicyStore::new();
        policies.save(policy_targeting("resolvable", "http://mock-sp"));
        policies.save(policy_targeting("dangling", "http://gone-sp"));

        let registry = FileServiceRegistry::from_entities(
            vec![FederationEntity::new("http://mock-idp", Some("MOCK"))],
            vec![FederationEntity::new("http://mock-sp", Some("MOCK"))],
        );
        let mailbox = RecordingMailBox::default();

        let flagged = validate_service_providers(
            &policies,
            &registry,
            &PolicyDefinitionParser::default(),
            &mailbox,
        );

        assert_eq!(flagged, 1);
        let reports = mailbox.reports.lock().unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].0, "dangling");
        assert_eq!(reports[0].1, vec!["http://gone-sp".to_string()]);
    }

    #[tokio::test]
    async fn non_owner_cleaner_is_a_noop() {
        let violations: Arc<dyn ViolationStore> = Arc::new(MemoryViolationStore::new());
        violations.append(PolicyViolation {
            policy_id: None,
            policy_name: "p".to_string(),
            access: crate::models::PolicyAccess::Write,
            reason: "mismatch_service_provider".to_string(),
            principal: "uid".to_string(),
            created_at: Utc::now() - chrono::Duration::days(365),
        });

        // The task of a non-owning node finishes immediately without touching
        // the store.
        spawn_violation_retention_cleaner(violations.clone(), 30, false)
            .await
            .unwrap();
        assert_eq!(violations.all().len(), 1);
    }
}
