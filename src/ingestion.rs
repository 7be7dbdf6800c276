//! Pre-policy ingestion strategies selected by deployment configuration.
//!
//! Each strategy populates the policy store once at process start, before
//! the listener accepts requests, and is idempotent: reloading the same
//! source yields the same records under the same ids.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;

use crate::config::{AppConfig, IngestionStrategy};
use crate::definition::PolicyDefinitionParser;
use crate::models::Policy;
use crate::registry::ServiceRegistry;
use crate::store::PolicyStore;
use crate::xacml::{DENY_NOTICE_ATTRIBUTE, LOA_ATTRIBUTE};
use crate::AppState;

/// Anchor for pre-loaded policies; matches the registry fixtures.
pub const LOADER_AUTHENTICATING_AUTHORITY: &str = "http://mock-idp";

/// Populates the policy store at process start.
pub trait PrePolicyLoader: Send + Sync {
    fn load(&self) -> anyhow::Result<usize>;
}

/// Builds the loader the configured strategy names.
pub fn loader_for(config: &AppConfig, state: &AppState) -> Box<dyn PrePolicyLoader> {
    match config.ingestion {
        IngestionStrategy::Directory => Box::new(DirectoryPolicyLoader {
            base_dir: config.policy_base_dir.clone(),
            policies: state.policies.clone(),
            parser: state.parser.clone(),
        }),
        IngestionStrategy::Performance(count) => Box::new(PerformancePolicyLoader {
            count,
            registry: state.registry.clone(),
            policies: state.policies.clone(),
        }),
        IngestionStrategy::Noop => Box::new(NoopPolicyLoader),
    }
}

/// Loads every `*.json` document under the policy base directory.
///
/// Documents failing structural validation are skipped with a warning and
/// never stored.
pub struct DirectoryPolicyLoader {
    pub base_dir: PathBuf,
    pub policies: Arc<dyn PolicyStore>,
    pub parser: PolicyDefinitionParser,
}

impl PrePolicyLoader for DirectoryPolicyLoader {
    fn load(&self) -> anyhow::Result<usize> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(&self.base_dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        let mut loaded = 0;
        for path in paths {
            let document = std::fs::read_to_string(&path)?;
            let name = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| "policy".to_string());

            let policy = Policy {
                id: Some(format!("urn:federation:pdp:policy:{name}")),
                name,
                policy_document: document,
                active: true,
                authenticating_authority: LOADER_AUTHENTICATING_AUTHORITY.to_string(),
                created_by: "system".to_string(),
                created_by_display_name: "Policy loader".to_string(),
                policy_type: None,
                no_target_sp: false,
                created_at: Utc::now(),
            };

            match self.parser.parse(&policy) {
                Ok(_) => {
                    self.policies.save(policy);
                    loaded += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        file = %path.display(),
                        error = %e,
                        "Rejected policy document during ingestion"
                    );
                }
            }
        }
        Ok(loaded)
    }
}

/// Synthesizes policies over the registered entities for load testing.
pub struct PerformancePolicyLoader {
    pub count: usize,
    pub registry: Arc<dyn ServiceRegistry>,
    pub policies: Arc<dyn PolicyStore>,
}

impl PrePolicyLoader for PerformancePolicyLoader {
    fn load(&self) -> anyhow::Result<usize> {
        let service_providers = self.registry.service_providers();
        anyhow::ensure!(
            !service_providers.is_empty(),
            "performance ingestion needs at least one registered service provider"
        );
        let identity_providers = self.registry.identity_providers();

        for i in 0..self.count {
            let service_provider = &service_providers[i % service_providers.len()];
            let identity_provider = (!identity_providers.is_empty())
                .then(|| &identity_providers[i % identity_providers.len()]);

            let policy = Policy {
                id: Some(format!("urn:federation:pdp:policy:perf:{i}")),
                name: format!("Performance policy {i}"),
                policy_document: synthetic_document(
                    i,
                    &service_provider.entity_id,
                    identity_provider.map(|e| e.entity_id.as_str()),
                ),
                active: true,
                authenticating_authority: identity_provider
                    .map(|e| e.entity_id.clone())
                    .unwrap_or_else(|| LOADER_AUTHENTICATING_AUTHORITY.to_string()),
                created_by: "system".to_string(),
                created_by_display_name: "Performance loader".to_string(),
                policy_type: None,
                no_target_sp: false,
                created_at: Utc::now(),
            };
            self.policies.save(policy);
        }
        Ok(self.count)
    }
}

fn synthetic_document(seq: usize, service_provider: &str, identity_provider: Option<&str>) -> String {
    let identity_providers: Vec<&str> = identity_provider.into_iter().collect();
    serde_json::json!({
        "policyId": format!("urn:federation:pdp:policy:perf:{seq}"),
        "description": "Synthesized for load testing",
        "rules": [
            {
                "ruleId": format!("deny-{seq}"),
                "effect": "Deny",
                "target": {
                    "serviceProviders": [service_provider],
                    "identityProviders": identity_providers,
                },
                "advice": [
                    {
                        "id": "deny-notice",
                        "attributes": [
                            {"id": DENY_NOTICE_ATTRIBUTE, "value": "Geen toegang tot deze dienst"}
                        ]
                    }
                ],
                "assignments": [
                    {"attributeId": LOA_ATTRIBUTE, "value": format!("http://pdp.federation.example/assurance/loa{}", seq % 3 + 1)}
                ]
            }
        ]
    })
    .to_string()
}

/// Strategy for deployments where policies arrive through the API only.
pub struct NoopPolicyLoader;

impl PrePolicyLoader for NoopPolicyLoader {
    fn load(&self) -> anyhow::Result<usize> {
        Ok(0)
    }
}
