// Dev dependencies used by other test targets (acknowledged to prevent
// clippy warnings)
use futures as _;
use reqwest as _;
use tempfile as _;

use std::path::Path;
use std::sync::Arc;

use pdp_service::definition::PolicyDefinitionParser;
use pdp_service::ingestion::{DirectoryPolicyLoader, PrePolicyLoader};
use pdp_service::registry::{FileServiceRegistry, ServiceRegistry};
use pdp_service::store::{MemoryPolicyStore, PolicyStore};

#[test]
fn shipped_registry_exports_load() {
    let registry = FileServiceRegistry::from_files(
        Path::new("data/service-registry/saml20-idp.json"),
        Path::new("data/service-registry/saml20-sp.json"),
    )
    .unwrap();

    assert_eq!(registry.identity_providers().len(), 3);
    assert_eq!(registry.service_providers().len(), 3);
    assert!(registry.owns_entity("MOCK", "http://mock-sp"));
    assert!(!registry.owns_entity("MOCK", "http://other-sp"));
}

#[test]
fn shipped_policy_documents_pass_validation() {
    let policies: Arc<dyn PolicyStore> = Arc::new(MemoryPolicyStore::new());
    let loader = DirectoryPolicyLoader {
        base_dir: "data/policies".into(),
        policies: policies.clone(),
        parser: PolicyDefinitionParser::default(),
    };

    assert_eq!(loader.load().unwrap(), 2);

    let stepup = policies
        .get("urn:federation:pdp:policy:stepup-loa")
        .expect("step-up fixture stored under its derived id");
    let definition = PolicyDefinitionParser::default().parse(&stepup).unwrap();
    assert_eq!(definition.loas.len(), 2);
    assert_eq!(definition.loas[0].level, 2);
    assert_eq!(definition.loas[1].level, 3);
    assert_eq!(
        definition.service_provider_ids,
        vec!["http://mock-sp", "http://mock-sp2"]
    );
}
