//! Entity-ownership lookup against the federation registry export.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::errors::AppError;
use crate::models::FederationEntity;

/// Answers which federation entities an institution owns.
///
/// The contract is synchronous and infallible at the signature level;
/// implementations resolve internal lookup failures to `false` so that
/// enforcement fails closed, never open.
pub trait ServiceRegistry: Send + Sync {
    fn identity_providers(&self) -> Vec<FederationEntity>;

    fn service_providers(&self) -> Vec<FederationEntity>;

    /// Whether the institution owns the entity.
    fn owns_entity(&self, institution_id: &str, entity_id: &str) -> bool;

    /// Test and administrative bypass: report every entity as owned.
    fn set_allow_all(&self, allow: bool);

    fn allow_all(&self) -> bool;

    fn identity_provider(&self, entity_id: &str) -> Option<FederationEntity> {
        self.identity_providers()
            .into_iter()
            .find(|e| e.entity_id == entity_id)
    }

    fn owned_identity_providers(&self, institution_id: &str) -> Vec<FederationEntity> {
        self.identity_providers()
            .into_iter()
            .filter(|e| e.institution_id.as_deref() == Some(institution_id))
            .collect()
    }

    fn owned_service_providers(&self, institution_id: &str) -> Vec<FederationEntity> {
        self.service_providers()
            .into_iter()
            .filter(|e| e.institution_id.as_deref() == Some(institution_id))
            .collect()
    }

    fn service_provider_exists(&self, entity_id: &str) -> bool {
        self.service_providers()
            .iter()
            .any(|e| e.entity_id == entity_id)
    }
}

/// Registry backed by the JSON entity exports on disk.
#[derive(Debug)]
pub struct FileServiceRegistry {
    idp_entities: Vec<FederationEntity>,
    sp_entities: Vec<FederationEntity>,
    allow_all: AtomicBool,
}

impl FileServiceRegistry {
    pub fn from_files(idp_path: &Path, sp_path: &Path) -> Result<Self, AppError> {
        Ok(Self::from_entities(
            load_entities(idp_path)?,
            load_entities(sp_path)?,
        ))
    }

    pub fn from_entities(
        idp_entities: Vec<FederationEntity>,
        sp_entities: Vec<FederationEntity>,
    ) -> Self {
        Self {
            idp_entities,
            sp_entities,
            allow_all: AtomicBool::new(false),
        }
    }
}

fn load_entities(path: &Path) -> Result<Vec<FederationEntity>, AppError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| AppError::io(format!("Failed to read registry export {}", path.display()), e))?;
    Ok(serde_json::from_str(&raw)?)
}

impl ServiceRegistry for FileServiceRegistry {
    fn identity_providers(&self) -> Vec<FederationEntity> {
        self.idp_entities.clone()
    }

    fn service_providers(&self) -> Vec<FederationEntity> {
        self.sp_entities.clone()
    }

    fn owns_entity(&self, institution_id: &str, entity_id: &str) -> bool {
        if self.allow_all() {
            return true;
        }
        self.idp_entities
            .iter()
            .chain(&self.sp_entities)
            .filter(|e| e.entity_id == entity_id)
            .any(|e| e.institution_id.as_deref() == Some(institution_id))
    }

    fn set_allow_all(&self, allow: bool) {
        self.allow_all.store(allow, Ordering::Relaxed);
    }

    fn allow_all(&self) -> bool {
        self.allow_all.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> FileServiceRegistry {
        FileServiceRegistry::from_entities(
            vec![
                FederationEntity::new("http://mock-idp", Some("MOCK")),
                FederationEntity::new("http://other-idp", Some("OTHER")),
            ],
            vec![FederationEntity::new("http://mock-sp", Some("MOCK"))],
        )
    }

    #[test]
    fn ownership_matches_institution() {
        let registry = registry();
        assert!(registry.owns_entity("MOCK", "http://mock-idp"));
        assert!(registry.owns_entity("MOCK", "http://mock-sp"));
        assert!(!registry.owns_entity("MOCK", "http://other-idp"));
        assert!(!registry.owns_entity("MOCK", "http://unknown-sp"));
    }

    #[test]
    fn allow_all_overrides_ownership() {
        let registry = registry();
        registry.set_allow_all(true);
        assert!(registry.owns_entity("MOCK", "http://other-idp"));
        assert!(registry.owns_entity("ANY", "http://unknown-sp"));

        registry.set_allow_all(false);
        assert!(!registry.owns_entity("ANY", "http://unknown-sp"));
    }

    #[test]
    fn institution_lookups() {
        let registry = registry();
        assert_eq!(
            registry
                .identity_provider("http://mock-idp")
                .and_then(|e| e.institution_id),
            Some("MOCK".to_string())
        );
        assert_eq!(registry.owned_identity_providers("MOCK").len(), 1);
        assert_eq!(registry.owned_service_providers("OTHER").len(), 0);
        assert!(registry.service_provider_exists("http://mock-sp"));
        assert!(!registry.service_provider_exists("http://gone-sp"));
    }
}
