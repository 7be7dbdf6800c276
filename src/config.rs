use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

/// Policy ingestion strategy, a closed set selected at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestionStrategy {
    /// Load every document under the policy base directory
    Directory,
    /// Synthesize the given number of policies for load testing
    Performance(usize),
    /// Leave the store empty; policies arrive through the API only
    Noop,
}

impl IngestionStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Directory => "directory",
            Self::Performance(_) => "performance",
            Self::Noop => "noop",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub policy_base_dir: PathBuf,
    pub idp_registry_path: PathBuf,
    pub sp_registry_path: PathBuf,
    pub ingestion: IngestionStrategy,
    pub violation_retention_days: u32,
    pub cron_job_owner: bool,
    pub registry_allow_all: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        let port: u16 = std::env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(8081);

        let host: IpAddr = std::env::var("HOST")
            .ok()
            .and_then(|s| {
                s.parse()
                    .map_err(|e| {
                        tracing::warn!("Invalid HOST value '{}': {}", s, e);
                        e
                    })
                    .ok()
            })
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

        let policy_base_dir =
            PathBuf::from(env_or("POLICY_BASE_DIR", "data/policies"));
        let idp_registry_path = PathBuf::from(env_or(
            "IDP_REGISTRY_PATH",
            "data/service-registry/saml20-idp.json",
        ));
        let sp_registry_path = PathBuf::from(env_or(
            "SP_REGISTRY_PATH",
            "data/service-registry/saml20-sp.json",
        ));

        let performance_policy_count: usize = std::env::var("PERFORMANCE_POLICY_COUNT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(100);
        let ingestion = match env_or("INGESTION_STRATEGY", "directory").as_str() {
            "directory" => IngestionStrategy::Directory,
            "performance" => IngestionStrategy::Performance(performance_policy_count),
            "noop" => IngestionStrategy::Noop,
            other => {
                tracing::warn!("Unknown INGESTION_STRATEGY '{}', using noop", other);
                IngestionStrategy::Noop
            }
        };

        let violation_retention_days: u32 = std::env::var("VIOLATION_RETENTION_DAYS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        let cron_job_owner = env_flag("CRON_JOB_OWNER");
        let registry_allow_all = env_flag("REGISTRY_ALLOW_ALL");

        tracing::info!(
            "Configuration loaded: {}:{}, ingestion={}, retention={}d, cron_owner={}",
            host,
            port,
            ingestion.name(),
            violation_retention_days,
            cron_job_owner
        );

        Self {
            bind_addr: SocketAddr::new(host, port),
            policy_base_dir,
            idp_registry_path,
            sp_registry_path,
            ingestion,
            violation_retention_days,
            cron_job_owner,
            registry_allow_all,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .map(|s| s == "true" || s == "1")
        .unwrap_or(false)
}
