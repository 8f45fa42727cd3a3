use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Chain JSON-RPC endpoint configuration.
///
/// Every request made against this endpoint is admitted through the shared
/// rate governor, so `max_requests_per_second` must match the provider quota.
#[derive(Debug, Deserialize, Clone)]
pub struct RpcSettings {
    pub url: String,
    /// Staking contract whose logs are queried with `eth_getLogs`
    pub contract_address: String,
    #[serde(default = "default_max_requests_per_second")]
    pub max_requests_per_second: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_max_requests_per_second() -> u32 {
    80
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// Block range and cadence settings for the sync cycle.
#[derive(Debug, Deserialize, Clone)]
pub struct SyncSettings {
    /// Window size for catch-up fetches
    #[serde(default = "default_max_blocks_per_fetch")]
    pub max_blocks_per_fetch: u64,
    /// Window size used only for the first-ever (cold) sync
    #[serde(default = "default_bulk_blocks_per_fetch")]
    pub bulk_blocks_per_fetch: u64,
    #[serde(default = "default_sync_interval_secs")]
    pub interval_secs: u64,
    /// Upper bound on upserts in flight while a window is being persisted
    #[serde(default = "default_upsert_concurrency")]
    pub upsert_concurrency: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            max_blocks_per_fetch: default_max_blocks_per_fetch(),
            bulk_blocks_per_fetch: default_bulk_blocks_per_fetch(),
            interval_secs: default_sync_interval_secs(),
            upsert_concurrency: default_upsert_concurrency(),
        }
    }
}

fn default_max_blocks_per_fetch() -> u64 {
    5_000
}

fn default_bulk_blocks_per_fetch() -> u64 {
    50_000
}

fn default_sync_interval_secs() -> u64 {
    60
}

fn default_upsert_concurrency() -> usize {
    16
}

/// PostgreSQL database connection configuration.
///
/// Used for storing:
/// - Decoded staking events
/// - The sync checkpoint
/// - Operator aggregates and roster metadata
#[derive(Debug, Deserialize, Clone)]
pub struct PostgresSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

fn default_pool_size() -> usize {
    16
}

/// Operator roster endpoint configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct RosterSettings {
    pub url: String,
    #[serde(default = "default_roster_page_size")]
    pub page_size: usize,
    #[serde(default = "default_roster_max_pages")]
    pub max_pages: usize,
    #[serde(default = "default_roster_interval_secs")]
    pub interval_secs: u64,
}

fn default_roster_page_size() -> usize {
    100
}

fn default_roster_max_pages() -> usize {
    100
}

fn default_roster_interval_secs() -> u64 {
    1_800
}

/// Root application configuration.
///
/// Loaded from `config.yaml` (or any format the `config` crate understands)
/// at startup, with `INDEXER__SECTION__KEY` environment overrides.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub rpc: RpcSettings,
    #[serde(default)]
    pub sync: SyncSettings,
    /// Without a postgres section the indexer keeps everything in memory
    #[serde(default)]
    pub postgres: Option<PostgresSettings>,
    #[serde(default)]
    pub roster: Option<RosterSettings>,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name("config"))
            .add_source(Environment::with_prefix("INDEXER").separator("__"))
            .build()?;

        let settings: Settings = s.try_deserialize()?;
        settings.validate()?;

        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.rpc.max_requests_per_second == 0 {
            return Err(ConfigError::Message(
                "rpc.max_requests_per_second must be greater than zero".to_string(),
            ));
        }
        if self.sync.max_blocks_per_fetch == 0 || self.sync.bulk_blocks_per_fetch == 0 {
            return Err(ConfigError::Message(
                "sync window sizes must be greater than zero".to_string(),
            ));
        }
        if self.sync.upsert_concurrency == 0 {
            return Err(ConfigError::Message(
                "sync.upsert_concurrency must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn load(yaml: &str) -> Result<Settings, ConfigError> {
        let settings: Settings = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    #[test]
    fn test_defaults_applied() {
        let settings = load(
            r#"
rpc:
  url: "http://localhost:8545"
  contract_address: "0xd8e3a935706c08b5e6f8e05d63d3e67ce2ae330c"
"#,
        )
        .unwrap();

        assert_eq!(settings.rpc.max_requests_per_second, 80);
        assert_eq!(settings.sync.max_blocks_per_fetch, 5_000);
        assert_eq!(settings.sync.bulk_blocks_per_fetch, 50_000);
        assert!(settings.postgres.is_none());
        assert!(settings.roster.is_none());
    }

    #[test]
    fn test_zero_window_rejected() {
        let result = load(
            r#"
rpc:
  url: "http://localhost:8545"
  contract_address: "0xd8e3a935706c08b5e6f8e05d63d3e67ce2ae330c"
sync:
  max_blocks_per_fetch: 0
"#,
        );

        assert!(result.is_err());
    }
}
