use std::env;

use crate::core::{DbError, Result};
use crate::model::identity::DEFAULT_SNOWFLAKE_EPOCH;
use crate::model::naming::{ModelConfiguration, NameType};

pub const ENV_SNOWFLAKE_EPOCH: &str = "RUSTCRUD_SNOWFLAKE_EPOCH";
pub const ENV_SNOWFLAKE_WORKER: &str = "RUSTCRUD_SNOWFLAKE_WORKER";
pub const ENV_SNOWFLAKE_DATACENTER: &str = "RUSTCRUD_SNOWFLAKE_DATACENTER";
pub const ENV_TABLE_NAMING: &str = "RUSTCRUD_TABLE_NAMING";
pub const ENV_COLUMN_NAMING: &str = "RUSTCRUD_COLUMN_NAMING";

/// Process-level settings read once when registries are created.
#[derive(Debug, Clone)]
pub struct CrudConfig {
    /// Defaults merged into every model's own configuration
    pub model_config: ModelConfiguration,

    /// Epoch for snowflake identities that do not declare their own
    pub snowflake_epoch: i64,

    pub snowflake_worker_id: i64,

    pub snowflake_datacenter_id: i64,
}

impl Default for CrudConfig {
    fn default() -> Self {
        Self {
            model_config: ModelConfiguration::default(),
            snowflake_epoch: DEFAULT_SNOWFLAKE_EPOCH,
            snowflake_worker_id: 0,
            snowflake_datacenter_id: 0,
        }
    }
}

impl CrudConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `RUSTCRUD_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(epoch) = read_i64(ENV_SNOWFLAKE_EPOCH)? {
            config.snowflake_epoch = epoch;
        }
        if let Some(worker) = read_i64(ENV_SNOWFLAKE_WORKER)? {
            config.snowflake_worker_id = worker;
        }
        if let Some(datacenter) = read_i64(ENV_SNOWFLAKE_DATACENTER)? {
            config.snowflake_datacenter_id = datacenter;
        }
        if let Ok(raw) = env::var(ENV_TABLE_NAMING) {
            config.model_config.table_naming = NameType::parse(&raw)?;
        }
        if let Ok(raw) = env::var(ENV_COLUMN_NAMING) {
            config.model_config.column_naming = NameType::parse(&raw)?;
        }

        Ok(config)
    }

    /// Set the default datasource name
    pub fn datasource(mut self, name: &str) -> Self {
        self.model_config.datasource = Some(name.to_string());
        self
    }

    /// Set the default table naming strategy
    pub fn table_naming(mut self, naming: NameType) -> Self {
        self.model_config.table_naming = naming;
        self
    }

    /// Set the default column naming strategy
    pub fn column_naming(mut self, naming: NameType) -> Self {
        self.model_config.column_naming = naming;
        self
    }

    pub fn snowflake_epoch(mut self, epoch_millis: i64) -> Self {
        self.snowflake_epoch = epoch_millis;
        self
    }

    pub fn snowflake_node(mut self, datacenter_id: i64, worker_id: i64) -> Self {
        self.snowflake_datacenter_id = datacenter_id;
        self.snowflake_worker_id = worker_id;
        self
    }
}

fn read_i64(key: &str) -> Result<Option<i64>> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|e| DbError::configuration(format!("{}='{}': {}", key, raw, e))),
        Err(_) => Ok(None),
    }
}
