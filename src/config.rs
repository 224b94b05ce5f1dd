use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::AppError;

/// Prefix of every environment variable read by [`AppConfig::load`].
pub const ENV_PREFIX: &str = "PAGESYNC";

/// Config file picked up from the working directory when present.
const DEFAULT_CONFIG_FILE: &str = "pagesync";

/// Server configuration.
///
/// Sources, later ones winning: built-in defaults, `pagesync.toml` (or the
/// file given on the command line), `PAGESYNC_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub bind_addr: String,
    pub mongodb_uri: String,
    pub mongodb_database: String,
    /// Directory holding the page mirrors (`PAGESYNC_CONTENT_DIR`). When
    /// unset, `content/seo` is searched from the working directory upwards.
    #[serde(default)]
    pub content_dir: Option<PathBuf>,
    /// Bearer token granted the admin role.
    pub service_token: String,
    /// Minimum delay between two reconciliation sweeps.
    pub sync_ttl_secs: u64,
    /// Additional tokens (config file only).
    #[serde(default)]
    pub grants: Vec<TokenGrant>,
}

/// A bearer token or session value mapped to a user and its roles.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub token: String,
    pub user: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl AppConfig {
    /// Load from defaults, the config file and the process environment.
    pub fn load(file: Option<&Path>) -> Result<Self, AppError> {
        Self::build(file, Environment::with_prefix(ENV_PREFIX))
    }

    fn build(file: Option<&Path>, env: Environment) -> Result<Self, AppError> {
        let file_source = match file {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let settings = Config::builder()
            .set_default("bind_addr", "127.0.0.1:3000")
            .and_then(|b| b.set_default("mongodb_uri", "mongodb://localhost:27017"))
            .and_then(|b| b.set_default("mongodb_database", "pagesync"))
            .and_then(|b| b.set_default("service_token", "dev-token"))
            .and_then(|b| b.set_default("sync_ttl_secs", 300))
            .map_err(|e| AppError::Internal(format!("Invalid config defaults: {e}")))?
            .add_source(file_source)
            .add_source(env.try_parsing(true))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to load configuration: {e}")))?;

        let mut config: AppConfig = settings
            .try_deserialize()
            .map_err(|e| AppError::Internal(format!("Invalid configuration: {e}")))?;

        config.content_dir = config
            .content_dir
            .filter(|dir| !dir.as_os_str().is_empty());

        Ok(config)
    }

    pub fn sync_ttl(&self) -> chrono::Duration {
        // Capped at ten years.
        chrono::Duration::seconds(self.sync_ttl_secs.min(315_360_000) as i64)
    }
}
