//! Configuration management for the server and the demo client.

use simplesync_engine::SyncConfig;
use std::env;
use std::path::PathBuf;

/// Default number of notes per page.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Largest page a client may request.
pub const MAX_PAGE_SIZE: usize = 1000;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Token required as `Authorization: Bearer <token>` on the notes API
    pub auth_token: Option<String>,
    /// Page size when the request does not set `limit`
    pub page_size: usize,
    /// Number of notes created at startup
    pub seed_notes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            auth_token: None,
            page_size: DEFAULT_PAGE_SIZE,
            seed_notes: 0,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Load configuration through `var`, which returns the value of a
    /// variable if it is set.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = var("HOST").unwrap_or_else(|| "0.0.0.0".to_string());

        let port = var("PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        let auth_token = var("AUTH_TOKEN").filter(|token| !token.is_empty());

        let page_size = match var("PAGE_SIZE") {
            Some(raw) => raw
                .parse::<usize>()
                .map_err(|_| ConfigError::InvalidPageSize)?
                .clamp(1, MAX_PAGE_SIZE),
            None => DEFAULT_PAGE_SIZE,
        };

        let seed_notes = match var("SEED_NOTES") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidSeedCount)?,
            None => 0,
        };

        Ok(Self {
            host,
            port,
            auth_token,
            page_size,
            seed_notes,
        })
    }
}

/// Configuration of the `notes-sync` demo client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Session configuration
    pub sync: SyncConfig,
    /// File backing the local store
    pub store_path: PathBuf,
}

impl ClientConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| env::var(key).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let start_url = var("SYNC_START_URL").ok_or(ConfigError::MissingStartUrl)?;
        let entity = var("SYNC_ENTITY").unwrap_or_else(|| "Note".to_string());

        let mut sync = SyncConfig::new(start_url, entity);
        if let Some(id_field) = var("SYNC_ID_FIELD") {
            sync = sync.with_id_field(id_field);
        }
        if let Some(token) = var("SYNC_BEARER_TOKEN").filter(|token| !token.is_empty()) {
            sync = sync.with_bearer_token(token);
        }
        sync.validate()
            .map_err(|e| ConfigError::InvalidSync(e.to_string()))?;

        let store_path = var("SYNC_STORE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("notes.json"));

        Ok(Self { sync, store_path })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid PORT value")]
    InvalidPort,

    #[error("Invalid PAGE_SIZE value")]
    InvalidPageSize,

    #[error("Invalid SEED_NOTES value")]
    InvalidSeedCount,

    #[error("SYNC_START_URL environment variable is required")]
    MissingStartUrl,

    #[error("Invalid sync configuration: {0}")]
    InvalidSync(String),
}
