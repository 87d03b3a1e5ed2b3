//! Per-session configuration.

use crate::{error::Result, Error};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Field holding the primary key when none is configured.
pub const DEFAULT_ID_FIELD: &str = "id";

fn default_id_field() -> String {
    DEFAULT_ID_FIELD.to_string()
}

/// Everything a [`SyncSession`](crate::SyncSession) needs to know about the
/// remote collection it mirrors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfig {
    /// Locator of the first page
    pub start_locator: String,
    /// Headers sent with every page request
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Name of the local collection, used in logs and snapshots
    pub entity_name: String,
    /// Record field holding the primary key
    #[serde(default = "default_id_field")]
    pub id_field: String,
}

impl SyncConfig {
    pub fn new(start_locator: impl Into<String>, entity_name: impl Into<String>) -> Self {
        Self {
            start_locator: start_locator.into(),
            headers: BTreeMap::new(),
            entity_name: entity_name.into(),
            id_field: default_id_field(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Send `Authorization: Bearer <token>` with every request.
    pub fn with_bearer_token(self, token: impl AsRef<str>) -> Self {
        let value = format!("Bearer {}", token.as_ref());
        self.with_header("Authorization", value)
    }

    pub fn with_id_field(mut self, id_field: impl Into<String>) -> Self {
        self.id_field = id_field.into();
        self
    }

    /// Check that the required fields are set.
    pub fn validate(&self) -> Result<()> {
        if self.start_locator.trim().is_empty() {
            return Err(Error::Config("start locator is empty".into()));
        }
        if self.entity_name.trim().is_empty() {
            return Err(Error::Config("entity name is empty".into()));
        }
        if self.id_field.is_empty() {
            return Err(Error::Config("identifier field is empty".into()));
        }
        Ok(())
    }
}
