//! Connection profiles stored as `connection.<name>.json` files.

use super::ConfigService;
use crate::error::{DbscopeError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

const PROFILE_PREFIX: &str = "connection.";
const PROFILE_SUFFIX: &str = ".json";

/// Supported database drivers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Driver {
    #[default]
    #[serde(alias = "pg", alias = "postgresql")]
    Postgres,
}

impl Driver {
    pub fn default_port(&self) -> u16 {
        match self {
            Self::Postgres => 5432,
        }
    }
}

/// Options for opening one database connection. Every field is optional;
/// missing ones fall back to the driver's defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionProfile {
    pub driver: Driver,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
}

impl ConnectionProfile {
    pub fn file_name(name: &str) -> String {
        format!("{PROFILE_PREFIX}{name}{PROFILE_SUFFIX}")
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| DbscopeError::config(format!("invalid connection profile: {e}")))
    }

    /// Fills unset fields from the libpq `PG*` variables in `config`. The port
    /// falls back to the driver default.
    pub fn with_defaults(mut self, config: &ConfigService) -> Self {
        let lookup = |key: &str| config.get(key).filter(|value| !value.is_empty());
        let set = |field: Option<String>| field.filter(|value| !value.is_empty());

        self.host = set(self.host).or_else(|| lookup("PGHOST"));
        self.port = self
            .port
            .or_else(|| lookup("PGPORT").and_then(|port| port.parse().ok()))
            .or(Some(self.driver.default_port()));
        self.username = set(self.username).or_else(|| lookup("PGUSER"));
        self.password = set(self.password).or_else(|| lookup("PGPASSWORD"));
        self.database = set(self.database).or_else(|| lookup("PGDATABASE"));
        self
    }

    /// Reads profile `name` from `dir`.
    pub fn load(dir: &Path, name: &str) -> Result<Self> {
        if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
            return Err(DbscopeError::config(format!("invalid connection name '{name}'")));
        }

        let path = dir.join(Self::file_name(name));
        let json = std::fs::read_to_string(&path).map_err(|e| {
            DbscopeError::config(format!("cannot read connection profile '{name}': {e}"))
        })?;
        tracing::debug!("Loaded connection profile from {}", path.display());
        Self::from_json(&json)
    }

    /// Names of every profile in `dir`, sorted.
    pub fn list_names(dir: &Path) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            let name = file_name
                .strip_prefix(PROFILE_PREFIX)
                .and_then(|rest| rest.strip_suffix(PROFILE_SUFFIX));
            if let Some(name) = name.filter(|name| !name.is_empty()) {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}
