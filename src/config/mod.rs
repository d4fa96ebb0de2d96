pub mod profile;

use clap::Parser;
use dashmap::DashMap;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

pub use profile::{ConnectionProfile, Driver};

pub const DEFAULT_PROFILE: &str = "default";

/// Server settings, read from the command line with environment fallbacks.
#[derive(Parser, Debug, Clone)]
#[command(name = "dbscope")]
#[command(version, about = "PostgreSQL administration API", long_about = None)]
pub struct ServerConfig {
    /// Address to bind
    #[arg(long, env = "DBSCOPE_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "DBSCOPE_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Route prefix for every controller
    #[arg(long, env = "DBSCOPE_PREFIX", default_value = "api")]
    pub prefix: String,

    /// Directory holding connection.<name>.json profiles
    #[arg(long, env = "DBSCOPE_CONFIG_DIR", default_value = ".")]
    pub config_dir: PathBuf,

    /// Maximum request body size in bytes
    #[arg(long, env = "DBSCOPE_BODY_LIMIT", default_value_t = crate::controller::registrar::DEFAULT_BODY_LIMIT)]
    pub body_limit: usize,

    /// Require this value in the x-api-key header
    #[arg(long, env = "DBSCOPE_API_KEY")]
    pub api_key: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            prefix: "api".to_string(),
            config_dir: PathBuf::from("."),
            body_limit: crate::controller::registrar::DEFAULT_BODY_LIMIT,
            api_key: None,
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> crate::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| crate::DbscopeError::config(format!("invalid bind address: {e}")))
    }

    /// The route prefix, or `None` when configured empty.
    pub fn route_prefix(&self) -> Option<&str> {
        let prefix = self.prefix.trim();
        (!prefix.is_empty()).then_some(prefix)
    }
}

/// Key/value view over the process environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigService {
    config: Arc<DashMap<String, String>>,
}

impl ConfigService {
    pub fn new() -> Self {
        Self::from_vars(env::vars())
    }

    pub fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Self {
        let service = Self::default();
        for (key, value) in vars {
            service.set(&key, &value);
        }
        service
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.config.get(key).map(|v| v.clone())
    }

    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    pub fn set(&self, key: &str, value: &str) {
        self.config.insert(key.to_string(), value.to_string());
    }
}
