use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use bookshelf_actors::ActorConfig;

use crate::error::{ServerError, ServerResult};

/// Server configuration, loadable from TOML.
///
/// Missing keys fall back to [`ServerConfig::default`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Directory for JSON snapshots. `None` keeps everything in memory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    pub mailbox_capacity: usize,
    /// Seconds a record store may idle before it stops. 0 disables.
    pub idle_timeout_secs: u64,
    pub cors_max_age_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 8787)),
            data_dir: None,
            mailbox_capacity: 64,
            idle_timeout_secs: 300,
            cors_max_age_secs: 86_400,
        }
    }
}

impl ServerConfig {
    pub fn from_toml_str(raw: &str) -> ServerResult<Self> {
        toml::from_str(raw).map_err(|e| ServerError::Config(e.to_string()))
    }

    /// Read and parse a TOML config file.
    pub fn load(path: &Path) -> ServerResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ServerError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn to_toml_string(&self) -> ServerResult<String> {
        toml::to_string_pretty(self).map_err(|e| ServerError::Config(e.to_string()))
    }

    pub fn actor_config(&self) -> ActorConfig {
        ActorConfig {
            mailbox_capacity: self.mailbox_capacity,
            idle_timeout: (self.idle_timeout_secs > 0)
                .then(|| Duration::from_secs(self.idle_timeout_secs)),
        }
    }
}
