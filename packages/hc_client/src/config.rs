use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use hc_session::{DEFAULT_QUEUE_CAPACITY, SessionOptions, TransportOptions};

// =============================================================================
// Client config (figment-deserialized from defaults / config.toml / env vars)
// =============================================================================
//
//   config.toml:     [server]
//                    host = "10.0.0.5"
//
//   env var:         HC_SERVER__HOST=10.0.0.5   (double underscore = nesting)
//
//   (single underscore stays within field names: HC_TRANSPORT__ACCEPT_INVALID_CERTS)

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerFileConfig,
    #[serde(default)]
    pub transport: TransportFileConfig,
    #[serde(default)]
    pub events: EventsFileConfig,
}

/// Connection prefills (lives under `[server]` in config.toml).
/// Anything left unset is asked for at startup.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ServerFileConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl ServerFileConfig {
    /// Fill unset fields from `other`. Fields already set win.
    pub fn or(self, other: ServerFileConfig) -> Self {
        Self {
            name: self.name.or(other.name),
            host: self.host.or(other.host),
            port: self.port.or(other.port),
            username: self.username.or(other.username),
            password: self.password.or(other.password),
        }
    }
}

/// Transport tunables (lives under `[transport]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransportFileConfig {
    /// https/wss when true, http/ws otherwise
    #[serde(default = "default_true")]
    pub secure: bool,
    /// Teamservers run on self-signed certificates (default: true).
    #[serde(default = "default_true")]
    pub accept_invalid_certs: bool,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for TransportFileConfig {
    fn default() -> Self {
        Self {
            secure: true,
            accept_invalid_certs: true,
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

/// Event stream tunables (lives under `[events]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventsFileConfig {
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for EventsFileConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_connect_timeout_secs() -> u64 {
    10
}
fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

impl FileConfig {
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            transport: TransportOptions {
                secure: self.transport.secure,
                accept_invalid_certs: self.transport.accept_invalid_certs,
                connect_timeout: Duration::from_secs(self.transport.connect_timeout_secs),
            },
            queue_capacity: self.events.queue_capacity,
        }
    }
}

/// Build a figment that layers: defaults → config.toml → HC_* env vars.
///
///   `HC_SERVER__PORT=40056`  →  `server.port = 40056`
///   `HC_TRANSPORT__SECURE=false`  →  `transport.secure = false`
pub fn load_config(data_dir: &Path) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    Figment::from(Serialized::defaults(FileConfig::default()))
        .merge(Toml::file(data_dir.join("config.toml")))
        .merge(Env::prefixed("HC_").split("__"))
}

// =============================================================================
// Directory layout (derived from --data-dir)
// =============================================================================

#[derive(Clone, Debug)]
pub struct HcConfig {
    pub data_dir: PathBuf,
}

impl HcConfig {
    pub fn new(custom_dir: Option<PathBuf>) -> Result<Self> {
        let data_dir = match custom_dir {
            Some(dir) => dir,
            None => dirs::home_dir()
                .context("Could not find home directory")?
                .join(".hc"),
        };

        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {:?}", data_dir))?;

        Ok(Self { data_dir })
    }

    pub fn config_toml_path(&self) -> PathBuf {
        self.data_dir.join("config.toml")
    }

    pub fn load(&self) -> Result<FileConfig> {
        load_config(&self.data_dir)
            .extract()
            .with_context(|| format!("Failed to parse {:?}", self.config_toml_path()))
    }
}
