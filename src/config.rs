use std::path::PathBuf;
use std::time::Duration;

use tracing::trace;

use crate::time::GRAPH_UPDATE_TIME_GAP;

/// Storage backend configuration
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// No persistence: live history and version tracking only, no graph
    /// history, records or peaks
    #[serde(rename = "none")]
    None,

    /// SQLite database (default for most deployments)
    Sqlite {
        /// Path to the SQLite database file
        #[serde(default = "default_sqlite_path")]
        path: PathBuf,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Sqlite {
            path: default_sqlite_path(),
        }
    }
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("./pings.db")
}

/// Protocol family of a tracked server, fixed at registration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolFamily {
    /// Connection oriented: TCP server list ping with protocol version
    /// negotiation and an optional favicon
    Java,

    /// Connectionless: RakNet unconnected ping, no version negotiation
    Bedrock,
}

impl ProtocolFamily {
    /// Default port used when the server entry does not configure one
    pub fn default_port(&self) -> u16 {
        match self {
            ProtocolFamily::Java => 25565,
            ProtocolFamily::Bedrock => 19132,
        }
    }
}

/// One entry of the Java protocol version probe table
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ProtocolVersion {
    pub name: String,
    pub protocol_id: i32,
}

/// Built-in probe table, ascending by release order. Overridable via
/// `java_versions` in the config file.
pub fn default_java_versions() -> Vec<ProtocolVersion> {
    [
        ("1.8.9", 47),
        ("1.12.2", 340),
        ("1.16.5", 754),
        ("1.18.2", 758),
        ("1.19.4", 762),
        ("1.20.4", 765),
        ("1.21.1", 767),
    ]
    .into_iter()
    .map(|(name, protocol_id)| ProtocolVersion {
        name: name.to_string(),
        protocol_id,
    })
    .collect()
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Rates {
    /// Milliseconds between ping cycles
    #[serde(default = "default_ping_interval")]
    pub ping_interval_millis: u64,

    /// Connect timeout budget per server per cycle, in milliseconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_millis: u64,
}

impl Default for Rates {
    fn default() -> Self {
        Rates {
            ping_interval_millis: default_ping_interval(),
            connect_timeout_millis: default_connect_timeout(),
        }
    }
}

fn default_ping_interval() -> u64 {
    3_000
}

fn default_connect_timeout() -> u64 {
    2_500
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct SiteConfig {
    #[serde(default = "default_site_host")]
    pub host: String,

    #[serde(default = "default_site_port")]
    pub port: u16,
}

impl Default for SiteConfig {
    fn default() -> Self {
        SiteConfig {
            host: default_site_host(),
            port: default_site_port(),
        }
    }
}

fn default_site_host() -> String {
    String::from("0.0.0.0")
}

fn default_site_port() -> u16 {
    8080
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub servers: Vec<ServerConfig>,

    #[serde(default)]
    pub rates: Rates,

    #[serde(default)]
    pub site: SiteConfig,

    /// Rolling window covered by the per-cycle live history
    #[serde(default = "default_server_graph_duration")]
    pub server_graph_duration_millis: u64,

    /// Rolling window covered by the minute-cadence graph history
    #[serde(default = "default_graph_duration")]
    pub graph_duration_millis: u64,

    /// Label shown to viewers for the graph window, e.g. "24h"
    pub graph_duration_label: Option<String>,

    /// How long to skip SRV lookups for a host after a miss. 0 disables the
    /// cooldown and retries the lookup every cycle.
    #[serde(default = "default_skip_srv_cooldown")]
    pub skip_srv_cooldown_millis: u64,

    /// Log each failed ping at error level
    #[serde(default)]
    pub log_failed_pings: bool,

    #[serde(default)]
    pub storage: StorageConfig,

    /// Java protocol versions to probe, round-robin one per cycle
    #[serde(default = "default_java_versions")]
    pub java_versions: Vec<ProtocolVersion>,
}

fn default_server_graph_duration() -> u64 {
    3 * 60 * 1_000
}

fn default_graph_duration() -> u64 {
    24 * 60 * 60 * 1_000
}

fn default_skip_srv_cooldown() -> u64 {
    60 * 60 * 1_000
}

impl Config {
    pub fn persistence_enabled(&self) -> bool {
        !matches!(self.storage, StorageConfig::None)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.rates.ping_interval_millis)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.rates.connect_timeout_millis)
    }

    /// Live history capacity: one slot per cycle across the configured window
    pub fn max_live_history_len(&self) -> usize {
        self.server_graph_duration_millis
            .div_ceil(self.rates.ping_interval_millis.max(1)) as usize
    }

    /// Graph history capacity: one slot per minute-gap across the window
    pub fn max_graph_history_len(&self) -> usize {
        self.graph_duration_millis.div_ceil(GRAPH_UPDATE_TIME_GAP as u64) as usize
    }

    pub fn graph_duration_label(&self) -> String {
        self.graph_duration_label
            .clone()
            .unwrap_or_else(|| format!("{}h", self.graph_duration_millis / (60 * 60 * 1_000)))
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct ServerConfig {
    pub name: String,
    pub host: String,
    pub port: Option<u16>,
    pub family: ProtocolFamily,

    /// Hard-coded favicon override; when set, favicons reported by the
    /// server are never applied
    pub favicon: Option<String>,

    /// Chart color; derived from the name when unset
    pub color: Option<String>,
}

impl ServerConfig {
    pub fn port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.family.default_port())
    }
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content = std::fs::read_to_string(path)?;
    serde_json::from_str(&file_content)
        .map_err(|_| anyhow::anyhow!("Invalid configuration file provided!"))
        .inspect(|config: &Config| trace!("loaded config: {config:?}"))
}
