//! Configuration system for the Peerline CLI.

use peerline_core::discovery::{RendezvousClient, RendezvousEndpoint};
use peerline_core::proto::MacAddr;
use peerline_core::{Contact, NetworkInfo};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Peerline configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// This node's own identity
    pub node: NodeConfig,
    /// Rendezvous directory settings
    pub rendezvous: RendezvousConfig,
    /// Discovery settings
    pub discovery: DiscoveryConfig,
    /// Transfer settings
    pub transfer: TransferConfig,
    /// Logging settings
    pub logging: LoggingConfig,
    /// Known contacts
    #[serde(default)]
    pub contacts: Vec<Contact>,
}

/// This node's own identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Display name other peers see
    #[serde(default = "default_node_name")]
    pub name: String,
    /// This node's hardware address; required for rendezvous sign-up
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mac: Option<MacAddr>,
    /// Inbox port this node listens on
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Rendezvous directory settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RendezvousConfig {
    /// Directory server address; discovery skips the rendezvous branch
    /// when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<IpAddr>,
    /// Directory server port
    #[serde(default = "default_rendezvous_port")]
    pub port: u16,
    /// Shared password credential
    #[serde(default)]
    pub password: String,
    /// Register as discoverable by hardware address only
    #[serde(default)]
    pub get_only_by_mac: bool,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Discovery settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Per-probe timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub probe_timeout_secs: u64,
}

/// Transfer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Username for the peer file service
    #[serde(default = "default_transfer_user")]
    pub username: String,
    /// Password for the peer file service
    #[serde(default = "default_transfer_password")]
    pub password: String,
    /// Control-channel timeout in seconds
    #[serde(default = "default_transfer_timeout_secs")]
    pub timeout_secs: u64,
    /// Where downloads land by default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_dir: Option<PathBuf>,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default values

fn default_node_name() -> String {
    "peerline".to_string()
}

fn default_port() -> u16 {
    42000
}

fn default_rendezvous_port() -> u16 {
    42001
}

fn default_timeout_secs() -> u64 {
    3
}

fn default_transfer_user() -> String {
    "peerline".to_string()
}

fn default_transfer_password() -> String {
    "peerpassword".to_string()
}

fn default_transfer_timeout_secs() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: default_node_name(),
            mac: None,
            port: default_port(),
        }
    }
}

impl Default for RendezvousConfig {
    fn default() -> Self {
        Self {
            address: None,
            port: default_rendezvous_port(),
            password: String::new(),
            get_only_by_mac: false,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            probe_timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            username: default_transfer_user(),
            password: default_transfer_password(),
            timeout_secs: default_transfer_timeout_secs(),
            download_dir: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, contents)?;
        Ok(())
    }

    /// Get default config path
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join("peerline/config.toml")
    }

    /// Load config from default path, or create default if it doesn't exist
    ///
    /// # Errors
    ///
    /// Returns an error if reading or creating the config fails.
    pub fn load_or_default() -> anyhow::Result<Self> {
        let path = Self::default_path();

        if path.exists() {
            Self::load(&path)
        } else {
            let config = Self::default();
            config.save(&path)?;
            Ok(config)
        }
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns an error if configuration is invalid.
    pub fn validate(&self) -> anyhow::Result<()> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!(
                "Invalid log level: {}. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            );
        }

        if self.discovery.probe_timeout_secs == 0 {
            anyhow::bail!("Probe timeout must be at least 1 second");
        }

        if self.node.port == 0 {
            anyhow::bail!("Node port must not be 0");
        }

        if self.rendezvous.address.is_some() && self.rendezvous.password.is_empty() {
            anyhow::bail!("A rendezvous server is configured but no password is set");
        }

        for contact in &self.contacts {
            if contact.name.is_empty() {
                anyhow::bail!("Contact with mac {} has an empty name", contact.mac);
            }
            if contact.port == 0 {
                anyhow::bail!("Contact '{}' has port 0", contact.name);
            }
        }

        let mut names: Vec<_> = self.contacts.iter().map(|c| c.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        if names.len() != self.contacts.len() {
            anyhow::bail!("Contact names must be unique");
        }

        Ok(())
    }

    /// Per-probe timeout as a `Duration`
    #[must_use]
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.discovery.probe_timeout_secs)
    }

    /// The rendezvous client this configuration describes, when a server
    /// is configured
    #[must_use]
    pub fn rendezvous_client(&self) -> Option<RendezvousClient> {
        self.rendezvous.address.map(|addr| {
            RendezvousClient::new(
                RendezvousEndpoint {
                    addr,
                    port: self.rendezvous.port,
                    password: self.rendezvous.password.clone(),
                },
                Duration::from_secs(self.rendezvous.timeout_secs),
            )
        })
    }

    /// This node's own identity, when the hardware address is configured
    #[must_use]
    pub fn network_info(&self) -> Option<NetworkInfo> {
        self.node.mac.map(|mac| NetworkInfo {
            name: self.node.name.clone(),
            mac,
            port: self.node.port,
        })
    }

    /// Where downloads land: the configured directory, the platform
    /// download directory, or the current directory
    #[must_use]
    pub fn download_dir(&self) -> PathBuf {
        self.transfer
            .download_dir
            .clone()
            .or_else(dirs::download_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}
