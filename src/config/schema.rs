//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration for the LBaaS service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct LbaasConfig {
    /// Generated HAProxy configuration settings.
    pub haproxy: HaproxyConfig,

    /// How HAProxy is told to reload.
    pub reload: ReloadConfig,

    /// Resource store settings.
    pub store: StoreConfig,

    /// Admin API settings.
    pub admin: AdminConfig,

    /// Background reconciliation settings.
    pub reconcile: ReconcileConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// HAProxy artifact configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HaproxyConfig {
    /// Path of the generated configuration file.
    pub config_path: PathBuf,

    /// Group HAProxy runs as (`group` directive).
    pub group: String,
}

impl Default for HaproxyConfig {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("/etc/haproxy/haproxy.cfg"),
            group: "nogroup".to_string(),
        }
    }
}

/// Reload mechanism selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReloadMechanism {
    /// Run `command` and treat exit status 0 as success.
    #[default]
    Command,
    /// Send `reload` on the HAProxy master CLI socket.
    MasterSocket,
    /// Only write the file.
    Disabled,
}

/// Reload configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReloadConfig {
    pub mechanism: ReloadMechanism,

    /// Argv for the `command` mechanism.
    pub command: Vec<String>,

    /// Master CLI socket for the `master_socket` mechanism.
    pub master_socket: PathBuf,

    /// Upper bound for one reload attempt in seconds.
    pub timeout_secs: u64,
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            mechanism: ReloadMechanism::Command,
            command: ["sudo", "service", "haproxy", "restart"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            master_socket: PathBuf::from("/var/run/haproxy-master.sock"),
            timeout_secs: 30,
        }
    }
}

/// Store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// JSON state file. `None` keeps everything in memory.
    pub path: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: Some(PathBuf::from("/var/lib/lbaas/state.json")),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Serve the admin API.
    pub enabled: bool,

    /// Admin API bind address.
    pub bind_address: String,

    /// Per-request timeout in seconds. Applies keep running past it.
    pub request_timeout_secs: u64,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "127.0.0.1:9876".to_string(),
            request_timeout_secs: 60,
        }
    }
}

/// Reconciler configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Run the background reconciler.
    pub enabled: bool,

    /// Apply the stored state once at startup.
    pub apply_on_startup: bool,

    /// Interval between divergence checks in seconds.
    pub interval_secs: u64,

    /// Base delay for exponential backoff after a failed apply.
    pub base_delay_ms: u64,

    /// Maximum backoff delay.
    pub max_delay_ms: u64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            apply_on_startup: true,
            interval_secs: 30,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
