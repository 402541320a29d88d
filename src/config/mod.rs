//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize, defaults when the file is absent)
//!     → validation.rs (semantic checks)
//!     → LbaasConfig (validated, immutable)
//!     → handed to store, driver, reconciler and admin API at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_or_default, ConfigError};
pub use schema::{
    AdminConfig, HaproxyConfig, LbaasConfig, ObservabilityConfig, ReconcileConfig, ReloadConfig,
    ReloadMechanism, StoreConfig,
};
