//! HAProxy load-balancer-as-a-service daemon.
//!
//! # Architecture Overview
//!
//! ```text
//!     Admin client (lbaas-cli, HTTP)
//!         │
//!         ▼
//!  ┌──────────────┐    ┌──────────────┐    ┌──────────────┐
//!  │  admin API   │───▶│ coordinator  │───▶│    driver    │
//!  │  (axum)      │    │ mutate+apply │    │   haproxy    │
//!  └──────────────┘    └──────┬───────┘    └──────┬───────┘
//!                             │                   │
//!                      ┌──────▼───────┐    ┌──────▼───────────────────┐
//!                      │  reconciler  │    │ store → builder → writer │
//!                      │  (periodic)  │    │        → reload          │
//!                      └──────────────┘    └──────────┬───────────────┘
//!                                                     ▼
//!                                          /etc/haproxy/haproxy.cfg
//!                                          + service reload / master CLI
//! ```

use clap::Parser;
use std::path::PathBuf;

use lbaas::config::{load_or_default, LbaasConfig};
use lbaas::lifecycle::startup;
use lbaas::observability::logging;

#[derive(Parser)]
#[command(name = "lbaas")]
#[command(about = "Manage HAProxy listeners and members through an admin API", long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "/etc/lbaas/lbaas.toml")]
    config: PathBuf,

    /// Load and validate the configuration, then exit.
    #[arg(long)]
    validate_config: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config: LbaasConfig = load_or_default(&args.config)?;
    logging::init(&config.observability.log_level);

    if args.validate_config {
        println!("{}: configuration is valid", args.config.display());
        return Ok(());
    }

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "lbaas starting");
    tracing::info!(
        config_path = %config.haproxy.config_path.display(),
        reload = ?config.reload.mechanism,
        admin_enabled = config.admin.enabled,
        admin_address = %config.admin.bind_address,
        reconcile_enabled = config.reconcile.enabled,
        "Configuration loaded"
    );

    startup::run(config).await
}
