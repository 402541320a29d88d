//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize subsystems in dependency order from a validated config
//! - Converge HAProxy with the stored state before serving
//! - Start background tasks and run until shutdown

use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use crate::admin::{self, AdminState};
use crate::config::LbaasConfig;
use crate::coordinator::{Coordinator, Reconciler};
use crate::driver::HaproxyDriver;
use crate::lifecycle::{signals, Shutdown};
use crate::observability::metrics;
use crate::store::Store;

/// Run the daemon until SIGINT/SIGTERM.
pub async fn run(config: LbaasConfig) -> Result<(), Box<dyn std::error::Error>> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let store = match &config.store.path {
        Some(path) => Store::open(path)?,
        None => {
            tracing::warn!("No store path configured, state will not survive a restart");
            Store::in_memory()
        }
    };

    let driver = Arc::new(HaproxyDriver::from_config(&config, store)?);
    let coordinator = Coordinator::new(driver);

    if config.reconcile.apply_on_startup {
        match coordinator.apply_changes().await {
            Ok(result) => tracing::info!(revision = result.revision, "Initial apply complete"),
            Err(e) => tracing::warn!(error = %e, "Initial apply failed, reconciler will retry"),
        }
    }

    let shutdown = Shutdown::new();
    let signal_task = signals::spawn_signal_listener(shutdown.clone());

    let mut tasks = Vec::new();
    if config.reconcile.enabled {
        let reconciler = Reconciler::from_config(coordinator.clone(), &config.reconcile);
        tasks.push(tokio::spawn(reconciler.run(shutdown.subscribe())));
    } else {
        tracing::info!("Reconciler disabled");
    }

    if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        let router = admin::setup_admin_router(
            AdminState {
                coordinator: coordinator.clone(),
            },
            Duration::from_secs(config.admin.request_timeout_secs),
        );
        admin::serve(listener, router, shutdown.wait()).await?;
    } else {
        tracing::info!("Admin API disabled, waiting for shutdown signal");
        shutdown.wait().await;
    }

    // Covers the admin server stopping on its own.
    shutdown.trigger();
    for task in tasks {
        let _ = task.await;
    }
    signal_task.abort();

    tracing::info!("Shutdown complete");
    Ok(())
}
