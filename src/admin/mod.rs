//! Admin HTTP API.
//!
//! # Data Flow
//! ```text
//! HTTP request (JSON)
//!     → axum router (trace + timeout layers)
//!     → handlers.rs (decode, detach onto a task)
//!     → Coordinator (mutate store → apply)
//!     → JSON response { entity, revision, apply }
//! ```
//!
//! # Design Decisions
//! - Mutations run on their own task so a timed-out request never
//!   interrupts an apply in progress
//! - Error kinds map onto a small fixed set of status codes

pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::coordinator::Coordinator;
use crate::driver::HaproxyDriver;
use self::handlers::*;

/// State injected into admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub coordinator: Coordinator<HaproxyDriver>,
}

/// Build the admin router.
#[allow(deprecated)]
pub fn setup_admin_router(state: AdminState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/v1/listeners", get(list_listeners).post(create_listener))
        .route(
            "/v1/listeners/{name}",
            get(get_listener).put(update_listener).delete(delete_listener),
        )
        .route("/v1/listeners/{name}/members", post(create_member))
        .route("/v1/members", get(list_members))
        .route(
            "/v1/members/{name}",
            get(get_member).put(update_member).delete(delete_member),
        )
        .route("/v1/apply", post(apply_changes))
        .route("/v1/status", get(get_status))
        .with_state(state)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
}

/// Serve the admin API until `shutdown` resolves.
pub async fn serve<S>(listener: TcpListener, router: Router, shutdown: S) -> std::io::Result<()>
where
    S: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "Admin API starting");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("Admin API stopped");
    Ok(())
}
