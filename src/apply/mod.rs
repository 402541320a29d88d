//! Apply pipeline: project stored state into the running HAProxy process.
//!
//! # Data Flow
//! ```text
//! ConfigSnapshot (read under the store lock, then released)
//!     → builder.rs (pure text synthesis, validates every token)
//!     → writer.rs (temp file in target dir → fsync → rename → fsync dir)
//!     → reload.rs (service command or master CLI socket, bounded by timeout)
//!     → ApplyResult / LbaasError::{Write, Apply}
//! ```
//!
//! # Design Decisions
//! - The builder never performs I/O; identical snapshots give identical bytes
//! - A failed write leaves the previous artifact in place and stops the apply
//! - Invokers never retry; the coordinator and reconciler own retry policy

pub mod builder;
pub mod reload;
pub mod writer;

pub use builder::{build_config, BuildOptions};
#[cfg(unix)]
pub use reload::MasterSocketInvoker;
pub use reload::{CommandInvoker, Invoker, ReloadInvoker, ReloadOutput};
pub use writer::{AtomicWriter, StagedConfig};
