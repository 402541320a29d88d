//! Load balancer domain model.
//!
//! # Data Flow
//! ```text
//! ListenerSpec / MemberSpec (request input)
//!     → validated by the store inside a transaction
//!     → Listener / Member records (id + timestamps assigned)
//!     → ConfigSnapshot (listeners with their members, creation order)
//!     → config builder
//! ```
//!
//! # Design Decisions
//! - Protocols and algorithms are closed enums; unknown values never reach the builder
//! - Names use HAProxy identifier characters only; `#` would start a comment
//! - Addresses are a bare IP (v4 or v6) or hostname; the port is always separate
//! - Updates carry `Option` fields and never touch identity

pub mod listener;
pub mod member;

pub use listener::{Algorithm, Listener, ListenerSpec, ListenerUpdate, Protocol};
pub use member::{Member, MemberSpec, MemberUpdate};

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{LbaasError, LbaasResult};

/// Self-consistent view of every listener with its members.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    /// Store revision this snapshot was read at.
    pub revision: u64,
    /// Listeners in creation order, members attached in creation order.
    pub listeners: Vec<Listener>,
}

/// Current unix time in seconds.
pub(crate) fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Check a name rendered as a proxy, server or group identifier.
///
/// HAProxy identifiers are limited to `[A-Za-z0-9_.:-]`.
pub(crate) fn validate_name(field: &str, value: &str) -> LbaasResult<()> {
    if value.is_empty() {
        return Err(LbaasError::Validation(format!("{} must not be empty", field)));
    }
    if let Some(c) = value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ':' | '-')))
    {
        return Err(LbaasError::Validation(format!(
            "{} may only contain letters, digits, '_', '.', ':' and '-', found {:?} in {:?}",
            field, c, value
        )));
    }
    Ok(())
}

/// Check a server address: an IPv4/IPv6 literal or a DNS hostname, no port.
pub(crate) fn validate_address(field: &str, value: &str) -> LbaasResult<()> {
    if value.is_empty() {
        return Err(LbaasError::Validation(format!("{} must not be empty", field)));
    }
    if value.parse::<IpAddr>().is_ok() {
        return Ok(());
    }
    let hostname = value.len() <= 253
        && value.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        });
    if !hostname {
        return Err(LbaasError::Validation(format!(
            "{} must be an IP address or hostname without a port: {:?}",
            field, value
        )));
    }
    Ok(())
}

pub(crate) fn validate_port(field: &str, port: u16) -> LbaasResult<()> {
    if port == 0 {
        return Err(LbaasError::Validation(format!(
            "{} must be between 1 and 65535",
            field
        )));
    }
    Ok(())
}
