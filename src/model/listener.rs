//! Listener types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{LbaasError, LbaasResult};
use crate::model::member::Member;
use crate::model::{validate_name, validate_port};

/// Proxy mode of a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Tcp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Tcp => "tcp",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = LbaasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "http" => Ok(Protocol::Http),
            "tcp" => Ok(Protocol::Tcp),
            other => Err(LbaasError::Validation(format!(
                "unsupported protocol: {}",
                other
            ))),
        }
    }
}

/// Balancing algorithm, rendered verbatim into the `balance` directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Algorithm {
    #[default]
    #[serde(rename = "roundrobin")]
    RoundRobin,
    #[serde(rename = "static-rr")]
    StaticRoundRobin,
    #[serde(rename = "leastconn")]
    LeastConn,
    #[serde(rename = "first")]
    First,
    #[serde(rename = "source")]
    Source,
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::RoundRobin => "roundrobin",
            Algorithm::StaticRoundRobin => "static-rr",
            Algorithm::LeastConn => "leastconn",
            Algorithm::First => "first",
            Algorithm::Source => "source",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = LbaasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "roundrobin" => Ok(Algorithm::RoundRobin),
            "static-rr" => Ok(Algorithm::StaticRoundRobin),
            "leastconn" => Ok(Algorithm::LeastConn),
            "first" => Ok(Algorithm::First),
            "source" => Ok(Algorithm::Source),
            other => Err(LbaasError::Validation(format!(
                "unsupported algorithm: {}",
                other
            ))),
        }
    }
}

/// A load-balanced endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listener {
    pub id: Uuid,
    /// Globally unique name, also the `listen` section name.
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub protocol: Protocol,
    pub port: u16,
    pub algorithm: Algorithm,
    pub created_at: u64,
    #[serde(default)]
    pub updated_at: Option<u64>,
    /// Filled in on read; the store keeps members in their own table.
    #[serde(default)]
    pub members: Vec<Member>,
}

/// Input for creating a listener.
///
/// Required fields are optional here so that a missing field surfaces as a
/// validation error instead of a decode failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerSpec {
    pub name: String,
    pub protocol: Option<Protocol>,
    pub port: Option<u16>,
    pub algorithm: Option<Algorithm>,
    pub description: Option<String>,
}

impl ListenerSpec {
    pub fn new(name: impl Into<String>, protocol: Protocol, port: u16) -> Self {
        Self {
            name: name.into(),
            protocol: Some(protocol),
            port: Some(port),
            ..Default::default()
        }
    }

    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = Some(algorithm);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Validate required fields and build the record.
    pub(crate) fn into_listener(self, now: u64) -> LbaasResult<Listener> {
        let (protocol, port) = match (self.protocol, self.port) {
            (Some(protocol), Some(port)) if !self.name.is_empty() => (protocol, port),
            _ => {
                return Err(LbaasError::Validation(
                    "name, port and protocol of the listener are required".to_string(),
                ))
            }
        };
        validate_name("listener name", &self.name)?;
        validate_port("listener port", port)?;

        Ok(Listener {
            id: Uuid::new_v4(),
            name: self.name,
            description: self.description,
            protocol,
            port,
            algorithm: self.algorithm.unwrap_or_default(),
            created_at: now,
            updated_at: None,
            members: Vec::new(),
        })
    }
}

/// Partial update of a listener's scalar fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerUpdate {
    pub protocol: Option<Protocol>,
    pub port: Option<u16>,
    pub algorithm: Option<Algorithm>,
    pub description: Option<String>,
}

impl ListenerUpdate {
    pub fn port(port: u16) -> Self {
        Self {
            port: Some(port),
            ..Default::default()
        }
    }

    pub fn algorithm(algorithm: Algorithm) -> Self {
        Self {
            algorithm: Some(algorithm),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.protocol.is_none()
            && self.port.is_none()
            && self.algorithm.is_none()
            && self.description.is_none()
    }

    pub(crate) fn apply_to(self, listener: &mut Listener, now: u64) -> LbaasResult<()> {
        if let Some(port) = self.port {
            validate_port("listener port", port)?;
            listener.port = port;
        }
        if let Some(protocol) = self.protocol {
            listener.protocol = protocol;
        }
        if let Some(algorithm) = self.algorithm {
            listener.algorithm = algorithm;
        }
        if let Some(description) = self.description {
            listener.description = Some(description);
        }
        listener.updated_at = Some(now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_algorithm_defaults_to_roundrobin() {
        let listener = ListenerSpec::new("web", Protocol::Http, 80)
            .into_listener(1)
            .unwrap();
        assert_eq!(listener.algorithm, Algorithm::RoundRobin);
        assert_eq!(listener.created_at, 1);
        assert!(listener.updated_at.is_none());
    }

    #[test]
    fn test_missing_required_fields() {
        let spec = ListenerSpec {
            name: "web".into(),
            protocol: Some(Protocol::Http),
            ..Default::default()
        };
        assert!(matches!(spec.into_listener(0), Err(LbaasError::Validation(_))));

        let spec = ListenerSpec {
            protocol: Some(Protocol::Tcp),
            port: Some(80),
            ..Default::default()
        };
        assert!(matches!(spec.into_listener(0), Err(LbaasError::Validation(_))));
    }

    #[test]
    fn test_serde_names_match_haproxy_keywords() {
        let json = serde_json::to_string(&Algorithm::StaticRoundRobin).unwrap();
        assert_eq!(json, "\"static-rr\"");

        let spec: ListenerSpec =
            serde_json::from_str(r#"{"name":"web","protocol":"tcp","port":443}"#).unwrap();
        assert_eq!(spec.protocol, Some(Protocol::Tcp));
        assert!(spec.algorithm.is_none());

        let bad: Result<ListenerSpec, _> =
            serde_json::from_str(r#"{"name":"web","protocol":"udp","port":53}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_from_str_rejects_unknown_values() {
        assert_eq!("leastconn".parse::<Algorithm>().unwrap(), Algorithm::LeastConn);
        assert!("random".parse::<Algorithm>().is_err());
        assert!("udp".parse::<Protocol>().is_err());
    }

    #[test]
    fn test_update_only_touches_given_fields() {
        let mut listener = ListenerSpec::new("web", Protocol::Http, 80)
            .with_description("front")
            .into_listener(1)
            .unwrap();
        let id = listener.id;

        ListenerUpdate::port(8080).apply_to(&mut listener, 5).unwrap();

        assert_eq!(listener.id, id);
        assert_eq!(listener.port, 8080);
        assert_eq!(listener.protocol, Protocol::Http);
        assert_eq!(listener.description.as_deref(), Some("front"));
        assert_eq!(listener.updated_at, Some(5));
    }
}
