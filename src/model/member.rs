//! Member (backend server) types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::error::{LbaasError, LbaasResult};
use crate::model::{validate_address, validate_name, validate_port};

/// A backend target attached to exactly one listener.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub port: u16,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub listener_id: Uuid,
    pub created_at: u64,
    #[serde(default)]
    pub updated_at: Option<u64>,
}

/// Input for creating a member.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemberSpec {
    pub name: String,
    pub address: String,
    pub port: Option<u16>,
    pub tags: BTreeSet<String>,
    pub description: Option<String>,
}

impl MemberSpec {
    pub fn new(name: impl Into<String>, address: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            port: Some(port),
            ..Default::default()
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub(crate) fn into_member(self, listener_id: Uuid, now: u64) -> LbaasResult<Member> {
        let port = match self.port {
            Some(port) if !self.name.is_empty() && !self.address.is_empty() => port,
            _ => {
                return Err(LbaasError::Validation(
                    "name, address and port of the member are required".to_string(),
                ))
            }
        };
        validate_name("member name", &self.name)?;
        validate_address("member address", &self.address)?;
        validate_port("member port", port)?;

        Ok(Member {
            id: Uuid::new_v4(),
            name: self.name,
            address: self.address,
            port,
            tags: self.tags,
            description: self.description,
            listener_id,
            created_at: now,
            updated_at: None,
        })
    }
}

/// Partial update of a member's scalar fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemberUpdate {
    pub address: Option<String>,
    pub port: Option<u16>,
    pub tags: Option<BTreeSet<String>>,
    pub description: Option<String>,
}

impl MemberUpdate {
    pub fn port(port: u16) -> Self {
        Self {
            port: Some(port),
            ..Default::default()
        }
    }

    pub(crate) fn apply_to(self, member: &mut Member, now: u64) -> LbaasResult<()> {
        if let Some(address) = self.address {
            validate_address("member address", &address)?;
            member.address = address;
        }
        if let Some(port) = self.port {
            validate_port("member port", port)?;
            member.port = port;
        }
        if let Some(tags) = self.tags {
            member.tags = tags;
        }
        if let Some(description) = self.description {
            member.description = Some(description);
        }
        member.updated_at = Some(now);
        Ok(())
    }
}
