//! In-memory tables and the mutations allowed inside a transaction.

use serde::{Deserialize, Serialize};

use crate::error::{LbaasError, LbaasResult};
use crate::model::{
    now_secs, ConfigSnapshot, Listener, ListenerSpec, ListenerUpdate, Member, MemberSpec,
    MemberUpdate,
};

/// Entity touched by a committed change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Listener,
    Member,
}

/// Kind of committed change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOp {
    Create,
    Update,
    Delete,
}

/// Outbox entry: a committed change not yet applied to HAProxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingChange {
    pub revision: u64,
    pub entity: EntityKind,
    pub name: String,
    pub op: ChangeOp,
    pub at: u64,
}

/// Complete persisted state.
///
/// Listeners and members are kept in creation order; that order is the
/// rendering order of the generated config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Tables {
    pub(crate) revision: u64,
    pub(crate) applied_revision: Option<u64>,
    pub(crate) listeners: Vec<Listener>,
    pub(crate) members: Vec<Member>,
    pub(crate) outbox: Vec<PendingChange>,
}

impl Tables {
    // ── Reads ──────────────────────────────────────────────────────

    /// Listener by name with its members attached.
    pub fn get_listener(&self, name: &str) -> LbaasResult<Listener> {
        let listener = self.listener_ref(name)?;
        Ok(self.with_members(listener))
    }

    /// All listeners, creation order, members attached.
    pub fn get_listeners(&self) -> Vec<Listener> {
        self.listeners.iter().map(|l| self.with_members(l)).collect()
    }

    pub fn get_member(&self, name: &str) -> LbaasResult<Member> {
        self.members
            .iter()
            .find(|m| m.name == name)
            .cloned()
            .ok_or_else(|| LbaasError::not_found("member", name))
    }

    pub fn get_members(&self) -> Vec<Member> {
        self.members.clone()
    }

    pub fn snapshot(&self) -> ConfigSnapshot {
        ConfigSnapshot {
            revision: self.revision,
            listeners: self.get_listeners(),
        }
    }

    // ── Listener mutations ─────────────────────────────────────────

    pub fn create_listener(&mut self, spec: ListenerSpec) -> LbaasResult<Listener> {
        let listener = spec.into_listener(now_secs())?;
        if self.listeners.iter().any(|l| l.name == listener.name) {
            return Err(LbaasError::duplicate("listener", listener.name));
        }
        self.check_port_free(listener.port, None)?;

        self.record(EntityKind::Listener, &listener.name, ChangeOp::Create);
        self.listeners.push(listener.clone());
        Ok(listener)
    }

    pub fn update_listener(&mut self, name: &str, update: ListenerUpdate) -> LbaasResult<Listener> {
        let idx = self.listener_index(name)?;
        let mut listener = self.listeners[idx].clone();
        update.apply_to(&mut listener, now_secs())?;
        self.check_port_free(listener.port, Some(idx))?;

        self.record(EntityKind::Listener, name, ChangeOp::Update);
        self.listeners[idx] = listener;
        Ok(self.with_members(&self.listeners[idx]))
    }

    /// Remove an empty listener. Members must be deleted first.
    pub fn delete_listener(&mut self, name: &str) -> LbaasResult<()> {
        let idx = self.listener_index(name)?;
        let id = self.listeners[idx].id;
        let members = self.members.iter().filter(|m| m.listener_id == id).count();
        if members > 0 {
            return Err(LbaasError::ListenerNotEmpty {
                name: name.to_string(),
                members,
            });
        }

        self.listeners.remove(idx);
        self.record(EntityKind::Listener, name, ChangeOp::Delete);
        Ok(())
    }

    // ── Member mutations ───────────────────────────────────────────

    pub fn create_member(&mut self, listener_name: &str, spec: MemberSpec) -> LbaasResult<Member> {
        let listener_id = self.listener_ref(listener_name)?.id;
        let member = spec.into_member(listener_id, now_secs())?;
        if self.members.iter().any(|m| m.name == member.name) {
            return Err(LbaasError::duplicate("member", member.name));
        }

        self.record(EntityKind::Member, &member.name, ChangeOp::Create);
        self.members.push(member.clone());
        Ok(member)
    }

    pub fn update_member(&mut self, name: &str, update: MemberUpdate) -> LbaasResult<Member> {
        let idx = self.member_index(name)?;
        let mut member = self.members[idx].clone();
        update.apply_to(&mut member, now_secs())?;

        self.record(EntityKind::Member, name, ChangeOp::Update);
        self.members[idx] = member.clone();
        Ok(member)
    }

    pub fn delete_member(&mut self, name: &str) -> LbaasResult<()> {
        let idx = self.member_index(name)?;
        self.members.remove(idx);
        self.record(EntityKind::Member, name, ChangeOp::Delete);
        Ok(())
    }

    // ── Internals ──────────────────────────────────────────────────

    fn listener_ref(&self, name: &str) -> LbaasResult<&Listener> {
        self.listeners
            .iter()
            .find(|l| l.name == name)
            .ok_or_else(|| LbaasError::not_found("listener", name))
    }

    fn listener_index(&self, name: &str) -> LbaasResult<usize> {
        self.listeners
            .iter()
            .position(|l| l.name == name)
            .ok_or_else(|| LbaasError::not_found("listener", name))
    }

    fn member_index(&self, name: &str) -> LbaasResult<usize> {
        self.members
            .iter()
            .position(|m| m.name == name)
            .ok_or_else(|| LbaasError::not_found("member", name))
    }

    fn with_members(&self, listener: &Listener) -> Listener {
        let mut listener = listener.clone();
        listener.members = self
            .members
            .iter()
            .filter(|m| m.listener_id == listener.id)
            .cloned()
            .collect();
        listener
    }

    /// Every listener binds 0.0.0.0, so ports are exclusive across protocols.
    fn check_port_free(&self, port: u16, skip: Option<usize>) -> LbaasResult<()> {
        let taken = self
            .listeners
            .iter()
            .enumerate()
            .find(|(i, l)| Some(*i) != skip && l.port == port);
        match taken {
            Some((_, other)) => Err(LbaasError::duplicate(
                "listener port",
                format!("{} (used by {})", port, other.name),
            )),
            None => Ok(()),
        }
    }

    /// Queue a change for the revision this transaction will commit as.
    fn record(&mut self, entity: EntityKind, name: &str, op: ChangeOp) {
        self.outbox.push(PendingChange {
            revision: self.revision + 1,
            entity,
            name: name.to_string(),
            op,
            at: now_secs(),
        });
    }

    pub(crate) fn outbox_len(&self) -> usize {
        self.outbox.len()
    }

    pub(crate) fn mark_applied(&mut self, revision: u64) {
        let revision = revision.min(self.revision);
        if self.applied_revision.map_or(true, |applied| applied < revision) {
            self.applied_revision = Some(revision);
        }
        self.outbox.retain(|c| c.revision > revision);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Protocol;

    fn tables_with_listener() -> Tables {
        let mut tables = Tables::default();
        tables
            .create_listener(ListenerSpec::new("web", Protocol::Http, 80))
            .unwrap();
        tables
    }

    #[test]
    fn test_duplicate_listener_name() {
        let mut tables = tables_with_listener();
        let err = tables
            .create_listener(ListenerSpec::new("web", Protocol::Tcp, 81))
            .unwrap_err();
        assert!(matches!(err, LbaasError::DuplicateEntry { kind: "listener", .. }));
    }

    #[test]
    fn test_port_collision() {
        let mut tables = tables_with_listener();
        let err = tables
            .create_listener(ListenerSpec::new("api", Protocol::Tcp, 80))
            .unwrap_err();
        assert!(matches!(
            err,
            LbaasError::DuplicateEntry {
                kind: "listener port",
                ..
            }
        ));

        tables
            .create_listener(ListenerSpec::new("api", Protocol::Tcp, 81))
            .unwrap();
        assert!(tables
            .update_listener("api", ListenerUpdate::port(80))
            .is_err());
        // Keeping its own port is not a collision.
        assert!(tables
            .update_listener("web", ListenerUpdate::port(80))
            .is_ok());
    }

    #[test]
    fn test_member_requires_listener() {
        let mut tables = Tables::default();
        let err = tables
            .create_member("missing", MemberSpec::new("m1", "10.0.0.1", 80))
            .unwrap_err();
        assert!(matches!(err, LbaasError::NotFound { kind: "listener", .. }));
        assert_eq!(tables.outbox_len(), 0);
    }

    #[test]
    fn test_grammar_breaking_tokens_rejected() {
        let mut tables = tables_with_listener();
        let err = tables
            .create_listener(ListenerSpec::new("web#x", Protocol::Http, 81))
            .unwrap_err();
        assert!(matches!(err, LbaasError::Validation(_)));

        for address in ["10.0.0.1:90", "10.0.0.2#oops"] {
            let err = tables
                .create_member("web", MemberSpec::new("m1", address, 80))
                .unwrap_err();
            assert!(matches!(err, LbaasError::Validation(_)), "{}", address);
        }
        tables
            .create_member("web", MemberSpec::new("m1", "10.0.0.1", 80))
            .unwrap();
        assert!(tables
            .update_member(
                "m1",
                MemberUpdate {
                    address: Some("10.0.0.1:90".into()),
                    ..Default::default()
                }
            )
            .is_err());
        assert_eq!(tables.get_member("m1").unwrap().address, "10.0.0.1");
        assert_eq!(tables.outbox_len(), 2);

        tables
            .create_member("web", MemberSpec::new("m2", "::1", 80))
            .unwrap();
    }

    #[test]
    fn test_member_names_unique_across_listeners() {
        let mut tables = tables_with_listener();
        tables
            .create_listener(ListenerSpec::new("api", Protocol::Tcp, 81))
            .unwrap();
        tables
            .create_member("web", MemberSpec::new("m1", "10.0.0.1", 80))
            .unwrap();
        assert!(tables
            .create_member("api", MemberSpec::new("m1", "10.0.0.2", 80))
            .is_err());
    }

    #[test]
    fn test_listener_members_in_creation_order() {
        let mut tables = tables_with_listener();
        for (i, name) in ["c", "a", "b"].iter().enumerate() {
            tables
                .create_member("web", MemberSpec::new(*name, format!("10.0.0.{}", i), 80))
                .unwrap();
        }
        let names: Vec<_> = tables
            .get_listener("web")
            .unwrap()
            .members
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_delete_listener_with_members_rejected() {
        let mut tables = tables_with_listener();
        tables
            .create_member("web", MemberSpec::new("m1", "10.0.0.1", 80))
            .unwrap();

        let err = tables.delete_listener("web").unwrap_err();
        assert!(matches!(err, LbaasError::ListenerNotEmpty { members: 1, .. }));

        tables.delete_member("m1").unwrap();
        tables.delete_listener("web").unwrap();
        assert!(tables.get_listener("web").is_err());
    }

    #[test]
    fn test_mark_applied_drains_outbox() {
        let mut tables = Tables::default();
        tables
            .create_listener(ListenerSpec::new("web", Protocol::Http, 80))
            .unwrap();
        tables.revision = 1;
        tables
            .create_listener(ListenerSpec::new("api", Protocol::Http, 81))
            .unwrap();
        tables.revision = 2;

        tables.mark_applied(1);
        assert_eq!(tables.applied_revision, Some(1));
        assert_eq!(tables.outbox.len(), 1);
        assert_eq!(tables.outbox[0].name, "api");

        // Never moves backwards.
        tables.mark_applied(0);
        assert_eq!(tables.applied_revision, Some(1));

        tables.mark_applied(2);
        assert!(tables.outbox.is_empty());
    }
}
