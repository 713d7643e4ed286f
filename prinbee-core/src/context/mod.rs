/*
 * This file is part of Prinbee, a distributed database system.
 *
 * Copyright (c) 2026, The Prinbee Authors
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

//! Named contexts (schemas): validation, the version-gated create/update
//! manager, and the four-phase `SET_CONTEXT` session that ties a schema
//! mutation to a cluster lock and peer-ACK fan-out.

pub mod lock;

pub use lock::{context_lock_name, ClusterLock, InMemoryClusterLock};

use crate::error::{PrinbeeError, PrinbeeResult};
use std::collections::HashMap;
use std::path::PathBuf;

pub const MAX_CONTEXT_NAME_LEN: usize = 100;

/// Canonicalize and validate a context name: lowercased, `1..=100` chars,
/// `[_A-Za-z][_A-Za-z0-9]*`.
pub fn validate_context_name(name: &str) -> PrinbeeResult<String> {
    if name.is_empty() || name.len() > MAX_CONTEXT_NAME_LEN {
        return Err(PrinbeeError::Validation(format!(
            "context name must be 1..={MAX_CONTEXT_NAME_LEN} bytes, got {}",
            name.len()
        )));
    }
    let mut chars = name.chars();
    let first = chars.next().unwrap();
    if !(first == '_' || first.is_ascii_alphabetic()) {
        return Err(PrinbeeError::Validation(
            "context name must start with a letter or underscore".into(),
        ));
    }
    if !chars.all(|c| c == '_' || c.is_ascii_alphanumeric()) {
        return Err(PrinbeeError::Validation(
            "context name may only contain letters, digits and underscores".into(),
        ));
    }
    Ok(name.to_lowercase())
}

#[derive(Debug, Clone)]
pub struct Context {
    pub name: String,
    pub path: PathBuf,
    pub owner: String,
    pub group: Option<String>,
    pub description: String,
    pub schema_version: u32,
}

/// Tracks every known context and enforces the monotonic schema-version
/// rule: `update(schema_version)` must equal `current + 1`.
#[derive(Debug, Default)]
pub struct ContextManager {
    contexts: HashMap<String, Context>,
}

impl ContextManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(
        &mut self,
        name: &str,
        path: PathBuf,
        owner: impl Into<String>,
        group: Option<String>,
        description: impl Into<String>,
    ) -> PrinbeeResult<()> {
        let name = validate_context_name(name)?;
        if self.contexts.contains_key(&name) {
            return Err(PrinbeeError::Resource(format!("context {name:?} already exists")));
        }
        self.contexts.insert(
            name.clone(),
            Context {
                name,
                path,
                owner: owner.into(),
                group,
                description: description.into(),
                schema_version: 0,
            },
        );
        Ok(())
    }

    /// Apply a schema update. `schema_version` must be exactly
    /// `current + 1`; any gap or regression is rejected with
    /// [`PrinbeeError::UnexpectedVersion`].
    pub fn update(&mut self, name: &str, schema_version: u32) -> PrinbeeResult<()> {
        let name = validate_context_name(name)?;
        let ctx = self
            .contexts
            .get_mut(&name)
            .ok_or_else(|| PrinbeeError::Resource(format!("no such context {name:?}")))?;
        let expected = ctx.schema_version + 1;
        if schema_version != expected {
            return Err(PrinbeeError::UnexpectedVersion { expected, got: schema_version });
        }
        ctx.schema_version = schema_version;
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Context> {
        let name = name.to_lowercase();
        self.contexts.get(&name)
    }

    pub fn list(&self) -> impl Iterator<Item = &Context> {
        self.contexts.values()
    }
}

/// The four `SET_CONTEXT` phases (spec §4.3): received, saved under lock,
/// broadcasting to peers, done once every peer ACK is in (or timed out).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetContextPhase {
    ContextReceived,
    ContextSaved,
    AwaitingPeerAcks,
    Done,
}

/// Per-request state for one in-flight `SET_CONTEXT` operation. The lock
/// is held from phase 1 through phase 2 only, per §5's "held only across
/// the minimal schema mutation window" rule; this struct itself does not
/// call into `ClusterLock` — the daemon's worker loop acquires/releases
/// using [`context_lock_name`] and drives this state machine alongside.
#[derive(Debug)]
pub struct SetContextSession {
    pub context_name: String,
    pub schema_version: u32,
    pub phase: SetContextPhase,
    expected_acks: usize,
    received_acks: usize,
}

impl SetContextSession {
    pub fn new(context_name: impl Into<String>, schema_version: u32) -> Self {
        Self {
            context_name: context_name.into(),
            schema_version,
            phase: SetContextPhase::ContextReceived,
            expected_acks: 0,
            received_acks: 0,
        }
    }

    /// Phase 2: the lock has been granted; create-or-update against the
    /// manager and advance to `ContextSaved`.
    pub fn apply(
        &mut self,
        manager: &mut ContextManager,
        new_context: impl FnOnce() -> (PathBuf, String, Option<String>, String),
    ) -> PrinbeeResult<()> {
        let result = if manager.get(&self.context_name).is_some() {
            manager.update(&self.context_name, self.schema_version)
        } else {
            let (path, owner, group, description) = new_context();
            manager.create(&self.context_name, path, owner, group, description)
        };
        result?;
        self.phase = SetContextPhase::ContextSaved;
        Ok(())
    }

    /// Phase 3: broadcast to every `NODE`-type peer and start waiting for
    /// their ACKs.
    pub fn begin_broadcast(&mut self, peer_count: usize) {
        self.expected_acks = peer_count;
        self.received_acks = 0;
        self.phase = SetContextPhase::AwaitingPeerAcks;
    }

    /// Phase 4: record one peer's ACK. Returns `true` once every expected
    /// peer has ACKed (the caller should then release the lock).
    pub fn record_peer_ack(&mut self) -> bool {
        self.received_acks += 1;
        if self.received_acks >= self.expected_acks {
            self.phase = SetContextPhase::Done;
            true
        } else {
            false
        }
    }

    pub fn is_done(&self) -> bool {
        self.phase == SetContextPhase::Done
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_is_canonicalized_and_bounded() {
        assert_eq!(validate_context_name("Orders").unwrap(), "orders");
        assert!(validate_context_name("").is_err());
        assert!(validate_context_name("9orders").is_err());
        assert!(validate_context_name(&"a".repeat(101)).is_err());
        assert!(validate_context_name(&"a".repeat(100)).is_ok());
        assert!(validate_context_name("_private-ish").is_err());
        assert!(validate_context_name("_private").is_ok());
    }

    #[test]
    fn update_requires_exact_successor_version() {
        let mut mgr = ContextManager::new();
        mgr.create("orders", PathBuf::from("/data/orders"), "alice", None, "").unwrap();
        assert!(mgr.update("orders", 1).is_ok());
        assert!(mgr.update("orders", 2).is_ok());
        let err = mgr.update("orders", 5).unwrap_err();
        match err {
            PrinbeeError::UnexpectedVersion { expected, got } => {
                assert_eq!(expected, 3);
                assert_eq!(got, 5);
            }
            other => panic!("expected UnexpectedVersion, got {other:?}"),
        }
    }

    #[test]
    fn context_version_gap_scenario() {
        // current = 3, SET_CONTEXT(version=5) -> ERR(expected=4, got=5)
        let mut mgr = ContextManager::new();
        mgr.create("orders", PathBuf::from("/data/orders"), "alice", None, "").unwrap();
        mgr.update("orders", 1).unwrap();
        mgr.update("orders", 2).unwrap();
        mgr.update("orders", 3).unwrap();
        let err = mgr.update("orders", 5).unwrap_err();
        assert!(matches!(err, PrinbeeError::UnexpectedVersion { expected: 4, got: 5 }));
    }

    #[test]
    fn set_context_session_runs_all_phases() {
        let mut mgr = ContextManager::new();
        let mut session = SetContextSession::new("orders", 1);
        assert_eq!(session.phase, SetContextPhase::ContextReceived);
        session
            .apply(&mut mgr, || (PathBuf::from("/data/orders"), "alice".into(), None, String::new()))
            .unwrap();
        assert_eq!(session.phase, SetContextPhase::ContextSaved);
        session.begin_broadcast(3);
        assert!(!session.record_peer_ack());
        assert!(!session.record_peer_ack());
        assert!(session.record_peer_ack());
        assert!(session.is_done());
    }
}
