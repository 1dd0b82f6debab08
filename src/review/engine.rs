//! Snapshot interposition and the review operations.
//!
//! [`ReviewEngine`] wraps the memory graph: each recording mutation captures
//! the prior state of the touched paths, performs the mutation and files the
//! snapshot, all on the caller's transaction. Rollback writes go straight to
//! the graph and are never recorded.

use rusqlite::Connection;
use tracing::{debug, info, warn};

use super::diff::diff_snapshot;
use super::snapshots::{self, snapshot_not_found};
use super::types::{
    OperationType, ResourceDiff, RollbackOutcome, SessionId, SessionInfo, Snapshot, SnapshotInfo,
};
use crate::config::MemoryConfig;
use crate::error::{Error, Result};
use crate::graph::{AliasRequest, CreateRequest, DeleteOutcome, MemoryGraph};
use crate::patch::UpdateRequest;
use crate::store::paths;
use crate::types::NodeState;
use crate::uri::MemoryUri;

/// Review operations over one connection.
pub struct ReviewEngine<'a> {
    conn: &'a Connection,
    config: &'a MemoryConfig,
}

impl<'a> ReviewEngine<'a> {
    pub fn new(conn: &'a Connection, config: &'a MemoryConfig) -> Self {
        Self { conn, config }
    }

    pub fn graph(&self) -> MemoryGraph<'a> {
        MemoryGraph::new(self.conn, self.config)
    }

    /// File a mutation against the session: a new snapshot holding `before`,
    /// or a promoted operation type on the existing one.
    fn record(
        &self,
        session: &SessionId,
        uri: &MemoryUri,
        operation: OperationType,
        before: Option<NodeState>,
    ) -> Result<()> {
        let resource_id = uri.to_string();
        match snapshots::get_snapshot(self.conn, session, &resource_id)? {
            Some(existing) => {
                let merged = existing.operation_type.merge(operation);
                if merged != existing.operation_type {
                    snapshots::set_operation_type(self.conn, session, &resource_id, merged)?;
                }
                debug!(
                    session = %session,
                    resource = %resource_id,
                    operation = %merged,
                    "snapshot kept"
                );
            }
            None => {
                snapshots::ensure_session(self.conn, session)?;
                let snapshot = Snapshot::new(session.clone(), uri.clone(), operation, before);
                snapshots::insert_snapshot(self.conn, &snapshot)?;
                debug!(
                    session = %session,
                    resource = %resource_id,
                    operation = %operation,
                    "snapshot captured"
                );
            }
        }
        Ok(())
    }

    // ==================== Recording mutations ====================

    pub fn create(&self, session: &SessionId, request: &CreateRequest) -> Result<NodeState> {
        let created = self.graph().create(request)?;
        self.record(session, created.uri(), OperationType::Create, None)?;
        Ok(created)
    }

    pub fn add_alias(&self, session: &SessionId, request: &AliasRequest) -> Result<NodeState> {
        let created = self.graph().add_alias(request)?;
        self.record(session, created.uri(), OperationType::CreateAlias, None)?;
        Ok(created)
    }

    pub fn update(
        &self,
        session: &SessionId,
        uri: &MemoryUri,
        request: &UpdateRequest,
    ) -> Result<NodeState> {
        let graph = self.graph();
        graph.check_writable(uri)?;
        let before = graph.require_state(uri)?;
        let shared = self.shared_states(&before)?;
        let updated = graph.update(uri, request)?;
        let operation = if request.is_content_edit() {
            OperationType::ModifyContent
        } else {
            OperationType::ModifyMeta
        };
        self.record(session, uri, operation, Some(before))?;

        // other paths see record edits too; each gets its own snapshot
        for prior in shared {
            if graph.state(prior.uri())?.as_ref() != Some(&prior) {
                let alias = prior.uri().clone();
                self.record(session, &alias, operation, Some(prior))?;
            }
        }
        Ok(updated)
    }

    /// States of the other paths pointing at the same record as `state`.
    fn shared_states(&self, state: &NodeState) -> Result<Vec<NodeState>> {
        let graph = self.graph();
        let mut states = Vec::new();
        for uri in paths::uris_for_content(self.conn, &state.record.content_id)? {
            if &uri != state.uri() {
                states.extend(graph.state(&uri)?);
            }
        }
        Ok(states)
    }

    /// Delete a path; every removed path gets its own snapshot.
    pub fn delete(&self, session: &SessionId, uri: &MemoryUri) -> Result<DeleteOutcome> {
        let outcome = self.graph().delete_path(uri)?;
        for state in &outcome.removed {
            self.record(session, state.uri(), OperationType::Delete, Some(state.clone()))?;
        }
        Ok(outcome)
    }

    // ==================== Review surface ====================

    pub fn list_sessions(&self) -> Result<Vec<SessionInfo>> {
        snapshots::list_sessions(self.conn)
    }

    pub fn list_snapshots(&self, session: &SessionId) -> Result<Vec<SnapshotInfo>> {
        if !snapshots::session_exists(self.conn, session)? {
            return Err(Error::not_found(format!("session '{}'", session)));
        }
        Ok(snapshots::list_snapshots(self.conn, session)?
            .iter()
            .map(Snapshot::info)
            .collect())
    }

    pub fn get_snapshot(&self, session: &SessionId, resource_id: &str) -> Result<Snapshot> {
        snapshots::get_snapshot(self.conn, session, resource_id)?
            .ok_or_else(|| snapshot_not_found(session, resource_id))
    }

    /// Compare a snapshot with the live state of its path.
    pub fn diff(&self, session: &SessionId, resource_id: &str) -> Result<ResourceDiff> {
        let snapshot = self.get_snapshot(session, resource_id)?;
        let current = self.graph().state(&snapshot.uri)?;
        Ok(diff_snapshot(&snapshot, current))
    }

    /// Keep the current state and discard the snapshot.
    pub fn approve(&self, session: &SessionId, resource_id: &str) -> Result<()> {
        snapshots::delete_snapshot(self.conn, session, resource_id)?;
        info!(session = %session, resource = %resource_id, "approved change");
        Ok(())
    }

    /// Restore the captured state (or remove a created path) and discard the
    /// snapshot.
    pub fn rollback(&self, session: &SessionId, resource_id: &str) -> Result<RollbackOutcome> {
        let snapshot = self.get_snapshot(session, resource_id)?;
        let graph = self.graph();

        let action = match &snapshot.snapshot_data {
            Some(state) => {
                graph.restore(state)?;
                "restored"
            }
            None => {
                let removed = graph.remove_created(&snapshot.uri)?;
                if removed.removed.is_empty() {
                    warn!(uri = %snapshot.uri, "created path already gone, nothing to roll back");
                    "already absent"
                } else {
                    "deleted"
                }
            }
        };

        snapshots::delete_snapshot(self.conn, session, resource_id)?;
        info!(
            session = %session,
            resource = %resource_id,
            operation = %snapshot.operation_type,
            action,
            "rolled back change"
        );
        Ok(RollbackOutcome {
            resource_id: resource_id.to_string(),
            operation_type: snapshot.operation_type,
            action: action.to_string(),
        })
    }

    /// Approve everything pending in a session. Returns the number of
    /// snapshots discarded.
    pub fn clear_session(&self, session: &SessionId) -> Result<usize> {
        if !snapshots::session_exists(self.conn, session)? {
            return Err(Error::not_found(format!("session '{}'", session)));
        }
        let cleared = snapshots::delete_session(self.conn, session)?;
        info!(session = %session, cleared, "cleared session");
        Ok(cleared)
    }
}
