//! Review session types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::NodeState;
use crate::uri::MemoryUri;

/// Resource type recorded for path snapshots.
pub const RESOURCE_TYPE_PATH: &str = "path";

/// Identifier of a review session, e.g. `mcp_20260101_120000_3f9a0c1d`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// Generate a fresh session ID stamped with the current UTC time.
    pub fn generate(prefix: &str) -> Self {
        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let random = Uuid::new_v4().simple().to_string();
        Self(format!("{}_{}_{}", prefix, stamp, &random[..8]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Kind of change a snapshot stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    Create,
    CreateAlias,
    ModifyContent,
    ModifyMeta,
    Delete,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::CreateAlias => "create_alias",
            Self::ModifyContent => "modify_content",
            Self::ModifyMeta => "modify_meta",
            Self::Delete => "delete",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "create" => Ok(Self::Create),
            "create_alias" => Ok(Self::CreateAlias),
            "modify_content" => Ok(Self::ModifyContent),
            "modify_meta" => Ok(Self::ModifyMeta),
            "delete" => Ok(Self::Delete),
            other => Err(Error::Internal(format!("unknown operation type: {}", other))),
        }
    }

    /// Whether the resource did not exist when the snapshot was taken.
    pub fn is_creation(&self) -> bool {
        matches!(self, Self::Create | Self::CreateAlias)
    }

    /// Operation type after a later mutation of the same resource.
    pub fn merge(self, later: OperationType) -> Self {
        use OperationType::*;
        match (self, later) {
            (Create | CreateAlias, _) => self,
            (Delete, Delete) => Delete,
            // the path came back after being deleted
            (Delete, _) => ModifyContent,
            (_, Delete) => Delete,
            (ModifyMeta, ModifyMeta) => ModifyMeta,
            (ModifyMeta | ModifyContent, _) => ModifyContent,
        }
    }
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Pre-mutation state of one resource within one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub session_id: SessionId,
    /// The path URI, as a string
    pub resource_id: String,
    pub uri: MemoryUri,
    pub resource_type: String,
    pub operation_type: OperationType,
    /// State before the first mutation; `None` when the session created it
    pub snapshot_data: Option<NodeState>,
    pub snapshot_time: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(
        session_id: SessionId,
        uri: MemoryUri,
        operation_type: OperationType,
        snapshot_data: Option<NodeState>,
    ) -> Self {
        Self {
            session_id,
            resource_id: uri.to_string(),
            uri,
            resource_type: RESOURCE_TYPE_PATH.to_string(),
            operation_type,
            snapshot_data,
            snapshot_time: Utc::now(),
        }
    }

    pub fn info(&self) -> SnapshotInfo {
        SnapshotInfo {
            resource_id: self.resource_id.clone(),
            uri: self.uri.clone(),
            resource_type: self.resource_type.clone(),
            operation_type: self.operation_type,
            snapshot_time: self.snapshot_time,
        }
    }
}

/// A session with pending snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: SessionId,
    pub created_at: DateTime<Utc>,
    pub pending_count: usize,
}

/// Listing entry for a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotInfo {
    pub resource_id: String,
    pub uri: MemoryUri,
    pub resource_type: String,
    pub operation_type: OperationType,
    pub snapshot_time: DateTime<Utc>,
}

/// A changed field between snapshot and current state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub before: Option<String>,
    pub after: Option<String>,
}

/// Line diff of two texts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextDiff {
    pub unified: String,
    pub summary: String,
    pub additions: usize,
    pub deletions: usize,
}

impl TextDiff {
    pub fn has_changes(&self) -> bool {
        self.additions > 0 || self.deletions > 0
    }
}

/// Difference between a snapshot and the current state of its resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDiff {
    pub resource_id: String,
    pub uri: MemoryUri,
    pub resource_type: String,
    pub operation_type: OperationType,
    pub snapshot_time: DateTime<Utc>,
    pub has_changes: bool,
    pub diff_summary: String,
    pub diff_unified: String,
    pub changes: Vec<FieldChange>,
    pub snapshot_data: Option<NodeState>,
    pub current_data: Option<NodeState>,
}

/// Outcome of a rollback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackOutcome {
    pub resource_id: String,
    pub operation_type: OperationType,
    /// What the rollback did, e.g. "restored" or "deleted"
    pub action: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use OperationType::*;

    #[test]
    fn test_session_id_format() {
        let id = SessionId::generate("mcp");
        let parts: Vec<&str> = id.as_str().split('_').collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], "mcp");
        assert_eq!(parts[1].len(), 8);
        assert_eq!(parts[2].len(), 6);
        assert_eq!(parts[3].len(), 8);
        assert_ne!(id, SessionId::generate("mcp"));
    }

    #[test]
    fn test_operation_type_roundtrip() {
        for op in [Create, CreateAlias, ModifyContent, ModifyMeta, Delete] {
            assert_eq!(OperationType::parse(op.as_str()).unwrap(), op);
        }
        assert!(OperationType::parse("rename").is_err());
    }

    #[test]
    fn test_merge() {
        assert_eq!(Create.merge(ModifyContent), Create);
        assert_eq!(CreateAlias.merge(Delete), CreateAlias);
        assert_eq!(ModifyMeta.merge(ModifyMeta), ModifyMeta);
        assert_eq!(ModifyMeta.merge(ModifyContent), ModifyContent);
        assert_eq!(ModifyContent.merge(ModifyMeta), ModifyContent);
        assert_eq!(ModifyContent.merge(Delete), Delete);
        assert_eq!(Delete.merge(Create), ModifyContent);
        assert_eq!(Delete.merge(Delete), Delete);
    }
}
