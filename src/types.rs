//! Core record types: content records, path entries and their read views.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::uri::MemoryUri;

/// Opaque identifier of a content record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(pub String);

impl ContentId {
    /// Generate a new random content ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ContentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ContentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The owned unit of knowledge. Shared by every path that aliases it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub content_id: ContentId,
    pub content: String,
    /// Display name, independent of any path segment
    pub title: String,
    /// 0 = highest precedence
    pub priority: u32,
    /// When the agent should recall this memory
    pub disclosure: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ContentRecord {
    pub fn new(content: impl Into<String>, title: impl Into<String>, priority: u32) -> Self {
        let now = Utc::now();
        Self {
            content_id: ContentId::new(),
            content: content.into(),
            title: title.into(),
            priority,
            disclosure: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_disclosure(mut self, disclosure: Option<String>) -> Self {
        self.disclosure = disclosure;
        self
    }
}

/// One addressable name for a content record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathEntry {
    pub uri: MemoryUri,
    pub content_id: ContentId,
    pub local_priority: Option<u32>,
    pub local_disclosure: Option<String>,
    /// `None` when the parent is the domain root sentinel
    pub parent_uri: Option<MemoryUri>,
    pub created_at: DateTime<Utc>,
}

impl PathEntry {
    pub fn new(uri: MemoryUri, content_id: ContentId) -> Self {
        let parent_uri = uri.parent().filter(|p| !p.is_root());
        Self {
            uri,
            content_id,
            local_priority: None,
            local_disclosure: None,
            parent_uri,
            created_at: Utc::now(),
        }
    }

    pub fn with_overrides(mut self, priority: Option<u32>, disclosure: Option<String>) -> Self {
        self.local_priority = priority;
        self.local_disclosure = disclosure;
        self
    }
}

/// A path joined with the record it points to.
///
/// This is the projection captured in snapshots and compared by diffs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeState {
    pub path: PathEntry,
    pub record: ContentRecord,
}

impl NodeState {
    pub fn uri(&self) -> &MemoryUri {
        &self.path.uri
    }

    /// Priority after applying the path override.
    pub fn effective_priority(&self) -> u32 {
        self.path.local_priority.unwrap_or(self.record.priority)
    }

    /// Disclosure after applying the path override.
    pub fn effective_disclosure(&self) -> Option<&str> {
        self.path
            .local_disclosure
            .as_deref()
            .or(self.record.disclosure.as_deref())
    }
}

/// Summary of a child path, as listed under its parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildSummary {
    pub uri: MemoryUri,
    /// Path segment
    pub name: String,
    pub title: String,
    pub priority: u32,
    pub disclosure: Option<String>,
}

impl ChildSummary {
    pub fn from_state(state: &NodeState) -> Self {
        Self {
            uri: state.path.uri.clone(),
            name: state.path.uri.title().unwrap_or_default().to_string(),
            title: state.record.title.clone(),
            priority: state.effective_priority(),
            disclosure: state.effective_disclosure().map(str::to_string),
        }
    }
}

/// One step of the breadcrumb chain from the domain root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breadcrumb {
    pub uri: MemoryUri,
    pub label: String,
}

/// Effective view of a node returned by `read`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeView {
    pub uri: MemoryUri,
    /// `None` for a domain root listing
    pub content_id: Option<ContentId>,
    pub title: String,
    pub content: String,
    pub priority: Option<u32>,
    pub disclosure: Option<String>,
    pub children: Vec<ChildSummary>,
    pub breadcrumbs: Vec<Breadcrumb>,
    /// Other paths pointing at the same content
    pub aliases: Vec<MemoryUri>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Kind of virtual `system://` view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemViewKind {
    Boot,
    Index,
    Recent,
}

impl std::fmt::Display for SystemViewKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Boot => write!(f, "boot"),
            Self::Index => write!(f, "index"),
            Self::Recent => write!(f, "recent"),
        }
    }
}

/// Entry of a system view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemEntry {
    pub uri: MemoryUri,
    pub title: String,
    pub priority: u32,
    pub disclosure: Option<String>,
    /// Full content for boot entries, `None` for listings
    pub content: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl SystemEntry {
    pub fn from_state(state: &NodeState, with_content: bool) -> Self {
        Self {
            uri: state.path.uri.clone(),
            title: state.record.title.clone(),
            priority: state.effective_priority(),
            disclosure: state.effective_disclosure().map(str::to_string),
            content: with_content.then(|| state.record.content.clone()),
            updated_at: state.record.updated_at,
        }
    }
}

/// A computed, read-only `system://` view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemView {
    pub uri: MemoryUri,
    pub kind: SystemViewKind,
    pub entries: Vec<SystemEntry>,
    /// Configured URIs that could not be resolved (boot view only)
    pub missing: Vec<String>,
}

/// Result of reading a URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum MemoryView {
    Node(NodeView),
    System(SystemView),
}

impl MemoryView {
    /// The node view, if this is not a system view.
    pub fn as_node(&self) -> Option<&NodeView> {
        match self {
            Self::Node(node) => Some(node),
            Self::System(_) => None,
        }
    }

    pub fn as_system(&self) -> Option<&SystemView> {
        match self {
            Self::System(view) => Some(view),
            Self::Node(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(local_priority: Option<u32>, local_disclosure: Option<&str>) -> NodeState {
        let record = ContentRecord::new("body", "title", 3).with_disclosure(Some("always".into()));
        let path = PathEntry::new(
            MemoryUri::parse("core://a/b").unwrap(),
            record.content_id.clone(),
        )
        .with_overrides(local_priority, local_disclosure.map(str::to_string));
        NodeState { path, record }
    }

    #[test]
    fn test_effective_metadata_falls_back_to_record() {
        let s = state(None, None);
        assert_eq!(s.effective_priority(), 3);
        assert_eq!(s.effective_disclosure(), Some("always"));
    }

    #[test]
    fn test_effective_metadata_prefers_override() {
        let s = state(Some(0), Some("when writing"));
        assert_eq!(s.effective_priority(), 0);
        assert_eq!(s.effective_disclosure(), Some("when writing"));
    }

    #[test]
    fn test_path_entry_parent() {
        let top = PathEntry::new(MemoryUri::parse("core://a").unwrap(), ContentId::new());
        assert_eq!(top.parent_uri, None);
        let nested = PathEntry::new(MemoryUri::parse("core://a/b").unwrap(), ContentId::new());
        assert_eq!(nested.parent_uri.unwrap().to_string(), "core://a");
    }
}
