//! # nocturne-memory
//!
//! A hierarchical, URI-addressed long-term memory store for language-model
//! agents, with reviewable and reversible mutations.
//!
//! ## Core Components
//!
//! - **Store**: SQLite-backed content records and the paths that name them
//! - **Graph**: create, read, alias, patch and delete over `domain://a/b` URIs
//! - **Patch**: exact-substring replacement and append edits
//! - **Review**: per-session snapshots with diff, approve and rollback
//! - **Search**: literal substring search over URIs and content
//! - **Tools**: the agent verbs and review surface as MCP tools
//!
//! ## Example
//!
//! ```rust,ignore
//! use nocturne_memory::{CreateRequest, MemoryService, MemoryUri, UpdateRequest};
//!
//! let service = MemoryService::in_memory()?;
//! service.create_memory(
//!     &CreateRequest::new(MemoryUri::root("core"), "Prefers short answers.", 1)
//!         .with_title("my_user"),
//! )?;
//! service.update_memory("core://my_user", &UpdateRequest::append("Lives in Oslo."))?;
//!
//! let session = service.session_id()?;
//! let diff = service.diff(session.as_str(), "core://my_user")?;
//! println!("{}", diff.diff_summary);
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod patch;
mod proptest;
pub mod review;
pub mod search;
pub mod service;
pub mod store;
pub mod tools;
pub mod types;
pub mod uri;

// Re-exports for convenience
pub use config::{MemoryConfig, MAX_RECENT_LIMIT};
pub use error::{Error, Result};
pub use graph::{AliasRequest, CreateRequest, DeleteOutcome, MemoryGraph};
pub use patch::{ContentEdit, UpdateRequest};
pub use review::{
    compare_text, FieldChange, OperationType, ResourceDiff, ReviewEngine, RollbackOutcome,
    SessionId, SessionInfo, Snapshot, SnapshotInfo, TextDiff,
};
pub use search::{MatchField, SearchHit, SearchQuery};
pub use service::MemoryService;
pub use store::SqliteStore;
pub use tools::{McpTool, McpToolRegistry, ToolExample, ToolHandler};
pub use types::{
    Breadcrumb, ChildSummary, ContentId, ContentRecord, MemoryView, NodeState, NodeView,
    PathEntry, SystemEntry, SystemView, SystemViewKind,
};
pub use uri::MemoryUri;
