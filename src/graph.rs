//! The memory graph: content store + path resolver composed into an
//! addressable tree.
//!
//! A [`MemoryGraph`] borrows one connection (normally an open transaction)
//! and the service configuration. It validates and performs mutations but
//! knows nothing about review sessions; the review engine wraps it.

use rusqlite::Connection;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use tracing::debug;

use crate::config::{MemoryConfig, MAX_RECENT_LIMIT};
use crate::error::{Error, Result};
use crate::patch::{apply_edit, UpdateRequest};
use crate::store::{content, paths};
use crate::types::{
    Breadcrumb, ChildSummary, ContentId, ContentRecord, MemoryView, NodeState, NodeView,
    PathEntry, SystemEntry, SystemView, SystemViewKind,
};
use crate::uri::{is_valid_segment, MemoryUri};

/// Arguments of `create_memory`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRequest {
    pub parent_uri: MemoryUri,
    pub content: String,
    pub priority: u32,
    /// Path segment; auto-assigned when absent
    pub title: Option<String>,
    pub disclosure: Option<String>,
}

impl CreateRequest {
    pub fn new(parent_uri: MemoryUri, content: impl Into<String>, priority: u32) -> Self {
        Self {
            parent_uri,
            content: content.into(),
            priority,
            title: None,
            disclosure: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_disclosure(mut self, disclosure: impl Into<String>) -> Self {
        self.disclosure = Some(disclosure.into());
        self
    }
}

/// Arguments of `add_alias`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasRequest {
    pub new_uri: MemoryUri,
    pub target_uri: MemoryUri,
    pub priority: Option<u32>,
    pub disclosure: Option<String>,
}

/// Outcome of deleting a path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteOutcome {
    /// Removed paths with their last state, deepest first
    pub removed: Vec<NodeState>,
    /// Records whose last reference went away
    pub collected: Vec<ContentId>,
}

/// Memory graph operations over one connection.
pub struct MemoryGraph<'a> {
    conn: &'a Connection,
    config: &'a MemoryConfig,
}

impl<'a> MemoryGraph<'a> {
    pub fn new(conn: &'a Connection, config: &'a MemoryConfig) -> Self {
        Self { conn, config }
    }

    // ==================== Validation ====================

    /// Reject system URIs and domains outside the allow-list.
    pub fn check_writable(&self, uri: &MemoryUri) -> Result<()> {
        if uri.is_system() {
            return Err(Error::ReadOnly(uri.to_string()));
        }
        self.check_domain(uri)
    }

    fn check_domain(&self, uri: &MemoryUri) -> Result<()> {
        if !self.config.allows_domain(uri.domain()) {
            return Err(Error::invalid_uri(
                uri.to_string(),
                format!("unknown domain '{}'", uri.domain()),
            ));
        }
        Ok(())
    }

    /// Whether `uri` can act as a parent: a domain root or an existing path.
    fn parent_exists(&self, uri: &MemoryUri) -> Result<bool> {
        if uri.is_root() {
            return Ok(true);
        }
        paths::path_exists(self.conn, uri)
    }

    // ==================== Reads ====================

    /// Current state of a path, if any.
    pub fn state(&self, uri: &MemoryUri) -> Result<Option<NodeState>> {
        if uri.is_system() || uri.is_root() {
            return Ok(None);
        }
        paths::get_state(self.conn, uri)
    }

    /// Current state of a path, or [`Error::NotFound`].
    pub fn require_state(&self, uri: &MemoryUri) -> Result<NodeState> {
        self.state(uri)?
            .ok_or_else(|| Error::not_found(uri.to_string()))
    }

    /// The path at `uri` and its descendants, deepest first.
    pub fn subtree(&self, uri: &MemoryUri) -> Result<Vec<NodeState>> {
        if uri.is_system() || uri.is_root() {
            return Ok(Vec::new());
        }
        paths::subtree_states(self.conn, uri)
    }

    /// Resolve a URI into its view: a node, a domain root listing, or a
    /// virtual system view.
    pub fn read(&self, uri: &MemoryUri) -> Result<MemoryView> {
        if uri.is_system() {
            return self.system_view(uri).map(MemoryView::System);
        }
        self.check_domain(uri)?;
        if uri.is_root() {
            return self.root_view(uri).map(MemoryView::Node);
        }
        self.node_view(uri).map(MemoryView::Node)
    }

    fn node_view(&self, uri: &MemoryUri) -> Result<NodeView> {
        let state = self.require_state(uri)?;
        let aliases = paths::uris_for_content(self.conn, &state.record.content_id)?
            .into_iter()
            .filter(|u| u != uri)
            .collect();

        Ok(NodeView {
            uri: uri.clone(),
            content_id: Some(state.record.content_id.clone()),
            title: state.record.title.clone(),
            content: state.record.content.clone(),
            priority: Some(state.effective_priority()),
            disclosure: state.effective_disclosure().map(str::to_string),
            children: self.children(uri)?,
            breadcrumbs: breadcrumbs(uri),
            aliases,
            updated_at: Some(state.record.updated_at),
        })
    }

    fn root_view(&self, uri: &MemoryUri) -> Result<NodeView> {
        Ok(NodeView {
            uri: uri.clone(),
            content_id: None,
            title: uri.domain().to_string(),
            content: String::new(),
            priority: None,
            disclosure: None,
            children: self.children(uri)?,
            breadcrumbs: breadcrumbs(uri),
            aliases: Vec::new(),
            updated_at: None,
        })
    }

    /// Children ordered by effective priority, then by record title, then by
    /// path segment. Numeric titles and segments compare numerically.
    pub fn children(&self, uri: &MemoryUri) -> Result<Vec<ChildSummary>> {
        let mut children: Vec<ChildSummary> = paths::child_states(self.conn, uri)?
            .iter()
            .map(ChildSummary::from_state)
            .collect();
        children.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| compare_names(&a.title, &b.title))
                .then_with(|| compare_names(&a.name, &b.name))
        });
        Ok(children)
    }

    fn system_view(&self, uri: &MemoryUri) -> Result<SystemView> {
        let segments = uri.segments();
        let (kind, entries, missing) = match segments.first().map(String::as_str) {
            Some("boot") if segments.len() == 1 => {
                let (entries, missing) = self.boot_entries()?;
                (SystemViewKind::Boot, entries, missing)
            }
            Some("index") if segments.len() == 1 => {
                let entries = paths::all_states(self.conn, None)?
                    .iter()
                    .map(|s| SystemEntry::from_state(s, false))
                    .collect();
                (SystemViewKind::Index, entries, Vec::new())
            }
            Some("recent") if segments.len() <= 2 => {
                let limit = match segments.get(1) {
                    Some(raw) => parse_recent_limit(uri, raw)?,
                    None => self.config.recent_limit,
                };
                let entries = paths::recent_states(self.conn, limit)?
                    .iter()
                    .map(|s| SystemEntry::from_state(s, false))
                    .collect();
                (SystemViewKind::Recent, entries, Vec::new())
            }
            _ => return Err(Error::not_found(uri.to_string())),
        };

        Ok(SystemView {
            uri: uri.clone(),
            kind,
            entries,
            missing,
        })
    }

    fn boot_entries(&self) -> Result<(Vec<SystemEntry>, Vec<String>)> {
        let mut entries = Vec::new();
        let mut missing = Vec::new();
        for raw in &self.config.boot_uris {
            let state = match MemoryUri::parse(raw) {
                Ok(uri) => self.state(&uri)?,
                Err(_) => None,
            };
            match state {
                Some(state) => entries.push(SystemEntry::from_state(&state, true)),
                None => missing.push(raw.clone()),
            }
        }
        Ok((entries, missing))
    }

    // ==================== Mutations ====================

    /// Title the next auto-titled child of `parent` gets: one more than the
    /// largest integer sibling name. Once that would pass `u64::MAX`, the
    /// lowest free positive integer is used instead.
    pub fn next_auto_title(&self, parent: &MemoryUri) -> Result<String> {
        let taken: BTreeSet<u64> = paths::child_names(self.conn, parent)?
            .iter()
            .filter_map(|name| name.parse::<u64>().ok())
            .collect();
        let next = match taken.last() {
            None => 1,
            Some(max) => max
                .checked_add(1)
                .unwrap_or_else(|| lowest_free_number(&taken)),
        };
        Ok(next.to_string())
    }

    /// Resolve the URI a create request would produce, validating the parent
    /// and title.
    pub fn resolve_create_uri(&self, request: &CreateRequest) -> Result<MemoryUri> {
        self.check_writable(&request.parent_uri)?;
        if let Some(title) = &request.title {
            if !is_valid_segment(title) {
                return Err(Error::invalid_title(title.clone()));
            }
        }
        if !self.parent_exists(&request.parent_uri)? {
            return Err(Error::ParentNotFound(request.parent_uri.to_string()));
        }
        let title = match &request.title {
            Some(title) => title.clone(),
            None => self.next_auto_title(&request.parent_uri)?,
        };
        request.parent_uri.child(&title)
    }

    /// Create a new record and its path.
    pub fn create(&self, request: &CreateRequest) -> Result<NodeState> {
        let uri = self.resolve_create_uri(request)?;
        let title = uri.title().unwrap_or_default().to_string();

        let record = ContentRecord::new(request.content.clone(), title, request.priority)
            .with_disclosure(normalize_disclosure(request.disclosure.clone()));
        let path = PathEntry::new(uri, record.content_id.clone());

        // The path row references the record, so the record goes first. A
        // duplicate URI fails the second insert and the caller's transaction
        // drops both.
        content::insert_record(self.conn, &record)?;
        paths::insert_path(self.conn, &path)?;

        debug!(uri = %path.uri, content_id = %record.content_id, "created memory");
        Ok(NodeState { path, record })
    }

    /// Add another path to the content of `target_uri`.
    pub fn add_alias(&self, request: &AliasRequest) -> Result<NodeState> {
        self.check_writable(&request.new_uri)?;
        if request.target_uri.is_system() {
            return Err(Error::ReadOnly(request.target_uri.to_string()));
        }
        if request.new_uri.is_root() {
            return Err(Error::invalid_arguments(
                "alias URI must name a path, not a domain root",
            ));
        }

        let target = self
            .state(&request.target_uri)?
            .ok_or_else(|| Error::TargetNotFound(request.target_uri.to_string()))?;

        if let Some(parent) = request.new_uri.parent() {
            if !self.parent_exists(&parent)? {
                return Err(Error::ParentNotFound(parent.to_string()));
            }
        }

        let path = PathEntry::new(request.new_uri.clone(), target.record.content_id.clone())
            .with_overrides(
                request.priority,
                normalize_disclosure(request.disclosure.clone()),
            );
        paths::insert_path(self.conn, &path)?;

        debug!(uri = %path.uri, target = %request.target_uri, "added alias");
        Ok(NodeState {
            path,
            record: target.record,
        })
    }

    /// Remove a path and its descendants, collecting records left without
    /// references.
    pub fn delete_path(&self, uri: &MemoryUri) -> Result<DeleteOutcome> {
        self.check_writable(uri)?;
        let removed = self.subtree(uri)?;
        if removed.is_empty() {
            return Err(Error::not_found(uri.to_string()));
        }
        let outcome = self.remove_states(removed)?;
        debug!(
            uri = %uri,
            removed = outcome.removed.len(),
            collected = outcome.collected.len(),
            "deleted path"
        );
        Ok(outcome)
    }

    fn remove_states(&self, removed: Vec<NodeState>) -> Result<DeleteOutcome> {
        let mut collected = Vec::new();
        for state in &removed {
            if !paths::delete_path(self.conn, &state.path.uri)? {
                return Err(Error::Integrity(format!(
                    "path {} disappeared during deletion",
                    state.path.uri
                )));
            }
            let id = &state.record.content_id;
            if !collected.contains(id) && content::collect_if_unreferenced(self.conn, id)? {
                collected.push(id.clone());
            }
        }
        Ok(DeleteOutcome { removed, collected })
    }

    /// Apply a content edit and/or metadata change.
    pub fn update(&self, uri: &MemoryUri, request: &UpdateRequest) -> Result<NodeState> {
        self.check_writable(uri)?;
        request.validate()?;
        let NodeState {
            mut path,
            mut record,
        } = self.require_state(uri)?;

        let mut record_changed = false;
        if let Some(edit) = &request.edit {
            record.content = apply_edit(&record.content, edit, uri)?;
            record_changed = true;
        }

        let mut path_changed = false;
        if let Some(priority) = request.priority {
            if path.local_priority.is_some() {
                path.local_priority = Some(priority);
                path_changed = true;
            } else {
                record.priority = priority;
                record_changed = true;
            }
        }
        if let Some(disclosure) = &request.disclosure {
            let value = normalize_disclosure(Some(disclosure.clone()));
            if path.local_disclosure.is_some() {
                path.local_disclosure = value;
                path_changed = true;
            } else {
                record.disclosure = value;
                record_changed = true;
            }
        }

        if record_changed {
            record.updated_at = chrono::Utc::now();
            content::update_record(self.conn, &record)?;
        }
        if path_changed {
            paths::update_overrides(
                self.conn,
                uri,
                path.local_priority,
                path.local_disclosure.as_deref(),
            )?;
        }

        debug!(
            uri = %uri,
            content_edit = request.is_content_edit(),
            "updated memory"
        );
        Ok(NodeState { path, record })
    }

    /// Change priority and/or disclosure without touching content.
    pub fn set_metadata(
        &self,
        uri: &MemoryUri,
        priority: Option<u32>,
        disclosure: Option<String>,
    ) -> Result<NodeState> {
        self.update(
            uri,
            &UpdateRequest {
                edit: None,
                priority,
                disclosure,
            },
        )
    }

    // ==================== Restore ====================

    /// Put a path and its record back exactly as captured.
    pub fn restore(&self, snapshot: &NodeState) -> Result<()> {
        let uri = &snapshot.path.uri;
        if let Some(parent) = uri.parent() {
            if !self.parent_exists(&parent)? {
                return Err(Error::ParentNotFound(parent.to_string()));
            }
        }

        content::restore_record(self.conn, &snapshot.record)?;
        match paths::get_path(self.conn, uri)? {
            Some(current) => {
                paths::restore_path(self.conn, &snapshot.path)?;
                if current.content_id != snapshot.path.content_id {
                    content::collect_if_unreferenced(self.conn, &current.content_id)?;
                }
            }
            None => paths::insert_path(self.conn, &snapshot.path)?,
        }
        debug!(uri = %uri, "restored memory");
        Ok(())
    }

    /// Undo a creation: remove the path and its subtree if still present.
    pub fn remove_created(&self, uri: &MemoryUri) -> Result<DeleteOutcome> {
        let removed = self.subtree(uri)?;
        if removed.is_empty() {
            return Ok(DeleteOutcome::default());
        }
        self.remove_states(removed)
    }

    // ==================== Integrity ====================

    /// Verify the reference invariants: every path has its record and parent,
    /// and no record outlives its last path.
    pub fn check_integrity(&self) -> Result<()> {
        let dangling = paths::dangling_paths(self.conn)?;
        if !dangling.is_empty() {
            return Err(Error::Integrity(format!(
                "paths reference missing records: {}",
                dangling.join(", ")
            )));
        }
        let detached = paths::detached_paths(self.conn)?;
        if !detached.is_empty() {
            return Err(Error::Integrity(format!(
                "paths without a parent: {}",
                detached.join(", ")
            )));
        }
        let orphaned = content::orphaned_records(self.conn)?;
        if !orphaned.is_empty() {
            let ids: Vec<String> = orphaned.iter().map(ToString::to_string).collect();
            return Err(Error::Integrity(format!(
                "records without paths: {}",
                ids.join(", ")
            )));
        }
        Ok(())
    }
}

/// `taken` is finite, so a free number exists below `u64::MAX`.
fn lowest_free_number(taken: &BTreeSet<u64>) -> u64 {
    let mut n = 1;
    while taken.contains(&n) {
        n += 1;
    }
    n
}

fn breadcrumbs(uri: &MemoryUri) -> Vec<Breadcrumb> {
    uri.ancestors()
        .into_iter()
        .chain(std::iter::once(uri.clone()))
        .map(|u| Breadcrumb {
            label: u.title().unwrap_or(u.domain()).to_string(),
            uri: u,
        })
        .collect()
}

/// Numeric names sort numerically and before other names.
fn compare_names(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

fn normalize_disclosure(disclosure: Option<String>) -> Option<String> {
    disclosure.filter(|d| !d.trim().is_empty())
}

fn parse_recent_limit(uri: &MemoryUri, raw: &str) -> Result<usize> {
    match raw.parse::<usize>() {
        Ok(n) if (1..=MAX_RECENT_LIMIT).contains(&n) => Ok(n),
        _ => Err(Error::invalid_uri(
            uri.to_string(),
            format!("recent count must be between 1 and {}", MAX_RECENT_LIMIT),
        )),
    }
}
