//! The memory service: agent verbs and the review surface over one store.

use std::sync::{Arc, RwLock};
use tracing::{debug, info, instrument};

use crate::config::MemoryConfig;
use crate::error::{Error, Result};
use crate::graph::{AliasRequest, CreateRequest, DeleteOutcome};
use crate::patch::UpdateRequest;
use crate::review::{
    compare_text, ResourceDiff, ReviewEngine, RollbackOutcome, SessionId, SessionInfo, Snapshot,
    SnapshotInfo, TextDiff,
};
use crate::search::{search, SearchHit, SearchQuery};
use crate::store::SqliteStore;
use crate::types::{MemoryView, NodeState};
use crate::uri::MemoryUri;

/// A memory store instance.
///
/// Cheap to share behind an [`Arc`]; all calls serialize on the store's
/// connection and each runs in its own transaction.
pub struct MemoryService {
    store: SqliteStore,
    config: MemoryConfig,
    session: RwLock<SessionId>,
}

impl MemoryService {
    /// Open the service described by `config`. Without a database path the
    /// store lives in memory.
    pub fn open(config: MemoryConfig) -> Result<Self> {
        config.validate()?;
        let store = match &config.database_path {
            Some(path) => SqliteStore::open(path)?,
            None => SqliteStore::in_memory()?,
        };
        Ok(Self::with_store(store, config))
    }

    /// In-memory service with default configuration.
    pub fn in_memory() -> Result<Self> {
        Self::open(MemoryConfig::default())
    }

    /// Build a service over an existing store.
    pub fn with_store(store: SqliteStore, config: MemoryConfig) -> Self {
        let session = match &config.session_id {
            Some(id) => SessionId::from(id.as_str()),
            None => SessionId::generate(&config.session_prefix),
        };
        info!(session = %session, "memory service ready");
        Self {
            store,
            config,
            session: RwLock::new(session),
        }
    }

    /// Wrap in an [`Arc`] for sharing across threads.
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Session that records the agent's mutations.
    pub fn session_id(&self) -> Result<SessionId> {
        self.session
            .read()
            .map(|s| s.clone())
            .map_err(|e| Error::Internal(format!("Failed to lock session: {}", e)))
    }

    /// Start recording into a freshly generated session.
    pub fn start_new_session(&self) -> Result<SessionId> {
        let fresh = SessionId::generate(&self.config.session_prefix);
        let mut session = self
            .session
            .write()
            .map_err(|e| Error::Internal(format!("Failed to lock session: {}", e)))?;
        *session = fresh.clone();
        info!(session = %fresh, "started review session");
        Ok(fresh)
    }

    fn write<T>(&self, f: impl FnOnce(&ReviewEngine, &SessionId) -> Result<T>) -> Result<T> {
        let session = self.session_id()?;
        let config = &self.config;
        self.store
            .with_tx(|tx| f(&ReviewEngine::new(tx, config), &session))
    }

    fn read<T>(&self, f: impl FnOnce(&ReviewEngine) -> Result<T>) -> Result<T> {
        let config = &self.config;
        self.store
            .with_conn(|conn| f(&ReviewEngine::new(conn, config)))
    }

    // ==================== Agent verbs ====================

    /// Read a node, a domain root listing or a `system://` view.
    #[instrument(skip(self))]
    pub fn read_memory(&self, uri: &str) -> Result<MemoryView> {
        let uri = MemoryUri::parse(uri)?;
        self.read(|engine| engine.graph().read(&uri))
    }

    #[instrument(skip(self, request), fields(parent = %request.parent_uri))]
    pub fn create_memory(&self, request: &CreateRequest) -> Result<NodeState> {
        let created = self.write(|engine, session| engine.create(session, request))?;
        info!(uri = %created.uri(), "memory created");
        Ok(created)
    }

    #[instrument(skip(self, request))]
    pub fn update_memory(&self, uri: &str, request: &UpdateRequest) -> Result<NodeState> {
        let uri = MemoryUri::parse(uri)?;
        request.validate()?;
        self.write(|engine, session| engine.update(session, &uri, request))
    }

    /// Delete a path and everything beneath it.
    #[instrument(skip(self))]
    pub fn delete_memory(&self, uri: &str) -> Result<DeleteOutcome> {
        let uri = MemoryUri::parse(uri)?;
        let outcome = self.write(|engine, session| engine.delete(session, &uri))?;
        info!(
            removed = outcome.removed.len(),
            collected = outcome.collected.len(),
            "memory deleted"
        );
        Ok(outcome)
    }

    #[instrument(skip(self, request), fields(new_uri = %request.new_uri, target = %request.target_uri))]
    pub fn add_alias(&self, request: &AliasRequest) -> Result<NodeState> {
        self.write(|engine, session| engine.add_alias(session, request))
    }

    /// Substring search. `limit` defaults to the configured search limit.
    #[instrument(skip(self))]
    pub fn search_memory(
        &self,
        query: &str,
        domain: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<SearchHit>> {
        let mut request = SearchQuery::new(query, limit.unwrap_or(self.config.default_search_limit))
            .case_sensitive(self.config.search_case_sensitive);
        if let Some(domain) = domain {
            request = request.in_domain(domain);
        }
        let hits = self.store.with_conn(|conn| search(conn, &request))?;
        debug!(hits = hits.len(), "search finished");
        Ok(hits)
    }

    // ==================== Review surface ====================

    pub fn list_sessions(&self) -> Result<Vec<SessionInfo>> {
        self.read(|engine| engine.list_sessions())
    }

    pub fn list_snapshots(&self, session_id: &str) -> Result<Vec<SnapshotInfo>> {
        self.read(|engine| engine.list_snapshots(&SessionId::from(session_id)))
    }

    pub fn get_snapshot(&self, session_id: &str, resource_id: &str) -> Result<Snapshot> {
        self.read(|engine| engine.get_snapshot(&SessionId::from(session_id), resource_id))
    }

    pub fn diff(&self, session_id: &str, resource_id: &str) -> Result<ResourceDiff> {
        self.read(|engine| engine.diff(&SessionId::from(session_id), resource_id))
    }

    #[instrument(skip(self))]
    pub fn approve(&self, session_id: &str, resource_id: &str) -> Result<()> {
        self.write(|engine, _| engine.approve(&SessionId::from(session_id), resource_id))
    }

    #[instrument(skip(self))]
    pub fn rollback(&self, session_id: &str, resource_id: &str) -> Result<RollbackOutcome> {
        self.write(|engine, _| engine.rollback(&SessionId::from(session_id), resource_id))
    }

    #[instrument(skip(self))]
    pub fn clear_session(&self, session_id: &str) -> Result<usize> {
        self.write(|engine, _| engine.clear_session(&SessionId::from(session_id)))
    }

    pub fn compare_text(&self, old: &str, new: &str) -> TextDiff {
        compare_text(old, new)
    }

    /// Verify reference counts and parent links.
    pub fn check_integrity(&self) -> Result<()> {
        self.read(|engine| engine.graph().check_integrity())
    }
}
