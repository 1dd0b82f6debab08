//! Service configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::uri::{is_valid_segment, MemoryUri, SYSTEM_DOMAIN};

/// Upper bound for `system://recent/N`.
pub const MAX_RECENT_LIMIT: usize = 100;

/// Configuration for a [`MemoryService`](crate::MemoryService).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Path to the SQLite database (None = in-memory)
    pub database_path: Option<PathBuf>,
    /// Domains that may hold paths. Empty accepts any well-formed domain.
    pub valid_domains: Vec<String>,
    /// URIs loaded, in order, by `system://boot`
    pub boot_uris: Vec<String>,
    /// Prefix for generated session IDs
    pub session_prefix: String,
    /// Fixed session ID; generated per service instance when absent
    pub session_id: Option<String>,
    /// Whether substring search is case-sensitive
    pub search_case_sensitive: bool,
    /// Result cap when a search gives no limit
    pub default_search_limit: usize,
    /// Entry count of `system://recent` without an explicit `/N`
    pub recent_limit: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            valid_domains: vec![
                "core".to_string(),
                "writer".to_string(),
                "game".to_string(),
                "notes".to_string(),
            ],
            boot_uris: vec!["core://agent".to_string(), "core://my_user".to_string()],
            session_prefix: "mcp".to_string(),
            session_id: None,
            search_case_sensitive: true,
            default_search_limit: 10,
            recent_limit: 10,
        }
    }
}

impl MemoryConfig {
    /// Create configuration from environment variables.
    ///
    /// - `MEMORY_DB_PATH`: database file (`~` is expanded)
    /// - `MEMORY_VALID_DOMAINS`: comma-separated domain allow-list
    /// - `MEMORY_BOOT_URIS`: comma-separated URIs for `system://boot`
    /// - `MEMORY_SESSION_ID`: fixed review session ID
    /// - `MEMORY_SEARCH_CASE_SENSITIVE`: `0`/`false` for case-insensitive search
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            database_path: lookup("MEMORY_DB_PATH")
                .filter(|s| !s.trim().is_empty())
                .map(|s| PathBuf::from(shellexpand::tilde(s.trim()).into_owned())),
            valid_domains: lookup("MEMORY_VALID_DOMAINS")
                .map(|s| split_list(&s))
                .unwrap_or(defaults.valid_domains),
            boot_uris: lookup("MEMORY_BOOT_URIS")
                .map(|s| split_list(&s))
                .unwrap_or(defaults.boot_uris),
            session_prefix: defaults.session_prefix,
            session_id: lookup("MEMORY_SESSION_ID").filter(|s| !s.trim().is_empty()),
            search_case_sensitive: lookup("MEMORY_SEARCH_CASE_SENSITIVE")
                .map(|s| s != "0" && s.to_lowercase() != "false")
                .unwrap_or(defaults.search_case_sensitive),
            default_search_limit: defaults.default_search_limit,
            recent_limit: defaults.recent_limit,
        };
        config.validate()?;
        Ok(config)
    }

    /// Set the database path.
    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Set the domain allow-list.
    pub fn with_valid_domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.valid_domains = domains.into_iter().map(Into::into).collect();
        self
    }

    /// Set the URIs shown by `system://boot`.
    pub fn with_boot_uris<I, S>(mut self, uris: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.boot_uris = uris.into_iter().map(Into::into).collect();
        self
    }

    /// Use a fixed session ID.
    pub fn with_session_id(mut self, id: impl Into<String>) -> Self {
        self.session_id = Some(id.into());
        self
    }

    /// Choose case-sensitive or case-insensitive search.
    pub fn with_case_sensitive_search(mut self, case_sensitive: bool) -> Self {
        self.search_case_sensitive = case_sensitive;
        self
    }

    /// Check the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        for domain in &self.valid_domains {
            if !is_valid_segment(domain) {
                return Err(Error::Config(format!("invalid domain name: '{}'", domain)));
            }
            if domain == SYSTEM_DOMAIN {
                return Err(Error::Config(format!(
                    "'{}' is reserved for read-only views",
                    SYSTEM_DOMAIN
                )));
            }
        }
        for uri in &self.boot_uris {
            MemoryUri::parse(uri)
                .map_err(|e| Error::Config(format!("invalid boot URI '{}': {}", uri, e)))?;
        }
        if self.default_search_limit == 0 {
            return Err(Error::Config("default_search_limit must be positive".into()));
        }
        if self.recent_limit == 0 || self.recent_limit > MAX_RECENT_LIMIT {
            return Err(Error::Config(format!(
                "recent_limit must be between 1 and {}",
                MAX_RECENT_LIMIT
            )));
        }
        Ok(())
    }

    /// Whether paths may live in `domain`.
    pub fn allows_domain(&self, domain: &str) -> bool {
        domain != SYSTEM_DOMAIN
            && (self.valid_domains.is_empty() || self.valid_domains.iter().any(|d| d == domain))
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = MemoryConfig::default();
        config.validate().unwrap();
        assert!(config.allows_domain("core"));
        assert!(!config.allows_domain("system"));
        assert!(!config.allows_domain("elsewhere"));
    }

    #[test]
    fn test_from_lookup() {
        let config = MemoryConfig::from_lookup(lookup(&[
            ("MEMORY_DB_PATH", "/tmp/memory.db"),
            ("MEMORY_VALID_DOMAINS", "core, diary"),
            ("MEMORY_BOOT_URIS", "core://agent,diary://today"),
            ("MEMORY_SEARCH_CASE_SENSITIVE", "false"),
        ]))
        .unwrap();

        assert_eq!(config.database_path, Some(PathBuf::from("/tmp/memory.db")));
        assert_eq!(config.valid_domains, vec!["core", "diary"]);
        assert_eq!(config.boot_uris.len(), 2);
        assert!(!config.search_case_sensitive);
    }

    #[test]
    fn test_tilde_is_expanded() {
        let config =
            MemoryConfig::from_lookup(lookup(&[("MEMORY_DB_PATH", "~/memory.db")])).unwrap();
        let path = config.database_path.unwrap();
        assert!(!path.to_string_lossy().starts_with('~') || std::env::var("HOME").is_err());
    }

    #[test]
    fn test_empty_allow_list_accepts_any_domain() {
        let config = MemoryConfig::default().with_valid_domains(Vec::<String>::new());
        assert!(config.allows_domain("anything"));
        assert!(!config.allows_domain("system"));
    }

    #[test]
    fn test_rejects_reserved_domain() {
        let err = MemoryConfig::from_lookup(lookup(&[("MEMORY_VALID_DOMAINS", "core,system")]))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_rejects_bad_boot_uri() {
        let err = MemoryConfig::default()
            .with_boot_uris(["not a uri"])
            .validate()
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
