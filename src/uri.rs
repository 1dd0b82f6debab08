//! Memory URIs: `domain://segment/segment...`.
//!
//! A URI with no segments (`core://`) names the domain root sentinel. The
//! root has no path entry of its own; it only exists as a creation parent and
//! as a virtual listing of top-level paths.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::error::{Error, Result};

/// Domain reserved for virtual, read-only views.
pub const SYSTEM_DOMAIN: &str = "system";

/// Allowed charset for domains and path segments.
static SEGMENT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9_-]+$").expect("Invalid regex"));

/// Check whether a title/segment uses only the allowed charset.
pub fn is_valid_segment(segment: &str) -> bool {
    SEGMENT_PATTERN.is_match(segment)
}

/// A parsed memory URI.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MemoryUri {
    domain: String,
    segments: Vec<String>,
}

impl MemoryUri {
    /// Parse a URI string.
    ///
    /// Segments with characters outside `[a-z0-9_-]` are reported as
    /// [`Error::InvalidTitle`], since a segment is the title of its path.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let (domain, rest) = trimmed
            .split_once("://")
            .ok_or_else(|| Error::invalid_uri(raw, "expected 'domain://path'"))?;

        if !is_valid_segment(domain) {
            return Err(Error::invalid_uri(raw, "domain must match [a-z0-9_-]+"));
        }

        let rest = rest.strip_suffix('/').unwrap_or(rest);
        let mut segments = Vec::new();
        if !rest.is_empty() {
            for segment in rest.split('/') {
                if segment.is_empty() {
                    return Err(Error::invalid_uri(raw, "empty path segment"));
                }
                if !is_valid_segment(segment) {
                    return Err(Error::invalid_title(segment));
                }
                segments.push(segment.to_string());
            }
        }

        Ok(Self {
            domain: domain.to_string(),
            segments,
        })
    }

    /// The root sentinel of a domain.
    pub fn root(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            segments: Vec::new(),
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Whether this URI is a domain root sentinel.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Whether this URI addresses the virtual `system://` views.
    pub fn is_system(&self) -> bool {
        self.domain == SYSTEM_DOMAIN
    }

    /// Last segment, i.e. the path title. `None` for a domain root.
    pub fn title(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Parent URI. The parent of a top-level path is the domain root; a domain
    /// root has no parent.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        Some(Self {
            domain: self.domain.clone(),
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Append a validated segment.
    pub fn child(&self, segment: &str) -> Result<Self> {
        if !is_valid_segment(segment) {
            return Err(Error::invalid_title(segment));
        }
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Ok(Self {
            domain: self.domain.clone(),
            segments,
        })
    }

    /// All ancestors from the domain root down to (excluding) this URI.
    pub fn ancestors(&self) -> Vec<Self> {
        (0..self.segments.len())
            .map(|depth| Self {
                domain: self.domain.clone(),
                segments: self.segments[..depth].to_vec(),
            })
            .collect()
    }

    /// Whether `self` is `other` or lies beneath it.
    pub fn starts_with(&self, other: &Self) -> bool {
        self.domain == other.domain && self.segments.starts_with(&other.segments)
    }
}

impl std::fmt::Display for MemoryUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}://{}", self.domain, self.segments.join("/"))
    }
}

impl std::str::FromStr for MemoryUri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for MemoryUri {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<MemoryUri> for String {
    fn from(uri: MemoryUri) -> Self {
        uri.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested() {
        let uri = MemoryUri::parse("core://agent/style_guide").unwrap();
        assert_eq!(uri.domain(), "core");
        assert_eq!(uri.segments(), &["agent", "style_guide"]);
        assert_eq!(uri.title(), Some("style_guide"));
        assert_eq!(uri.to_string(), "core://agent/style_guide");
    }

    #[test]
    fn test_parse_root() {
        let uri = MemoryUri::parse("writer://").unwrap();
        assert!(uri.is_root());
        assert_eq!(uri.parent(), None);
        assert_eq!(uri.to_string(), "writer://");
    }

    #[test]
    fn test_trailing_slash_is_ignored() {
        assert_eq!(
            MemoryUri::parse("core://a/b/").unwrap(),
            MemoryUri::parse("core://a/b").unwrap()
        );
    }

    #[test]
    fn test_bad_segment_is_invalid_title() {
        let err = MemoryUri::parse("core://agent/Style Guide").unwrap_err();
        assert!(matches!(err, Error::InvalidTitle { .. }));
    }

    #[test]
    fn test_structural_errors() {
        assert!(matches!(
            MemoryUri::parse("core/agent"),
            Err(Error::InvalidUri { .. })
        ));
        assert!(matches!(
            MemoryUri::parse("core://a//b"),
            Err(Error::InvalidUri { .. })
        ));
        assert!(matches!(
            MemoryUri::parse("Core://a"),
            Err(Error::InvalidUri { .. })
        ));
    }

    #[test]
    fn test_parent_and_ancestors() {
        let uri = MemoryUri::parse("core://a/b/c").unwrap();
        assert_eq!(uri.parent().unwrap().to_string(), "core://a/b");
        let ancestors: Vec<String> = uri.ancestors().iter().map(|u| u.to_string()).collect();
        assert_eq!(ancestors, vec!["core://", "core://a", "core://a/b"]);
        assert!(uri.starts_with(&MemoryUri::parse("core://a").unwrap()));
        assert!(!uri.starts_with(&MemoryUri::parse("writer://a").unwrap()));
    }

    #[test]
    fn test_child_validates() {
        let root = MemoryUri::root("core");
        assert_eq!(root.child("7").unwrap().to_string(), "core://7");
        assert!(root.child("Nope").is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let uri = MemoryUri::parse("core://a").unwrap();
        let json = serde_json::to_string(&uri).unwrap();
        assert_eq!(json, "\"core://a\"");
        let back: MemoryUri = serde_json::from_str(&json).unwrap();
        assert_eq!(back, uri);
    }
}
