//! Literal substring search over path URIs and content.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::store::paths;
use crate::types::NodeState;
use crate::uri::MemoryUri;

/// Characters of context kept on each side of a snippet's match.
const SNIPPET_RADIUS: usize = 40;

/// Where a hit matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchField {
    Uri,
    Content,
}

/// A search request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    pub domain: Option<String>,
    pub limit: usize,
    pub case_sensitive: bool,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>, limit: usize) -> Self {
        Self {
            query: query.into(),
            domain: None,
            limit,
            case_sensitive: true,
        }
    }

    pub fn in_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }
}

/// One matching path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub uri: MemoryUri,
    pub title: String,
    pub priority: u32,
    pub disclosure: Option<String>,
    pub matched: MatchField,
    /// Byte offset of the earliest match, in the field it was found in
    pub position: usize,
    /// Excerpt around the first content match, or the head of the content
    pub snippet: String,
}

/// Run a search. Each path aliasing a record is matched on its own.
pub fn search(conn: &Connection, query: &SearchQuery) -> Result<Vec<SearchHit>> {
    if query.query.is_empty() {
        return Err(Error::invalid_arguments("search query must not be empty"));
    }
    if query.limit == 0 {
        return Ok(Vec::new());
    }

    let needle = fold(&query.query, query.case_sensitive);
    let mut hits: Vec<SearchHit> = paths::all_states(conn, query.domain.as_deref())?
        .iter()
        .filter_map(|state| match_state(state, &needle, query.case_sensitive))
        .collect();

    hits.sort_by(|a, b| {
        a.position
            .cmp(&b.position)
            .then_with(|| a.uri.to_string().cmp(&b.uri.to_string()))
    });
    hits.truncate(query.limit);
    Ok(hits)
}

/// ASCII folding keeps byte offsets aligned with the original text.
fn fold(text: &str, case_sensitive: bool) -> String {
    if case_sensitive {
        text.to_string()
    } else {
        text.to_ascii_lowercase()
    }
}

fn match_state(state: &NodeState, needle: &str, case_sensitive: bool) -> Option<SearchHit> {
    let uri_text = fold(&state.path.uri.to_string(), case_sensitive);
    let content = &state.record.content;
    let content_pos = fold(content, case_sensitive).find(needle);

    // the earlier of the two matches decides; ties go to the URI
    let (matched, position) = match (uri_text.find(needle), content_pos) {
        (Some(u), Some(c)) if c < u => (MatchField::Content, c),
        (Some(u), _) => (MatchField::Uri, u),
        (None, Some(c)) => (MatchField::Content, c),
        (None, None) => return None,
    };

    let snippet = match content_pos {
        Some(pos) => snippet(content, pos, needle.len()),
        None => snippet(content, 0, 0),
    };

    Some(SearchHit {
        uri: state.path.uri.clone(),
        title: state.record.title.clone(),
        priority: state.effective_priority(),
        disclosure: state.effective_disclosure().map(str::to_string),
        matched,
        position,
        snippet,
    })
}

/// Excerpt of `text` around `[start, start + len)`, widened to char
/// boundaries and marked with `...` where cut.
fn snippet(text: &str, start: usize, len: usize) -> String {
    let mut from = start.saturating_sub(SNIPPET_RADIUS);
    while !text.is_char_boundary(from) {
        from -= 1;
    }
    let mut to = (start + len + SNIPPET_RADIUS).min(text.len());
    while !text.is_char_boundary(to) {
        to += 1;
    }

    let mut out = String::new();
    if from > 0 {
        out.push_str("...");
    }
    out.push_str(&text[from..to].replace('\n', " "));
    if to < text.len() {
        out.push_str("...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryConfig;
    use crate::graph::{AliasRequest, CreateRequest, MemoryGraph};
    use crate::store::SqliteStore;
    use pretty_assertions::assert_eq;

    fn uri(s: &str) -> MemoryUri {
        MemoryUri::parse(s).unwrap()
    }

    fn seeded() -> SqliteStore {
        let store = SqliteStore::in_memory().unwrap();
        let config = MemoryConfig::default();
        store
            .with_tx(|tx| {
                let graph = MemoryGraph::new(tx, &config);
                for (parent, title, body) in [
                    ("core://", "agent", "The agent remembers the Lighthouse."),
                    ("core://", "lighthouse", "A tall tower by the sea."),
                    ("writer://", "draft", "Chapter one. lighthouse keeper."),
                    ("core://", "empty", ""),
                ] {
                    graph.create(&CreateRequest::new(uri(parent), body, 1).with_title(title))?;
                }
                graph.add_alias(&AliasRequest {
                    new_uri: uri("writer://beacon"),
                    target_uri: uri("core://lighthouse"),
                    priority: None,
                    disclosure: None,
                })?;
                Ok(())
            })
            .unwrap();
        store
    }

    fn run(store: &SqliteStore, query: SearchQuery) -> Vec<SearchHit> {
        store.with_conn(|conn| search(conn, &query)).unwrap()
    }

    fn uris(hits: &[SearchHit]) -> Vec<String> {
        hits.iter().map(|h| h.uri.to_string()).collect()
    }

    #[test]
    fn test_ordered_by_first_match_position() {
        let store = seeded();
        let hits = run(&store, SearchQuery::new("lighthouse", 10));
        assert_eq!(uris(&hits), vec!["core://lighthouse", "writer://draft"]);
        assert_eq!(hits[0].matched, MatchField::Uri);
        assert_eq!(hits[1].matched, MatchField::Content);
    }

    #[test]
    fn test_early_content_match_beats_later_uri_match() {
        let store = SqliteStore::in_memory().unwrap();
        let config = MemoryConfig::default();
        store
            .with_tx(|tx| {
                let graph = MemoryGraph::new(tx, &config);
                graph.create(&CreateRequest::new(uri("core://"), "sky", 1).with_title("bluesky"))?;
                graph.create(&CreateRequest::new(uri("core://"), "bluesky first", 1).with_title("zz"))?;
                graph.create(&CreateRequest::new(uri("core://"), "a bluesky", 1).with_title("aa"))?;
                Ok(())
            })
            .unwrap();

        let hits = run(&store, SearchQuery::new("bluesky", 10));
        let order: Vec<(String, usize, MatchField)> = hits
            .iter()
            .map(|h| (h.uri.to_string(), h.position, h.matched))
            .collect();
        assert_eq!(
            order,
            vec![
                ("core://zz".to_string(), 0, MatchField::Content),
                ("core://aa".to_string(), 2, MatchField::Content),
                ("core://bluesky".to_string(), 7, MatchField::Uri),
            ]
        );
    }

    #[test]
    fn test_case_insensitive() {
        let store = seeded();
        let hits = run(&store, SearchQuery::new("LIGHTHOUSE", 10).case_sensitive(false));
        assert_eq!(
            uris(&hits),
            vec!["core://lighthouse", "writer://draft", "core://agent"]
        );
    }

    #[test]
    fn test_aliases_are_separate_hits() {
        let store = seeded();
        let hits = run(&store, SearchQuery::new("tall tower", 10));
        assert_eq!(uris(&hits), vec!["core://lighthouse", "writer://beacon"]);
    }

    #[test]
    fn test_domain_filter_and_limit() {
        let store = seeded();
        let hits = run(&store, SearchQuery::new("e", 10).in_domain("writer"));
        assert!(hits.iter().all(|h| h.uri.domain() == "writer"));

        let hits = run(&store, SearchQuery::new("e", 2));
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn test_every_hit_contains_query() {
        let store = seeded();
        for hit in run(&store, SearchQuery::new("the", 50)) {
            let state = store
                .with_conn(|conn| paths::get_state(conn, &hit.uri))
                .unwrap()
                .unwrap();
            assert!(
                hit.uri.to_string().contains("the") || state.record.content.contains("the")
            );
        }
    }

    #[test]
    fn test_empty_query_rejected() {
        let store = seeded();
        let err = store
            .with_conn(|conn| search(conn, &SearchQuery::new("", 10)))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArguments(_)));
    }

    #[test]
    fn test_snippet_marks_cuts() {
        let text = format!("{}needle{}", "a".repeat(100), "b".repeat(100));
        let s = snippet(&text, 100, 6);
        assert!(s.starts_with("..."));
        assert!(s.ends_with("..."));
        assert!(s.contains("needle"));
        assert_eq!(snippet("short", 0, 5), "short");
    }

    #[test]
    fn test_snippet_respects_char_boundaries() {
        let text = "记".repeat(30) + "x" + &"忆".repeat(30);
        let s = snippet(&text, 90, 1);
        assert!(s.contains('x'));
    }
}
