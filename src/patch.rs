//! Patch engine: the two content edit modes.
//!
//! - **Replace**: `old_string` must occur exactly once in the current
//!   content. Overlapping occurrences count, so `"aa"` is ambiguous in
//!   `"aaa"`. An empty `new_string` deletes the matched span.
//! - **Append**: text is added at the end, separated by a single newline
//!   when the content is non-empty and does not already end with one.
//!
//! There is deliberately no whole-document replacement mode.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::uri::MemoryUri;

/// Separator inserted before appended text.
pub const APPEND_SEPARATOR: char = '\n';

/// A content edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ContentEdit {
    Replace {
        old_string: String,
        new_string: String,
    },
    Append {
        text: String,
    },
}

/// A validated `update_memory` request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRequest {
    pub edit: Option<ContentEdit>,
    pub priority: Option<u32>,
    /// `Some("")` clears the disclosure
    pub disclosure: Option<String>,
}

impl UpdateRequest {
    /// Exact-substring replacement.
    pub fn replace(old_string: impl Into<String>, new_string: impl Into<String>) -> Self {
        Self {
            edit: Some(ContentEdit::Replace {
                old_string: old_string.into(),
                new_string: new_string.into(),
            }),
            ..Default::default()
        }
    }

    /// Append to the end of the content.
    pub fn append(text: impl Into<String>) -> Self {
        Self {
            edit: Some(ContentEdit::Append { text: text.into() }),
            ..Default::default()
        }
    }

    /// Metadata-only update.
    pub fn metadata() -> Self {
        Self::default()
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_disclosure(mut self, disclosure: impl Into<String>) -> Self {
        self.disclosure = Some(disclosure.into());
        self
    }

    /// Build a request from the raw tool arguments, rejecting invalid
    /// combinations.
    pub fn from_parts(
        old_string: Option<String>,
        new_string: Option<String>,
        append: Option<String>,
        priority: Option<u32>,
        disclosure: Option<String>,
    ) -> Result<Self> {
        let edit = match (old_string, new_string, append) {
            (Some(_), _, Some(_)) | (_, Some(_), Some(_)) => {
                return Err(Error::invalid_arguments(
                    "patch (old_string/new_string) and append are mutually exclusive",
                ))
            }
            (Some(old_string), Some(new_string), None) => Some(ContentEdit::Replace {
                old_string,
                new_string,
            }),
            (Some(_), None, None) => {
                return Err(Error::invalid_arguments(
                    "old_string requires new_string (use \"\" to delete the match)",
                ))
            }
            (None, Some(_), None) => {
                return Err(Error::invalid_arguments("new_string requires old_string"))
            }
            (None, None, Some(text)) => Some(ContentEdit::Append { text }),
            (None, None, None) => None,
        };

        let request = Self {
            edit,
            priority,
            disclosure,
        };
        request.validate()?;
        Ok(request)
    }

    /// Check the request is non-empty and each part is well formed.
    pub fn validate(&self) -> Result<()> {
        match &self.edit {
            Some(ContentEdit::Replace { old_string, .. }) if old_string.is_empty() => {
                Err(Error::invalid_arguments("old_string must not be empty"))
            }
            Some(ContentEdit::Append { text }) if text.is_empty() => {
                Err(Error::invalid_arguments("append text must not be empty"))
            }
            None if !self.has_metadata() => Err(Error::invalid_arguments(
                "nothing to update: give old_string/new_string, append, priority or disclosure",
            )),
            _ => Ok(()),
        }
    }

    /// Whether the request edits content (as opposed to metadata only).
    pub fn is_content_edit(&self) -> bool {
        self.edit.is_some()
    }

    pub fn has_metadata(&self) -> bool {
        self.priority.is_some() || self.disclosure.is_some()
    }
}

/// Count occurrences of `needle`, including overlapping ones, stopping once
/// `cap` is reached.
pub fn count_occurrences(haystack: &str, needle: &str, cap: usize) -> usize {
    if needle.is_empty() {
        return 0;
    }
    let mut count = 0;
    let mut start = 0;
    while let Some(pos) = haystack[start..].find(needle) {
        count += 1;
        if count >= cap {
            break;
        }
        let at = start + pos;
        // advance by one character so overlapping matches are seen
        let step = haystack[at..].chars().next().map_or(1, char::len_utf8);
        start = at + step;
    }
    count
}

/// Apply an edit to `content`, returning the new content. `uri` is only used
/// for error reporting.
pub fn apply_edit(content: &str, edit: &ContentEdit, uri: &MemoryUri) -> Result<String> {
    match edit {
        ContentEdit::Replace {
            old_string,
            new_string,
        } => {
            if old_string.is_empty() {
                return Err(Error::invalid_arguments("old_string must not be empty"));
            }
            match count_occurrences(content, old_string, 2) {
                0 => Err(Error::NoMatch {
                    uri: uri.to_string(),
                }),
                1 => Ok(content.replacen(old_string.as_str(), new_string, 1)),
                _ => Err(Error::AmbiguousMatch {
                    uri: uri.to_string(),
                    count: count_occurrences(content, old_string, usize::MAX),
                }),
            }
        }
        ContentEdit::Append { text } => {
            if text.is_empty() {
                return Err(Error::invalid_arguments("append text must not be empty"));
            }
            let mut updated = String::with_capacity(content.len() + text.len() + 1);
            updated.push_str(content);
            if !content.is_empty() && !content.ends_with(APPEND_SEPARATOR) {
                updated.push(APPEND_SEPARATOR);
            }
            updated.push_str(text);
            Ok(updated)
        }
    }
}
