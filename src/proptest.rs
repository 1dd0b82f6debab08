//! Property-based tests for the patch engine and review rollback using
//! proptest.
//!
//! - A replacement followed by its inverse restores the original content
//! - A failed patch leaves content untouched
//! - Append always keeps the old content as a prefix
//! - Rolling back any sequence of edits restores the captured state

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::config::MemoryConfig;
    use crate::error::Error;
    use crate::graph::CreateRequest;
    use crate::patch::{apply_edit, count_occurrences, ContentEdit, UpdateRequest};
    use crate::service::MemoryService;
    use crate::uri::MemoryUri;

    fn uri() -> MemoryUri {
        MemoryUri::parse("core://note").unwrap()
    }

    // Short words so that collisions between needles are common
    fn word() -> impl Strategy<Value = String> {
        "[a-c]{1,3}"
    }

    fn text() -> impl Strategy<Value = String> {
        prop::collection::vec(word(), 0..8).prop_map(|words| words.join(" "))
    }

    // =========================================================================
    // Patch Properties
    // =========================================================================

    proptest! {
        /// A -> B -> A gives back the original when both needles are unique.
        #[test]
        fn replace_then_inverse_restores(
            prefix in text(),
            suffix in text(),
            a in "[xyz]{1,4}",
            b in "[XYZ]{1,4}",
        ) {
            let content = format!("{}<{}>{}", prefix, a, suffix);
            let forward = ContentEdit::Replace { old_string: a.clone(), new_string: b.clone() };
            prop_assume!(count_occurrences(&content, &a, 2) == 1);

            let edited = apply_edit(&content, &forward, &uri()).unwrap();
            prop_assume!(count_occurrences(&edited, &b, 2) == 1);

            let back = ContentEdit::Replace { old_string: b, new_string: a };
            prop_assert_eq!(apply_edit(&edited, &back, &uri()).unwrap(), content);
        }

        /// Patches that do not match exactly once are rejected.
        #[test]
        fn non_unique_patch_is_rejected(content in text(), needle in word()) {
            let edit = ContentEdit::Replace {
                old_string: needle.clone(),
                new_string: "Q".into(),
            };
            let expected = count_occurrences(&content, &needle, usize::MAX);
            let result = apply_edit(&content, &edit, &uri());
            match (expected, result) {
                (0, Err(Error::NoMatch { .. })) => {}
                (1, Ok(_)) => {}
                (n, Err(Error::AmbiguousMatch { count, .. })) if n > 1 => {
                    prop_assert_eq!(count, n);
                }
                (n, other) => {
                    prop_assert!(false, "{} occurrences, got {:?}", n, other);
                }
            }
        }

        /// Appending keeps everything that was there.
        #[test]
        fn append_keeps_prefix(content in text(), extra in "[a-z]{1,10}") {
            let edit = ContentEdit::Append { text: extra.clone() };
            let out = apply_edit(&content, &edit, &uri()).unwrap();
            prop_assert!(out.starts_with(&content));
            prop_assert!(out.ends_with(&extra));
            prop_assert!(out.len() <= content.len() + extra.len() + 1);
        }
    }

    // =========================================================================
    // Rollback Properties
    // =========================================================================

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        /// Whatever edits a session applies, rollback returns to the snapshot.
        #[test]
        fn rollback_restores_captured_state(
            initial in text(),
            appends in prop::collection::vec("[a-z]{1,5}", 1..5),
            priority in 0u32..5,
        ) {
            let svc = MemoryService::open(MemoryConfig::default().with_session_id("mcp_prop"))
                .unwrap();
            let original = svc
                .create_memory(&CreateRequest::new(MemoryUri::root("core"), initial, 2).with_title("note"))
                .unwrap();
            svc.approve("mcp_prop", "core://note").unwrap();

            for extra in &appends {
                svc.update_memory("core://note", &UpdateRequest::append(extra.clone())).unwrap();
            }
            svc.update_memory("core://note", &UpdateRequest::metadata().with_priority(priority))
                .unwrap();

            prop_assert_eq!(svc.list_snapshots("mcp_prop").unwrap().len(), 1);
            svc.rollback("mcp_prop", "core://note").unwrap();

            let view = svc.read_memory("core://note").unwrap();
            let node = view.as_node().unwrap();
            prop_assert_eq!(&node.content, &original.record.content);
            prop_assert_eq!(node.priority, Some(2));
            prop_assert!(svc.list_sessions().unwrap().is_empty());
        }
    }
}
