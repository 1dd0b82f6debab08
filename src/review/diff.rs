//! Line diffs and snapshot-versus-current comparison.
//!
//! The unified format follows the classic `diff -u` layout: `---`/`+++`
//! headers, `@@ -a,b +c,d @@` hunk headers and three lines of context.

use super::types::{FieldChange, ResourceDiff, Snapshot, TextDiff};
use crate::types::NodeState;

/// Lines of context around each hunk.
const CONTEXT_LINES: usize = 3;

/// Largest changed region, in line pairs, aligned with an LCS. Bigger
/// regions are reported as a single replacement.
const MAX_LCS_CELLS: usize = 64_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    Equal,
    Delete,
    Insert,
    Replace,
}

/// `a[i1..i2]` turns into `b[j1..j2]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Opcode {
    tag: Tag,
    i1: usize,
    i2: usize,
    j1: usize,
    j2: usize,
}

/// One line of the edit script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Keep,
    Remove,
    Add,
}

fn split_lines(text: &str) -> Vec<&str> {
    text.split_inclusive('\n').collect()
}

/// Edit script between two line sequences, from a longest common
/// subsequence. Common prefix and suffix are peeled off first.
fn opcodes(a: &[&str], b: &[&str]) -> Vec<Opcode> {
    let prefix = a.iter().zip(b).take_while(|(x, y)| x == y).count();
    let suffix = a[prefix..]
        .iter()
        .rev()
        .zip(b[prefix..].iter().rev())
        .take_while(|(x, y)| x == y)
        .count();
    let (ma, mb) = (&a[prefix..a.len() - suffix], &b[prefix..b.len() - suffix]);

    let mut steps = Vec::with_capacity(prefix + ma.len() + mb.len() + suffix);
    steps.extend(std::iter::repeat(Step::Keep).take(prefix));
    if ma.len().saturating_mul(mb.len()) > MAX_LCS_CELLS {
        // too large to align line by line: one block replacement
        steps.extend(std::iter::repeat(Step::Remove).take(ma.len()));
        steps.extend(std::iter::repeat(Step::Add).take(mb.len()));
    } else {
        lcs_steps(ma, mb, &mut steps);
    }
    steps.extend(std::iter::repeat(Step::Keep).take(suffix));

    group_steps(&steps)
}

/// Hirschberg's divide and conquer: split `a` in half, find where the halves
/// meet in `b` from two linear-space LCS rows, and recurse.
fn lcs_steps(a: &[&str], b: &[&str], steps: &mut Vec<Step>) {
    if a.is_empty() {
        steps.extend(std::iter::repeat(Step::Add).take(b.len()));
        return;
    }
    if b.is_empty() {
        steps.extend(std::iter::repeat(Step::Remove).take(a.len()));
        return;
    }
    if a.len() == 1 {
        match b.iter().position(|line| *line == a[0]) {
            Some(k) => {
                steps.extend(std::iter::repeat(Step::Add).take(k));
                steps.push(Step::Keep);
                steps.extend(std::iter::repeat(Step::Add).take(b.len() - k - 1));
            }
            None => {
                steps.push(Step::Remove);
                steps.extend(std::iter::repeat(Step::Add).take(b.len()));
            }
        }
        return;
    }

    let mid = a.len() / 2;
    let forward = lcs_row(&a[..mid], b);
    let tail: Vec<&str> = a[mid..].iter().rev().copied().collect();
    let reversed: Vec<&str> = b.iter().rev().copied().collect();
    let backward = lcs_row(&tail, &reversed);
    let m = b.len();
    let split = (0..=m)
        .max_by_key(|&j| (forward[j] + backward[m - j], std::cmp::Reverse(j)))
        .unwrap_or(0);

    lcs_steps(&a[..mid], &b[..split], steps);
    lcs_steps(&a[mid..], &b[split..], steps);
}

/// `row[j]` is the LCS length of all of `a` against `b[..j]`. Only one row
/// is kept.
fn lcs_row(a: &[&str], b: &[&str]) -> Vec<usize> {
    let mut row = vec![0usize; b.len() + 1];
    for x in a {
        let mut diag = 0;
        for (j, y) in b.iter().enumerate() {
            let above = row[j + 1];
            row[j + 1] = if x == y { diag + 1 } else { above.max(row[j]) };
            diag = above;
        }
    }
    row
}

/// Collapse single-line steps into opcodes; adjacent deletes and inserts
/// become one replace.
fn group_steps(steps: &[Step]) -> Vec<Opcode> {
    let mut codes: Vec<Opcode> = Vec::new();
    let (mut i, mut j) = (0, 0);
    for &step in steps {
        let (tag, di, dj) = match step {
            Step::Keep => (Tag::Equal, 1, 1),
            Step::Remove => (Tag::Delete, 1, 0),
            Step::Add => (Tag::Insert, 0, 1),
        };
        let changed = tag != Tag::Equal;
        match codes.last_mut() {
            Some(last) if last.tag == tag || (changed && last.tag != Tag::Equal) => {
                if last.tag != tag {
                    last.tag = Tag::Replace;
                }
                last.i2 += di;
                last.j2 += dj;
            }
            _ => codes.push(Opcode {
                tag,
                i1: i,
                i2: i + di,
                j1: j,
                j2: j + dj,
            }),
        }
        i += di;
        j += dj;
    }
    codes
}

/// Split opcodes into hunks carrying at most `context` equal lines on each
/// side.
fn grouped_opcodes(mut codes: Vec<Opcode>, context: usize) -> Vec<Vec<Opcode>> {
    if codes.is_empty() {
        return Vec::new();
    }
    if let Some(first) = codes.first_mut().filter(|c| c.tag == Tag::Equal) {
        first.i1 = first.i1.max(first.i2.saturating_sub(context));
        first.j1 = first.j1.max(first.j2.saturating_sub(context));
    }
    if let Some(last) = codes.last_mut().filter(|c| c.tag == Tag::Equal) {
        last.i2 = last.i2.min(last.i1 + context);
        last.j2 = last.j2.min(last.j1 + context);
    }

    let mut groups = Vec::new();
    let mut group = Vec::new();
    for mut code in codes {
        if code.tag == Tag::Equal && code.i2 - code.i1 > context * 2 {
            group.push(Opcode {
                i2: code.i2.min(code.i1 + context),
                j2: code.j2.min(code.j1 + context),
                ..code
            });
            groups.push(std::mem::take(&mut group));
            code.i1 = code.i1.max(code.i2 - context);
            code.j1 = code.j1.max(code.j2 - context);
        }
        group.push(code);
    }
    if !(group.is_empty() || (group.len() == 1 && group[0].tag == Tag::Equal)) {
        groups.push(group);
    }
    groups
}

fn format_range(start: usize, stop: usize) -> String {
    let length = stop - start;
    let beginning = if length == 0 { start } else { start + 1 };
    if length == 1 {
        beginning.to_string()
    } else {
        format!("{},{}", beginning, length)
    }
}

fn push_line(out: &mut String, marker: char, line: &str) {
    out.push(marker);
    out.push_str(line);
    if !line.ends_with('\n') {
        out.push('\n');
    }
}

fn summarize(additions: usize, deletions: usize) -> String {
    if additions == 0 && deletions == 0 {
        "No changes".to_string()
    } else {
        format!("+{} / -{} lines", additions, deletions)
    }
}

/// Unified diff of two texts with the given file labels.
pub fn unified_diff(old: &str, new: &str, from_label: &str, to_label: &str) -> TextDiff {
    let (a, b) = (split_lines(old), split_lines(new));
    let groups = grouped_opcodes(opcodes(&a, &b), CONTEXT_LINES);

    let mut unified = String::new();
    let (mut additions, mut deletions) = (0, 0);
    for group in &groups {
        if unified.is_empty() {
            unified.push_str(&format!("--- {}\n+++ {}\n", from_label, to_label));
        }
        let (first, last) = (group[0], group[group.len() - 1]);
        unified.push_str(&format!(
            "@@ -{} +{} @@\n",
            format_range(first.i1, last.i2),
            format_range(first.j1, last.j2)
        ));
        for code in group {
            if code.tag == Tag::Equal {
                for line in &a[code.i1..code.i2] {
                    push_line(&mut unified, ' ', line);
                }
                continue;
            }
            for line in &a[code.i1..code.i2] {
                push_line(&mut unified, '-', line);
                deletions += 1;
            }
            for line in &b[code.j1..code.j2] {
                push_line(&mut unified, '+', line);
                additions += 1;
            }
        }
    }

    TextDiff {
        unified,
        summary: summarize(additions, deletions),
        additions,
        deletions,
    }
}

/// Standalone comparison of two texts.
pub fn compare_text(old: &str, new: &str) -> TextDiff {
    unified_diff(old, new, "snapshot", "current")
}

fn whole_text(marker: char, text: &str, from_label: &str, to_label: &str) -> String {
    let mut unified = format!("--- {}\n+++ {}\n", from_label, to_label);
    for line in text.lines() {
        push_line(&mut unified, marker, line);
    }
    unified
}

/// Field-level changes, using effective metadata.
pub fn field_changes(before: Option<&NodeState>, after: Option<&NodeState>) -> Vec<FieldChange> {
    type Getter = fn(&NodeState) -> Option<String>;
    let fields: [(&str, Getter); 5] = [
        ("title", |s| Some(s.record.title.clone())),
        ("priority", |s| Some(s.effective_priority().to_string())),
        ("disclosure", |s| s.effective_disclosure().map(str::to_string)),
        ("content", |s| Some(s.record.content.clone())),
        ("content_id", |s| Some(s.record.content_id.to_string())),
    ];

    fields
        .iter()
        .filter_map(|(field, get)| {
            let old = before.and_then(get);
            let new = after.and_then(get);
            (old != new).then(|| FieldChange {
                field: field.to_string(),
                before: old,
                after: new,
            })
        })
        .collect()
}

/// Compare a snapshot with the current state of its resource.
pub fn diff_snapshot(snapshot: &Snapshot, current: Option<NodeState>) -> ResourceDiff {
    let resource = snapshot.resource_id.as_str();
    let changes = field_changes(snapshot.snapshot_data.as_ref(), current.as_ref());

    let (has_changes, diff_summary, diff_unified) =
        match (&snapshot.snapshot_data, &current) {
            (None, None) => (false, "Created then deleted".to_string(), String::new()),
            (None, Some(now)) => (
                true,
                format!(
                    "Created: +{} lines (rollback = delete)",
                    now.record.content.lines().count()
                ),
                whole_text('+', &now.record.content, "/dev/null", resource),
            ),
            (Some(then), None) => (
                true,
                format!(
                    "Deleted: -{} lines (rollback = restore)",
                    then.record.content.lines().count()
                ),
                whole_text('-', &then.record.content, resource, "/dev/null"),
            ),
            (Some(then), Some(now)) => {
                let text = compare_text(&then.record.content, &now.record.content);
                let summary = if text.has_changes() {
                    text.summary
                } else if changes.is_empty() {
                    "No changes".to_string()
                } else {
                    let names: Vec<&str> = changes.iter().map(|c| c.field.as_str()).collect();
                    format!("Changed: {}", names.join(", "))
                };
                (!changes.is_empty(), summary, text.unified)
            }
        };

    ResourceDiff {
        resource_id: snapshot.resource_id.clone(),
        uri: snapshot.uri.clone(),
        resource_type: snapshot.resource_type.clone(),
        operation_type: snapshot.operation_type,
        snapshot_time: snapshot.snapshot_time,
        has_changes,
        diff_summary,
        diff_unified,
        changes,
        snapshot_data: snapshot.snapshot_data.clone(),
        current_data: current,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::review::types::{OperationType, SessionId};
    use crate::types::{ContentRecord, PathEntry};
    use crate::uri::MemoryUri;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_identical_texts() {
        let diff = compare_text("a\nb\n", "a\nb\n");
        assert_eq!(diff.unified, "");
        assert_eq!(diff.summary, "No changes");
        assert!(!diff.has_changes());
    }

    #[test]
    fn test_single_line_change() {
        let diff = compare_text("one\ntwo\nthree\n", "one\nTWO\nthree\n");
        assert_eq!(
            diff.unified,
            "--- snapshot\n+++ current\n@@ -1,3 +1,3 @@\n one\n-two\n+TWO\n three\n"
        );
        assert_eq!(diff.summary, "+1 / -1 lines");
    }

    #[test]
    fn test_append_only() {
        let diff = compare_text("a\n", "a\nb\n");
        assert_eq!(diff.unified, "--- snapshot\n+++ current\n@@ -1 +1,2 @@\n a\n+b\n");
        assert_eq!((diff.additions, diff.deletions), (1, 0));
    }

    #[test]
    fn test_from_empty() {
        let diff = compare_text("", "x\ny\n");
        assert_eq!(diff.unified, "--- snapshot\n+++ current\n@@ -0,0 +1,2 @@\n+x\n+y\n");
    }

    #[test]
    fn test_distant_changes_make_two_hunks() {
        let old: String = (1..=20).map(|i| format!("{}\n", i)).collect();
        let new: String = (1..=20)
            .map(|i| match i {
                2 => "two\n".to_string(),
                19 => "nineteen\n".to_string(),
                _ => format!("{}\n", i),
            })
            .collect();
        let diff = compare_text(&old, &new);
        assert_eq!(diff.unified.matches("@@ -").count(), 2);
        assert_eq!(diff.summary, "+2 / -2 lines");
        assert!(diff.unified.contains("@@ -1,5 +1,5 @@"));
        assert!(diff.unified.contains("@@ -16,5 +16,5 @@"));
    }

    #[test]
    fn test_interleaved_edits_align() {
        let old: String = (0..2000).map(|i| format!("line {}\n", i)).collect();
        let new: String = (0..2000)
            .map(|i| {
                if i % 2 == 1 {
                    format!("edit {}\n", i)
                } else {
                    format!("line {}\n", i)
                }
            })
            .collect();
        let diff = compare_text(&old, &new);
        assert_eq!((diff.additions, diff.deletions), (1000, 1000));
        assert!(diff.unified.starts_with("--- snapshot\n+++ current\n@@ -1,2000 +1,2000 @@\n line 0\n-line 1\n+edit 1\n"));
    }

    #[test]
    fn test_large_rewrite_is_one_block() {
        let old: String = (0..20_000).map(|i| format!("old {}\n", i)).collect();
        let new: String = (0..20_000).map(|i| format!("new {}\n", i)).collect();
        let diff = compare_text(&old, &new);
        assert_eq!((diff.additions, diff.deletions), (20_000, 20_000));
        assert_eq!(diff.unified.matches("@@ -").count(), 1);
        assert!(diff.unified.contains("@@ -1,20000 +1,20000 @@"));
    }

    #[test]
    fn test_lcs_row_lengths() {
        assert_eq!(lcs_row(&["a", "b", "c"], &["b", "x", "c"]), vec![0, 1, 1, 2]);
        assert_eq!(lcs_row(&[], &["a"]), vec![0, 0]);
    }

    #[test]
    fn test_missing_final_newline() {
        let diff = compare_text("a", "b");
        assert_eq!(diff.unified, "--- snapshot\n+++ current\n@@ -1 +1 @@\n-a\n+b\n");
    }

    fn state(content: &str, priority: u32) -> NodeState {
        let record = ContentRecord::new(content, "note", priority);
        let path = PathEntry::new(MemoryUri::parse("core://note").unwrap(), record.content_id.clone());
        NodeState { path, record }
    }

    fn snapshot(data: Option<NodeState>, op: OperationType) -> Snapshot {
        Snapshot::new(
            SessionId::from("s"),
            MemoryUri::parse("core://note").unwrap(),
            op,
            data,
        )
    }

    #[test]
    fn test_created_resource() {
        let diff = diff_snapshot(
            &snapshot(None, OperationType::Create),
            Some(state("l1\nl2", 1)),
        );
        assert!(diff.has_changes);
        assert_eq!(diff.diff_summary, "Created: +2 lines (rollback = delete)");
        assert_eq!(diff.diff_unified, "--- /dev/null\n+++ core://note\n+l1\n+l2\n");
    }

    #[test]
    fn test_created_then_deleted() {
        let diff = diff_snapshot(&snapshot(None, OperationType::Create), None);
        assert!(!diff.has_changes);
        assert_eq!(diff.diff_summary, "Created then deleted");
        assert!(diff.changes.is_empty());
    }

    #[test]
    fn test_deleted_resource() {
        let before = state("gone", 1);
        let diff = diff_snapshot(&snapshot(Some(before), OperationType::Delete), None);
        assert!(diff.has_changes);
        assert_eq!(diff.diff_summary, "Deleted: -1 lines (rollback = restore)");
    }

    #[test]
    fn test_metadata_only_change() {
        let before = state("same", 1);
        let mut after = before.clone();
        after.record.priority = 0;
        let diff = diff_snapshot(&snapshot(Some(before), OperationType::ModifyMeta), Some(after));
        assert!(diff.has_changes);
        assert_eq!(diff.diff_summary, "Changed: priority");
        assert_eq!(diff.diff_unified, "");
        assert_eq!(
            diff.changes,
            vec![FieldChange {
                field: "priority".into(),
                before: Some("1".into()),
                after: Some("0".into()),
            }]
        );
    }

    #[test]
    fn test_reverted_change_has_no_changes() {
        let before = state("same", 1);
        let diff = diff_snapshot(
            &snapshot(Some(before.clone()), OperationType::ModifyContent),
            Some(before),
        );
        assert!(!diff.has_changes);
        assert_eq!(diff.diff_summary, "No changes");
    }
}
