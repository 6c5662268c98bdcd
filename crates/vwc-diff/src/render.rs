//! Git extended unified diff rendering.
//!
//! Output is byte-exact and stable: every section starts with
//! `diff --git a/<old> b/<new>`, extended header lines follow in the order
//! mode, then rename, and content hunks come last.

use std::fmt::Write as _;

use vwc_store::Entry;
use vwc_types::RepoPath;

use crate::blob_diff::diff_blobs;
use crate::snapshot_diff::{SnapshotChange, SnapshotDiff};

/// Render a whole diff as patch text.
pub fn render_git(diff: &SnapshotDiff) -> String {
    diff.changes.iter().map(render_change).collect()
}

/// Render one file section.
pub fn render_change(change: &SnapshotChange) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "diff --git a/{} b/{}",
        change.old_path(),
        change.new_path()
    );

    match change {
        SnapshotChange::Added { entry } => {
            let _ = writeln!(out, "new file mode {}", entry.kind);
            push_content(&mut out, None, Some(entry));
        }
        SnapshotChange::Deleted { entry } => {
            let _ = writeln!(out, "deleted file mode {}", entry.kind);
            push_content(&mut out, Some(entry), None);
        }
        SnapshotChange::Modified { old, new } => {
            push_mode_lines(&mut out, old, new);
            push_content(&mut out, Some(old), Some(new));
        }
        SnapshotChange::ModeChanged { old, new } => {
            push_mode_lines(&mut out, old, new);
        }
        SnapshotChange::Renamed { old, new } => {
            push_mode_lines(&mut out, old, new);
            let _ = writeln!(out, "rename from {}", old.path);
            let _ = writeln!(out, "rename to {}", new.path);
            if old.hash != new.hash {
                push_content(&mut out, Some(old), Some(new));
            }
        }
    }
    out
}

fn push_mode_lines(out: &mut String, old: &Entry, new: &Entry) {
    if old.kind != new.kind {
        let _ = writeln!(out, "old mode {}", old.kind);
        let _ = writeln!(out, "new mode {}", new.kind);
    }
}

fn push_content(out: &mut String, old: Option<&Entry>, new: Option<&Entry>) {
    let old_bytes = old.map(|e| &e.content[..]).unwrap_or_default();
    let new_bytes = new.map(|e| &e.content[..]).unwrap_or_default();
    let blob = diff_blobs(old_bytes, new_bytes);

    if blob.binary {
        let path = new.or(old).map(|e| &e.path);
        let _ = writeln!(out, "Binary file {} has changed", display_path(path));
        return;
    }
    if blob.hunks.is_empty() {
        return;
    }

    match old {
        Some(e) => {
            let _ = writeln!(out, "--- a/{}", e.path);
        }
        None => out.push_str("--- /dev/null\n"),
    }
    match new {
        Some(e) => {
            let _ = writeln!(out, "+++ b/{}", e.path);
        }
        None => out.push_str("+++ /dev/null\n"),
    }

    for hunk in &blob.hunks {
        out.push_str(&hunk.header());
        out.push('\n');
        for line in &hunk.lines {
            out.push(line.tag.prefix());
            out.push_str(&line.text);
            out.push('\n');
            if line.no_newline {
                out.push_str("\\ No newline at end of file\n");
            }
        }
    }
}

fn display_path(path: Option<&RepoPath>) -> &str {
    path.map(RepoPath::as_str).unwrap_or_default()
}
