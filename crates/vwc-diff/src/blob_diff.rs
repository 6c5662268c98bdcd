//! Blob-level diff: line-by-line comparison of entry contents.
//!
//! Uses the `similar` crate (Myers diff algorithm) to produce hunks with
//! three lines of context. A final line without a trailing newline is
//! flagged so the renderer can emit `\ No newline at end of file`.

use similar::{ChangeTag, TextDiff};

const CONTEXT_LINES: usize = 3;

/// The result of diffing two blobs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlobDiff {
    pub hunks: Vec<DiffHunk>,
    /// Either side is not valid UTF-8; no hunks are computed.
    pub binary: bool,
}

impl BlobDiff {
    /// Returns `true` if the two blobs are identical.
    pub fn is_empty(&self) -> bool {
        self.hunks.is_empty() && !self.binary
    }

    pub fn additions(&self) -> usize {
        self.count(LineTag::Added)
    }

    pub fn deletions(&self) -> usize {
        self.count(LineTag::Removed)
    }

    fn count(&self, tag: LineTag) -> usize {
        self.hunks
            .iter()
            .flat_map(|h| &h.lines)
            .filter(|l| l.tag == tag)
            .count()
    }
}

/// A contiguous region of changes.
///
/// Start lines follow unified diff conventions: 1-based, except that an
/// empty range starts at the line *before* it (0 for an empty file).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiffHunk {
    pub old_start: usize,
    pub old_count: usize,
    pub new_start: usize,
    pub new_count: usize,
    pub lines: Vec<DiffLine>,
}

impl DiffHunk {
    /// `@@ -s,c +s,c @@`, counts always printed.
    pub fn header(&self) -> String {
        format!(
            "@@ -{},{} +{},{} @@",
            self.old_start, self.old_count, self.new_start, self.new_count
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineTag {
    Context,
    Added,
    Removed,
}

impl LineTag {
    pub fn prefix(&self) -> char {
        match self {
            Self::Context => ' ',
            Self::Added => '+',
            Self::Removed => '-',
        }
    }
}

/// One line of a hunk, without its line terminator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiffLine {
    pub tag: LineTag,
    pub text: String,
    /// The line is the last of its side and has no trailing newline.
    pub no_newline: bool,
}

/// Compute a line diff between two byte slices.
pub fn diff_blobs(old: &[u8], new: &[u8]) -> BlobDiff {
    let (Ok(old_str), Ok(new_str)) = (std::str::from_utf8(old), std::str::from_utf8(new)) else {
        return BlobDiff {
            hunks: Vec::new(),
            binary: old != new,
        };
    };
    if old_str == new_str {
        return BlobDiff::default();
    }

    let text_diff = TextDiff::from_lines(old_str, new_str);
    let mut hunks = Vec::new();

    for group in text_diff.grouped_ops(CONTEXT_LINES) {
        let (Some(first), Some(last)) = (group.first(), group.last()) else {
            continue;
        };
        let old_range = first.old_range().start..last.old_range().end;
        let new_range = first.new_range().start..last.new_range().end;

        let mut lines = Vec::new();
        for op in &group {
            for change in text_diff.iter_changes(op) {
                let tag = match change.tag() {
                    ChangeTag::Equal => LineTag::Context,
                    ChangeTag::Insert => LineTag::Added,
                    ChangeTag::Delete => LineTag::Removed,
                };
                let value = change.value();
                let text = value.strip_suffix('\n').unwrap_or(value);
                lines.push(DiffLine {
                    tag,
                    text: text.to_string(),
                    no_newline: change.missing_newline(),
                });
            }
        }

        hunks.push(DiffHunk {
            old_start: hunk_start(&old_range),
            old_count: old_range.len(),
            new_start: hunk_start(&new_range),
            new_count: new_range.len(),
            lines,
        });
    }

    BlobDiff {
        hunks,
        binary: false,
    }
}

fn hunk_start(range: &std::ops::Range<usize>) -> usize {
    if range.is_empty() {
        range.start
    } else {
        range.start + 1
    }
}
