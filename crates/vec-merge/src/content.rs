//! Three-way content merge.
//!
//! Takes base, ours, and theirs versions of a file and produces a merged
//! result, inserting conflict markers where the two sides change
//! overlapping regions of the base. Inputs are normalized CRLF→LF first;
//! binary content (NUL byte in the leading 5 MiB) never reaches the line
//! merge and is escalated by the tree layer instead.

use vec_diff::{diff_lines, split_lines, Edit, EditOp};

/// How much of a file is sniffed for NUL bytes.
const BINARY_SNIFF_LIMIT: usize = 5 * 1024 * 1024;

/// Whether content is binary: a NUL byte within the leading 5 MiB.
pub fn is_binary(data: &[u8]) -> bool {
    let sniff = &data[..data.len().min(BINARY_SNIFF_LIMIT)];
    sniff.contains(&0)
}

/// Replace every CRLF with LF.
pub fn normalize_crlf(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        if data[i] == b'\r' && data.get(i + 1) == Some(&b'\n') {
            out.push(b'\n');
            i += 2;
        } else {
            out.push(data[i]);
            i += 1;
        }
    }
    out
}

/// Labels rendered into conflict markers.
#[derive(Debug, Clone)]
pub struct MergeLabels<'a> {
    pub base: &'a str,
    pub ours: &'a str,
    pub theirs: &'a str,
}

impl Default for MergeLabels<'_> {
    fn default() -> Self {
        Self {
            base: "base",
            ours: "ours",
            theirs: "theirs",
        }
    }
}

/// Conflict marker style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictStyle {
    /// Ours and theirs only.
    #[default]
    Merge,
    /// Base content between `|||||||` and `=======`.
    Diff3,
}

/// Result of a three-way content merge.
#[derive(Debug, Clone)]
pub enum ContentMergeResult {
    /// Clean merge, no conflicts.
    Clean(Vec<u8>),
    /// Conflict markers embedded in the content.
    Conflict {
        content: Vec<u8>,
        conflict_count: usize,
    },
}

impl ContentMergeResult {
    /// Whether the merge was clean.
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Clean(_))
    }

    /// The merged content, with or without conflict markers.
    pub fn content(&self) -> &[u8] {
        match self {
            Self::Clean(data) => data,
            Self::Conflict { content, .. } => content,
        }
    }
}

/// Perform a three-way content merge on already-normalized text.
///
/// Diffs base→ours and base→theirs, interleaves non-overlapping changes,
/// collapses identical changes, and emits conflict markers for overlapping
/// divergent regions.
pub fn merge_content(
    base: &[u8],
    ours: &[u8],
    theirs: &[u8],
    style: ConflictStyle,
    labels: &MergeLabels<'_>,
) -> ContentMergeResult {
    // Either side matching the other (or the base) decides without a diff.
    if ours == theirs {
        return ContentMergeResult::Clean(ours.to_vec());
    }
    if base == ours {
        return ContentMergeResult::Clean(theirs.to_vec());
    }
    if base == theirs {
        return ContentMergeResult::Clean(ours.to_vec());
    }

    let base_lines = split_lines(base);
    let ours_lines = split_lines(ours);
    let theirs_lines = split_lines(theirs);

    let hunks_ours = collect_change_regions(&diff_lines(base, ours));
    let hunks_theirs = collect_change_regions(&diff_lines(base, theirs));

    merge_regions(
        &base_lines,
        &ours_lines,
        &theirs_lines,
        &hunks_ours,
        &hunks_theirs,
        style,
        labels,
    )
}

/// A contiguous region of changes relative to the base.
#[derive(Debug, Clone)]
struct ChangeRegion {
    /// Start line in base (0-indexed).
    base_start: usize,
    /// Number of lines removed from base.
    base_len: usize,
    /// Start line in the modified file (0-indexed).
    new_start: usize,
    /// Number of lines added.
    new_len: usize,
}

/// Collect contiguous change regions from an edit script.
fn collect_change_regions(edits: &[Edit]) -> Vec<ChangeRegion> {
    let mut regions = Vec::new();
    let mut i = 0;

    while i < edits.len() {
        if edits[i].op == EditOp::Equal {
            i += 1;
            continue;
        }

        let base_start = edits[i].old_index;
        let new_start = edits[i].new_index;
        let mut base_end = base_start;
        let mut new_end = new_start;

        while i < edits.len() && edits[i].op != EditOp::Equal {
            match edits[i].op {
                EditOp::Delete => base_end = edits[i].old_index + 1,
                EditOp::Insert => new_end = edits[i].new_index + 1,
                EditOp::Equal => unreachable!(),
            }
            i += 1;
        }

        regions.push(ChangeRegion {
            base_start,
            base_len: base_end - base_start,
            new_start,
            new_len: new_end - new_start,
        });
    }

    regions
}

/// Merge change regions from ours and theirs against the base.
fn merge_regions(
    base_lines: &[&[u8]],
    ours_lines: &[&[u8]],
    theirs_lines: &[&[u8]],
    hunks_ours: &[ChangeRegion],
    hunks_theirs: &[ChangeRegion],
    style: ConflictStyle,
    labels: &MergeLabels<'_>,
) -> ContentMergeResult {
    let mut output: Vec<u8> = Vec::new();
    let mut conflict_count = 0;

    let mut base_pos = 0;
    let mut oi = 0;
    let mut ti = 0;

    while oi < hunks_ours.len() || ti < hunks_theirs.len() {
        let o_region = hunks_ours.get(oi);
        let t_region = hunks_theirs.get(ti);

        match (o_region, t_region) {
            (Some(o), Some(t)) => {
                let o_end = o.base_start + o.base_len;
                let t_end = t.base_start + t.base_len;

                if o_end < t.base_start || (o_end == t.base_start && o.base_start < t.base_start)
                {
                    // Ours strictly first, no overlap.
                    emit_base_range(&mut output, base_lines, base_pos, o.base_start);
                    emit_lines(&mut output, ours_lines, o.new_start, o.new_len);
                    base_pos = base_pos.max(o_end);
                    oi += 1;
                } else if t_end < o.base_start
                    || (t_end == o.base_start && t.base_start < o.base_start)
                {
                    // Theirs strictly first, no overlap.
                    emit_base_range(&mut output, base_lines, base_pos, t.base_start);
                    emit_lines(&mut output, theirs_lines, t.new_start, t.new_len);
                    base_pos = base_pos.max(t_end);
                    ti += 1;
                } else {
                    // Overlapping regions.
                    let ours_content = collect_lines(ours_lines, o.new_start, o.new_len);
                    let theirs_content = collect_lines(theirs_lines, t.new_start, t.new_len);

                    let overlap_start = o.base_start.min(t.base_start);
                    let overlap_end = o_end.max(t_end);

                    emit_base_range(&mut output, base_lines, base_pos, overlap_start);

                    if ours_content == theirs_content {
                        // Identical change on both sides.
                        output.extend_from_slice(&ours_content);
                    } else {
                        conflict_count += 1;
                        let base_content = collect_lines(
                            base_lines,
                            overlap_start,
                            overlap_end - overlap_start,
                        );
                        emit_conflict(
                            &mut output,
                            &ours_content,
                            &theirs_content,
                            &base_content,
                            style,
                            labels,
                        );
                    }

                    base_pos = base_pos.max(overlap_end);
                    oi += 1;
                    ti += 1;
                }
            }
            (Some(o), None) => {
                emit_base_range(&mut output, base_lines, base_pos, o.base_start);
                emit_lines(&mut output, ours_lines, o.new_start, o.new_len);
                base_pos = base_pos.max(o.base_start + o.base_len);
                oi += 1;
            }
            (None, Some(t)) => {
                emit_base_range(&mut output, base_lines, base_pos, t.base_start);
                emit_lines(&mut output, theirs_lines, t.new_start, t.new_len);
                base_pos = base_pos.max(t.base_start + t.base_len);
                ti += 1;
            }
            (None, None) => unreachable!(),
        }
    }

    // Remaining unchanged base suffix.
    emit_base_range(&mut output, base_lines, base_pos, base_lines.len());

    if conflict_count > 0 {
        ContentMergeResult::Conflict {
            content: output,
            conflict_count,
        }
    } else {
        ContentMergeResult::Clean(output)
    }
}

/// Emit `count` lines starting at `start`, verbatim (lines keep their
/// terminators, so clean regions round-trip byte-exactly).
fn emit_lines(output: &mut Vec<u8>, lines: &[&[u8]], start: usize, count: usize) {
    for line in lines.iter().skip(start).take(count) {
        output.extend_from_slice(line);
    }
}

/// Emit base lines `from..to`; an inverted or empty range is a no-op (a
/// region can start inside a span an earlier overlap already consumed).
fn emit_base_range(output: &mut Vec<u8>, lines: &[&[u8]], from: usize, to: usize) {
    if to > from {
        emit_lines(output, lines, from, to - from);
    }
}

/// Collect lines into one buffer.
fn collect_lines(lines: &[&[u8]], start: usize, count: usize) -> Vec<u8> {
    let mut buf = Vec::new();
    for line in lines.iter().skip(start).take(count) {
        buf.extend_from_slice(line);
    }
    buf
}

/// Ensure a conflict block ends with a newline before the next marker.
fn push_block(output: &mut Vec<u8>, block: &[u8]) {
    output.extend_from_slice(block);
    if !block.is_empty() && !block.ends_with(b"\n") {
        output.push(b'\n');
    }
}

/// Emit one conflict hunk.
fn emit_conflict(
    output: &mut Vec<u8>,
    ours_content: &[u8],
    theirs_content: &[u8],
    base_content: &[u8],
    style: ConflictStyle,
    labels: &MergeLabels<'_>,
) {
    output.extend_from_slice(b"<<<<<<< ");
    output.extend_from_slice(labels.ours.as_bytes());
    output.push(b'\n');
    push_block(output, ours_content);

    if style == ConflictStyle::Diff3 {
        output.extend_from_slice(b"||||||| ");
        output.extend_from_slice(labels.base.as_bytes());
        output.push(b'\n');
        push_block(output, base_content);
    }

    output.extend_from_slice(b"=======\n");
    push_block(output, theirs_content);

    output.extend_from_slice(b">>>>>>> ");
    output.extend_from_slice(labels.theirs.as_bytes());
    output.push(b'\n');
}
