//! Span-level diff encoding
//!
//! The remote document only accepts incremental edits, so every remote write
//! is expressed as a list of [`Edit`]s computed here. Offsets are counted in
//! characters (Unicode scalar values) of the *old* text.
//!
//! [`matching_blocks`] is also the alignment primitive used by the three-way
//! merge in [`crate::merge`].

use serde::{Deserialize, Serialize};
use similar::{capture_diff_slices_deadline, Algorithm, DiffOp};
use std::hash::Hash;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Time budget for the Myers search on one pair of sequences.
///
/// Past the deadline the remaining middle is reported as a coarse
/// replacement, which keeps wholesale rewrites cheap.
const DIFF_DEADLINE: Duration = Duration::from_millis(250);

/// A single span replacement: characters `from..to` of the old text become `insert`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edit {
    pub from: usize,
    pub to: usize,
    pub insert: String,
}

impl Edit {
    /// Pure insertion (no characters removed)
    pub fn is_insert(&self) -> bool {
        self.from == self.to
    }

    /// Pure deletion (nothing inserted)
    pub fn is_delete(&self) -> bool {
        self.insert.is_empty() && self.from < self.to
    }
}

/// Errors raised while applying an edit list to a text
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("Edit {from}..{to} is out of range for a text of {len} characters")]
    OutOfRange { from: usize, to: usize, len: usize },

    #[error("Edit {from}..{to} ends before it starts")]
    Inverted { from: usize, to: usize },

    #[error("Edit starting at {from} overlaps the previous edit ending at {previous_end}")]
    Overlapping { from: usize, previous_end: usize },
}

/// A run of equal elements: `a[a_start..a_start + len] == b[b_start..b_start + len]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchingBlock {
    pub a_start: usize,
    pub b_start: usize,
    pub len: usize,
}

impl MatchingBlock {
    pub fn a_end(&self) -> usize {
        self.a_start + self.len
    }

    pub fn b_end(&self) -> usize {
        self.b_start + self.len
    }
}

/// Compute the matching blocks of a shortest edit script between `a` and `b`.
///
/// Blocks are ascending in both sequences and never adjacent (touching runs
/// are coalesced). The list always ends with the zero-length sentinel
/// `(a.len(), b.len(), 0)`.
pub fn matching_blocks<T: Eq + Hash + Ord>(a: &[T], b: &[T]) -> Vec<MatchingBlock> {
    let deadline = Instant::now() + DIFF_DEADLINE;
    let mut blocks = Vec::new();

    for op in capture_diff_slices_deadline(Algorithm::Myers, a, b, Some(deadline)) {
        if let DiffOp::Equal {
            old_index,
            new_index,
            len,
        } = op
        {
            push_block(&mut blocks, old_index, new_index, len);
        }
    }

    blocks.push(MatchingBlock {
        a_start: a.len(),
        b_start: b.len(),
        len: 0,
    });
    blocks
}

fn push_block(blocks: &mut Vec<MatchingBlock>, a_start: usize, b_start: usize, len: usize) {
    if len == 0 {
        return;
    }
    if let Some(last) = blocks.last_mut() {
        if last.a_end() == a_start && last.b_end() == b_start {
            last.len += len;
            return;
        }
    }
    blocks.push(MatchingBlock {
        a_start,
        b_start,
        len,
    });
}

/// Encode the transformation `old -> new` as ascending, non-overlapping span edits.
///
/// Equal spans are omitted, so `encode(t, t)` is empty.
pub fn encode(old: &str, new: &str) -> Vec<Edit> {
    let old_chars: Vec<char> = old.chars().collect();
    let new_chars: Vec<char> = new.chars().collect();

    let mut edits = Vec::new();
    let (mut i, mut j) = (0, 0);
    for block in matching_blocks(&old_chars, &new_chars) {
        if i < block.a_start || j < block.b_start {
            edits.push(Edit {
                from: i,
                to: block.a_start,
                insert: new_chars[j..block.b_start].iter().collect(),
            });
        }
        i = block.a_end();
        j = block.b_end();
    }
    edits
}

/// Apply an edit list produced by [`encode`] (or any equivalent producer) to `old`.
pub fn apply(old: &str, edits: &[Edit]) -> Result<String, EditError> {
    let chars: Vec<char> = old.chars().collect();
    let mut out = String::with_capacity(old.len());
    let mut cursor = 0;

    for edit in edits {
        if edit.from > edit.to {
            return Err(EditError::Inverted {
                from: edit.from,
                to: edit.to,
            });
        }
        if edit.to > chars.len() {
            return Err(EditError::OutOfRange {
                from: edit.from,
                to: edit.to,
                len: chars.len(),
            });
        }
        if edit.from < cursor {
            return Err(EditError::Overlapping {
                from: edit.from,
                previous_end: cursor,
            });
        }
        out.extend(&chars[cursor..edit.from]);
        out.push_str(&edit.insert);
        cursor = edit.to;
    }

    out.extend(&chars[cursor..]);
    Ok(out)
}
