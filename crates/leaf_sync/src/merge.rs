//! Three-way text merge with a fixed remote-wins tie-break

use crate::diff::matching_blocks;
use serde::{Deserialize, Serialize};
use std::hash::Hash;
use std::ops::Range;
use std::str::FromStr;

/// Unit the merge aligns on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// Align individual characters (finest, merges edits on the same line)
    #[default]
    Character,

    /// Align whole lines, terminator included
    Line,
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "character" | "char" => Ok(Granularity::Character),
            "line" => Ok(Granularity::Line),
            other => Err(format!(
                "unknown merge granularity '{}' (expected 'character' or 'line')",
                other
            )),
        }
    }
}

/// Result of a three-way merge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Merged text (conflicting regions carry the remote content)
    pub text: String,

    /// Number of regions both sides changed differently
    pub conflicts: usize,
}

impl MergeOutcome {
    /// True if any region conflicted
    pub fn conflict(&self) -> bool {
        self.conflicts > 0
    }
}

/// Merge `local` and `remote`, both derived from `base`, at character granularity.
pub fn merge(base: &str, local: &str, remote: &str) -> MergeOutcome {
    merge_with(Granularity::Character, base, local, remote)
}

/// Merge at the given granularity.
pub fn merge_with(granularity: Granularity, base: &str, local: &str, remote: &str) -> MergeOutcome {
    if local == remote {
        return MergeOutcome {
            text: remote.to_string(),
            conflicts: 0,
        };
    }

    match granularity {
        Granularity::Character => {
            let base: Vec<char> = base.chars().collect();
            let local: Vec<char> = local.chars().collect();
            let remote: Vec<char> = remote.chars().collect();
            let (merged, conflicts) = merge_tokens(&base, &local, &remote);
            MergeOutcome {
                text: merged.into_iter().collect(),
                conflicts,
            }
        }
        Granularity::Line => {
            let base: Vec<&str> = base.split_inclusive('\n').collect();
            let local: Vec<&str> = local.split_inclusive('\n').collect();
            let remote: Vec<&str> = remote.split_inclusive('\n').collect();
            let (merged, conflicts) = merge_tokens(&base, &local, &remote);
            MergeOutcome {
                text: merged.concat(),
                conflicts,
            }
        }
    }
}

/// One aligned region of the merge
#[derive(Debug, Clone, PartialEq, Eq)]
enum Region {
    /// Neither side touched it (range into base)
    Unchanged(Range<usize>),
    /// Only local changed it (range into local)
    Local(Range<usize>),
    /// Only remote changed it (range into remote)
    Remote(Range<usize>),
    /// Both changed it identically (range into local)
    Same(Range<usize>),
    /// Both changed it differently
    Conflict {
        base: Range<usize>,
        local: Range<usize>,
        remote: Range<usize>,
    },
}

/// Base range matched unchanged on both sides, with its counterparts
struct SyncRegion {
    base: Range<usize>,
    local: Range<usize>,
    remote: Range<usize>,
}

fn merge_tokens<T: Eq + Hash + Ord + Clone>(base: &[T], local: &[T], remote: &[T]) -> (Vec<T>, usize) {
    let mut merged = Vec::with_capacity(remote.len().max(local.len()));
    let mut conflicts = 0;

    for region in merge_regions(base, local, remote) {
        match region {
            Region::Unchanged(range) => merged.extend_from_slice(&base[range]),
            Region::Local(range) | Region::Same(range) => merged.extend_from_slice(&local[range]),
            Region::Remote(range) => merged.extend_from_slice(&remote[range]),
            Region::Conflict {
                base: base_range,
                local: local_range,
                remote: remote_range,
            } => {
                conflicts += 1;
                tracing::trace!(
                    base = ?base_range,
                    local = ?local_range,
                    remote = ?remote_range,
                    "Conflicting region, keeping remote"
                );
                merged.extend_from_slice(&remote[remote_range]);
            }
        }
    }

    (merged, conflicts)
}

/// Regions of `base` left unchanged by both sides.
///
/// Always terminated by an empty region at the ends of all three sequences.
fn sync_regions<T: Eq + Hash + Ord>(base: &[T], local: &[T], remote: &[T]) -> Vec<SyncRegion> {
    let local_blocks = matching_blocks(base, local);
    let remote_blocks = matching_blocks(base, remote);

    let mut regions = Vec::new();
    let (mut li, mut ri) = (0, 0);
    while li < local_blocks.len() && ri < remote_blocks.len() {
        let lb = local_blocks[li];
        let rb = remote_blocks[ri];

        let start = lb.a_start.max(rb.a_start);
        let end = lb.a_end().min(rb.a_end());
        if start < end {
            let len = end - start;
            let local_start = lb.b_start + (start - lb.a_start);
            let remote_start = rb.b_start + (start - rb.a_start);
            regions.push(SyncRegion {
                base: start..end,
                local: local_start..local_start + len,
                remote: remote_start..remote_start + len,
            });
        }

        if lb.a_end() < rb.a_end() {
            li += 1;
        } else {
            ri += 1;
        }
    }

    regions.push(SyncRegion {
        base: base.len()..base.len(),
        local: local.len()..local.len(),
        remote: remote.len()..remote.len(),
    });
    regions
}

fn merge_regions<T: Eq + Hash + Ord>(base: &[T], local: &[T], remote: &[T]) -> Vec<Region> {
    let mut regions = Vec::new();
    let (mut bi, mut li, mut ri) = (0, 0, 0);

    for sync in sync_regions(base, local, remote) {
        let base_gap = bi..sync.base.start;
        let local_gap = li..sync.local.start;
        let remote_gap = ri..sync.remote.start;

        // Both sides deleting the same base span leaves nothing to emit
        if !local_gap.is_empty() || !remote_gap.is_empty() {
            let local_unchanged = base[base_gap.clone()] == local[local_gap.clone()];
            let remote_unchanged = base[base_gap.clone()] == remote[remote_gap.clone()];

            let region = if local[local_gap.clone()] == remote[remote_gap.clone()] {
                Region::Same(local_gap)
            } else if local_unchanged {
                Region::Remote(remote_gap)
            } else if remote_unchanged {
                Region::Local(local_gap)
            } else {
                Region::Conflict {
                    base: base_gap,
                    local: local_gap,
                    remote: remote_gap,
                }
            };
            regions.push(region);
        }

        if !sync.base.is_empty() {
            regions.push(Region::Unchanged(sync.base.clone()));
        }
        bi = sync.base.end;
        li = sync.local.end;
        ri = sync.remote.end;
    }

    regions
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_no_divergence_is_identity() {
        for text in ["", "plain", "a\nb\nc\n", "ünïcödé"] {
            assert_eq!(
                merge(text, text, text),
                MergeOutcome {
                    text: text.to_string(),
                    conflicts: 0
                }
            );
        }
    }

    #[test]
    fn test_local_only_change_passes_through() {
        let outcome = merge("a\nb\nc", "a\nX\nc", "a\nb\nc");
        assert_eq!(outcome.text, "a\nX\nc");
        assert!(!outcome.conflict());
    }

    #[test]
    fn test_remote_only_change_passes_through() {
        let outcome = merge("a\nb\nc", "a\nb\nc", "a\nb\nc\nd");
        assert_eq!(outcome.text, "a\nb\nc\nd");
        assert!(!outcome.conflict());
    }

    #[test]
    fn test_conflict_takes_remote() {
        let outcome = merge("line1", "line1-local", "line1-remote");
        assert_eq!(outcome.text, "line1-remote");
        assert!(outcome.conflict());
        assert_eq!(outcome.conflicts, 1);
    }

    #[test]
    fn test_disjoint_edits_combine() {
        let base = "first line\nsecond line\nthird line\n";
        let local = "FIRST line\nsecond line\nthird line\n";
        let remote = "first line\nsecond line\nthird LINE\n";
        let outcome = merge(base, local, remote);
        assert_eq!(outcome.text, "FIRST line\nsecond line\nthird LINE\n");
        assert!(!outcome.conflict());
    }

    #[test]
    fn test_identical_edits_are_not_conflicts() {
        let outcome = merge("x = 1", "x = 2", "x = 2");
        assert_eq!(outcome.text, "x = 2");
        assert!(!outcome.conflict());
    }

    #[test]
    fn test_both_delete_same_span() {
        let outcome = merge("keep drop keep", "keep keep", "keep keep");
        assert_eq!(outcome.text, "keep keep");
        assert!(!outcome.conflict());
    }

    #[test]
    fn test_line_granularity_conflict_keeps_remote_line() {
        let base = "a\nb\nc\n";
        let local = "a\nlocal b\nc\n";
        let remote = "a\nremote b\nc\n";
        let outcome = merge_with(Granularity::Line, base, local, remote);
        assert_eq!(outcome.text, "a\nremote b\nc\n");
        assert!(outcome.conflict());
    }

    #[test]
    fn test_line_granularity_merges_separate_lines() {
        let base = "one\ntwo\nthree\n";
        let local = "ONE\ntwo\nthree\n";
        let remote = "one\ntwo\nTHREE\n";
        let outcome = merge_with(Granularity::Line, base, local, remote);
        assert_eq!(outcome.text, "ONE\ntwo\nTHREE\n");
        assert!(!outcome.conflict());
    }

    #[test]
    fn test_granularity_parsing() {
        assert_eq!("line".parse::<Granularity>(), Ok(Granularity::Line));
        assert_eq!("Character".parse::<Granularity>(), Ok(Granularity::Character));
        assert!("word".parse::<Granularity>().is_err());
    }

    fn text() -> impl Strategy<Value = String> {
        let alphabet = vec!['a', 'b', 'c', ' ', '\n', 'é', 'ß', '日', '🙂'];
        prop::collection::vec(prop::sample::select(alphabet), 0..32)
            .prop_map(|chars| chars.into_iter().collect())
    }

    fn granularity() -> impl Strategy<Value = Granularity> {
        prop_oneof![Just(Granularity::Character), Just(Granularity::Line)]
    }

    proptest! {
        #[test]
        fn test_unchanged_inputs_merge_to_themselves(t in text(), g in granularity()) {
            let outcome = merge_with(g, &t, &t, &t);
            prop_assert_eq!(&outcome.text, &t);
            prop_assert!(!outcome.conflict());
        }

        #[test]
        fn test_local_only_edits_pass_through(base in text(), local in text(), g in granularity()) {
            let outcome = merge_with(g, &base, &local, &base);
            prop_assert_eq!(&outcome.text, &local);
            prop_assert!(!outcome.conflict());
        }

        #[test]
        fn test_remote_only_edits_pass_through(base in text(), remote in text(), g in granularity()) {
            let outcome = merge_with(g, &base, &base, &remote);
            prop_assert_eq!(&outcome.text, &remote);
            prop_assert!(!outcome.conflict());
        }

        #[test]
        fn test_agreeing_sides_never_conflict(base in text(), both in text(), g in granularity()) {
            let outcome = merge_with(g, &base, &both, &both);
            prop_assert_eq!(&outcome.text, &both);
            prop_assert!(!outcome.conflict());
        }
    }
}
