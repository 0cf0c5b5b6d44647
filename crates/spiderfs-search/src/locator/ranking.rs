//! Relevance scoring and bounded top-K selection.
//!
//! Tiers never overlap: an exact substring always outranks a
//! case-insensitive one, which always outranks a scattered subsequence.
//! Within the subsequence tier fewer skipped characters score higher.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use crate::model::LocatorHit;

const EXACT: u32 = 3000;
const CASELESS: u32 = 2000;
const SUBSEQUENCE: u32 = 1000;
const MAX_GAP_PENALTY: u32 = 999;

/// Scores `relative` against `pattern`; `None` means no match.
pub(crate) fn score(pattern: &str, relative: &str) -> Option<u32> {
    if relative.contains(pattern) {
        return Some(EXACT);
    }
    let folded_pattern = pattern.to_lowercase();
    let folded_relative = relative.to_lowercase();
    if folded_relative.contains(&folded_pattern) {
        return Some(CASELESS);
    }
    let gaps = subsequence_gaps(&folded_pattern, &folded_relative)?;
    let penalty = u32::try_from(gaps).unwrap_or(MAX_GAP_PENALTY).min(MAX_GAP_PENALTY);
    Some(SUBSEQUENCE + (MAX_GAP_PENALTY - penalty))
}

/// True when every character of `pattern` occurs in order in `relative`,
/// ignoring case. This is the filter `fzf -i +x` applies.
pub(crate) fn is_candidate(pattern: &str, relative: &str) -> bool {
    subsequence_gaps(&pattern.to_lowercase(), &relative.to_lowercase()).is_some()
}

/// Characters skipped between the first and last matched position, using
/// leftmost matching.
fn subsequence_gaps(pattern: &str, candidate: &str) -> Option<usize> {
    let mut remaining = candidate.chars();
    let mut gaps = 0usize;
    for (index, wanted) in pattern.chars().enumerate() {
        let mut skipped = 0usize;
        loop {
            match remaining.next() {
                Some(found) if found == wanted => break,
                Some(_) => skipped += 1,
                None => return None,
            }
        }
        if index > 0 {
            gaps += skipped;
        }
    }
    Some(gaps)
}

/// A scored path awaiting selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Ranked {
    pub(crate) score: u32,
    pub(crate) depth: usize,
    pub(crate) path: String,
    pub(crate) is_dir: bool,
}

impl Ord for Ranked {
    /// Greater means more relevant: higher score, then shallower depth,
    /// then lexically smaller path.
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .cmp(&other.score)
            .then_with(|| other.depth.cmp(&self.depth))
            .then_with(|| other.path.cmp(&self.path))
            .then_with(|| self.is_dir.cmp(&other.is_dir))
    }
}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Keeps the `limit` most relevant entries seen so far.
#[derive(Debug)]
pub(crate) struct TopK {
    limit: usize,
    heap: BinaryHeap<Reverse<Ranked>>,
}

impl TopK {
    pub(crate) fn new(limit: usize) -> Self {
        Self {
            limit,
            heap: BinaryHeap::with_capacity(limit.saturating_add(1)),
        }
    }

    pub(crate) fn push(&mut self, entry: Ranked) {
        self.heap.push(Reverse(entry));
        if self.heap.len() > self.limit {
            self.heap.pop();
        }
    }

    /// Hits ordered best first.
    pub(crate) fn into_hits(self) -> Vec<LocatorHit> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|Reverse(entry)| LocatorHit {
                path: entry.path,
                is_directory: entry.is_dir,
                score: f64::from(entry.score),
            })
            .collect()
    }
}
