// SMART PARENT SELECTOR
// Picks the 3-5 "bluest" tips as parents for a new block or transaction.
//
// INVARIANTS:
// 1. Requested count is clamped to [MIN_PARENTS, MAX_PARENTS]
// 2. Ordering is (blue score desc, identifier asc), so equal-score tips resolve deterministically
// 3. Fewer than `count` parents are returned only when fewer tips exist

use serde::{Deserialize, Serialize};

pub const MIN_PARENTS: usize = 3;
pub const MAX_PARENTS: usize = 5;

/// Anything that can stand as a DAG tip: an ordered identifier plus a blue score.
pub trait ScoredTip {
    type Id: Ord + Clone;

    fn tip_id(&self) -> &Self::Id;

    fn blue_score(&self) -> u64;
}

/// Result of parent selection, in selection order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedParents<T> {
    pub parents: Vec<T>,
}

impl<T: ScoredTip> SelectedParents<T> {
    pub fn count(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn ids(&self) -> Vec<T::Id> {
        self.parents.iter().map(|p| p.tip_id().clone()).collect()
    }

    pub fn blue_scores(&self) -> Vec<u64> {
        self.parents.iter().map(|p| p.blue_score()).collect()
    }
}

/// Clamp a caller's requested parent fan-out into the protocol bound.
pub fn clamp_parent_count(requested: usize) -> usize {
    requested.clamp(MIN_PARENTS, MAX_PARENTS)
}

/// Select up to `clamp_parent_count(count)` tips with the highest blue scores.
pub fn select_bluest_tips<T>(tips: &[T], count: usize) -> SelectedParents<T>
where
    T: ScoredTip + Clone,
{
    let count = clamp_parent_count(count);

    let mut ranked: Vec<&T> = tips.iter().collect();
    ranked.sort_by(|a, b| {
        b.blue_score()
            .cmp(&a.blue_score())
            .then_with(|| a.tip_id().cmp(b.tip_id()))
    });

    SelectedParents {
        parents: ranked.into_iter().take(count).cloned().collect(),
    }
}
