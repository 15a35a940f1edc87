//! Top-k selection over score arrays.

use std::cmp::Ordering;

/// Direction of a ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Smallest scores first (distances)
    Ascending,
    /// Largest scores first (relevance)
    Descending,
}

/// Indices of the `k` best entries of `scores`.
///
/// Entries are ordered by score in the given direction; equal scores keep
/// their original index order, so repeated queries over the same data rank
/// identically. Returns `min(k, scores.len())` indices and never touches
/// `scores` itself.
pub fn select_top_k<T>(scores: &[T], k: usize, order: SortOrder) -> Vec<usize>
where
    T: Copy + Into<f64>,
{
    let k = k.min(scores.len());
    if k == 0 {
        return Vec::new();
    }

    let mut ids: Vec<usize> = (0..scores.len()).collect();
    let compare = |a: &usize, b: &usize| -> Ordering {
        let (a, b): (f64, f64) = (scores[*a].into(), scores[*b].into());
        match order {
            SortOrder::Ascending => a.total_cmp(&b),
            SortOrder::Descending => b.total_cmp(&a),
        }
    };

    // Partition first so large collections only fully sort the winners.
    // The index is the final tie-breaker, which keeps the partition stable.
    let tie_broken = |a: &usize, b: &usize| compare(a, b).then(a.cmp(b));
    if k < ids.len() {
        ids.select_nth_unstable_by(k - 1, tie_broken);
        ids.truncate(k);
    }
    ids.sort_unstable_by(tie_broken);
    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascending_order() {
        let scores = [3.0, 1.0, 2.0, 0.5];
        assert_eq!(select_top_k(&scores, 2, SortOrder::Ascending), vec![3, 1]);
        assert_eq!(select_top_k(&scores, 4, SortOrder::Ascending), vec![3, 1, 2, 0]);
    }

    #[test]
    fn test_descending_order() {
        let scores = [3u32, 1, 7, 2];
        assert_eq!(select_top_k(&scores, 3, SortOrder::Descending), vec![2, 0, 3]);
    }

    #[test]
    fn test_ties_break_by_index() {
        let scores = [1.0, 0.0, 1.0, 0.0, 1.0];
        assert_eq!(
            select_top_k(&scores, 5, SortOrder::Ascending),
            vec![1, 3, 0, 2, 4]
        );
        assert_eq!(
            select_top_k(&scores, 4, SortOrder::Descending),
            vec![0, 2, 4, 1]
        );
        assert_eq!(select_top_k(&scores, 2, SortOrder::Descending), vec![0, 2]);
    }

    #[test]
    fn test_k_larger_than_input() {
        let scores = [2.0f32, 1.0];
        assert_eq!(select_top_k(&scores, 10, SortOrder::Ascending), vec![1, 0]);
    }

    #[test]
    fn test_zero_k_and_empty_scores() {
        assert!(select_top_k(&[1.0], 0, SortOrder::Ascending).is_empty());
        assert!(select_top_k::<f64>(&[], 3, SortOrder::Descending).is_empty());
    }

    #[test]
    fn test_scores_unchanged() {
        let scores = vec![5.0, 4.0, 3.0];
        let before = scores.clone();
        let _ = select_top_k(&scores, 2, SortOrder::Ascending);
        assert_eq!(scores, before);
    }
}
