//! Balanced contiguous partitioning of record indices

use std::ops::Range;

/// Contiguous range of record indices assigned to one worker
///
/// `start` doubles as the partition's rank: sorting outputs by it restores
/// file order without re-sorting records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    /// First record index (inclusive)
    pub start: usize,
    /// One past the last record index
    pub end: usize,
}

impl Partition {
    /// Number of records in the partition
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the partition is empty
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Record indices covered
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Split `[0, n)` into `workers` contiguous ranges
///
/// Sizes differ by at most one; the first `n % workers` partitions get the
/// extra element. `n == 0` or `workers == 0` yields one empty partition.
///
/// ```
/// use fastxmap::parallel::partition;
///
/// let parts = partition(10, 3);
/// let sizes: Vec<usize> = parts.iter().map(|p| p.len()).collect();
/// assert_eq!(sizes, vec![4, 3, 3]);
/// assert_eq!(parts[1].start, 4);
/// ```
pub fn partition(n: usize, workers: usize) -> Vec<Partition> {
    if n == 0 || workers == 0 {
        return vec![Partition { start: 0, end: 0 }];
    }

    let base = n / workers;
    let extra = n % workers;
    let mut start = 0;

    (0..workers)
        .map(|i| {
            let len = base + usize::from(i < extra);
            let part = Partition {
                start,
                end: start + len,
            };
            start += len;
            part
        })
        .collect()
}

/// Number of workers to use: `requested` (or all cores), clamped to
/// `[1, available cores]`
pub fn worker_count(requested: Option<usize>) -> usize {
    let available = num_cpus::get().max(1);
    requested.unwrap_or(available).clamp(1, available)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_degenerate_inputs() {
        assert_eq!(partition(0, 4), vec![Partition { start: 0, end: 0 }]);
        assert_eq!(partition(7, 0), vec![Partition { start: 0, end: 0 }]);
        assert_eq!(partition(0, 0), vec![Partition { start: 0, end: 0 }]);
    }

    #[test]
    fn test_more_workers_than_records() {
        let parts = partition(2, 4);
        let sizes: Vec<usize> = parts.iter().map(Partition::len).collect();
        assert_eq!(sizes, vec![1, 1, 0, 0]);
        assert_eq!(parts[3].start, 2);
    }

    #[test]
    fn test_worker_count_bounds() {
        let available = num_cpus::get().max(1);
        assert_eq!(worker_count(None), available);
        assert_eq!(worker_count(Some(0)), 1);
        assert_eq!(worker_count(Some(usize::MAX)), available);
        assert_eq!(worker_count(Some(1)), 1);
    }

    proptest! {
        /// Sizes differ by at most one and the ranges tile [0, n) in order
        #[test]
        fn test_partitions_balanced_and_exhaustive(n in 0usize..10_000, w in 1usize..64) {
            let parts = partition(n, w);

            let expected = if n == 0 { 1 } else { w };
            prop_assert_eq!(parts.len(), expected);

            let max = parts.iter().map(Partition::len).max().unwrap();
            let min = parts.iter().map(Partition::len).min().unwrap();
            prop_assert!(max - min <= 1);

            let mut next = 0;
            for part in &parts {
                prop_assert_eq!(part.start, next);
                next = part.end;
            }
            prop_assert_eq!(next, n);
        }
    }
}
