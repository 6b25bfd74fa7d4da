//! Contiguous work partitioning
//!
//! Every parallel backend assigns particles to workers through these
//! functions. Ranges are disjoint and cover `0..len`, sizes differ by at most
//! one, and the larger ranges sit at the end.

use std::ops::Range;

/// Half-open range owned by `worker` out of `workers`
pub fn partition_range(len: usize, workers: usize, worker: usize) -> Range<usize> {
    range_start(len, workers, worker)..range_start(len, workers, worker + 1)
}

/// All worker ranges, in worker order
pub fn partition(len: usize, workers: usize) -> Vec<Range<usize>> {
    (0..workers.max(1))
        .map(|w| partition_range(len, workers, w))
        .collect()
}

fn range_start(len: usize, workers: usize, worker: usize) -> usize {
    let workers = workers.max(1);
    let base = len / workers;
    let first_big = workers - len % workers;
    worker * base + worker.saturating_sub(first_big)
}
