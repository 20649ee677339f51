//! Static split of the (batch, output row, output column) volume across workers.
//!
//! Every worker computes its own share from `(thread_id, num_threads)` alone, so the split is
//! deterministic and needs no coordination. Over all worker ids the shares are disjoint and
//! cover the whole output.

use std::ops::Range;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkPartition {
    pub batch: Range<usize>,
    pub rows: Range<usize>,
    pub cols: Range<usize>,
}

impl WorkPartition {
    pub fn empty() -> Self { Self { batch: 0..0, rows: 0..0, cols: 0..0 } }

    pub fn is_empty(&self) -> bool {
        self.batch.is_empty() || self.rows.is_empty() || self.cols.is_empty()
    }

    /// Number of output pixels (per channel) owned by this worker.
    pub fn pixels(&self) -> usize {
        if self.is_empty() { 0 } else { self.batch.len() * self.rows.len() * self.cols.len() }
    }
}

/// Factor pair `(a, b)` of `n` with `a * b == n`, `a <= b` and `b - a` minimal.
pub fn closest_factors(n: usize) -> (usize, usize) {
    if n == 0 { return (0, 0); }
    let mut a = isqrt(n);
    while n % a != 0 { a -= 1; }
    (a, n / a)
}

fn isqrt(n: usize) -> usize {
    let mut a = (n as f64).sqrt() as usize;
    while a * a > n { a -= 1; }
    while (a + 1) * (a + 1) <= n { a += 1; }
    a
}

#[inline]
fn chunk(index: usize, per: usize, total: usize) -> Range<usize> {
    let begin = (index * per).min(total);
    begin..(begin + per).min(total)
}

/// Share of worker `thread_id` out of `num_threads` for a `batch x out_h x out_w` output.
pub fn partition(batch: usize, out_h: usize, out_w: usize, thread_id: usize, num_threads: usize) -> WorkPartition {
    if batch == 0 || num_threads == 0 || thread_id >= num_threads {
        return WorkPartition::empty();
    }
    if batch >= num_threads {
        let per = (batch + num_threads - 1) / num_threads;
        return WorkPartition { batch: chunk(thread_id, per, batch), rows: 0..out_h, cols: 0..out_w };
    }

    // Fewer images than workers: each image gets a group of workers laid out as a 2-D grid.
    let per_image = num_threads / batch;
    let n = thread_id / per_image;
    if n >= batch {
        return WorkPartition::empty();
    }
    let group_begin = (n * per_image).min(num_threads);
    let group_end = (group_begin + per_image).min(num_threads);
    let local = thread_id - group_begin;
    debug_assert!(local < group_end - group_begin);

    // cols_g <= rows_g
    let (cols_g, rows_g) = closest_factors(group_end - group_begin);
    let tid_h = local / cols_g;
    let tid_w = local % cols_g;
    let h_per = (out_h + rows_g - 1) / rows_g;
    let w_per = (out_w + cols_g - 1) / cols_g;
    WorkPartition { batch: n..n + 1, rows: chunk(tid_h, h_per, out_h), cols: chunk(tid_w, w_per, out_w) }
}
