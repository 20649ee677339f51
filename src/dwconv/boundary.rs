//! Border / interior classification of output pixels.
//!
//! Only the first and last output row and column of the whole image can have taps that fall
//! into the padding; everything else gathers without bounds checks.

use std::ops::Range;

/// A worker's range along one output axis, split into its border and interior parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeSplit {
    /// Index 0 when it lies in the range.
    pub first: Option<usize>,
    pub interior: Range<usize>,
    /// Index `extent - 1` when it lies in the range and differs from `first`.
    pub last: Option<usize>,
}

impl EdgeSplit {
    pub fn new(range: Range<usize>, extent: usize) -> Self {
        if range.is_empty() || extent == 0 {
            return Self { first: None, interior: 0..0, last: None };
        }
        let first = (range.start == 0).then_some(0);
        let last_idx = extent - 1;
        let last = (range.end == extent && last_idx != 0).then_some(last_idx);
        let lo = range.start.max(1);
        let hi = range.end.min(last_idx);
        let interior = if lo < hi { lo..hi } else { 0..0 };
        Self { first, interior, last }
    }

    /// Border indices in ascending order.
    pub fn borders(&self) -> impl Iterator<Item = usize> + '_ {
        self.first.into_iter().chain(self.last)
    }

    /// Every index of the split, borders and interior.
    pub fn len(&self) -> usize { self.borders().count() + self.interior.len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}
