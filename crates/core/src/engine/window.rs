use std::ops::Range;

use serde::{Deserialize, Serialize};

/// Bounds of the prefix bisection.
///
/// `last_good` is the longest prefix known clean, `upper_bound` the shortest
/// known flagged. While the window is open, `last_good < mid < upper_bound`.
/// The scanned slice always starts at 0, so the search converges on the
/// shortest flagged prefix rather than an interior byte range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchWindow {
    last_good: usize,
    upper_bound: usize,
    mid: usize,
}

impl SearchWindow {
    pub fn new(len: usize) -> Self {
        Self { last_good: 0, upper_bound: len, mid: len / 2 }
    }

    pub fn last_good(&self) -> usize {
        self.last_good
    }

    pub fn upper_bound(&self) -> usize {
        self.upper_bound
    }

    pub fn mid(&self) -> usize {
        self.mid
    }

    /// More than one byte separates the bounds.
    pub fn is_open(&self) -> bool {
        self.upper_bound.saturating_sub(self.last_good) > 1
    }

    /// Slice of the input to scan next.
    pub fn candidate(&self) -> Range<usize> {
        0..self.mid
    }

    /// Fold one verdict for the current candidate into the bounds.
    pub fn narrow(&mut self, malicious: bool) {
        debug_assert!(self.is_open());
        debug_assert!(self.last_good < self.mid && self.mid < self.upper_bound);
        if malicious {
            self.upper_bound = self.mid;
        } else {
            self.last_good = self.mid;
        }
        self.mid = (self.last_good + self.upper_bound) / 2;
    }
}
