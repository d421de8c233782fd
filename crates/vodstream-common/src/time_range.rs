//! Buffered time ranges.
//!
//! Mirrors what a media sink reports as "buffered": a sorted list of
//! disjoint `[start, end)` intervals in seconds. Adjacent or overlapping
//! additions are merged.

use serde::{Deserialize, Serialize};

/// A single buffered interval in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Half-open containment: `start <= t < end`.
    pub fn contains(&self, t: f64) -> bool {
        t >= self.start && t < self.end
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Sorted, disjoint set of buffered ranges.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeRanges {
    ranges: Vec<TimeRange>,
}

impl TimeRanges {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from arbitrary ranges, normalizing order and merging overlaps.
    pub fn from_ranges(ranges: impl IntoIterator<Item = (f64, f64)>) -> Self {
        let mut out = Self::new();
        for (start, end) in ranges {
            out.add(start, end);
        }
        out
    }

    /// Insert `[start, end)`, merging with any range it touches.
    ///
    /// Empty or inverted intervals are ignored.
    pub fn add(&mut self, start: f64, end: f64) {
        if start.is_nan() || end.is_nan() || end <= start {
            return;
        }

        let mut merged = TimeRange::new(start, end);
        let mut kept = Vec::with_capacity(self.ranges.len() + 1);
        for range in self.ranges.drain(..) {
            if range.end < merged.start || range.start > merged.end {
                kept.push(range);
            } else {
                merged.start = merged.start.min(range.start);
                merged.end = merged.end.max(range.end);
            }
        }
        kept.push(merged);
        kept.sort_by(|a, b| a.start.total_cmp(&b.start));
        self.ranges = kept;
    }

    /// Whether any range contains `t`.
    pub fn contains(&self, t: f64) -> bool {
        self.range_containing(t).is_some()
    }

    /// The range containing `t`, if any.
    pub fn range_containing(&self, t: f64) -> Option<TimeRange> {
        self.ranges.iter().copied().find(|r| r.contains(t))
    }

    /// Start of the first range beginning strictly after `t`.
    pub fn next_start_after(&self, t: f64) -> Option<f64> {
        self.ranges.iter().map(|r| r.start).find(|start| *start > t)
    }

    pub fn first(&self) -> Option<TimeRange> {
        self.ranges.first().copied()
    }

    pub fn last(&self) -> Option<TimeRange> {
        self.ranges.last().copied()
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimeRange> {
        self.ranges.iter()
    }

    pub fn clear(&mut self) {
        self.ranges.clear();
    }

    /// Ranges covered by both `self` and `other`.
    pub fn intersect(&self, other: &TimeRanges) -> TimeRanges {
        let mut out = TimeRanges::new();
        for a in &self.ranges {
            for b in &other.ranges {
                out.add(a.start.max(b.start), a.end.min(b.end));
            }
        }
        out
    }
}
