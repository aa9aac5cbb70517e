//! Ordered segment collections and whole-day coverage queries.
//!
//! A [`SegmentSet`] is the list a schedule is built from. It stays
//! deliberately permissive on mutation; the editor adds and removes pieces
//! freely and asks afterwards whether the result tiles the day. Callers
//! that need the non-overlap invariant check [`covers_full_day`] or
//! [`first_gap`] once editing settles.
//!
//! [`covers_full_day`]: SegmentSet::covers_full_day
//! [`first_gap`]: SegmentSet::first_gap

use crate::segment::{GridCell, Segment, CELLS_PER_DAY, MINUTES_PER_DAY};

/// Ordered list of dose segments.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SegmentSet {
    segments: Vec<Segment>,
}

impl SegmentSet {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set holding the given segments, in the given order.
    pub fn from_segments(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Borrow the segments in insertion order.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Owned copy of the list, detached from this set.
    pub fn snapshot(&self) -> Vec<Segment> {
        self.segments.clone()
    }

    pub fn push(&mut self, segment: Segment) {
        self.segments.push(segment);
    }

    /// Drop all segments.
    pub fn clear(&mut self) {
        self.segments.clear();
    }

    /// Swap in a whole new list.
    pub fn replace(&mut self, segments: Vec<Segment>) {
        self.segments = segments;
    }

    /// Usability check for delivery.
    ///
    /// An empty list fails unless `allow_empty`; a zero-dose member fails
    /// regardless. The two are separate conditions, `allow_empty` waives
    /// only the first.
    pub fn is_valid(&self, allow_empty: bool) -> bool {
        if self.segments.is_empty() {
            return allow_empty;
        }
        self.segments.iter().all(|s| !s.is_zero_dose())
    }

    /// True when the segments, sorted by start, chain contiguously from
    /// minute 0 to minute 1440 with no gaps or overlaps.
    pub fn covers_full_day(&self) -> bool {
        if self.segments.is_empty() {
            return false;
        }
        let sorted = self.sorted_by_start();
        if sorted[0].start_minute() != 0 {
            return false;
        }
        for pair in sorted.windows(2) {
            if pair[0].end_minute() != pair[1].start_minute() {
                return false;
            }
        }
        sorted[sorted.len() - 1].end_minute() == MINUTES_PER_DAY
    }

    /// First uncovered stretch, as `(start, end)` grid-slot indices.
    ///
    /// `(48, 48)` means the day is fully covered. An empty set reports
    /// `(0, 48)`. Leading, interior, and trailing gaps are all found; with
    /// several gaps only the earliest is reported.
    pub fn first_gap(&self) -> (usize, usize) {
        if self.segments.is_empty() {
            return (0, CELLS_PER_DAY);
        }
        let sorted = self.sorted_by_start();
        if sorted[0].start_index() != 0 {
            return (0, sorted[0].start_index());
        }
        for pair in sorted.windows(2) {
            if pair[0].end_index() < pair[1].start_index() {
                return (pair[0].end_index(), pair[1].start_index());
            }
        }
        let last_end = sorted[sorted.len() - 1].end_index();
        if last_end < CELLS_PER_DAY {
            return (last_end, CELLS_PER_DAY);
        }
        (CELLS_PER_DAY, CELLS_PER_DAY)
    }

    /// Walk the 48 grid cells in ascending order.
    ///
    /// Each cell is passed to `f` together with the first segment covering
    /// it, if any; the cell's rate is filled in from that segment. Return
    /// `false` from `f` to stop early.
    pub fn for_each_cell<F>(&self, mut f: F)
    where
        F: FnMut(&GridCell, Option<&Segment>) -> bool,
    {
        for slot in 0..CELLS_PER_DAY {
            let mut cell = GridCell::at(slot);
            let covering = self.segments.iter().find(|s| s.contains_cell(&cell));
            if let Some(segment) = covering {
                cell.units_per_hour = segment.units_per_hour();
            }
            if !f(&cell, covering) {
                break;
            }
        }
    }

    fn sorted_by_start(&self) -> Vec<Segment> {
        let mut sorted = self.segments.clone();
        sorted.sort_by_key(|s| s.start_minute());
        sorted
    }
}
