//! Basal segments and the fixed 30-minute grid.
//!
//! The patch plans a day as 1440 minutes divided into 48 half-hour slots.
//! A [`Segment`] assigns an hourly dose rate to a contiguous, grid-aligned
//! interval `[start, end)` of that day. Segments carry the interval algebra
//! the schedule editor needs: coverage and overlap tests, one-sided
//! shrinking, and splitting around a carved-out range.

use crate::{Error, Result};

/// Minutes in a schedule day.
pub const MINUTES_PER_DAY: u32 = 1440;

/// Width of one grid slot in minutes.
pub const MINUTES_PER_CELL: u32 = 30;

/// Number of grid slots in a day.
pub const CELLS_PER_DAY: usize = (MINUTES_PER_DAY / MINUTES_PER_CELL) as usize;

/// One fixed slot of the 48-slot daily grid.
///
/// Cells are iteration artifacts, not stored state: schedules are flattened
/// against them to produce per-slot output. `units_per_hour` holds the rate
/// of the segment matched to the cell, zero when nothing covers it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridCell {
    /// Slot index, `0..48`
    pub slot: usize,
    /// First minute of the slot
    pub start_minute: u32,
    /// One past the last minute of the slot
    pub end_minute: u32,
    /// Rate matched onto this slot
    pub units_per_hour: f64,
}

impl GridCell {
    /// The cell covering `[30 * slot, 30 * slot + 30)`, with no rate yet.
    pub fn at(slot: usize) -> Self {
        debug_assert!(slot < CELLS_PER_DAY);
        let start_minute = slot as u32 * MINUTES_PER_CELL;
        Self {
            slot,
            start_minute,
            end_minute: start_minute + MINUTES_PER_CELL,
            units_per_hour: 0.0,
        }
    }
}

/// A dose rate over a half-open, grid-aligned interval of the day.
///
/// Construction validates the interval, so every `Segment` in circulation
/// is well formed. The rate may be zero; a zero-dose segment is
/// constructible but marks its collection invalid for delivery.
#[derive(Clone, Debug, PartialEq)]
pub struct Segment {
    start_minute: u32,
    end_minute: u32,
    units_per_hour: f64,
}

impl Segment {
    /// Create a validated segment.
    ///
    /// Boundaries must satisfy `start < end <= 1440` and align to the
    /// 30-minute grid, and the rate must be a finite non-negative number.
    /// Anything else is a caller bug and is rejected rather than clamped.
    pub fn new(start_minute: u32, end_minute: u32, units_per_hour: f64) -> Result<Self> {
        if start_minute >= end_minute {
            return Err(Error::Segment(format!(
                "segment range [{}, {}) is inverted or empty",
                start_minute, end_minute
            )));
        }
        if end_minute > MINUTES_PER_DAY {
            return Err(Error::Segment(format!(
                "segment end {} is past the {}-minute day",
                end_minute, MINUTES_PER_DAY
            )));
        }
        if start_minute % MINUTES_PER_CELL != 0 || end_minute % MINUTES_PER_CELL != 0 {
            return Err(Error::Segment(format!(
                "segment [{}, {}) is not aligned to the {}-minute grid",
                start_minute, end_minute, MINUTES_PER_CELL
            )));
        }
        if !units_per_hour.is_finite() || units_per_hour < 0.0 {
            return Err(Error::Segment(format!(
                "dose rate {} is not a finite non-negative number",
                units_per_hour
            )));
        }
        Ok(Self {
            start_minute,
            end_minute,
            units_per_hour,
        })
    }

    /// Full-day segment at a single rate.
    pub fn full_day(units_per_hour: f64) -> Result<Self> {
        Self::new(0, MINUTES_PER_DAY, units_per_hour)
    }

    /// First minute of the interval.
    pub fn start_minute(&self) -> u32 {
        self.start_minute
    }

    /// One past the last minute of the interval.
    pub fn end_minute(&self) -> u32 {
        self.end_minute
    }

    /// Hourly dose rate in insulin units.
    pub fn units_per_hour(&self) -> f64 {
        self.units_per_hour
    }

    /// Grid slot of the first minute.
    pub fn start_index(&self) -> usize {
        (self.start_minute / MINUTES_PER_CELL) as usize
    }

    /// Grid slot one past the last covered slot.
    pub fn end_index(&self) -> usize {
        (self.end_minute / MINUTES_PER_CELL) as usize
    }

    /// Interval length in minutes.
    pub fn duration_minutes(&self) -> u32 {
        self.end_minute - self.start_minute
    }

    /// A zero-dose segment delivers nothing.
    pub fn is_zero_dose(&self) -> bool {
        self.units_per_hour == 0.0
    }

    /// The minute falls inside `[start, end)`.
    pub fn contains_minute(&self, minute: u32) -> bool {
        self.start_minute <= minute && minute < self.end_minute
    }

    /// Same `[start, end)` range. Rates are not compared.
    pub fn same_span(&self, other: &Segment) -> bool {
        self.start_minute == other.start_minute && self.end_minute == other.end_minute
    }

    /// Shares a start boundary or an end boundary with `other`.
    pub fn shares_edge(&self, other: &Segment) -> bool {
        self.start_minute == other.start_minute || self.end_minute == other.end_minute
    }

    /// `other`'s range lies entirely within ours. Equal ranges count.
    pub fn covers(&self, other: &Segment) -> bool {
        self.start_minute <= other.start_minute && other.end_minute <= self.end_minute
    }

    /// Our range lies entirely within `other`'s.
    pub fn covered_by(&self, other: &Segment) -> bool {
        other.covers(self)
    }

    /// The ranges intersect. Touching boundaries do not count.
    pub fn overlaps(&self, other: &Segment) -> bool {
        self.start_minute < other.end_minute && other.start_minute < self.end_minute
    }

    /// Strict partial overlap: the ranges intersect but neither contains
    /// the other.
    pub fn partially_overlaps(&self, other: &Segment) -> bool {
        self.overlaps(other) && !self.covers(other) && !self.covered_by(other)
    }

    /// The cell's full minute range lies within `[start, end)`.
    pub fn contains_cell(&self, cell: &GridCell) -> bool {
        self.start_minute <= cell.start_minute && cell.end_minute <= self.end_minute
    }

    /// Shrink this segment by the portion `target` overlaps from one side.
    ///
    /// A target overlapping our left edge moves `start` up to the target's
    /// end; one overlapping our right edge pulls `end` back to the target's
    /// start. At most one edge moves. With `strict` set the call is a no-op
    /// unless the two are in strict partial overlap; a target that covers
    /// us entirely is never handled here, callers test [`covers`] first and
    /// split instead.
    ///
    /// [`covers`]: Segment::covers
    pub fn subtract(&mut self, target: &Segment, strict: bool) {
        if strict && !self.partially_overlaps(target) {
            return;
        }
        if target.start_minute <= self.start_minute
            && self.start_minute < target.end_minute
            && target.end_minute <= self.end_minute
        {
            self.start_minute = target.end_minute;
        } else if self.start_minute <= target.start_minute
            && target.start_minute < self.end_minute
            && self.end_minute <= target.end_minute
        {
            self.end_minute = target.start_minute;
        }
    }

    /// Carve `target`'s range out of this segment, returning the remainder.
    ///
    /// The pieces keep our rate: none when the spans match exactly, one
    /// when the target is flush with either boundary, two when it sits
    /// strictly inside. With `strict` set, a target we do not cover yields
    /// `None`; without it the caller vouches for coverage.
    pub fn split_by(&self, target: &Segment, strict: bool) -> Option<Vec<Segment>> {
        if strict && !self.covers(target) {
            return None;
        }
        let mut pieces = Vec::with_capacity(2);
        if self.start_minute < target.start_minute {
            pieces.push(Segment {
                start_minute: self.start_minute,
                end_minute: target.start_minute,
                units_per_hour: self.units_per_hour,
            });
        }
        if target.end_minute < self.end_minute {
            pieces.push(Segment {
                start_minute: target.end_minute,
                end_minute: self.end_minute,
                units_per_hour: self.units_per_hour,
            });
        }
        Some(pieces)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(start: u32, end: u32) -> Segment {
        Segment::new(start, end, 1.0).unwrap()
    }

    #[test]
    fn test_construction_rejects_bad_intervals() {
        assert!(Segment::new(120, 120, 1.0).is_err());
        assert!(Segment::new(240, 120, 1.0).is_err());
        assert!(Segment::new(0, 1470, 1.0).is_err());
        assert!(Segment::new(0, 45, 1.0).is_err());
        assert!(Segment::new(15, 60, 1.0).is_err());
        assert!(Segment::new(0, 60, -0.5).is_err());
        assert!(Segment::new(0, 60, f64::NAN).is_err());
        assert!(Segment::new(0, 60, f64::INFINITY).is_err());
    }

    #[test]
    fn test_construction_allows_zero_dose() {
        let s = Segment::new(0, 60, 0.0).unwrap();
        assert!(s.is_zero_dose());
        assert!(!seg(0, 60).is_zero_dose());
    }

    #[test]
    fn test_indices_and_duration() {
        let s = seg(90, 180);
        assert_eq!(s.start_index(), 3);
        assert_eq!(s.end_index(), 6);
        assert_eq!(s.duration_minutes(), 90);

        let full = Segment::full_day(1.0).unwrap();
        assert_eq!(full.start_index(), 0);
        assert_eq!(full.end_index(), CELLS_PER_DAY);
        assert_eq!(full.duration_minutes(), MINUTES_PER_DAY);
    }

    #[test]
    fn test_contains_minute_is_half_open() {
        let s = seg(60, 120);
        assert!(!s.contains_minute(59));
        assert!(s.contains_minute(60));
        assert!(s.contains_minute(119));
        assert!(!s.contains_minute(120));
    }

    #[test]
    fn test_overlap_and_coverage_predicates() {
        let a = seg(0, 120);
        let b = seg(60, 180);
        let c = seg(120, 240);
        let inner = seg(30, 90);

        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        // Touching boundaries are not an overlap
        assert!(!a.overlaps(&c));
        assert!(!c.overlaps(&a));

        assert!(a.covers(&inner));
        assert!(inner.covered_by(&a));
        assert!(!inner.covers(&a));
        assert!(a.covers(&a));

        assert!(a.partially_overlaps(&b));
        assert!(!a.partially_overlaps(&inner));
        assert!(!a.partially_overlaps(&c));
    }

    #[test]
    fn test_same_span_and_shared_edges() {
        let a = seg(60, 120);
        let b = Segment::new(60, 120, 2.5).unwrap();
        let c = seg(60, 180);
        assert!(a.same_span(&b));
        assert!(!a.same_span(&c));
        assert!(a.shares_edge(&c));
        assert!(!a.shares_edge(&seg(90, 150)));
    }

    #[test]
    fn test_contains_cell_requires_full_slot() {
        let s = seg(60, 150);
        assert!(!s.contains_cell(&GridCell::at(1)));
        assert!(s.contains_cell(&GridCell::at(2)));
        assert!(s.contains_cell(&GridCell::at(4)));
        assert!(!s.contains_cell(&GridCell::at(5)));
    }

    #[test]
    fn test_subtract_left_overlap() {
        let mut s = seg(120, 360);
        s.subtract(&seg(60, 180), true);
        assert_eq!(s.start_minute(), 180);
        assert_eq!(s.end_minute(), 360);
    }

    #[test]
    fn test_subtract_right_overlap() {
        let mut s = seg(120, 360);
        s.subtract(&seg(300, 420), true);
        assert_eq!(s.start_minute(), 120);
        assert_eq!(s.end_minute(), 300);
    }

    #[test]
    fn test_subtract_strict_ignores_non_partial() {
        // Disjoint target
        let mut s = seg(120, 360);
        s.subtract(&seg(600, 660), true);
        assert!(s.same_span(&seg(120, 360)));

        // Contained target is not a partial overlap either
        s.subtract(&seg(180, 240), true);
        assert!(s.same_span(&seg(120, 360)));
    }

    #[test]
    fn test_split_by_interior_target() {
        let s = seg(0, 720);
        let pieces = s.split_by(&seg(120, 300), true).unwrap();
        assert_eq!(pieces.len(), 2);
        assert!(pieces[0].same_span(&seg(0, 120)));
        assert!(pieces[1].same_span(&seg(300, 720)));
        assert_eq!(pieces[0].units_per_hour(), 1.0);
        assert_eq!(pieces[1].units_per_hour(), 1.0);
    }

    #[test]
    fn test_split_by_flush_targets() {
        let s = seg(0, 720);

        let left_flush = s.split_by(&seg(0, 300), true).unwrap();
        assert_eq!(left_flush.len(), 1);
        assert!(left_flush[0].same_span(&seg(300, 720)));

        let right_flush = s.split_by(&seg(300, 720), true).unwrap();
        assert_eq!(right_flush.len(), 1);
        assert!(right_flush[0].same_span(&seg(0, 300)));

        let exact = s.split_by(&seg(0, 720), true).unwrap();
        assert!(exact.is_empty());
    }

    #[test]
    fn test_split_by_strict_requires_coverage() {
        let s = seg(120, 360);
        assert!(s.split_by(&seg(60, 180), true).is_none());
        assert!(s.split_by(&seg(600, 660), true).is_none());
        // Unchecked mode leaves responsibility with the caller
        assert!(s.split_by(&seg(120, 360), false).is_some());
    }

    #[test]
    fn test_split_pieces_reconstitute_original() {
        let s = seg(60, 600);
        let target = seg(180, 420);
        let pieces = s.split_by(&target, true).unwrap();

        let mut spans: Vec<(u32, u32)> = pieces
            .iter()
            .map(|p| (p.start_minute(), p.end_minute()))
            .collect();
        spans.push((target.start_minute(), target.end_minute()));
        spans.sort();

        assert_eq!(spans.first().map(|s| s.0), Some(60));
        assert_eq!(spans.last().map(|s| s.1), Some(600));
        for pair in spans.windows(2) {
            assert_eq!(pair[0].1, pair[1].0);
        }
    }
}
