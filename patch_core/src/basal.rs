//! Daily basal schedules.
//!
//! A [`BasalSchedule`] is a [`SegmentSet`] plus delivery status and a
//! cursor for the segment currently in force. The
//! [`BasalScheduleManager`] owns the live schedule, converts external
//! profiles into it, and drives status transitions as the patch reports
//! delivery events.

use crate::clock::Clock;
use crate::profile::BasalProfile;
use crate::segment::{Segment, CELLS_PER_DAY, MINUTES_PER_CELL, MINUTES_PER_DAY};
use crate::segments::SegmentSet;
use crate::Result;
use chrono::{DateTime, Duration, NaiveTime, Timelike, Utc};

/// Delivery status of a basal schedule.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BasalStatus {
    /// Programmed but not delivering
    Selected,
    /// Actively delivering
    Started,
    /// Delivery paused by the user
    Paused,
    /// Delivery suspended by the device
    Suspended,
    /// Terminal reset state
    Stopped,
}

/// A day's basal plan with its delivery status.
#[derive(Clone, Debug, PartialEq)]
pub struct BasalSchedule {
    segments: SegmentSet,
    status: BasalStatus,
    active_index: Option<usize>,
}

impl BasalSchedule {
    /// Fresh schedule: one full-day placeholder segment at the given
    /// minimum rate, `Selected`, no active segment yet.
    pub fn new(min_rate: f64) -> Result<Self> {
        let placeholder = Segment::full_day(min_rate)?;
        Ok(Self::from_segments(vec![placeholder]))
    }

    /// Schedule over the given segments, `Selected`, cursor unset.
    pub fn from_segments(segments: Vec<Segment>) -> Self {
        Self {
            segments: SegmentSet::from_segments(segments),
            status: BasalStatus::Selected,
            active_index: None,
        }
    }

    pub fn status(&self) -> BasalStatus {
        self.status
    }

    pub fn segments(&self) -> &SegmentSet {
        &self.segments
    }

    /// Delivery has begun on the patch.
    pub fn mark_started(&mut self) {
        self.set_status(BasalStatus::Started);
    }

    /// The user paused delivery.
    pub fn mark_paused(&mut self) {
        self.set_status(BasalStatus::Paused);
    }

    /// The device suspended delivery.
    pub fn mark_suspended(&mut self) {
        self.set_status(BasalStatus::Suspended);
    }

    /// Back to programmed-but-idle.
    pub fn mark_selected(&mut self) {
        self.set_status(BasalStatus::Selected);
    }

    /// Terminal reset. Forgets the active-segment cursor, so the next
    /// [`refresh_active_segment`] reports a change.
    ///
    /// [`refresh_active_segment`]: BasalSchedule::refresh_active_segment
    pub fn mark_stopped(&mut self) {
        self.set_status(BasalStatus::Stopped);
        self.active_index = None;
    }

    fn set_status(&mut self, next: BasalStatus) {
        if self.status != next {
            tracing::debug!("Basal status {:?} -> {:?}", self.status, next);
            self.status = next;
        }
    }

    /// Recompute which segment "now" falls in.
    ///
    /// Returns whether the cursor moved. The first call after construction
    /// or after a stop always reports a change, so callers resynchronize
    /// their display even if time has not crossed a boundary.
    pub fn refresh_active_segment(&mut self, clock: &dyn Clock) -> bool {
        let minute = minute_of_day(clock.now());
        let next = self.covering_index(minute);
        let changed = self.active_index.is_none() || self.active_index != next;
        if changed {
            tracing::debug!(
                "Active basal segment now {:?} (minute {})",
                next,
                minute
            );
        }
        self.active_index = next;
        changed
    }

    /// Wall-clock start of the segment the cursor points at, or of the
    /// covering segment when the cursor is unset.
    ///
    /// A cursor left pointing at a pre-midnight segment anchors the start
    /// to yesterday; the segment began before the day rolled over.
    pub fn active_segment_start(&self, clock: &dyn Clock) -> Option<DateTime<Utc>> {
        let now = clock.now();
        let minute_now = minute_of_day(now);
        let segment = self
            .active_index
            .and_then(|i| self.segments.segments().get(i))
            .or_else(|| self.segment_covering(minute_now))?;

        let midnight = now.date_naive().and_time(NaiveTime::MIN).and_utc();
        let mut start = midnight + Duration::minutes(i64::from(segment.start_minute()));
        if segment.start_minute() > minute_now {
            start = start - Duration::days(1);
        }
        Some(start)
    }

    /// Hourly rate in force at the given instant, zero when uncovered.
    pub fn rate_at(&self, at: DateTime<Utc>) -> f64 {
        self.rate_at_minute(minute_of_day(at))
    }

    /// Hourly rate in force right now.
    pub fn current_rate(&self, clock: &dyn Clock) -> f64 {
        self.rate_at(clock.now())
    }

    /// Highest hourly rate anywhere in the schedule, zero for an empty one.
    pub fn max_rate(&self) -> f64 {
        self.segments
            .segments()
            .iter()
            .map(|s| s.units_per_hour())
            .fold(0.0, f64::max)
    }

    /// Highest rate the schedule will deliver between now and `minutes`
    /// from now, wrapping past midnight into the same schedule.
    pub fn max_rate_in_window(&self, minutes: u32, clock: &dyn Clock) -> f64 {
        let start_minute = minute_of_day(clock.now());
        if minutes == 0 {
            return self.rate_at_minute(start_minute);
        }
        if minutes >= MINUTES_PER_DAY {
            return self.max_rate();
        }
        let rates = self.rate_per_cell();
        let first = (start_minute / MINUTES_PER_CELL) as usize;
        let last = ((start_minute + minutes - 1) / MINUTES_PER_CELL) as usize;
        let mut max = 0.0_f64;
        for raw in first..=last {
            max = max.max(rates[raw % CELLS_PER_DAY]);
        }
        max
    }

    /// Hourly rate for each of the 48 grid slots, zero where uncovered.
    pub fn rate_per_cell(&self) -> [f64; CELLS_PER_DAY] {
        let mut rates = [0.0; CELLS_PER_DAY];
        self.segments.for_each_cell(|cell, covering| {
            if covering.is_some() {
                rates[cell.slot] = cell.units_per_hour;
            }
            true
        });
        rates
    }

    /// Total daily dose as the plain sum of half-hour slot contributions.
    ///
    /// Rounding to pulse granularity is a display decision and is not
    /// made here; see [`Config::round_dose`].
    ///
    /// [`Config::round_dose`]: crate::config::Config::round_dose
    pub fn units_per_day(&self) -> f64 {
        self.rate_per_cell().iter().map(|rate| rate * 0.5).sum()
    }

    fn rate_at_minute(&self, minute: u32) -> f64 {
        self.segment_covering(minute)
            .map_or(0.0, |s| s.units_per_hour())
    }

    fn segment_covering(&self, minute: u32) -> Option<&Segment> {
        self.segments
            .segments()
            .iter()
            .find(|s| s.contains_minute(minute))
    }

    fn covering_index(&self, minute: u32) -> Option<usize> {
        self.segments
            .segments()
            .iter()
            .position(|s| s.contains_minute(minute))
    }
}

/// Owns the live basal schedule for the bound patch.
#[derive(Clone, Debug, PartialEq)]
pub struct BasalScheduleManager {
    schedule: BasalSchedule,
}

impl BasalScheduleManager {
    /// Manager holding a fresh placeholder schedule.
    pub fn new(min_rate: f64) -> Result<Self> {
        Ok(Self {
            schedule: BasalSchedule::new(min_rate)?,
        })
    }

    pub fn schedule(&self) -> &BasalSchedule {
        &self.schedule
    }

    /// Replace the live schedule with a fresh conversion of `profile`.
    pub fn set_schedule(&mut self, profile: &BasalProfile) -> Result<()> {
        let next = Self::schedule_from_profile(profile)?;
        tracing::info!(
            "Replacing basal schedule: {} segments, {:.2} U/day",
            next.segments().len(),
            next.units_per_day()
        );
        self.schedule = next;
        Ok(())
    }

    /// Convert a validated profile into a schedule.
    ///
    /// Breakpoint `i` becomes the segment `[start[i], start[i+1])` at its
    /// rate; the last segment always ends at minute 1440. The result
    /// covers the full day by construction.
    pub fn schedule_from_profile(profile: &BasalProfile) -> Result<BasalSchedule> {
        profile.validate()?;
        let breakpoints = &profile.breakpoints;
        let mut segments = Vec::with_capacity(breakpoints.len());
        for (i, bp) in breakpoints.iter().enumerate() {
            let end = match breakpoints.get(i + 1) {
                Some(next) => next.start_minute,
                None => MINUTES_PER_DAY,
            };
            segments.push(Segment::new(bp.start_minute, end, bp.rate)?);
        }
        Ok(BasalSchedule::from_segments(segments))
    }

    /// Structural equality between the live schedule and a fresh
    /// conversion of `profile`. `None`, and profiles that fail to
    /// convert, compare unequal.
    pub fn matches_profile(&self, profile: Option<&BasalProfile>) -> bool {
        let Some(profile) = profile else {
            return false;
        };
        let Ok(converted) = Self::schedule_from_profile(profile) else {
            return false;
        };
        self.schedule.segments().segments() == converted.segments().segments()
    }

    /// Adopt another manager's schedule and status wholesale.
    pub fn adopt(&mut self, other: &BasalScheduleManager) {
        self.schedule = other.schedule.clone();
    }

    /// The patch is gone; the schedule stays programmed but goes back to
    /// merely selected.
    pub fn reset_for_deactivation(&mut self) {
        self.schedule.mark_selected();
    }

    pub fn mark_started(&mut self) {
        self.schedule.mark_started();
    }

    pub fn mark_paused(&mut self) {
        self.schedule.mark_paused();
    }

    pub fn mark_suspended(&mut self) {
        self.schedule.mark_suspended();
    }

    pub fn mark_stopped(&mut self) {
        self.schedule.mark_stopped();
    }

    /// See [`BasalSchedule::refresh_active_segment`].
    pub fn refresh_active_segment(&mut self, clock: &dyn Clock) -> bool {
        self.schedule.refresh_active_segment(clock)
    }
}

fn minute_of_day(at: DateTime<Utc>) -> u32 {
    at.hour() * 60 + at.minute()
}
