//! In-flight bolus bookkeeping.
//!
//! The patch can run one immediate bolus and one extended bolus at a time.
//! The tracker mirrors both slots and folds the firmware's absolute pulse
//! counters into injected/remaining units. The firmware is authoritative
//! for delivery progress; occlusions and user aborts legitimately leave
//! totals short of the prescription, so reported counts are never
//! second-guessed here.

use chrono::{DateTime, Utc};

/// Insulin volume metered per pump pulse, in units.
pub const UNITS_PER_PULSE: f64 = 0.05;

/// The two bolus delivery slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BolusKind {
    /// Delivered as fast as the pump can
    Now,
    /// Spread over a programmed duration
    Extended,
}

/// One bolus slot. `history_id == 0` means the slot is idle.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Bolus {
    /// Record id assigned when the bolus was prescribed, 0 when idle
    pub history_id: u32,
    /// Units still to deliver
    pub remain_units: f64,
    /// Units delivered so far
    pub injected_units: f64,
    /// When delivery began
    pub start_time: Option<DateTime<Utc>>,
    /// Expected or confirmed stop time
    pub end_time: Option<DateTime<Utc>>,
    /// `end_time` was confirmed by the device rather than estimated
    pub end_time_synced: bool,
    /// Planned spread duration; immediate boluses leave this at zero
    pub duration_minutes: u32,
}

impl Bolus {
    /// The slot holds a bolus.
    pub fn is_active(&self) -> bool {
        self.history_id != 0
    }
}

/// Mirrors the patch's immediate and extended bolus slots.
#[derive(Clone, Debug, Default)]
pub struct BolusTracker {
    now_bolus: Bolus,
    ext_bolus: Bolus,
}

impl BolusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bolus(&self, kind: BolusKind) -> &Bolus {
        match kind {
            BolusKind::Now => &self.now_bolus,
            BolusKind::Extended => &self.ext_bolus,
        }
    }

    pub fn is_active(&self, kind: BolusKind) -> bool {
        self.bolus(kind).is_active()
    }

    pub fn any_active(&self) -> bool {
        self.now_bolus.is_active() || self.ext_bolus.is_active()
    }

    /// Begin tracking an immediate bolus: the full dose still to deliver.
    pub fn start_now_bolus(
        &mut self,
        history_id: u32,
        units: f64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) {
        tracing::debug!("Now bolus {} started: {:.2} U", history_id, units);
        self.now_bolus = Bolus {
            history_id,
            remain_units: units,
            injected_units: 0.0,
            start_time: Some(start),
            end_time: Some(end),
            end_time_synced: false,
            duration_minutes: 0,
        };
    }

    /// Begin tracking an extended bolus spread over `duration_minutes`.
    pub fn start_ext_bolus(
        &mut self,
        history_id: u32,
        units: f64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        duration_minutes: u32,
    ) {
        tracing::debug!(
            "Extended bolus {} started: {:.2} U over {} min",
            history_id,
            units,
            duration_minutes
        );
        self.ext_bolus = Bolus {
            history_id,
            remain_units: units,
            injected_units: 0.0,
            start_time: Some(start),
            end_time: Some(end),
            end_time_synced: false,
            duration_minutes,
        };
    }

    /// Fold the device's absolute pulse counters into a slot.
    ///
    /// Both counters replace the stored values outright. A total that
    /// drifts from the prescription is logged and accepted.
    pub fn update_from_patch(
        &mut self,
        kind: BolusKind,
        delivered_pulses: u32,
        remaining_pulses: u32,
    ) {
        let slot = self.bolus_mut(kind);
        let previous_total = slot.injected_units + slot.remain_units;
        slot.injected_units = delivered_pulses as f64 * UNITS_PER_PULSE;
        slot.remain_units = remaining_pulses as f64 * UNITS_PER_PULSE;

        let reported_total = slot.injected_units + slot.remain_units;
        if slot.is_active() && (reported_total - previous_total).abs() > UNITS_PER_PULSE / 2.0 {
            tracing::warn!(
                "{:?} bolus {}: device reports {:.2} U total, tracker had {:.2} U",
                kind,
                slot.history_id,
                reported_total,
                previous_total
            );
        }
        tracing::debug!(
            "{:?} bolus update: {:.2} U injected, {:.2} U remaining",
            kind,
            slot.injected_units,
            slot.remain_units
        );
    }

    /// Record the stop time the device confirmed.
    pub fn sync_end_time(&mut self, kind: BolusKind, at: DateTime<Utc>) {
        let slot = self.bolus_mut(kind);
        slot.end_time = Some(at);
        slot.end_time_synced = true;
    }

    /// Reset one slot to idle.
    pub fn clear(&mut self, kind: BolusKind) {
        *self.bolus_mut(kind) = Bolus::default();
    }

    /// Reset both slots.
    pub fn clear_all(&mut self) {
        self.now_bolus = Bolus::default();
        self.ext_bolus = Bolus::default();
    }

    fn bolus_mut(&mut self, kind: BolusKind) -> &mut Bolus {
        match kind {
            BolusKind::Now => &mut self.now_bolus,
            BolusKind::Extended => &mut self.ext_bolus,
        }
    }
}
