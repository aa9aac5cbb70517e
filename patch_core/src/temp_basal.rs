//! Temporary basal overrides.
//!
//! A temp basal replaces the scheduled rate for a bounded stretch of time,
//! either with a fixed rate or with a percentage of schedule. The patch
//! runs at most one override at a time.

use crate::clock::Clock;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// How an override adjusts the scheduled rate.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateAdjustment {
    /// Fixed hourly rate in insulin units
    Absolute(f64),
    /// Percentage of the scheduled rate
    Percent(u32),
}

/// Which unit the frontend offers when composing an override.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateDisplay {
    #[default]
    Absolute,
    Percent,
}

/// A time-boxed override of the basal schedule.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TempBasal {
    /// How long the override runs once started
    pub duration_minutes: u32,
    /// Replacement for the scheduled rate
    pub adjustment: RateAdjustment,
    /// Currently delivering
    pub running: bool,
    /// When delivery began, unset until started
    pub started_at: Option<DateTime<Utc>>,
}

impl TempBasal {
    /// A not-yet-started override.
    pub fn new(duration_minutes: u32, adjustment: RateAdjustment) -> Self {
        Self {
            duration_minutes,
            adjustment,
            running: false,
            started_at: None,
        }
    }

    /// Scheduled stop time. `None` unless running.
    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        if !self.running {
            return None;
        }
        self.started_at
            .map(|start| start + Duration::minutes(i64::from(self.duration_minutes)))
    }
}

/// Holds the single current override for the patch.
///
/// Starting an override stores the manager's own stamped copy, so later
/// edits to the caller's object never leak into the authoritative one.
#[derive(Clone, Debug, Default)]
pub struct TempBasalManager {
    current: Option<TempBasal>,
    display: RateDisplay,
}

impl TempBasalManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored override, running or stopped.
    pub fn current(&self) -> Option<&TempBasal> {
        self.current.as_ref()
    }

    pub fn display(&self) -> RateDisplay {
        self.display
    }

    pub fn set_display(&mut self, display: RateDisplay) {
        self.display = display;
    }

    /// Store a running copy of `temp_basal` stamped with the current time.
    pub fn start(&mut self, temp_basal: &TempBasal, clock: &dyn Clock) {
        let mut own = temp_basal.clone();
        own.running = true;
        own.started_at = Some(clock.now());
        tracing::info!(
            "Temp basal started: {:?} for {} min",
            own.adjustment,
            own.duration_minutes
        );
        self.current = Some(own);
    }

    /// Mark the current override stopped. The adjustment fields stay
    /// around for display; only the running state and start time drop.
    pub fn stop(&mut self) {
        if let Some(current) = self.current.as_mut() {
            current.running = false;
            current.started_at = None;
            tracing::info!("Temp basal stopped");
        }
    }

    /// Forget the stored override entirely.
    pub fn clear(&mut self) {
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;

    #[test]
    fn test_new_override_is_idle() {
        let tb = TempBasal::new(90, RateAdjustment::Absolute(0.6));
        assert!(!tb.running);
        assert!(tb.started_at.is_none());
        assert!(tb.end_time().is_none());
    }

    #[test]
    fn test_start_stores_stamped_copy() {
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap();
        let clock = ManualClock::new(now);
        let mut manager = TempBasalManager::new();

        let requested = TempBasal::new(120, RateAdjustment::Percent(150));
        manager.start(&requested, &clock);

        let current = manager.current().unwrap();
        assert!(current.running);
        assert_eq!(current.started_at, Some(now));
        assert_eq!(current.end_time(), Some(now + Duration::minutes(120)));

        // The caller's object is untouched
        assert!(!requested.running);
        assert!(requested.started_at.is_none());
    }

    #[test]
    fn test_stop_keeps_adjustment_for_display() {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap());
        let mut manager = TempBasalManager::new();
        manager.start(&TempBasal::new(60, RateAdjustment::Absolute(0.8)), &clock);

        manager.stop();
        let current = manager.current().unwrap();
        assert!(!current.running);
        assert!(current.started_at.is_none());
        assert!(current.end_time().is_none());
        assert_eq!(current.adjustment, RateAdjustment::Absolute(0.8));
        assert_eq!(current.duration_minutes, 60);

        // Stopping again, or with nothing stored, is harmless
        manager.stop();
        manager.clear();
        manager.stop();
        assert!(manager.current().is_none());
    }

    #[test]
    fn test_display_unit_preference() {
        let mut manager = TempBasalManager::new();
        assert_eq!(manager.display(), RateDisplay::Absolute);
        manager.set_display(RateDisplay::Percent);
        assert_eq!(manager.display(), RateDisplay::Percent);
    }

    #[test]
    fn test_adjustment_serialization() {
        let absolute = serde_json::to_string(&RateAdjustment::Absolute(0.5)).unwrap();
        assert_eq!(absolute, r#"{"absolute":0.5}"#);
        let percent = serde_json::to_string(&RateAdjustment::Percent(130)).unwrap();
        assert_eq!(percent, r#"{"percent":130}"#);
    }
}
