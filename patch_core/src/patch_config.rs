//! Patch identity, counters, and the pairing/activation lifecycle.
//!
//! A [`PatchConfig`] describes the one patch the controller is bound to:
//! its transport identity, the 15-bit command sequence number, cumulative
//! delivery counters, and where it stands in the activation wizard.
//! Deactivation wipes the identity so a new patch can be bonded.

use crate::bolus::UNITS_PER_PULSE;
use crate::clock::Clock;
use crate::config::WearConfig;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// Steps of the pairing/activation wizard, in wear order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PatchLifecycle {
    /// No patch, or the bound patch was shut down
    Shutdown,
    /// Transport pairing completed
    Bonded,
    RemoveNeedleCap,
    RemoveProtectionTape,
    SafetyCheck,
    RotateKnob,
    /// Basal programming accepted by the patch
    BasalSetting,
    /// Delivering; the wizard is done
    Activated,
}

/// A lifecycle step with when it was entered.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LifecycleEvent {
    pub state: PatchLifecycle,
    pub at: DateTime<Utc>,
}

impl LifecycleEvent {
    pub fn new(state: PatchLifecycle, at: DateTime<Utc>) -> Self {
        Self { state, at }
    }
}

/// Delivery categories the firmware meters separately.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeliveryCategory {
    NormalBasal,
    TempBasal,
    NowBolus,
    ExtBolus,
}

/// Operational identity and bookkeeping for the bound patch.
#[derive(Clone, Debug)]
pub struct PatchConfig {
    mac_address: Option<String>,
    serial_number: String,
    firmware_version: String,
    seq15: i32,
    pulse_counts: HashMap<DeliveryCategory, u64>,
    wakeup_at: Option<DateTime<Utc>>,
    activated_at: Option<DateTime<Utc>>,
    pause_finish_at: Option<DateTime<Utc>>,
    needle_retry_count: u32,
    lifecycle: LifecycleEvent,
}

impl Default for PatchConfig {
    fn default() -> Self {
        Self {
            mac_address: None,
            serial_number: String::new(),
            firmware_version: String::new(),
            seq15: -1,
            pulse_counts: HashMap::new(),
            wakeup_at: None,
            activated_at: None,
            pause_finish_at: None,
            needle_retry_count: 0,
            lifecycle: LifecycleEvent::new(PatchLifecycle::Shutdown, DateTime::UNIX_EPOCH),
        }
    }
}

impl PatchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful bond to a physical patch. The sequence number
    /// starts counting and the wake-up time is stamped.
    pub fn bind(
        &mut self,
        mac_address: String,
        serial_number: String,
        firmware_version: String,
        clock: &dyn Clock,
    ) {
        tracing::info!("Bound to patch {} ({})", serial_number, mac_address);
        self.mac_address = Some(mac_address);
        self.serial_number = serial_number;
        self.firmware_version = firmware_version;
        self.seq15 = 0;
        self.update_wakeup(clock);
    }

    pub fn mac_address(&self) -> Option<&str> {
        self.mac_address.as_deref()
    }

    pub fn serial_number(&self) -> &str {
        &self.serial_number
    }

    pub fn firmware_version(&self) -> &str {
        &self.firmware_version
    }

    /// Current 15-bit command sequence number, -1 while unbound.
    pub fn seq15(&self) -> i32 {
        self.seq15
    }

    /// Restore a sequence number, -1 or `0..=0x7FFF`.
    pub fn set_seq15(&mut self, seq15: i32) {
        self.seq15 = seq15;
    }

    /// Advance the rolling sequence number. Wraps after 0x7FFF; unbound
    /// configs stay at -1.
    pub fn increment_seq(&mut self) {
        if self.seq15 < 0 {
            return;
        }
        self.seq15 = (self.seq15 + 1) & 0x7FFF;
    }

    /// Deactivated means no bound transport address, nothing else.
    pub fn is_deactivated(&self) -> bool {
        self.mac_address.is_none()
    }

    /// Wipe every trace of the bound patch. Identity, counters, and the
    /// pause window all reset; the lifecycle drops to `Shutdown` at `at`.
    pub fn deactivate(&mut self, at: DateTime<Utc>) {
        tracing::info!("Patch deactivated, clearing identity");
        self.mac_address = None;
        self.serial_number.clear();
        self.firmware_version.clear();
        self.seq15 = -1;
        self.pulse_counts.clear();
        self.wakeup_at = None;
        self.activated_at = None;
        self.pause_finish_at = None;
        self.needle_retry_count = 0;
        self.lifecycle = LifecycleEvent::new(PatchLifecycle::Shutdown, at);
    }

    /// Apply a lifecycle notification from the wizard or the patch.
    ///
    /// Re-announcing the current state is a no-op. `Activated` stamps the
    /// activation time and forgets needle retries; `Shutdown` tears the
    /// whole binding down.
    pub fn apply_lifecycle(&mut self, event: LifecycleEvent) {
        if event.state == self.lifecycle.state {
            return;
        }
        tracing::info!(
            "Patch lifecycle {:?} -> {:?}",
            self.lifecycle.state,
            event.state
        );
        match event.state {
            PatchLifecycle::Activated => {
                self.activated_at = Some(event.at);
                self.needle_retry_count = 0;
                self.lifecycle = event;
            }
            PatchLifecycle::Shutdown => {
                self.deactivate(event.at);
            }
            _ => self.lifecycle = event,
        }
    }

    pub fn lifecycle(&self) -> LifecycleEvent {
        self.lifecycle
    }

    pub fn is_activated(&self) -> bool {
        self.lifecycle.state == PatchLifecycle::Activated
    }

    /// Add device-reported pulses to a category's running total.
    pub fn record_pulses(&mut self, category: DeliveryCategory, pulses: u32) {
        *self.pulse_counts.entry(category).or_insert(0) += u64::from(pulses);
        tracing::debug!("{:?}: +{} pulses", category, pulses);
    }

    pub fn pulse_count(&self, category: DeliveryCategory) -> u64 {
        self.pulse_counts.get(&category).copied().unwrap_or(0)
    }

    /// Units delivered in one category since activation.
    pub fn delivered_units(&self, category: DeliveryCategory) -> f64 {
        self.pulse_count(category) as f64 * UNITS_PER_PULSE
    }

    /// Units delivered across all categories since activation.
    pub fn total_delivered_units(&self) -> f64 {
        self.pulse_counts.values().sum::<u64>() as f64 * UNITS_PER_PULSE
    }

    /// A needle insertion failed and will be retried.
    pub fn record_needle_retry(&mut self) {
        self.needle_retry_count += 1;
        tracing::debug!("Needle retry {}", self.needle_retry_count);
    }

    pub fn needle_retry_count(&self) -> u32 {
        self.needle_retry_count
    }

    /// Stamp the most recent wake-up from the patch.
    pub fn update_wakeup(&mut self, clock: &dyn Clock) {
        self.wakeup_at = Some(clock.now());
    }

    pub fn wakeup_at(&self) -> Option<DateTime<Utc>> {
        self.wakeup_at
    }

    pub fn activated_at(&self) -> Option<DateTime<Utc>> {
        self.activated_at
    }

    /// When the patch runs out of rated wear time, if it ever woke up.
    pub fn expires_at(&self, wear: &WearConfig) -> Option<DateTime<Utc>> {
        self.wakeup_at.map(|wakeup| wakeup + wear.wear_duration())
    }

    /// Past the rated wear duration. A config that never woke up cannot
    /// be expired.
    pub fn is_expired(&self, clock: &dyn Clock, wear: &WearConfig) -> bool {
        match self.expires_at(wear) {
            Some(expiry) => clock.now() > expiry,
            None => false,
        }
    }

    /// Open a basal pause window ending `hours` from now.
    pub fn set_basal_paused(&mut self, hours: f64, clock: &dyn Clock) {
        let offset = Duration::milliseconds((hours * 3_600_000.0).round() as i64);
        let finish = clock.now() + offset;
        tracing::info!("Basal paused until {}", finish);
        self.pause_finish_at = Some(finish);
    }

    /// A pause window is set and has not elapsed yet.
    pub fn is_in_pause_window(&self, clock: &dyn Clock) -> bool {
        self.pause_finish_at
            .map_or(false, |finish| clock.now() < finish)
    }

    /// Close the pause window.
    pub fn set_basal_resumed(&mut self) {
        self.pause_finish_at = None;
    }

    pub fn pause_finish_at(&self) -> Option<DateTime<Utc>> {
        self.pause_finish_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;

    fn clock() -> ManualClock {
        ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 15, 8, 0, 0).unwrap())
    }

    fn bound_config(clock: &ManualClock) -> PatchConfig {
        let mut config = PatchConfig::new();
        config.bind(
            "00:1B:44:11:3A:B7".into(),
            "PATCH-0042".into(),
            "1.3.0".into(),
            clock,
        );
        config
    }

    #[test]
    fn test_default_is_unbound() {
        let config = PatchConfig::new();
        assert!(config.is_deactivated());
        assert_eq!(config.seq15(), -1);
        assert_eq!(config.serial_number(), "");
        assert_eq!(config.lifecycle().state, PatchLifecycle::Shutdown);
        assert!(!config.is_activated());
        assert!(config.wakeup_at().is_none());
    }

    #[test]
    fn test_bind_establishes_identity() {
        let clock = clock();
        let config = bound_config(&clock);
        assert!(!config.is_deactivated());
        assert_eq!(config.mac_address(), Some("00:1B:44:11:3A:B7"));
        assert_eq!(config.serial_number(), "PATCH-0042");
        assert_eq!(config.seq15(), 0);
        assert_eq!(config.wakeup_at(), Some(clock.now()));
    }

    #[test]
    fn test_seq15_increments_and_wraps() {
        let clock = clock();
        let mut config = bound_config(&clock);

        config.increment_seq();
        assert_eq!(config.seq15(), 1);

        config.set_seq15(0x7FFF);
        config.increment_seq();
        assert_eq!(config.seq15(), 0);
    }

    #[test]
    fn test_seq15_stays_unbound() {
        let mut config = PatchConfig::new();
        config.increment_seq();
        assert_eq!(config.seq15(), -1);
    }

    #[test]
    fn test_lifecycle_progression() {
        let clock = clock();
        let mut config = bound_config(&clock);

        config.apply_lifecycle(LifecycleEvent::new(PatchLifecycle::Bonded, clock.now()));
        assert_eq!(config.lifecycle().state, PatchLifecycle::Bonded);

        // Re-announcing the same state keeps the original timestamp
        let bonded_at = config.lifecycle().at;
        clock.advance(Duration::minutes(5));
        config.apply_lifecycle(LifecycleEvent::new(PatchLifecycle::Bonded, clock.now()));
        assert_eq!(config.lifecycle().at, bonded_at);

        config.record_needle_retry();
        config.record_needle_retry();
        assert_eq!(config.needle_retry_count(), 2);

        clock.advance(Duration::minutes(3));
        config.apply_lifecycle(LifecycleEvent::new(PatchLifecycle::Activated, clock.now()));
        assert!(config.is_activated());
        assert_eq!(config.activated_at(), Some(clock.now()));
        assert_eq!(config.needle_retry_count(), 0);
    }

    #[test]
    fn test_deactivate_wipes_identity() {
        let clock = clock();
        let mut config = bound_config(&clock);
        config.record_pulses(DeliveryCategory::NormalBasal, 240);
        config.set_basal_paused(1.0, &clock);
        config.apply_lifecycle(LifecycleEvent::new(PatchLifecycle::Activated, clock.now()));

        config.deactivate(clock.now());
        assert!(config.is_deactivated());
        assert!(config.mac_address().is_none());
        assert_eq!(config.serial_number(), "");
        assert_eq!(config.seq15(), -1);
        assert_eq!(config.lifecycle().state, PatchLifecycle::Shutdown);
        assert_eq!(config.pulse_count(DeliveryCategory::NormalBasal), 0);
        assert!(config.pause_finish_at().is_none());
        assert!(config.activated_at().is_none());
    }

    #[test]
    fn test_shutdown_event_deactivates() {
        let clock = clock();
        let mut config = bound_config(&clock);
        config.apply_lifecycle(LifecycleEvent::new(PatchLifecycle::Activated, clock.now()));

        config.apply_lifecycle(LifecycleEvent::new(PatchLifecycle::Shutdown, clock.now()));
        assert!(config.is_deactivated());
        assert_eq!(config.seq15(), -1);
    }

    #[test]
    fn test_pulse_counters() {
        let clock = clock();
        let mut config = bound_config(&clock);
        config.record_pulses(DeliveryCategory::NormalBasal, 60);
        config.record_pulses(DeliveryCategory::NormalBasal, 40);
        config.record_pulses(DeliveryCategory::NowBolus, 40);

        assert_eq!(config.pulse_count(DeliveryCategory::NormalBasal), 100);
        assert_eq!(config.pulse_count(DeliveryCategory::TempBasal), 0);
        assert_eq!(config.delivered_units(DeliveryCategory::NormalBasal), 5.0);
        assert_eq!(config.delivered_units(DeliveryCategory::NowBolus), 2.0);
        assert_eq!(config.total_delivered_units(), 7.0);
    }

    #[test]
    fn test_expiry_follows_wear_duration() {
        let clock = clock();
        let wear = WearConfig::default();

        let unbound = PatchConfig::new();
        assert!(!unbound.is_expired(&clock, &wear));

        let config = bound_config(&clock);
        let expiry = config.expires_at(&wear).unwrap();
        assert_eq!(expiry, clock.now() + Duration::hours(84));

        clock.advance(Duration::hours(84));
        assert!(!config.is_expired(&clock, &wear));
        clock.advance(Duration::minutes(1));
        assert!(config.is_expired(&clock, &wear));
    }

    #[test]
    fn test_pause_window() {
        let clock = clock();
        let mut config = bound_config(&clock);
        assert!(!config.is_in_pause_window(&clock));

        config.set_basal_paused(0.5, &clock);
        assert!(config.is_in_pause_window(&clock));
        assert_eq!(
            config.pause_finish_at(),
            Some(clock.now() + Duration::minutes(30))
        );

        clock.advance(Duration::minutes(29));
        assert!(config.is_in_pause_window(&clock));
        clock.advance(Duration::minutes(2));
        assert!(!config.is_in_pause_window(&clock));

        config.set_basal_paused(1.0, &clock);
        config.set_basal_resumed();
        assert!(!config.is_in_pause_window(&clock));
    }
}
