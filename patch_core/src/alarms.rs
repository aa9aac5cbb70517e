//! Alarm registry: arm, fire, acknowledge.
//!
//! Safety conditions move through three stages. They are armed
//! (registered with a future trigger time), they fire when the condition
//! occurs, and they sit in the occurred collection until the user
//! acknowledges them. Device notifications arrive late and duplicated,
//! so every transition tolerates codes in the wrong stage as a no-op.

use crate::clock::Clock;
use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

/// Conditions with their own alarm lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AlarmCode {
    Occlusion,
    LowReservoir,
    EmptyReservoir,
    LowBattery,
    PatchExpired,
    NeedleInsertionFailed,
    DeliverySuspended,
}

impl AlarmCode {
    /// Every alarm code, for iteration.
    pub const ALL: [AlarmCode; 7] = [
        AlarmCode::Occlusion,
        AlarmCode::LowReservoir,
        AlarmCode::EmptyReservoir,
        AlarmCode::LowBattery,
        AlarmCode::PatchExpired,
        AlarmCode::NeedleInsertionFailed,
        AlarmCode::DeliverySuspended,
    ];

    /// Presentation metadata from the static catalog.
    pub fn meta(self) -> &'static AlarmMeta {
        &alarm_catalog()[&self]
    }
}

/// How urgently an alarm must be surfaced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum AlarmPriority {
    Notice,
    Warning,
    Critical,
}

/// Static presentation metadata for an alarm code.
#[derive(Clone, Debug)]
pub struct AlarmMeta {
    pub label: &'static str,
    pub priority: AlarmPriority,
    /// The patch beeps for this alarm until silenced
    pub audible: bool,
}

static ALARM_CATALOG: Lazy<HashMap<AlarmCode, AlarmMeta>> = Lazy::new(|| {
    let mut catalog = HashMap::new();
    catalog.insert(
        AlarmCode::Occlusion,
        AlarmMeta {
            label: "Occlusion detected",
            priority: AlarmPriority::Critical,
            audible: true,
        },
    );
    catalog.insert(
        AlarmCode::LowReservoir,
        AlarmMeta {
            label: "Reservoir low",
            priority: AlarmPriority::Warning,
            audible: true,
        },
    );
    catalog.insert(
        AlarmCode::EmptyReservoir,
        AlarmMeta {
            label: "Reservoir empty",
            priority: AlarmPriority::Critical,
            audible: true,
        },
    );
    catalog.insert(
        AlarmCode::LowBattery,
        AlarmMeta {
            label: "Patch battery low",
            priority: AlarmPriority::Warning,
            audible: true,
        },
    );
    catalog.insert(
        AlarmCode::PatchExpired,
        AlarmMeta {
            label: "Patch expired",
            priority: AlarmPriority::Critical,
            audible: true,
        },
    );
    catalog.insert(
        AlarmCode::NeedleInsertionFailed,
        AlarmMeta {
            label: "Needle insertion failed",
            priority: AlarmPriority::Warning,
            audible: false,
        },
    );
    catalog.insert(
        AlarmCode::DeliverySuspended,
        AlarmMeta {
            label: "Delivery suspended",
            priority: AlarmPriority::Notice,
            audible: false,
        },
    );
    catalog
});

/// The full alarm catalog, keyed by code.
pub fn alarm_catalog() -> &'static HashMap<AlarmCode, AlarmMeta> {
    &ALARM_CATALOG
}

/// An armed or fired alarm instance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AlarmItem {
    pub code: AlarmCode,
    /// When the alarm was armed
    pub created_at: DateTime<Utc>,
    /// When the condition is expected, or was observed, to hold
    pub trigger_at: DateTime<Utc>,
}

/// Arm/fire/acknowledge bookkeeping for alarm codes.
///
/// A code lives in at most one of the armed or fired collections while
/// notifications arrive in order. The beep set is independent of both.
#[derive(Clone, Debug, Default)]
pub struct Alarms {
    registered: HashMap<AlarmCode, AlarmItem>,
    occurred: HashMap<AlarmCode, AlarmItem>,
    need_to_stop_beep: HashSet<AlarmCode>,
}

impl Alarms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm `code` to trigger after `delay`. Rearming replaces the
    /// pending entry.
    pub fn register(&mut self, code: AlarmCode, delay: Duration, clock: &dyn Clock) {
        let now = clock.now();
        let item = AlarmItem {
            code,
            created_at: now,
            trigger_at: now + delay,
        };
        tracing::debug!("Alarm {:?} armed for {}", code, item.trigger_at);
        self.registered.insert(code, item);
    }

    /// Disarm `code`; unknown codes are ignored.
    pub fn unregister(&mut self, code: AlarmCode) {
        if self.registered.remove(&code).is_some() {
            tracing::debug!("Alarm {:?} disarmed", code);
        }
    }

    /// Move an armed alarm to fired. A code that was never armed, or
    /// already fired, stays where it is.
    pub fn mark_occurred(&mut self, code: AlarmCode) {
        if self.occurred.contains_key(&code) {
            return;
        }
        if let Some(item) = self.registered.remove(&code) {
            tracing::info!("Alarm {:?} fired: {}", code, code.meta().label);
            self.occurred.insert(code, item);
        }
    }

    /// Acknowledge a fired alarm. Codes that are not fired are ignored.
    pub fn acknowledge(&mut self, code: AlarmCode) {
        if self.occurred.remove(&code).is_some() {
            tracing::info!("Alarm {:?} acknowledged", code);
        }
    }

    pub fn is_registered(&self, code: AlarmCode) -> bool {
        self.registered.contains_key(&code)
    }

    pub fn is_occurring(&self, code: AlarmCode) -> bool {
        self.occurred.contains_key(&code)
    }

    pub fn registered_items(&self) -> impl Iterator<Item = &AlarmItem> {
        self.registered.values()
    }

    pub fn occurred_items(&self) -> impl Iterator<Item = &AlarmItem> {
        self.occurred.values()
    }

    /// When a fired alarm was due. Codes that never fired fall back to
    /// "now"; callers use this for display, not correctness.
    pub fn occurred_at(&self, code: AlarmCode, clock: &dyn Clock) -> DateTime<Utc> {
        self.occurred
            .get(&code)
            .map_or_else(|| clock.now(), |item| item.trigger_at)
    }

    /// The patch is beeping for `code` and must be told to stop.
    pub fn mark_beep_pending(&mut self, code: AlarmCode) {
        self.need_to_stop_beep.insert(code);
    }

    /// The stop-beep command went through.
    pub fn beep_silenced(&mut self, code: AlarmCode) {
        self.need_to_stop_beep.remove(&code);
    }

    pub fn has_pending_beep(&self, code: AlarmCode) -> bool {
        self.need_to_stop_beep.contains(&code)
    }

    pub fn beeps_pending(&self) -> impl Iterator<Item = AlarmCode> + '_ {
        self.need_to_stop_beep.iter().copied()
    }

    /// Forget everything: armed, fired, and pending beeps.
    pub fn clear(&mut self) {
        self.registered.clear();
        self.occurred.clear();
        self.need_to_stop_beep.clear();
    }
}
