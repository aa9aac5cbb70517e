#![forbid(unsafe_code)]

//! Core dosing-schedule and device-state engine for a wearable insulin
//! patch pump.
//!
//! This crate provides:
//! - Basal segments, the 48-slot daily grid, and interval algebra
//! - Basal schedules with their delivery status machine and dose queries
//! - Temporary basal overrides and in-flight bolus tracking
//! - Patch identity, pairing lifecycle, and wear-time expiry
//! - Status frame decoding and the alarm registry

pub mod alarms;
pub mod basal;
pub mod bolus;
pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod patch_config;
pub mod patch_state;
pub mod profile;
pub mod segment;
pub mod segments;
pub mod temp_basal;

// Re-export commonly used types
pub use alarms::{alarm_catalog, AlarmCode, AlarmItem, AlarmMeta, AlarmPriority, Alarms};
pub use basal::{BasalSchedule, BasalScheduleManager, BasalStatus};
pub use bolus::{Bolus, BolusKind, BolusTracker, UNITS_PER_PULSE};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use error::{Error, Result};
pub use patch_config::{DeliveryCategory, LifecycleEvent, PatchConfig, PatchLifecycle};
pub use patch_state::{PatchState, FRAME_LEN};
pub use profile::{BasalBreakpoint, BasalProfile};
pub use segment::{GridCell, Segment, CELLS_PER_DAY, MINUTES_PER_CELL, MINUTES_PER_DAY};
pub use segments::SegmentSet;
pub use temp_basal::{RateAdjustment, RateDisplay, TempBasal, TempBasalManager};
