//! Decoded view over the patch's periodic status frame.
//!
//! The patch reports its condition as a fixed 16-byte frame. The raw
//! payload stays opaque in here; callers get named predicates per
//! documented flag plus payload-only equality, so a retransmitted frame
//! can be told apart from a real change.
//!
//! Frame layout:
//!
//! | Byte  | Meaning                                               |
//! |-------|-------------------------------------------------------|
//! | 0     | delivery registered flags                             |
//! | 1     | delivery running flags                                |
//! | 2     | delivery finished flags                               |
//! | 3     | alarm flags                                           |
//! | 4     | raw battery reading                                   |
//! | 5-15  | reserved by firmware                                  |
//!
//! Delivery flag bits, identical across bytes 0-2: bit 0 normal basal,
//! bit 1 temp basal, bit 2 immediate bolus, bit 3 extended bolus. Alarm
//! bits: bit 0 occlusion, bit 1 low reservoir, bit 2 empty reservoir,
//! bit 3 low battery.
//!
//! A delivery is reported active only while it is registered, running,
//! and not yet finished. The firmware keeps stale running bits around
//! after completion, so all three bytes matter.

use crate::config::BatteryCurve;
use crate::{Error, Result};
use chrono::{DateTime, Utc};

/// Wire size of a status frame.
pub const FRAME_LEN: usize = 16;

const REGISTERED: usize = 0;
const RUNNING: usize = 1;
const FINISHED: usize = 2;
const ALARMS: usize = 3;
const BATTERY: usize = 4;

const BASAL_BIT: u8 = 0x01;
const TEMP_BASAL_BIT: u8 = 0x02;
const NOW_BOLUS_BIT: u8 = 0x04;
const EXT_BOLUS_BIT: u8 = 0x08;

const OCCLUSION_BIT: u8 = 0x01;
const LOW_RESERVOIR_BIT: u8 = 0x02;
const EMPTY_RESERVOIR_BIT: u8 = 0x04;
const LOW_BATTERY_BIT: u8 = 0x08;

/// Latest decoded status frame, or the never-populated state.
#[derive(Clone, Debug, Default)]
pub struct PatchState {
    payload: [u8; FRAME_LEN],
    updated_at: Option<DateTime<Utc>>,
}

impl PatchState {
    pub fn new() -> Self {
        Self::default()
    }

    /// No frame has been received yet.
    pub fn is_empty(&self) -> bool {
        self.updated_at.is_none()
    }

    /// When the current payload arrived.
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// Replace the payload from a received frame.
    pub fn update(&mut self, frame: &[u8], at: DateTime<Utc>) -> Result<()> {
        if frame.len() != FRAME_LEN {
            return Err(Error::Frame(format!(
                "expected {} status bytes, got {}",
                FRAME_LEN,
                frame.len()
            )));
        }
        self.payload.copy_from_slice(frame);
        self.updated_at = Some(at);
        tracing::debug!("Status frame updated at {}", at);
        Ok(())
    }

    /// Drop back to the never-populated state.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Payload-only comparison; receive timestamps are ignored so a
    /// retransmitted frame compares equal.
    pub fn same_payload(&self, other: &PatchState) -> bool {
        self.payload == other.payload
    }

    pub fn is_basal_active(&self) -> bool {
        self.delivery_active(BASAL_BIT)
    }

    pub fn is_temp_basal_active(&self) -> bool {
        self.delivery_active(TEMP_BASAL_BIT)
    }

    pub fn is_now_bolus_active(&self) -> bool {
        self.delivery_active(NOW_BOLUS_BIT)
    }

    pub fn is_ext_bolus_active(&self) -> bool {
        self.delivery_active(EXT_BOLUS_BIT)
    }

    /// Either bolus slot is active.
    pub fn is_bolus_active(&self) -> bool {
        self.is_now_bolus_active() || self.is_ext_bolus_active()
    }

    pub fn is_temp_basal_finished(&self) -> bool {
        self.flag(FINISHED, TEMP_BASAL_BIT)
    }

    pub fn is_now_bolus_finished(&self) -> bool {
        self.flag(FINISHED, NOW_BOLUS_BIT)
    }

    pub fn is_ext_bolus_finished(&self) -> bool {
        self.flag(FINISHED, EXT_BOLUS_BIT)
    }

    pub fn has_occlusion(&self) -> bool {
        self.flag(ALARMS, OCCLUSION_BIT)
    }

    pub fn is_reservoir_low(&self) -> bool {
        self.flag(ALARMS, LOW_RESERVOIR_BIT)
    }

    pub fn is_reservoir_empty(&self) -> bool {
        self.flag(ALARMS, EMPTY_RESERVOIR_BIT)
    }

    pub fn is_battery_low(&self) -> bool {
        self.flag(ALARMS, LOW_BATTERY_BIT)
    }

    /// Raw battery byte as reported, before the estimate curve.
    pub fn battery_raw(&self) -> u8 {
        self.payload[BATTERY]
    }

    /// Battery percent estimate through the configured curve.
    pub fn battery_percent(&self, curve: &BatteryCurve) -> u8 {
        curve.percent(self.battery_raw())
    }

    fn flag(&self, byte: usize, bit: u8) -> bool {
        self.payload[byte] & bit != 0
    }

    fn delivery_active(&self, bit: u8) -> bool {
        self.flag(REGISTERED, bit) && self.flag(RUNNING, bit) && !self.flag(FINISHED, bit)
    }
}
