//! External basal rate profiles.
//!
//! A profile is the input the schedule is programmed from: an ordered list
//! of `(start minute, hourly rate)` breakpoints supplied by the clinician
//! tooling as JSON. Loading is strict. A dosing profile that fails
//! validation is an error, never a silently corrected default.

use crate::segment::{MINUTES_PER_CELL, MINUTES_PER_DAY};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One rate breakpoint.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BasalBreakpoint {
    /// Minute of day this rate takes effect, grid-aligned
    pub start_minute: u32,
    /// Hourly dose rate in insulin units
    pub rate: f64,
}

/// Ordered breakpoint list describing a full day of basal rates.
///
/// Each breakpoint's rate runs until the next breakpoint starts; the last
/// one runs to the end of the day.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BasalProfile {
    pub breakpoints: Vec<BasalBreakpoint>,
}

impl BasalProfile {
    /// Check the breakpoint list is usable as a day schedule.
    pub fn validate(&self) -> Result<()> {
        if self.breakpoints.is_empty() {
            return Err(Error::Profile("profile has no breakpoints".into()));
        }
        if self.breakpoints[0].start_minute != 0 {
            return Err(Error::Profile(format!(
                "first breakpoint starts at minute {}, must start at 0",
                self.breakpoints[0].start_minute
            )));
        }
        for bp in &self.breakpoints {
            if bp.start_minute >= MINUTES_PER_DAY {
                return Err(Error::Profile(format!(
                    "breakpoint start {} is past the {}-minute day",
                    bp.start_minute, MINUTES_PER_DAY
                )));
            }
            if bp.start_minute % MINUTES_PER_CELL != 0 {
                return Err(Error::Profile(format!(
                    "breakpoint start {} is not aligned to the {}-minute grid",
                    bp.start_minute, MINUTES_PER_CELL
                )));
            }
            if !bp.rate.is_finite() || bp.rate < 0.0 {
                return Err(Error::Profile(format!(
                    "breakpoint rate {} is not a finite non-negative number",
                    bp.rate
                )));
            }
        }
        for pair in self.breakpoints.windows(2) {
            if pair[0].start_minute >= pair[1].start_minute {
                return Err(Error::Profile(format!(
                    "breakpoint starts must be strictly increasing ({} then {})",
                    pair[0].start_minute, pair[1].start_minute
                )));
            }
        }
        Ok(())
    }

    /// Load and validate a profile from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let profile: BasalProfile = serde_json::from_str(&contents)?;
        profile.validate()?;
        tracing::info!(
            "Loaded basal profile with {} breakpoints from {:?}",
            profile.breakpoints.len(),
            path
        );
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn bp(start_minute: u32, rate: f64) -> BasalBreakpoint {
        BasalBreakpoint { start_minute, rate }
    }

    #[test]
    fn test_validate_accepts_well_formed_profile() {
        let profile = BasalProfile {
            breakpoints: vec![bp(0, 1.0), bp(420, 1.4), bp(1320, 0.9)],
        };
        assert!(profile.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_profiles() {
        let empty = BasalProfile {
            breakpoints: vec![],
        };
        assert!(empty.validate().is_err());

        let late_start = BasalProfile {
            breakpoints: vec![bp(30, 1.0)],
        };
        assert!(late_start.validate().is_err());

        let unaligned = BasalProfile {
            breakpoints: vec![bp(0, 1.0), bp(45, 1.2)],
        };
        assert!(unaligned.validate().is_err());

        let out_of_day = BasalProfile {
            breakpoints: vec![bp(0, 1.0), bp(1440, 1.2)],
        };
        assert!(out_of_day.validate().is_err());

        let unsorted = BasalProfile {
            breakpoints: vec![bp(0, 1.0), bp(600, 1.2), bp(600, 1.3)],
        };
        assert!(unsorted.validate().is_err());

        let negative_rate = BasalProfile {
            breakpoints: vec![bp(0, -0.1)],
        };
        assert!(negative_rate.validate().is_err());
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            r#"{{"breakpoints": [
                {{"start_minute": 0, "rate": 1.0}},
                {{"start_minute": 720, "rate": 1.5}}
            ]}}"#
        )
        .unwrap();

        let profile = BasalProfile::from_json_file(&path).unwrap();
        assert_eq!(profile.breakpoints.len(), 2);
        assert_eq!(profile.breakpoints[1].start_minute, 720);
        assert_eq!(profile.breakpoints[1].rate, 1.5);
    }

    #[test]
    fn test_from_json_file_rejects_invalid_profile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.json");
        std::fs::write(
            &path,
            r#"{"breakpoints": [{"start_minute": 300, "rate": 1.0}]}"#,
        )
        .unwrap();

        let err = BasalProfile::from_json_file(&path).unwrap_err();
        assert!(matches!(err, Error::Profile(_)));
    }

    #[test]
    fn test_from_json_file_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        assert!(matches!(
            BasalProfile::from_json_file(&missing),
            Err(Error::Io(_))
        ));
    }
}
