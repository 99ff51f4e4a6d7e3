use std::io;
use std::path::Path;

use chrono::{NaiveTime, TimeDelta};
use serde::{Deserialize, Serialize};

use crate::timeutil;

/// Opening hours of the studio. Process-wide; mutated only through the
/// privileged `update_hours` operation, read-only to slot computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessHours {
    pub open: NaiveTime,
    pub close: NaiveTime,
}

impl Default for BusinessHours {
    fn default() -> Self {
        Self {
            open: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            close: NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
        }
    }
}

impl BusinessHours {
    /// Read `RESERVD_OPEN_TIME` / `RESERVD_CLOSE_TIME` (`HH:MM`), falling
    /// back to 08:00–22:00.
    pub fn from_env() -> Self {
        let mut hours = Self::default();
        if let Some(t) = env_time("RESERVD_OPEN_TIME") {
            hours.open = t;
        }
        if let Some(t) = env_time("RESERVD_CLOSE_TIME") {
            hours.close = t;
        }
        hours
    }
}

fn env_time(var: &str) -> Option<NaiveTime> {
    let raw = std::env::var(var).ok()?;
    match NaiveTime::parse_from_str(&raw, "%H:%M") {
        Ok(t) => Some(t),
        Err(e) => {
            tracing::warn!("ignoring {var}={raw}: {e}");
            None
        }
    }
}

/// Scheduling policy knobs, fixed for the lifetime of the process.
///
/// The cancellation lead time and the confirmation window offset are
/// deliberately configuration, not constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Slot granularity and booking duration, in minutes.
    pub slot_minutes: u32,
    /// Mandatory gap after each booking before the studio is free again.
    pub buffer_minutes: u32,
    /// Per-organization daily ceiling for non-privileged callers.
    pub daily_quota_minutes: u32,
    /// A member may cancel only while at least this much time remains
    /// before the booking starts.
    pub cancel_lead_minutes: u32,
    /// How long before the start the confirmation window opens.
    pub confirm_window_minutes: u32,
    /// Unconfirmed bookings are auto-canceled once the start is this close.
    pub confirm_deadline_minutes: u32,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            slot_minutes: 60,
            buffer_minutes: 10,
            daily_quota_minutes: 180,
            cancel_lead_minutes: 30,
            confirm_window_minutes: 45,
            confirm_deadline_minutes: 30,
        }
    }
}

impl PolicyConfig {
    pub fn slot(&self) -> TimeDelta {
        timeutil::minutes(self.slot_minutes)
    }

    pub fn cancel_lead(&self) -> TimeDelta {
        timeutil::minutes(self.cancel_lead_minutes)
    }

    pub fn confirm_window(&self) -> TimeDelta {
        timeutil::minutes(self.confirm_window_minutes)
    }

    pub fn confirm_deadline(&self) -> TimeDelta {
        timeutil::minutes(self.confirm_deadline_minutes)
    }

    /// Load from a JSON file; absent fields keep their defaults.
    pub fn from_json_file(path: &Path) -> io::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        config
            .validate()
            .map_err(|msg| io::Error::new(io::ErrorKind::InvalidData, msg))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if self.slot_minutes == 0 {
            return Err("slot_minutes must be positive");
        }
        if self
            .slot_minutes
            .checked_add(self.buffer_minutes)
            .is_none_or(|span| span >= 24 * 60)
        {
            return Err("slot plus buffer must fit within a day");
        }
        if self.daily_quota_minutes < self.slot_minutes {
            return Err("daily quota must admit at least one slot");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = PolicyConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.slot_minutes, 60);
        assert_eq!(config.buffer_minutes, 10);
        assert_eq!(config.daily_quota_minutes, 180);
    }

    #[test]
    fn json_file_overrides_partial() {
        let dir = std::env::temp_dir().join("reservd_test_config");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("policy.json");
        std::fs::write(&path, r#"{"cancel_lead_minutes": 120, "confirm_window_minutes": 60}"#)
            .unwrap();

        let config = PolicyConfig::from_json_file(&path).unwrap();
        assert_eq!(config.cancel_lead_minutes, 120);
        assert_eq!(config.confirm_window_minutes, 60);
        assert_eq!(config.slot_minutes, 60); // untouched default

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn span_overflow_rejected() {
        let config = PolicyConfig {
            slot_minutes: u32::MAX,
            buffer_minutes: u32::MAX,
            daily_quota_minutes: u32::MAX,
            ..PolicyConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn invalid_policy_rejected() {
        let config = PolicyConfig {
            slot_minutes: 0,
            ..PolicyConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
