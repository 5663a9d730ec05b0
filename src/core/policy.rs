//! Admission rule sets and the built-in presets.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::core::SchedulerError;

/// Preset seeded when no policy is active and no other default is configured.
pub const DEFAULT_PRESET: &str = "balanced_defaults";

/// Time of day at minute resolution, written as `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClockTime(NaiveTime);

impl ClockTime {
    /// Build from hour and minute.
    pub fn new(hour: u32, minute: u32) -> Result<Self, SchedulerError> {
        NaiveTime::from_hms_opt(hour, minute, 0)
            .map(Self)
            .ok_or_else(|| SchedulerError::Validation(format!("invalid time {hour:02}:{minute:02}")))
    }

    /// Underlying time.
    pub const fn time(self) -> NaiveTime {
        self.0
    }
}

impl FromStr for ClockTime {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveTime::parse_from_str(s.trim(), "%H:%M")
            .map(Self)
            .map_err(|e| SchedulerError::Validation(format!("invalid HH:MM time `{s}`: {e}")))
    }
}

impl TryFrom<String> for ClockTime {
    type Error = SchedulerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ClockTime> for String {
    fn from(value: ClockTime) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0.hour(), self.0.minute())
    }
}

/// Daily window during which launches are suppressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuietHours {
    /// Window start (inclusive).
    pub start: ClockTime,
    /// Window end (exclusive).
    pub end: ClockTime,
    /// Launches stay allowed while on external power.
    #[serde(default = "default_true")]
    pub allow_if_plugged: bool,
}

const fn default_true() -> bool {
    true
}

impl QuietHours {
    /// Build a window from `HH:MM` strings.
    pub fn parse(start: &str, end: &str, allow_if_plugged: bool) -> Result<Self, SchedulerError> {
        Ok(Self {
            start: start.parse()?,
            end: end.parse()?,
            allow_if_plugged,
        })
    }

    /// Whether `now` falls inside the window. `start > end` wraps midnight;
    /// `start == end` is an empty window.
    pub fn contains(&self, now: NaiveTime) -> bool {
        let (start, end) = (self.start.time(), self.end.time());
        if start > end {
            now >= start || now < end
        } else {
            start <= now && now < end
        }
    }
}

/// Thresholds consulted by admission control. Every key is optional on input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rules {
    /// Minimum battery charge while unplugged (0 disables the check).
    pub battery_min_pct: u32,
    /// CPU ceiling in percent.
    pub cpu_max_pct: u32,
    /// Free memory that must remain, in MB.
    pub mem_reserve_mb: u64,
    /// GPU utilization ceiling in percent.
    pub gpu_max_util_pct: f64,
    /// Quiet-hours window.
    pub quiet_hours: Option<QuietHours>,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            battery_min_pct: 0,
            cpu_max_pct: 100,
            mem_reserve_mb: 0,
            gpu_max_util_pct: 90.0,
            quiet_hours: None,
        }
    }
}

impl Rules {
    /// Parse a JSON rule mapping; missing keys take defaults, unknown keys are ignored.
    pub fn from_json(value: serde_json::Value) -> Result<Self, SchedulerError> {
        let rules: Self = serde_json::from_value(value)
            .map_err(|e| SchedulerError::Validation(format!("invalid rules: {e}")))?;
        rules.validate()?;
        Ok(rules)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.battery_min_pct > 100 {
            return Err(SchedulerError::Validation("battery_min_pct must be <= 100".into()));
        }
        if self.cpu_max_pct > 100 {
            return Err(SchedulerError::Validation("cpu_max_pct must be <= 100".into()));
        }
        if !(0.0..=100.0).contains(&self.gpu_max_util_pct) {
            return Err(SchedulerError::Validation("gpu_max_util_pct must be within 0..=100".into()));
        }
        Ok(())
    }
}

/// Stored policy with its activation flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRecord {
    /// Unique policy name.
    pub name: String,
    /// Rule set.
    pub rules: Rules,
    /// Exactly one record is active once a policy has been seeded.
    pub active: bool,
    /// Last create/update time.
    pub updated_at: DateTime<Utc>,
}

/// Names of the built-in presets.
pub const PRESET_NAMES: [&str; 3] = ["performance", "balanced_defaults", "sip-battery"];

/// Rules for a built-in preset.
pub fn preset(name: &str) -> Option<Rules> {
    let (battery, cpu, mem, gpu, start, end, plugged) = match name {
        "performance" => (10, 95, 512, 95.0, (0, 0), (0, 0), true),
        "balanced_defaults" => (30, 85, 2048, 80.0, (22, 0), (7, 0), true),
        "sip-battery" => (50, 70, 4096, 60.0, (21, 0), (8, 0), false),
        _ => return None,
    };
    let quiet = QuietHours {
        start: ClockTime::new(start.0, start.1).ok()?,
        end: ClockTime::new(end.0, end.1).ok()?,
        allow_if_plugged: plugged,
    };
    Some(Rules {
        battery_min_pct: battery,
        cpu_max_pct: cpu,
        mem_reserve_mb: mem,
        gpu_max_util_pct: gpu,
        quiet_hours: Some(quiet),
    })
}

/// All presets in declaration order.
pub fn presets() -> Vec<(&'static str, Rules)> {
    PRESET_NAMES
        .iter()
        .filter_map(|name| preset(name).map(|rules| (*name, rules)))
        .collect()
}
