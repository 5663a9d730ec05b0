//! Point-in-time system readings and the provider seam that supplies them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::SchedulerError;
use crate::util::clock::utc_now;

const MIB: u64 = 1024 * 1024;

/// Power source state.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PowerState {
    /// Running on external power.
    pub plugged: bool,
    /// Battery charge, if the machine reports one.
    pub battery_pct: Option<f64>,
}

/// GPU state.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GpuState {
    /// A GPU was detected.
    pub available: bool,
    /// Utilization in percent.
    pub util_pct: Option<f64>,
    /// Total VRAM in bytes.
    pub mem_total_bytes: Option<u64>,
    /// Used VRAM in bytes.
    pub mem_used_bytes: Option<u64>,
}

/// System resource snapshot consumed by admission control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemSnapshot {
    /// When the reading was taken.
    pub taken_at: DateTime<Utc>,
    /// Total CPU utilization in percent.
    pub cpu_total_pct: f64,
    /// Physical memory size in bytes.
    pub mem_total_bytes: u64,
    /// Physical memory in use in bytes.
    pub mem_used_bytes: u64,
    /// Power state.
    #[serde(default)]
    pub power: PowerState,
    /// GPU state.
    #[serde(default)]
    pub gpu: GpuState,
}

impl SystemSnapshot {
    /// Idle machine with the given memory size, on external power, no GPU.
    pub fn idle(mem_total_bytes: u64) -> Self {
        Self {
            taken_at: utc_now(),
            cpu_total_pct: 0.0,
            mem_total_bytes,
            mem_used_bytes: 0,
            power: PowerState {
                plugged: true,
                battery_pct: None,
            },
            gpu: GpuState::default(),
        }
    }

    /// Free memory (total minus used) in MB.
    pub const fn mem_free_mb(&self) -> u64 {
        self.mem_total_bytes.saturating_sub(self.mem_used_bytes) / MIB
    }

    /// Free VRAM (total minus used) in MB; 0 when the total is unknown.
    pub fn gpu_free_vram_mb(&self) -> u64 {
        match self.gpu.mem_total_bytes {
            Some(total) if total > 0 => {
                total.saturating_sub(self.gpu.mem_used_bytes.unwrap_or(0)) / MIB
            }
            _ => 0,
        }
    }
}

/// Source of system snapshots.
pub trait MetricsProvider: Send + Sync {
    /// Take a fresh reading.
    fn snapshot(&self) -> Result<SystemSnapshot, SchedulerError>;
}
