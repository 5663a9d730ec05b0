//! Admission control: decides whether machine conditions permit a launch now.
//!
//! [`evaluate`] is pure. Every check runs regardless of earlier failures so a
//! caller sees all violated constraints at once, in a fixed order: CPU,
//! memory, battery, quiet hours, GPU.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::core::{ResourceEnvelope, Rules, SystemSnapshot};

/// Outcome of an admission check.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Admission {
    /// True when no rule was violated.
    pub allowed: bool,
    /// One human-readable reason per violated rule; empty when allowed.
    pub reasons: Vec<String>,
}

impl Admission {
    /// Reasons joined for display.
    pub fn summary(&self) -> String {
        self.reasons.join("; ")
    }
}

/// Evaluate `envelope` against `snapshot` under `rules` at local time `now`.
pub fn evaluate(
    snapshot: &SystemSnapshot,
    envelope: &ResourceEnvelope,
    rules: &Rules,
    now: NaiveTime,
) -> Admission {
    let mut reasons = Vec::new();

    let cpu = snapshot.cpu_total_pct;
    let cpu_max = rules.cpu_max_pct.min(envelope.max_cpu_pct);
    if cpu > f64::from(cpu_max) {
        reasons.push(format!("CPU {cpu:.0}% exceeds limit {cpu_max}%"));
    }

    let mem_free = snapshot.mem_free_mb();
    let mem_reserve = rules.mem_reserve_mb.max(envelope.max_mem_mb);
    if mem_free < mem_reserve {
        reasons.push(format!("Free memory {mem_free}MB below reserve {mem_reserve}MB"));
    }

    let plugged = snapshot.power.plugged;
    if rules.battery_min_pct > 0 && !plugged {
        if let Some(battery) = snapshot.power.battery_pct {
            if battery < f64::from(rules.battery_min_pct) {
                reasons.push(format!(
                    "Battery {battery:.0}% below minimum {}%",
                    rules.battery_min_pct
                ));
            }
        }
    }

    if let Some(quiet) = &rules.quiet_hours {
        if quiet.contains(now) && !(plugged && quiet.allow_if_plugged) {
            reasons.push(format!("Quiet hours in effect ({}-{})", quiet.start, quiet.end));
        }
    }

    if envelope.requires_gpu {
        let gpu = &snapshot.gpu;
        if gpu.available {
            let util = gpu.util_pct.unwrap_or(0.0);
            let limit = rules.gpu_max_util_pct;
            if util > limit {
                reasons.push(format!("GPU util {util:.0}% exceeds limit {limit:.0}%"));
            }
            let free_vram = snapshot.gpu_free_vram_mb();
            if envelope.min_vram_mb > 0 && free_vram < envelope.min_vram_mb {
                reasons.push(format!(
                    "GPU free VRAM {free_vram}MB below required {}MB",
                    envelope.min_vram_mb
                ));
            }
        } else {
            reasons.push("GPU required but not detected".to_string());
        }
    }

    Admission {
        allowed: reasons.is_empty(),
        reasons,
    }
}
