//! Local resource pressure sampling
//!
//! Memory, disk and process pressure are derived from system metrics
//! collected with `sysinfo` and compared against configurable thresholds.

use sysinfo::{Disks, ProcessesToUpdate, System};

/// Limits above which a pressure condition is reported
#[derive(Debug, Clone, PartialEq)]
pub struct PressureThresholds {
    /// Memory utilization percentage (0.0 - 100.0)
    pub memory_percent: f64,

    /// Disk utilization percentage (0.0 - 100.0)
    pub disk_percent: f64,

    /// Process count
    pub max_processes: usize,
}

impl Default for PressureThresholds {
    fn default() -> Self {
        Self {
            memory_percent: 90.0,
            disk_percent: 90.0,
            max_processes: 32768,
        }
    }
}

/// A single sample of local resource usage
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PressureReading {
    pub memory_usage_percent: f64,
    pub disk_usage_percent: f64,
    pub process_count: usize,
}

impl PressureReading {
    pub fn memory_pressure(&self, thresholds: &PressureThresholds) -> bool {
        self.memory_usage_percent >= thresholds.memory_percent
    }

    pub fn disk_pressure(&self, thresholds: &PressureThresholds) -> bool {
        self.disk_usage_percent >= thresholds.disk_percent
    }

    pub fn pid_pressure(&self, thresholds: &PressureThresholds) -> bool {
        self.process_count >= thresholds.max_processes
    }
}

/// Source of pressure readings
pub trait PressureSampler: Send {
    fn sample(&mut self) -> PressureReading;
}

/// Samples the host this agent runs on
pub struct SystemPressureSampler {
    system: System,
    disks: Disks,
}

impl SystemPressureSampler {
    pub fn new() -> Self {
        Self {
            system: System::new(),
            disks: Disks::new_with_refreshed_list(),
        }
    }
}

impl Default for SystemPressureSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl PressureSampler for SystemPressureSampler {
    fn sample(&mut self) -> PressureReading {
        self.system.refresh_memory();
        self.system.refresh_processes(ProcessesToUpdate::All, true);
        self.disks.refresh(true);

        let total_mem = self.system.total_memory();
        let used_mem = self.system.used_memory();
        let memory_usage = percent(used_mem, total_mem);

        // Disk usage (sum of all disks)
        let (total_disk, used_disk) = disk_usage(
            self.disks
                .iter()
                .map(|d| (d.total_space(), d.available_space())),
        );

        PressureReading {
            memory_usage_percent: memory_usage,
            disk_usage_percent: percent(used_disk, total_disk),
            process_count: self.system.processes().len(),
        }
    }
}

/// Sampler returning a fixed reading
#[derive(Debug, Clone, Default)]
pub struct StaticPressureSampler(pub PressureReading);

impl PressureSampler for StaticPressureSampler {
    fn sample(&mut self) -> PressureReading {
        self.0.clone()
    }
}

/// Sum (total, used) over (total, available) pairs. Some filesystems report
/// more available space than total, which counts as zero used.
fn disk_usage(disks: impl Iterator<Item = (u64, u64)>) -> (u64, u64) {
    disks.fold((0u64, 0u64), |(total, used), (dt, da)| {
        (
            total.saturating_add(dt),
            used.saturating_add(dt.saturating_sub(da)),
        )
    })
}

fn percent(used: u64, total: u64) -> f64 {
    if total > 0 {
        (used as f64 / total as f64) * 100.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thresholds_are_inclusive() {
        let thresholds = PressureThresholds {
            memory_percent: 80.0,
            disk_percent: 50.0,
            max_processes: 10,
        };
        let reading = PressureReading {
            memory_usage_percent: 80.0,
            disk_usage_percent: 49.9,
            process_count: 10,
        };

        assert!(reading.memory_pressure(&thresholds));
        assert!(!reading.disk_pressure(&thresholds));
        assert!(reading.pid_pressure(&thresholds));
    }

    #[test]
    fn test_percent_handles_zero_total() {
        assert_eq!(percent(10, 0), 0.0);
        assert_eq!(percent(25, 100), 25.0);
    }

    #[test]
    fn test_disk_usage_with_overreported_available_space() {
        let disks = [(100, 40), (50, 80)];
        assert_eq!(disk_usage(disks.into_iter()), (150, 60));
    }

    #[test]
    fn test_system_sampler_reports_sane_values() {
        let mut sampler = SystemPressureSampler::new();
        let reading = sampler.sample();

        assert!((0.0..=100.0).contains(&reading.memory_usage_percent));
        assert!((0.0..=100.0).contains(&reading.disk_usage_percent));
    }
}
