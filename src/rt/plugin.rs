//! Scheduling plugin seam.
//!
//! The scheduler treats the underlying scheduling runtime as a
//! capability-providing collaborator: it decides admission and performs
//! whatever OS-level work a mode transition needs. The plugin reports
//! failures as plain reasons; the scheduler wraps them in its typed errors.

use tracing::{debug, info};

use super::params::{Priority, TaskClass, TaskParams};

/// Boundary to the underlying scheduling runtime.
pub trait SchedulingPlugin {
    /// Plugin name, used in error messages and logs.
    fn name(&self) -> &'static str;

    /// Admission control: can this task be accommodated?
    fn admit(&mut self, params: &TaskParams) -> Result<(), String>;

    /// Apply the runtime side of the background-to-real-time transition.
    fn enter(&mut self, params: &TaskParams) -> Result<(), String>;

    /// Undo whatever `enter` applied. Must not fail; called on every exit
    /// path including error unwinds.
    fn exit(&mut self, params: &TaskParams);
}

/// Production plugin: userspace cadence with optional OS elevation.
///
/// Admission is a single-task capacity check (utilization must not exceed
/// 1.0) plus a partition sanity check. On Linux, `TaskClass::Hard` tasks
/// are elevated to `SCHED_FIFO` on enter and restored to `SCHED_OTHER` on
/// exit; a `partition` pins the thread via `sched_setaffinity`. `Soft` and
/// `BestEffort` tasks run on the monotonic cadence alone, with no
/// privileged syscalls.
#[derive(Debug, Default)]
pub struct NativePlugin {
    elevated: bool,
}

impl NativePlugin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SchedulingPlugin for NativePlugin {
    fn name(&self) -> &'static str {
        "native"
    }

    fn admit(&mut self, params: &TaskParams) -> Result<(), String> {
        let utilization = params.utilization();
        if utilization > 1.0 {
            return Err(format!(
                "utilization {:.3} exceeds single-task capacity 1.0",
                utilization
            ));
        }

        if let Some(cpu) = params.partition {
            let cpus = std::thread::available_parallelism()
                .map(|n| n.get() as u32)
                .unwrap_or(1);
            if cpu >= cpus {
                return Err(format!("partition cpu {} not available ({} cpus)", cpu, cpus));
            }
        }

        debug!(utilization, "task admitted");
        Ok(())
    }

    fn enter(&mut self, params: &TaskParams) -> Result<(), String> {
        if let Some(cpu) = params.partition {
            os::pin_to_cpu(cpu)?;
            info!(cpu, "pinned to partition");
        }

        if params.class == TaskClass::Hard {
            let priority = match params.priority {
                Priority::Lowest => os::lowest_rt_priority(),
                Priority::Fixed(p) => p,
            };
            os::elevate_fifo(priority)?;
            self.elevated = true;
            info!(priority, "elevated to SCHED_FIFO");
        }

        Ok(())
    }

    fn exit(&mut self, _params: &TaskParams) {
        if self.elevated {
            os::restore_normal();
            self.elevated = false;
            info!("restored normal scheduling policy");
        }
    }
}

#[cfg(target_os = "linux")]
mod os {
    /// Lowest usable `SCHED_FIFO` priority.
    pub fn lowest_rt_priority() -> i32 {
        // sched_get_priority_min(SCHED_FIFO) is 1 on Linux
        1
    }

    pub fn pin_to_cpu(cpu: u32) -> Result<(), String> {
        unsafe {
            let mut set: libc::cpu_set_t = std::mem::zeroed();
            libc::CPU_ZERO(&mut set);
            libc::CPU_SET(cpu as usize, &mut set);
            if libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set) != 0 {
                return Err(format!(
                    "sched_setaffinity(cpu {}) failed: {}",
                    cpu,
                    std::io::Error::last_os_error()
                ));
            }
        }
        Ok(())
    }

    pub fn elevate_fifo(priority: i32) -> Result<(), String> {
        let priority = priority.clamp(1, 99);
        unsafe {
            let param = libc::sched_param {
                sched_priority: priority,
            };
            if libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) != 0 {
                return Err(format!(
                    "sched_setscheduler(SCHED_FIFO, {}) failed: {}",
                    priority,
                    std::io::Error::last_os_error()
                ));
            }
        }
        Ok(())
    }

    pub fn restore_normal() {
        unsafe {
            let param = libc::sched_param { sched_priority: 0 };
            // Best effort; the process is leaving the real-time phase anyway
            let _ = libc::sched_setscheduler(0, libc::SCHED_OTHER, &param);
        }
    }
}

#[cfg(not(target_os = "linux"))]
mod os {
    pub fn lowest_rt_priority() -> i32 {
        1
    }

    pub fn pin_to_cpu(cpu: u32) -> Result<(), String> {
        Err(format!("cpu pinning (cpu {}) not supported on this platform", cpu))
    }

    pub fn elevate_fifo(_priority: i32) -> Result<(), String> {
        Err("SCHED_FIFO elevation not supported on this platform".to_string())
    }

    pub fn restore_normal() {}
}
