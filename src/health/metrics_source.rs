//! # Metrics Source
//!
//! Process-level runtime statistics (memory, cpu, uptime) read once per tick.
//! Memory is this process's resident set against the host's total memory;
//! cpu is this process's usage normalized across all cores.

use parking_lot::Mutex;
use std::fmt;
use std::time::{Duration, Instant};
use sysinfo::{Pid, System};

use super::types::MemoryUsage;
use crate::error::{VigilError, VigilResult};

/// One reading of runtime statistics
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuntimeMetrics {
    pub memory: MemoryUsage,
    pub cpu_percent: f64,
    pub uptime: Duration,
}

/// Source of process runtime statistics
pub trait MetricsSource: Send + Sync + fmt::Debug {
    fn sample(&self) -> VigilResult<RuntimeMetrics>;

    /// Ask the host to reclaim memory. Returns `false` when no such hint exists.
    fn reclaim_memory(&self) -> bool {
        false
    }
}

/// `sysinfo`-backed metrics source for the current process
pub struct SysinfoMetricsSource {
    system: Mutex<System>,
    pid: Option<Pid>,
    started_at: Instant,
}

impl fmt::Debug for SysinfoMetricsSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SysinfoMetricsSource")
            .field("pid", &self.pid)
            .field("started_at", &self.started_at)
            .finish()
    }
}

impl Default for SysinfoMetricsSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoMetricsSource {
    pub fn new() -> Self {
        let pid = sysinfo::get_current_pid().ok();
        let mut system = System::new();
        system.refresh_memory();
        // Populates the core list used to normalize process cpu
        system.refresh_cpu();
        // First process reading primes the cpu usage delta
        if let Some(pid) = pid {
            system.refresh_process(pid);
        }
        Self {
            system: Mutex::new(system),
            pid,
            started_at: Instant::now(),
        }
    }
}

impl MetricsSource for SysinfoMetricsSource {
    fn sample(&self) -> VigilResult<RuntimeMetrics> {
        let pid = self
            .pid
            .ok_or_else(|| VigilError::probe("current process id unavailable"))?;

        let mut system = self.system.lock();
        system.refresh_memory();
        if !system.refresh_process(pid) {
            return Err(VigilError::probe(format!("process {pid} not found")));
        }
        let process = system
            .process(pid)
            .ok_or_else(|| VigilError::probe(format!("process {pid} not found")))?;

        let memory = MemoryUsage::from_bytes(process.memory(), system.total_memory());
        let cores = system.cpus().len().max(1) as f64;
        let cpu_percent = (f64::from(process.cpu_usage()) / cores).clamp(0.0, 100.0);

        Ok(RuntimeMetrics {
            memory,
            cpu_percent,
            uptime: self.started_at.elapsed(),
        })
    }
}
