#[cfg(feature = "cli")]
use std::time::{Duration, Instant};
#[cfg(feature = "cli")]
use sysinfo::{Pid, ProcessesToUpdate, System};

#[cfg(feature = "cli")]
#[derive(Debug, Clone)]
pub struct RuntimeStats {
    pub cpu_usage: f32,
    pub memory_usage_mb: u64,
    pub peak_memory_mb: u64,
    pub uptime: Duration,
}

/// 記錄輪詢服務本身的資源使用量
#[cfg(feature = "cli")]
pub struct RuntimeMonitor {
    system: System,
    pid: Option<Pid>,
    started: Instant,
    peak_memory_mb: u64,
    enabled: bool,
}

#[cfg(feature = "cli")]
impl RuntimeMonitor {
    pub fn new(enabled: bool) -> Self {
        let pid = sysinfo::get_current_pid().ok();
        if enabled && pid.is_none() {
            tracing::warn!("Could not resolve current PID, runtime stats disabled");
        }

        Self {
            system: System::new(),
            pid,
            started: Instant::now(),
            peak_memory_mb: 0,
            enabled: enabled && pid.is_some(),
        }
    }

    pub fn sample(&mut self) -> Option<RuntimeStats> {
        if !self.enabled {
            return None;
        }

        let pid = self.pid?;
        self.system
            .refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        let process = self.system.process(pid)?;

        let memory_mb = process.memory() / 1024 / 1024;
        self.peak_memory_mb = self.peak_memory_mb.max(memory_mb);

        Some(RuntimeStats {
            cpu_usage: process.cpu_usage(),
            memory_usage_mb: memory_mb,
            peak_memory_mb: self.peak_memory_mb,
            uptime: self.started.elapsed(),
        })
    }

    pub fn log_cycle(&mut self, cycle: u64) {
        if let Some(stats) = self.sample() {
            tracing::info!(
                "📊 cycle {} - CPU: {:.1}%, Memory: {}MB, Peak: {}MB, Uptime: {:?}",
                cycle,
                stats.cpu_usage,
                stats.memory_usage_mb,
                stats.peak_memory_mb,
                stats.uptime
            );
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

// 非 CLI 環境提供空實現
#[cfg(not(feature = "cli"))]
pub struct RuntimeMonitor;

#[cfg(not(feature = "cli"))]
impl RuntimeMonitor {
    pub fn new(_enabled: bool) -> Self {
        Self
    }

    pub fn log_cycle(&mut self, _cycle: u64) {}

    pub fn is_enabled(&self) -> bool {
        false
    }
}

#[cfg(all(test, feature = "cli"))]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_monitor_samples_nothing() {
        let mut monitor = RuntimeMonitor::new(false);
        assert!(!monitor.is_enabled());
        assert!(monitor.sample().is_none());
    }
}
