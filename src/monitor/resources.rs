//! 进程资源采样（CPU / 常驻内存）
//!
//! CPU 占用需要两次刷新之间的差值，构造时先刷新一次建立基线。

use serde::Serialize;
use sysinfo::{Pid, ProcessesToUpdate, System};
use tokio::sync::Mutex;

/// 一次采样结果
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResourceSample {
    pub cpu_percent: f32,
    pub memory_mb: f64,
}

/// 资源告警阈值
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceLimits {
    pub memory_warn_mb: f64,
    pub cpu_warn_percent: f32,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            memory_warn_mb: 512.0,
            cpu_warn_percent: 85.0,
        }
    }
}

impl ResourceLimits {
    /// 返回超限项的描述
    pub fn exceeded(&self, sample: &ResourceSample) -> Vec<String> {
        let mut over = Vec::new();
        if sample.memory_mb > self.memory_warn_mb {
            over.push(format!(
                "memory {:.1} MB above {:.0} MB",
                sample.memory_mb, self.memory_warn_mb
            ));
        }
        if sample.cpu_percent > self.cpu_warn_percent {
            over.push(format!(
                "cpu {:.1}% above {:.0}%",
                sample.cpu_percent, self.cpu_warn_percent
            ));
        }
        over
    }
}

/// 当前进程的资源采样器
pub struct ResourceMonitor {
    system: Mutex<System>,
    pid: Pid,
}

impl ResourceMonitor {
    pub fn new() -> Self {
        let mut system = System::new();
        let pid = Pid::from_u32(std::process::id());
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]));

        Self {
            system: Mutex::new(system),
            pid,
        }
    }

    /// 采样；进程信息不可读时返回 None
    pub async fn sample(&self) -> Option<ResourceSample> {
        let mut system = self.system.lock().await;
        system.refresh_processes(ProcessesToUpdate::Some(&[self.pid]));

        system.process(self.pid).map(|process| ResourceSample {
            cpu_percent: process.cpu_usage(),
            memory_mb: process.memory() as f64 / 1024.0 / 1024.0,
        })
    }
}

impl Default for ResourceMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limits_report_each_exceeded_value() {
        let limits = ResourceLimits {
            memory_warn_mb: 100.0,
            cpu_warn_percent: 50.0,
        };
        let calm = ResourceSample {
            cpu_percent: 10.0,
            memory_mb: 20.0,
        };
        assert!(limits.exceeded(&calm).is_empty());

        let busy = ResourceSample {
            cpu_percent: 75.0,
            memory_mb: 250.0,
        };
        let over = limits.exceeded(&busy);
        assert_eq!(over.len(), 2);
        assert!(over[0].starts_with("memory"));
        assert!(over[1].starts_with("cpu"));
    }

    #[tokio::test]
    async fn test_sample_current_process() {
        let monitor = ResourceMonitor::new();
        let sample = monitor.sample().await.expect("own process should be visible");
        assert!(sample.memory_mb > 0.0);
        assert!(sample.cpu_percent >= 0.0);
    }
}
