//! 调度器上运行的几个后台任务

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::calls::CallManager;
use crate::monitor::{
    Alert, AlertSeverity, AlertSink, HealthChecker, PeriodicTask, ResourceLimits, ResourceMonitor,
    StatusReporter,
};

/// 通话队列监控：记录活跃通话数，对超时长的通话告警
pub struct CallQueueMonitorTask {
    manager: Arc<CallManager>,
    long_call: Duration,
}

impl CallQueueMonitorTask {
    pub fn new(manager: Arc<CallManager>, long_call: Duration) -> Self {
        Self { manager, long_call }
    }
}

#[async_trait]
impl PeriodicTask for CallQueueMonitorTask {
    fn name(&self) -> &'static str {
        "call_queue_monitor"
    }

    async fn run(&self) -> anyhow::Result<()> {
        let active = self.manager.active_calls().await;
        if !active.is_empty() {
            tracing::info!(active = active.len(), "Active calls");
        }

        let limit = self.long_call.as_secs_f64();
        for record in active.values().filter(|r| r.duration_secs > limit) {
            tracing::warn!(
                call_id = %record.call_id,
                duration_secs = record.duration_secs,
                "Long running call"
            );
        }
        Ok(())
    }
}

pub struct HealthCheckTask {
    checker: Arc<HealthChecker>,
}

impl HealthCheckTask {
    pub fn new(checker: Arc<HealthChecker>) -> Self {
        Self { checker }
    }
}

#[async_trait]
impl PeriodicTask for HealthCheckTask {
    fn name(&self) -> &'static str {
        "health_check"
    }

    async fn run(&self) -> anyhow::Result<()> {
        let snapshot = self.checker.check().await;
        if snapshot.is_healthy() {
            tracing::debug!(
                healthy = snapshot.healthy_count,
                total = snapshot.total_count,
                "Health check passed"
            );
        } else {
            tracing::warn!(
                healthy = snapshot.healthy_count,
                total = snapshot.total_count,
                failing = ?snapshot.failing(),
                "Health check degraded"
            );
        }
        Ok(())
    }
}

/// 进程资源监控：超限发 Warning 告警；采样失败视为任务失败
pub struct ResourceMonitorTask {
    monitor: Arc<ResourceMonitor>,
    limits: ResourceLimits,
    sink: Arc<dyn AlertSink>,
}

impl ResourceMonitorTask {
    pub fn new(monitor: Arc<ResourceMonitor>, limits: ResourceLimits, sink: Arc<dyn AlertSink>) -> Self {
        Self {
            monitor,
            limits,
            sink,
        }
    }
}

#[async_trait]
impl PeriodicTask for ResourceMonitorTask {
    fn name(&self) -> &'static str {
        "resource_monitor"
    }

    async fn run(&self) -> anyhow::Result<()> {
        let sample = self
            .monitor
            .sample()
            .await
            .ok_or_else(|| anyhow::anyhow!("process resource usage unavailable"))?;

        tracing::debug!(
            cpu_percent = sample.cpu_percent,
            memory_mb = sample.memory_mb,
            "Resource usage"
        );

        let exceeded = self.limits.exceeded(&sample);
        if !exceeded.is_empty() {
            self.sink.emit(&Alert::new(
                AlertSeverity::Warning,
                "high_resource_usage",
                format!("High resource usage: {}", exceeded.join("; ")),
            ));
        }
        Ok(())
    }
}

pub struct StatusReportTask {
    reporter: Arc<StatusReporter>,
}

impl StatusReportTask {
    pub fn new(reporter: Arc<StatusReporter>) -> Self {
        Self { reporter }
    }
}

#[async_trait]
impl PeriodicTask for StatusReportTask {
    fn name(&self) -> &'static str {
        "status_report"
    }

    async fn run(&self) -> anyhow::Result<()> {
        let report = self.reporter.report().await;
        tracing::info!("{report}");
        Ok(())
    }
}

/// 清理过期的通话记录与历史事件
pub struct CleanupTask {
    manager: Arc<CallManager>,
    retention: Duration,
}

impl CleanupTask {
    pub fn new(manager: Arc<CallManager>, retention: Duration) -> Self {
        Self { manager, retention }
    }
}

#[async_trait]
impl PeriodicTask for CleanupTask {
    fn name(&self) -> &'static str {
        "cleanup"
    }

    async fn run(&self) -> anyhow::Result<()> {
        let removed = self.manager.cleanup(self.retention).await;
        tracing::debug!(removed, retention_secs = self.retention.as_secs(), "Cleanup pass finished");
        Ok(())
    }
}
