//! 监控层：健康检查、状态报告、告警、资源采样与后台调度

pub mod alert;
pub mod health;
pub mod report;
pub mod resources;
pub mod scheduler;
pub mod tasks;

pub use alert::{Alert, AlertSeverity, AlertSink, LogAlertSink};
pub use health::{
    ConfiguredProbe, HealthChecker, HealthProbe, HealthSnapshot, ManagerProbe, TelephonyProbe,
};
pub use report::{evaluate_alerts, format_uptime, AlertThresholds, StatusReport, StatusReporter};
pub use resources::{ResourceLimits, ResourceMonitor, ResourceSample};
pub use scheduler::{PeriodicTask, Scheduler, SchedulerSummary, TaskRunStats};
pub use tasks::{
    CallQueueMonitorTask, CleanupTask, HealthCheckTask, ResourceMonitorTask, StatusReportTask,
};
