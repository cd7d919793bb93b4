//! 组件装配：由 AppConfig 与电话平台客户端构建全部运行时组件
//!
//! CallManager 等共享状态在这里显式构造并以 Arc 分发，不存在进程级单例。

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::calls::CallManager;
use crate::config::AppConfig;
use crate::core::shutdown::{CallDrainCleanup, FinalReportCleanup, ShutdownCoordinator};
use crate::monitor::{
    AlertSink, CallQueueMonitorTask, CleanupTask, ConfiguredProbe, HealthCheckTask, HealthChecker,
    LogAlertSink, ManagerProbe, ResourceMonitor, ResourceMonitorTask, Scheduler, StatusReportTask,
    StatusReporter, TelephonyProbe,
};
use crate::telephony::{TelephonyClient, UnavailableClient};

/// 构建器
pub struct MonitorBuilder {
    config: AppConfig,
    client: Arc<dyn TelephonyClient>,
    sink: Arc<dyn AlertSink>,
    enable_resources: bool,
}

impl MonitorBuilder {
    /// 默认使用 UnavailableClient（外呼与平台探针均失败）和 LogAlertSink
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            client: Arc::new(UnavailableClient),
            sink: Arc::new(LogAlertSink),
            enable_resources: true,
        }
    }

    pub fn with_client(mut self, client: Arc<dyn TelephonyClient>) -> Self {
        self.client = client;
        self
    }

    pub fn with_alert_sink(mut self, sink: Arc<dyn AlertSink>) -> Self {
        self.sink = sink;
        self
    }

    /// 是否注册进程资源监控任务
    pub fn with_resource_monitor(mut self, enable: bool) -> Self {
        self.enable_resources = enable;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn build_manager(&self) -> Arc<CallManager> {
        Arc::new(CallManager::new(
            self.client.clone(),
            self.config.outbound_settings(),
        ))
    }

    /// 平台可达、助手已配置、号码已配置、管理器在运行 四项探针
    pub fn build_health_checker(&self, manager: Arc<CallManager>) -> HealthChecker {
        let telephony = &self.config.telephony;
        HealthChecker::new(Duration::from_secs(telephony.probe_timeout_secs))
            .with_probe(TelephonyProbe::new(self.client.clone()))
            .with_probe(ConfiguredProbe::new(
                "assistant_configured",
                telephony.assistant_id.as_deref(),
            ))
            .with_probe(ConfiguredProbe::new(
                "phone_number_configured",
                telephony.phone_number_id.as_deref(),
            ))
            .with_probe(ManagerProbe::new(manager))
    }

    pub fn build_scheduler(
        &self,
        manager: Arc<CallManager>,
        health: Arc<HealthChecker>,
        reporter: Arc<StatusReporter>,
    ) -> Scheduler {
        let s = &self.config.scheduler;
        let secs = Duration::from_secs;

        let mut scheduler = Scheduler::new(
            secs(s.tick_secs),
            secs(s.error_backoff_secs),
            self.sink.clone(),
        );
        let long_call = Duration::from_secs_f64(self.config.alerts.long_call_secs.max(0.0));
        scheduler.register(
            Arc::new(CallQueueMonitorTask::new(manager.clone(), long_call)),
            secs(s.call_queue_interval_secs),
        );
        scheduler.register(
            Arc::new(HealthCheckTask::new(health)),
            secs(s.health_interval_secs),
        );
        if self.enable_resources {
            scheduler.register(
                Arc::new(ResourceMonitorTask::new(
                    Arc::new(ResourceMonitor::new()),
                    self.config.resource_limits(),
                    self.sink.clone(),
                )),
                secs(s.resources_interval_secs),
            );
        }
        scheduler.register(
            Arc::new(StatusReportTask::new(reporter)),
            secs(s.status_interval_secs),
        );
        scheduler.register(
            Arc::new(CleanupTask::new(manager, self.config.retention())),
            secs(s.cleanup_interval_secs),
        );
        scheduler
    }

    pub fn build(self) -> MonitorComponents {
        let manager = self.build_manager();
        let health = Arc::new(self.build_health_checker(manager.clone()));
        let reporter = Arc::new(StatusReporter::new(
            manager.clone(),
            health.clone(),
            self.config.alert_thresholds(),
            self.sink.clone(),
        ));
        let scheduler = self.build_scheduler(manager.clone(), health.clone(), reporter.clone());

        MonitorComponents {
            manager,
            health,
            reporter,
            scheduler,
            config: self.config,
        }
    }
}

/// 装配好的组件；scheduler 由调用方 spawn
pub struct MonitorComponents {
    pub manager: Arc<CallManager>,
    pub health: Arc<HealthChecker>,
    pub reporter: Arc<StatusReporter>,
    pub scheduler: Scheduler,
    pub config: AppConfig,
}

impl MonitorComponents {
    /// 停机清理：先结束剩余通话，再输出最终报告
    pub fn shutdown_coordinator(&self) -> ShutdownCoordinator {
        let mut coordinator = ShutdownCoordinator::new(Duration::from_secs(
            self.config.app.shutdown_timeout_secs,
        ));
        coordinator.register(CallDrainCleanup::new(self.manager.clone()));
        coordinator.register(FinalReportCleanup::new(self.reporter.clone()));
        coordinator
    }
}

/// 便捷函数：加载配置并创建构建器；配置加载失败时退回默认配置
pub fn create_monitor_builder(config_path: Option<PathBuf>) -> MonitorBuilder {
    let config = crate::config::load_config(config_path).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });
    MonitorBuilder::new(config)
}
