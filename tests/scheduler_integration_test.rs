//! 调度循环集成测试：虚拟时钟下运行完整组件

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use callwatch::config::AppConfig;
    use callwatch::core::{MonitorBuilder, ShutdownManager, ShutdownReason};
    use callwatch::monitor::{Alert, AlertSink};
    use callwatch::telephony::MockTelephonyClient;

    #[derive(Default)]
    struct CollectingSink(Mutex<Vec<Alert>>);

    impl AlertSink for CollectingSink {
        fn emit(&self, alert: &Alert) {
            self.0.lock().unwrap().push(alert.clone());
        }
    }

    impl CollectingSink {
        fn codes(&self) -> Vec<&'static str> {
            self.0.lock().unwrap().iter().map(|a| a.code).collect()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_hour_of_scheduling_runs_cleanup_once() {
        let mut config = AppConfig::default();
        config.telephony.assistant_id = Some("asst".to_string());
        config.calls.retention_secs = 60;

        let sink = Arc::new(CollectingSink::default());
        let components = MonitorBuilder::new(config)
            .with_client(Arc::new(MockTelephonyClient::default()))
            .with_alert_sink(sink.clone())
            .with_resource_monitor(false)
            .build();

        let manager = components.manager.clone();
        manager.start_inbound("finished", "+15550200").await.unwrap();
        manager.end("finished", "completed").await;
        manager.start_inbound("ongoing", "+15550201").await.unwrap();

        let shutdown = Arc::new(ShutdownManager::new());
        let handle = tokio::spawn(components.scheduler.run(shutdown.token()));

        tokio::time::sleep(Duration::from_secs(3601)).await;
        assert!(manager.get("finished").await.is_none());
        assert!(manager.get("ongoing").await.is_some());

        shutdown.shutdown(ShutdownReason::Signal);
        let summary = handle.await.unwrap();

        assert_eq!(summary.runs("cleanup"), 1);
        assert_eq!(summary.runs("call_queue_monitor"), 360);
        assert_eq!(summary.runs("health_check"), 120);
        assert_eq!(summary.runs("status_report"), 60);
        assert_eq!(summary.tasks.values().map(|s| s.failures).sum::<u64>(), 0);
        assert!(!sink.codes().contains(&"background_service_error"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_drains_calls_after_loop_stops() {
        let sink = Arc::new(CollectingSink::default());
        let components = MonitorBuilder::new(AppConfig::default())
            .with_client(Arc::new(MockTelephonyClient::default()))
            .with_alert_sink(sink.clone())
            .with_resource_monitor(false)
            .build();
        for i in 0..12 {
            components
                .manager
                .start_inbound(&format!("busy-{i}"), "+15550300")
                .await
                .unwrap();
        }

        let shutdown = Arc::new(ShutdownManager::new());
        let coordinator = components.shutdown_coordinator();
        let manager = components.manager.clone();
        let handle = tokio::spawn(components.scheduler.run(shutdown.token()));

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(sink.codes().contains(&"high_call_volume"));

        shutdown.shutdown(ShutdownReason::UserInitiated);
        handle.await.unwrap();
        assert_eq!(coordinator.run_cleanup().await, 2);

        assert!(!manager.is_accepting());
        let stats = manager.statistics().await;
        assert_eq!(stats.active_count, 0);
        assert_eq!(stats.total_handled, 12);
    }
}
