//! 状态报告：汇总通话统计与健康检查，并按阈值产生告警
//!
//! report() 除了把告警交给 AlertSink 之外没有副作用；无论是否触发告警都返回完整报告。

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::calls::{CallManager, CallStatistics};
use crate::monitor::{Alert, AlertSeverity, AlertSink, HealthChecker, HealthSnapshot};

/// 告警阈值（默认值与线上一致，可通过 [alerts] 配置覆盖）
#[derive(Debug, Clone, PartialEq)]
pub struct AlertThresholds {
    pub high_volume_active: usize,
    pub critical_volume_active: usize,
    /// 百分比
    pub min_success_rate: f64,
    /// 样本数不超过该值时不评估成功率，避免小样本误报
    pub min_sample_size: usize,
    pub long_call_secs: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            high_volume_active: 10,
            critical_volume_active: 15,
            min_success_rate: 90.0,
            min_sample_size: 10,
            long_call_secs: 600.0,
        }
    }
}

/// 根据统计数据评估告警；各条规则互相独立
pub fn evaluate_alerts(stats: &CallStatistics, thresholds: &AlertThresholds) -> Vec<Alert> {
    let mut alerts = Vec::new();

    if stats.active_count > thresholds.high_volume_active {
        alerts.push(Alert::new(
            AlertSeverity::Warning,
            "high_call_volume",
            format!("High call volume: {} active calls", stats.active_count),
        ));
    }
    if stats.active_count > thresholds.critical_volume_active {
        alerts.push(Alert::new(
            AlertSeverity::Warning,
            "very_high_call_volume",
            format!(
                "Very high call volume: {} active calls (limit {})",
                stats.active_count, thresholds.critical_volume_active
            ),
        ));
    }
    if stats.success_rate < thresholds.min_success_rate
        && stats.total_handled > thresholds.min_sample_size
    {
        alerts.push(Alert::new(
            AlertSeverity::Warning,
            "low_success_rate",
            format!(
                "Low success rate: {:.1}% over {} calls",
                stats.success_rate, stats.total_handled
            ),
        ));
    }
    if stats.average_duration_secs > thresholds.long_call_secs {
        alerts.push(Alert::new(
            AlertSeverity::Info,
            "long_average_duration",
            format!(
                "Long average call duration: {:.0}s",
                stats.average_duration_secs
            ),
        ));
    }

    alerts
}

/// `HH:MM:SS`，超过一天为 `Nd HH:MM:SS`
pub fn format_uptime(secs: f64) -> String {
    let total = secs.max(0.0) as u64;
    let days = total / 86_400;
    let hours = (total % 86_400) / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    if days > 0 {
        format!("{days}d {hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    }
}

/// 一次状态报告
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub generated_at: DateTime<Utc>,
    pub uptime: String,
    pub statistics: CallStatistics,
    pub health: HealthSnapshot,
    pub alerts: Vec<Alert>,
}

impl StatusReport {
    /// 形如 "3/4"
    pub fn health_ratio(&self) -> String {
        format!("{}/{}", self.health.healthy_count, self.health.total_count)
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.statistics;
        writeln!(f, "System status @ {}", self.generated_at.format("%Y-%m-%d %H:%M:%S UTC"))?;
        writeln!(f, "  uptime:           {}", self.uptime)?;
        writeln!(f, "  active calls:     {}", s.active_count)?;
        writeln!(
            f,
            "  calls handled:    {} ({} ok, {} failed)",
            s.total_handled, s.successful_calls, s.failed_calls
        )?;
        writeln!(f, "  success rate:     {:.1}%", s.success_rate)?;
        writeln!(f, "  avg duration:     {:.1}s", s.average_duration_secs)?;
        write!(f, "  health:           {}", self.health_ratio())?;
        let failing = self.health.failing();
        if !failing.is_empty() {
            write!(f, " (failing: {})", failing.join(", "))?;
        }
        if !self.alerts.is_empty() {
            write!(f, "\n  alerts:           {}", self.alerts.len())?;
        }
        Ok(())
    }
}

/// 状态报告器
pub struct StatusReporter {
    manager: Arc<CallManager>,
    health: Arc<HealthChecker>,
    thresholds: AlertThresholds,
    sink: Arc<dyn AlertSink>,
}

impl StatusReporter {
    pub fn new(
        manager: Arc<CallManager>,
        health: Arc<HealthChecker>,
        thresholds: AlertThresholds,
        sink: Arc<dyn AlertSink>,
    ) -> Self {
        Self {
            manager,
            health,
            thresholds,
            sink,
        }
    }

    pub fn thresholds(&self) -> &AlertThresholds {
        &self.thresholds
    }

    pub async fn report(&self) -> StatusReport {
        let statistics = self.manager.statistics().await;
        let health = self.health.check().await;
        let alerts = evaluate_alerts(&statistics, &self.thresholds);

        for alert in &alerts {
            self.sink.emit(alert);
        }

        StatusReport {
            generated_at: Utc::now(),
            uptime: format_uptime(statistics.uptime_secs),
            statistics,
            health,
            alerts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::calls::OutboundSettings;
    use crate::monitor::alert::testing::RecordingSink;
    use crate::monitor::ConfiguredProbe;
    use crate::telephony::MockTelephonyClient;

    fn stats(active: usize, total: usize, successful: usize, avg: f64) -> CallStatistics {
        CallStatistics {
            uptime_secs: 0.0,
            active_count: active,
            total_handled: total,
            successful_calls: successful,
            failed_calls: total - successful,
            success_rate: if total == 0 {
                0.0
            } else {
                successful as f64 / total as f64 * 100.0
            },
            average_duration_secs: avg,
        }
    }

    fn codes(alerts: &[Alert]) -> Vec<&'static str> {
        alerts.iter().map(|a| a.code).collect()
    }

    #[test]
    fn test_eleven_active_fires_only_volume_warning() {
        let alerts = evaluate_alerts(&stats(11, 0, 0, 0.0), &AlertThresholds::default());
        assert_eq!(codes(&alerts), vec!["high_call_volume"]);
        assert_eq!(alerts[0].severity, AlertSeverity::Warning);
    }

    #[test]
    fn test_sixteen_active_fires_both_volume_warnings() {
        let alerts = evaluate_alerts(&stats(16, 0, 0, 0.0), &AlertThresholds::default());
        assert_eq!(codes(&alerts), vec!["high_call_volume", "very_high_call_volume"]);
    }

    #[test]
    fn test_low_success_rate_respects_sample_size() {
        let thresholds = AlertThresholds::default();
        let alerts = evaluate_alerts(&stats(0, 20, 10, 0.0), &thresholds);
        assert_eq!(codes(&alerts), vec!["low_success_rate"]);

        let alerts = evaluate_alerts(&stats(0, 5, 2, 0.0), &thresholds);
        assert!(alerts.is_empty());
    }

    #[test]
    fn test_long_average_duration_is_info() {
        let alerts = evaluate_alerts(&stats(0, 1, 1, 601.0), &AlertThresholds::default());
        assert_eq!(codes(&alerts), vec!["long_average_duration"]);
        assert_eq!(alerts[0].severity, AlertSeverity::Info);
    }

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(0.0), "00:00:00");
        assert_eq!(format_uptime(3725.9), "01:02:05");
        assert_eq!(format_uptime(90_061.0), "1d 01:01:01");
    }

    #[tokio::test]
    async fn test_report_combines_statistics_and_health() {
        let client = Arc::new(MockTelephonyClient::default());
        let manager = Arc::new(CallManager::new(client, OutboundSettings::default()));
        for i in 0..11 {
            manager.start_inbound(&format!("c{i}"), "+1").await.unwrap();
        }
        let health = Arc::new(
            HealthChecker::new(Duration::from_secs(1))
                .with_probe(ConfiguredProbe::new("assistant_configured", Some("a")))
                .with_probe(ConfiguredProbe::new("phone_number_configured", None)),
        );
        let sink = Arc::new(RecordingSink::default());
        let reporter = StatusReporter::new(
            manager,
            health,
            AlertThresholds::default(),
            sink.clone(),
        );

        let report = reporter.report().await;
        assert_eq!(report.statistics.active_count, 11);
        assert_eq!(report.health_ratio(), "1/2");
        assert_eq!(codes(&report.alerts), vec!["high_call_volume"]);
        assert_eq!(sink.codes(), vec!["high_call_volume"]);

        let text = report.to_string();
        assert!(text.contains("active calls:     11"));
        assert!(text.contains("failing: phone_number_configured"));
    }

    #[tokio::test]
    async fn test_report_without_alerts_still_returns_summary() {
        let client = Arc::new(MockTelephonyClient::default());
        let manager = Arc::new(CallManager::new(client, OutboundSettings::default()));
        let sink = Arc::new(RecordingSink::default());
        let reporter = StatusReporter::new(
            manager,
            Arc::new(HealthChecker::new(Duration::from_secs(1))),
            AlertThresholds::default(),
            sink.clone(),
        );

        let report = reporter.report().await;
        assert!(report.alerts.is_empty());
        assert!(sink.alerts().is_empty());
        assert_eq!(report.statistics.success_rate, 0.0);
        assert_eq!(report.health_ratio(), "0/0");
    }
}
