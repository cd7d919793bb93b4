//! 告警：级别、告警内容与输出端
//!
//! 默认的 LogAlertSink 把告警写进 tracing 日志；接入外部告警系统时实现 AlertSink 即可。

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// 告警级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AlertSeverity::Info => "info",
            AlertSeverity::Warning => "warning",
            AlertSeverity::Error => "error",
            AlertSeverity::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// 单条告警
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub severity: AlertSeverity,
    /// 稳定的机器可读标识，如 "high_call_volume"
    pub code: &'static str,
    pub message: String,
    pub raised_at: DateTime<Utc>,
}

impl Alert {
    pub fn new(severity: AlertSeverity, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            raised_at: Utc::now(),
        }
    }
}

/// 告警输出端
pub trait AlertSink: Send + Sync {
    fn emit(&self, alert: &Alert);
}

/// 写日志的告警输出端
#[derive(Debug, Default)]
pub struct LogAlertSink;

impl AlertSink for LogAlertSink {
    fn emit(&self, alert: &Alert) {
        match alert.severity {
            AlertSeverity::Info => {
                tracing::info!(code = alert.code, "ALERT: {}", alert.message)
            }
            AlertSeverity::Warning => {
                tracing::warn!(code = alert.code, "ALERT: {}", alert.message)
            }
            AlertSeverity::Error => {
                tracing::error!(code = alert.code, "ALERT: {}", alert.message)
            }
            AlertSeverity::Critical => {
                tracing::error!(code = alert.code, "CRITICAL ALERT: {}", alert.message)
            }
        }
    }
}
