//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `CALLWATCH__*` 覆盖（双下划线表示嵌套，如 `CALLWATCH__TELEPHONY__ASSISTANT_ID=asst_1`）。
//! 所有字段都有默认值，空配置也能启动（只是外呼不可用、相关健康检查为 false）。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::calls::OutboundSettings;
use crate::monitor::{AlertThresholds, ResourceLimits};

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub telephony: TelephonySection,
    pub calls: CallsSection,
    pub alerts: AlertsSection,
    pub scheduler: SchedulerSection,
    pub resources: ResourcesSection,
}

/// [app] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: String,
    /// 停机时每个清理步骤的超时
    pub shutdown_timeout_secs: u64,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: "callwatch".to_string(),
            shutdown_timeout_secs: 5,
        }
    }
}

/// [telephony] 段：外呼所需的平台标识与超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelephonySection {
    pub assistant_id: Option<String>,
    pub phone_number_id: Option<String>,
    /// 外呼默认的转接号码
    pub transfer_to: Option<String>,
    pub placement_timeout_secs: u64,
    /// 单个健康探针的超时
    pub probe_timeout_secs: u64,
}

impl Default for TelephonySection {
    fn default() -> Self {
        Self {
            assistant_id: None,
            phone_number_id: None,
            transfer_to: None,
            placement_timeout_secs: 10,
            probe_timeout_secs: 10,
        }
    }
}

/// [calls] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CallsSection {
    /// 终态通话与历史事件的保留时长
    pub retention_secs: u64,
}

impl Default for CallsSection {
    fn default() -> Self {
        Self {
            retention_secs: 86_400,
        }
    }
}

/// [alerts] 段：状态报告的告警阈值
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AlertsSection {
    pub high_volume_active: usize,
    pub critical_volume_active: usize,
    pub min_success_rate: f64,
    pub min_sample_size: usize,
    pub long_call_secs: f64,
}

impl Default for AlertsSection {
    fn default() -> Self {
        let t = AlertThresholds::default();
        Self {
            high_volume_active: t.high_volume_active,
            critical_volume_active: t.critical_volume_active,
            min_success_rate: t.min_success_rate,
            min_sample_size: t.min_sample_size,
            long_call_secs: t.long_call_secs,
        }
    }
}

/// [scheduler] 段：节拍、出错退避与各任务间隔（秒）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerSection {
    pub tick_secs: u64,
    pub error_backoff_secs: u64,
    pub call_queue_interval_secs: u64,
    pub health_interval_secs: u64,
    pub resources_interval_secs: u64,
    pub status_interval_secs: u64,
    pub cleanup_interval_secs: u64,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            tick_secs: 5,
            error_backoff_secs: 5,
            call_queue_interval_secs: 10,
            health_interval_secs: 30,
            resources_interval_secs: 120,
            status_interval_secs: 60,
            cleanup_interval_secs: 3600,
        }
    }
}

/// [resources] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResourcesSection {
    pub memory_warn_mb: f64,
    pub cpu_warn_percent: f32,
}

impl Default for ResourcesSection {
    fn default() -> Self {
        let l = ResourceLimits::default();
        Self {
            memory_warn_mb: l.memory_warn_mb,
            cpu_warn_percent: l.cpu_warn_percent,
        }
    }
}

impl AppConfig {
    pub fn outbound_settings(&self) -> OutboundSettings {
        OutboundSettings {
            assistant_id: self.telephony.assistant_id.clone(),
            phone_number_id: self.telephony.phone_number_id.clone(),
            default_transfer_to: self.telephony.transfer_to.clone(),
            placement_timeout: Duration::from_secs(self.telephony.placement_timeout_secs),
        }
    }

    pub fn alert_thresholds(&self) -> AlertThresholds {
        AlertThresholds {
            high_volume_active: self.alerts.high_volume_active,
            critical_volume_active: self.alerts.critical_volume_active,
            min_success_rate: self.alerts.min_success_rate,
            min_sample_size: self.alerts.min_sample_size,
            long_call_secs: self.alerts.long_call_secs,
        }
    }

    pub fn resource_limits(&self) -> ResourceLimits {
        ResourceLimits {
            memory_warn_mb: self.resources.memory_warn_mb,
            cpu_warn_percent: self.resources.cpu_warn_percent,
        }
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.calls.retention_secs)
    }
}

/// 从 config 目录加载配置，环境变量 CALLWATCH__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 CALLWATCH__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        } else {
            tracing::warn!(path = %path.display(), "Config file not found, ignoring");
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("CALLWATCH")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}
