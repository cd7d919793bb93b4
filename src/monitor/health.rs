//! 健康检查
//!
//! 每个探针独立执行并受超时约束；探针返回 Err 或超时都记为 false 并记录日志，不向调用方抛错。
//! 检查过程只读，不修改任何通话状态。

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use serde::Serialize;

use crate::calls::CallManager;
use crate::core::ProbeError;
use crate::telephony::TelephonyClient;

/// 健康探针：显式返回 Result<bool>，不依赖 panic / 异常表达「不健康」
#[async_trait]
pub trait HealthProbe: Send + Sync {
    fn name(&self) -> &str;

    async fn probe(&self) -> Result<bool, ProbeError>;
}

/// 一次健康检查的结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthSnapshot {
    pub checks: BTreeMap<String, bool>,
    pub checked_at: DateTime<Utc>,
    pub healthy_count: usize,
    pub total_count: usize,
}

impl HealthSnapshot {
    /// 通过的探针占比；没有探针时为 0
    pub fn ratio(&self) -> f64 {
        if self.total_count == 0 {
            0.0
        } else {
            self.healthy_count as f64 / self.total_count as f64
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.total_count > 0 && self.healthy_count == self.total_count
    }

    /// 未通过的探针名
    pub fn failing(&self) -> Vec<&str> {
        self.checks
            .iter()
            .filter(|(_, ok)| !**ok)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

/// 健康检查器：持有一组探针
pub struct HealthChecker {
    probes: Vec<Arc<dyn HealthProbe>>,
    probe_timeout: Duration,
}

impl HealthChecker {
    pub fn new(probe_timeout: Duration) -> Self {
        Self {
            probes: Vec::new(),
            probe_timeout,
        }
    }

    pub fn register(&mut self, probe: impl HealthProbe + 'static) {
        self.probes.push(Arc::new(probe));
    }

    pub fn with_probe(mut self, probe: impl HealthProbe + 'static) -> Self {
        self.register(probe);
        self
    }

    pub fn probe_names(&self) -> Vec<String> {
        self.probes.iter().map(|p| p.name().to_string()).collect()
    }

    pub async fn check(&self) -> HealthSnapshot {
        let mut checks = BTreeMap::new();

        for probe in &self.probes {
            let name = probe.name().to_string();
            let guarded = AssertUnwindSafe(probe.probe()).catch_unwind();
            let ok = match tokio::time::timeout(self.probe_timeout, guarded).await {
                Ok(Ok(Ok(ok))) => ok,
                Ok(Ok(Err(e))) => {
                    tracing::warn!(probe = %name, error = %e, "Health probe failed");
                    false
                }
                Ok(Err(_)) => {
                    tracing::error!(probe = %name, "Health probe panicked");
                    false
                }
                Err(_) => {
                    let e = ProbeError::Timeout(self.probe_timeout.as_secs());
                    tracing::warn!(probe = %name, error = %e, "Health probe failed");
                    false
                }
            };
            checks.insert(name, ok);
        }

        let healthy_count = checks.values().filter(|ok| **ok).count();
        let total_count = checks.len();
        HealthSnapshot {
            checks,
            checked_at: Utc::now(),
            healthy_count,
            total_count,
        }
    }
}

/// 电话平台可达：list_assistants(1) 成功即视为可达
pub struct TelephonyProbe {
    client: Arc<dyn TelephonyClient>,
}

impl TelephonyProbe {
    pub fn new(client: Arc<dyn TelephonyClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HealthProbe for TelephonyProbe {
    fn name(&self) -> &str {
        "telephony_client"
    }

    async fn probe(&self) -> Result<bool, ProbeError> {
        self.client.list_assistants(1).await?;
        Ok(true)
    }
}

/// 配置项是否存在（如 assistant_configured / phone_number_configured）
pub struct ConfiguredProbe {
    name: &'static str,
    present: bool,
}

impl ConfiguredProbe {
    pub fn new(name: &'static str, value: Option<&str>) -> Self {
        Self {
            name,
            present: value.map(|v| !v.trim().is_empty()).unwrap_or(false),
        }
    }
}

#[async_trait]
impl HealthProbe for ConfiguredProbe {
    fn name(&self) -> &str {
        self.name
    }

    async fn probe(&self) -> Result<bool, ProbeError> {
        Ok(self.present)
    }
}

/// CallManager 仍在接受通话
pub struct ManagerProbe {
    manager: Arc<CallManager>,
}

impl ManagerProbe {
    pub fn new(manager: Arc<CallManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl HealthProbe for ManagerProbe {
    fn name(&self) -> &str {
        "call_manager_active"
    }

    async fn probe(&self) -> Result<bool, ProbeError> {
        Ok(self.manager.is_accepting())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calls::OutboundSettings;
    use crate::telephony::MockTelephonyClient;

    struct FailingProbe;

    #[async_trait]
    impl HealthProbe for FailingProbe {
        fn name(&self) -> &str {
            "failing"
        }

        async fn probe(&self) -> Result<bool, ProbeError> {
            Err(ProbeError::Other("boom".to_string()))
        }
    }

    struct HangingProbe;

    #[async_trait]
    impl HealthProbe for HangingProbe {
        fn name(&self) -> &str {
            "hanging"
        }

        async fn probe(&self) -> Result<bool, ProbeError> {
            std::future::pending::<()>().await;
            Ok(true)
        }
    }

    struct PanickingProbe;

    #[async_trait]
    impl HealthProbe for PanickingProbe {
        fn name(&self) -> &str {
            "panicking"
        }

        async fn probe(&self) -> Result<bool, ProbeError> {
            panic!("probe state corrupted");
        }
    }

    #[tokio::test]
    async fn test_panicking_probe_counts_as_unhealthy() {
        let checker = HealthChecker::new(Duration::from_secs(1))
            .with_probe(PanickingProbe)
            .with_probe(ConfiguredProbe::new("assistant_configured", Some("asst")));

        let snapshot = checker.check().await;
        assert_eq!(snapshot.checks["panicking"], false);
        assert_eq!(snapshot.checks["assistant_configured"], true);
        assert_eq!(snapshot.healthy_count, 1);
        assert_eq!(snapshot.total_count, 2);
    }

    #[tokio::test]
    async fn test_all_probes_healthy() {
        let client = Arc::new(MockTelephonyClient::default());
        let manager = Arc::new(CallManager::new(client.clone(), OutboundSettings::default()));
        let checker = HealthChecker::new(Duration::from_secs(1))
            .with_probe(TelephonyProbe::new(client))
            .with_probe(ConfiguredProbe::new("assistant_configured", Some("asst")))
            .with_probe(ConfiguredProbe::new("phone_number_configured", Some("pn")))
            .with_probe(ManagerProbe::new(manager));

        let snapshot = checker.check().await;
        assert_eq!(snapshot.total_count, 4);
        assert_eq!(snapshot.healthy_count, 4);
        assert!(snapshot.is_healthy());
        assert_eq!(snapshot.ratio(), 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_errors_and_timeouts_count_as_unhealthy() {
        let checker = HealthChecker::new(Duration::from_secs(10))
            .with_probe(FailingProbe)
            .with_probe(HangingProbe)
            .with_probe(ConfiguredProbe::new("phone_number_configured", None));

        let snapshot = checker.check().await;
        assert_eq!(snapshot.healthy_count, 0);
        assert_eq!(snapshot.total_count, 3);
        assert_eq!(snapshot.failing().len(), 3);
    }

    #[tokio::test]
    async fn test_unreachable_client_and_closed_manager() {
        let client = Arc::new(MockTelephonyClient::default());
        client.set_reachable(false);
        let manager = Arc::new(CallManager::new(client.clone(), OutboundSettings::default()));
        manager.close();

        let checker = HealthChecker::new(Duration::from_secs(1))
            .with_probe(TelephonyProbe::new(client))
            .with_probe(ManagerProbe::new(manager))
            .with_probe(ConfiguredProbe::new("assistant_configured", Some("asst")));

        let snapshot = checker.check().await;
        assert_eq!(snapshot.checks["telephony_client"], false);
        assert_eq!(snapshot.checks["call_manager_active"], false);
        assert_eq!(snapshot.checks["assistant_configured"], true);
        assert!((snapshot.ratio() - 1.0 / 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_empty_checker_ratio_is_zero() {
        let snapshot = HealthChecker::new(Duration::from_secs(1)).check().await;
        assert_eq!(snapshot.ratio(), 0.0);
        assert!(!snapshot.is_healthy());
    }

    #[test]
    fn test_blank_config_value_is_not_configured() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let ok = rt.block_on(ConfiguredProbe::new("assistant_configured", Some("  ")).probe());
        assert_eq!(ok, Ok(false));
    }
}
