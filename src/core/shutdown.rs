//! 优雅停机
//!
//! Ctrl+C / SIGTERM 触发 CancellationToken，调度循环在一个节拍内退出；随后按注册顺序执行清理：
//! 先停止接受新通话并结束剩余通话，再输出最终状态报告。

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::calls::CallManager;
use crate::monitor::StatusReporter;

/// 停机信号
#[derive(Clone, Default)]
pub struct ShutdownManager {
    token: CancellationToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// Ctrl+C
    UserInitiated,
    /// SIGTERM
    Signal,
}

impl ShutdownManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 交给调度循环等长期任务的取消 token
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn shutdown(&self, reason: ShutdownReason) {
        tracing::info!(?reason, "Shutdown requested");
        self.token.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.token.is_cancelled()
    }

    /// 安装 Ctrl+C 与（unix 下）SIGTERM 处理
    pub fn install_signal_handlers(self: &Arc<Self>) {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                tracing::info!("Received Ctrl+C, shutting down...");
                manager.shutdown(ShutdownReason::UserInitiated);
            }
        });

        #[cfg(unix)]
        {
            let manager = Arc::clone(self);
            tokio::spawn(async move {
                use tokio::signal::unix::{signal, SignalKind};
                if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                    sigterm.recv().await;
                    tracing::info!("Received SIGTERM, shutting down...");
                    manager.shutdown(ShutdownReason::Signal);
                }
            });
        }
    }
}

/// 停机时执行的清理步骤
#[async_trait::async_trait]
pub trait ShutdownCleanup: Send + Sync {
    async fn cleanup(&self) -> anyhow::Result<()>;

    fn name(&self) -> &'static str;
}

/// 按注册顺序执行清理，每步受超时约束；单步失败不影响后续步骤
pub struct ShutdownCoordinator {
    cleanup_tasks: Vec<Arc<dyn ShutdownCleanup>>,
    timeout: Duration,
}

impl ShutdownCoordinator {
    pub fn new(timeout: Duration) -> Self {
        Self {
            cleanup_tasks: Vec::new(),
            timeout,
        }
    }

    pub fn register<T: ShutdownCleanup + 'static>(&mut self, task: T) {
        self.cleanup_tasks.push(Arc::new(task));
    }

    /// 返回成功完成的步骤数
    pub async fn run_cleanup(&self) -> usize {
        tracing::info!(steps = self.cleanup_tasks.len(), "Running shutdown cleanup");

        let mut completed = 0;
        for task in &self.cleanup_tasks {
            let name = task.name();
            match tokio::time::timeout(self.timeout, task.cleanup()).await {
                Ok(Ok(())) => {
                    completed += 1;
                    tracing::info!(step = name, "Cleanup step completed");
                }
                Ok(Err(e)) => {
                    tracing::warn!(step = name, error = %e, "Cleanup step failed");
                }
                Err(_) => {
                    tracing::warn!(
                        step = name,
                        timeout_secs = self.timeout.as_secs(),
                        "Cleanup step timed out"
                    );
                }
            }
        }

        tracing::info!("Shutdown cleanup finished");
        completed
    }
}

/// 停止接受新通话，并以 "shutdown" 为原因结束剩余通话
pub struct CallDrainCleanup {
    manager: Arc<CallManager>,
}

impl CallDrainCleanup {
    pub fn new(manager: Arc<CallManager>) -> Self {
        Self { manager }
    }
}

#[async_trait::async_trait]
impl ShutdownCleanup for CallDrainCleanup {
    async fn cleanup(&self) -> anyhow::Result<()> {
        self.manager.close();
        let ended = self.manager.end_all("shutdown").await;
        if ended > 0 {
            tracing::info!(ended, "Ended remaining calls");
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "call_drain"
    }
}

/// 输出最终状态报告
pub struct FinalReportCleanup {
    reporter: Arc<StatusReporter>,
}

impl FinalReportCleanup {
    pub fn new(reporter: Arc<StatusReporter>) -> Self {
        Self { reporter }
    }
}

#[async_trait::async_trait]
impl ShutdownCleanup for FinalReportCleanup {
    async fn cleanup(&self) -> anyhow::Result<()> {
        let report = self.reporter.report().await;
        tracing::info!("Final status\n{report}");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "final_report"
    }
}

/// 安装信号处理后运行 app，app 结束后执行 cleanup 并返回 app 的输出
///
/// app 需自行监听 `shutdown_manager.token()`，收到信号后尽快返回。
pub async fn run_with_graceful_shutdown<F, C, Fut>(
    shutdown_manager: Arc<ShutdownManager>,
    app: F,
    cleanup: C,
) -> F::Output
where
    F: Future,
    C: FnOnce() -> Fut,
    Fut: Future,
{
    shutdown_manager.install_signal_handlers();

    let output = app.await;
    if shutdown_manager.is_shutdown() {
        tracing::info!("Application stopped after shutdown signal");
    } else {
        tracing::info!("Application finished");
    }

    cleanup().await;
    output
}
