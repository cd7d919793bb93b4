//! callwatch 入口：加载配置、装配组件、运行后台调度循环，收到 Ctrl+C / SIGTERM 后优雅停机。
//!
//! 用法：`callwatch [--mock] [CONFIG_PATH]`
//! `--mock` 使用内置的模拟电话平台（无需厂商 SDK，便于本地演练）。

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use callwatch::core::{create_monitor_builder, run_with_graceful_shutdown, ShutdownManager};
use callwatch::telephony::MockTelephonyClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    callwatch::observability::init();

    let mut use_mock = false;
    let mut config_path = None;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--mock" => use_mock = true,
            other if other.starts_with("--") => {
                anyhow::bail!("unknown option: {other}");
            }
            path => config_path = Some(PathBuf::from(path)),
        }
    }

    let mut builder = create_monitor_builder(config_path);
    if use_mock {
        tracing::info!("Using mock telephony client");
        builder = builder.with_client(Arc::new(MockTelephonyClient::default()));
    }
    tracing::info!(app = %builder.config().app.name, "Starting");

    let components = builder.build();
    let shutdown = Arc::new(ShutdownManager::new());
    let coordinator = components.shutdown_coordinator();

    let scheduler = tokio::spawn(components.scheduler.run(shutdown.token()));
    let summary = run_with_graceful_shutdown(shutdown, scheduler, || coordinator.run_cleanup())
        .await
        .context("Scheduler task failed")?;

    tracing::info!(ticks = summary.ticks, tasks = ?summary.tasks, "Scheduler summary");
    Ok(())
}
