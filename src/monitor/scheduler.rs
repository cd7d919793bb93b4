//! 后台调度循环
//!
//! 单个协作式循环：固定节拍醒来，逐个检查各任务距上次运行是否已满各自的间隔，满了就运行。
//! 任务返回错误或 panic 都只记日志并发出 "background service error" 告警，短暂退避后继续；
//! 每次 sleep 都与 CancellationToken 竞争，取消后在一个节拍内退出。

use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::FutureExt;
use serde::Serialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::monitor::{Alert, AlertSeverity, AlertSink};

/// 周期性后台任务
#[async_trait]
pub trait PeriodicTask: Send + Sync {
    /// 任务名称（用于日志与统计）
    fn name(&self) -> &'static str;

    async fn run(&self) -> anyhow::Result<()>;
}

/// 单个任务的运行统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaskRunStats {
    pub runs: u64,
    pub failures: u64,
}

/// 调度循环退出时的汇总
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerSummary {
    pub ticks: u64,
    pub tasks: BTreeMap<String, TaskRunStats>,
}

impl SchedulerSummary {
    pub fn runs(&self, task: &str) -> u64 {
        self.tasks.get(task).map(|s| s.runs).unwrap_or(0)
    }

    pub fn failures(&self, task: &str) -> u64 {
        self.tasks.get(task).map(|s| s.failures).unwrap_or(0)
    }
}

struct ScheduledTask {
    task: Arc<dyn PeriodicTask>,
    interval: Duration,
    last_run: Instant,
    stats: TaskRunStats,
}

/// 调度器：register 注册任务后调用 run，直到 token 被取消
pub struct Scheduler {
    tick: Duration,
    error_backoff: Duration,
    tasks: Vec<ScheduledTask>,
    sink: Arc<dyn AlertSink>,
}

impl Scheduler {
    pub fn new(tick: Duration, error_backoff: Duration, sink: Arc<dyn AlertSink>) -> Self {
        Self {
            tick,
            error_backoff,
            tasks: Vec::new(),
            sink,
        }
    }

    pub fn register(&mut self, task: Arc<dyn PeriodicTask>, interval: Duration) {
        self.tasks.push(ScheduledTask {
            task,
            interval,
            last_run: Instant::now(),
            stats: TaskRunStats::default(),
        });
    }

    pub fn task_names(&self) -> Vec<&'static str> {
        self.tasks.iter().map(|t| t.task.name()).collect()
    }

    pub async fn run(mut self, token: CancellationToken) -> SchedulerSummary {
        tracing::info!(
            tasks = ?self.task_names(),
            tick_secs = self.tick.as_secs_f64(),
            "Background services started"
        );

        let started = Instant::now();
        for entry in &mut self.tasks {
            entry.last_run = started;
        }

        let mut ticks = 0u64;
        loop {
            if !sleep_or_cancel(self.tick, &token).await {
                break;
            }
            ticks += 1;

            let mut had_error = false;
            for entry in &mut self.tasks {
                if token.is_cancelled() {
                    break;
                }
                let now = Instant::now();
                if now.saturating_duration_since(entry.last_run) < entry.interval {
                    continue;
                }
                entry.last_run = now;
                entry.stats.runs += 1;

                let name = entry.task.name();
                let failure = match AssertUnwindSafe(entry.task.run()).catch_unwind().await {
                    Ok(Ok(())) => None,
                    Ok(Err(e)) => Some(format!("{e:#}")),
                    Err(panic) => Some(format!("task panicked: {}", panic_message(panic.as_ref()))),
                };

                if let Some(message) = failure {
                    entry.stats.failures += 1;
                    had_error = true;
                    tracing::error!(task = name, error = %message, "Background service error");
                    self.sink.emit(&Alert::new(
                        AlertSeverity::Error,
                        "background_service_error",
                        format!("Background service error in {name}: {message}"),
                    ));
                }
            }

            if had_error && !sleep_or_cancel(self.error_backoff, &token).await {
                break;
            }
        }

        tracing::info!(ticks, "Background services stopped");
        SchedulerSummary {
            ticks,
            tasks: self
                .tasks
                .iter()
                .map(|t| (t.task.name().to_string(), t.stats))
                .collect(),
        }
    }
}

/// 睡眠；期间被取消则返回 false
async fn sleep_or_cancel(duration: Duration, token: &CancellationToken) -> bool {
    tokio::select! {
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
