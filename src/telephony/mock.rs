//! Mock 电话平台客户端（用于测试与 `--mock` 本地运行，无需真实账号）
//!
//! 行为可在运行时切换：成功 / 成功但不返回 ID / 失败 / 永不返回（用于超时）。

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::core::CollaboratorError;
use crate::telephony::{AssistantSummary, CallHandle, PlaceCallRequest, TelephonyClient};

/// place_call 的预设行为
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockBehavior {
    Succeed,
    SucceedWithoutId,
    /// 等待给定时长后成功（模拟慢接口）
    SucceedAfter(Duration),
    Fail(CollaboratorError),
    /// 永不返回，由调用方的超时兜底
    Hang,
}

/// Mock 客户端：记录收到的外呼请求，按 MockBehavior 应答
#[derive(Debug)]
pub struct MockTelephonyClient {
    behavior: Mutex<MockBehavior>,
    reachable: AtomicBool,
    placed: Mutex<Vec<PlaceCallRequest>>,
    next_id: AtomicU64,
}

impl Default for MockTelephonyClient {
    fn default() -> Self {
        Self::new(MockBehavior::Succeed)
    }
}

impl MockTelephonyClient {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior: Mutex::new(behavior),
            reachable: AtomicBool::new(true),
            placed: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn set_behavior(&self, behavior: MockBehavior) {
        if let Ok(mut current) = self.behavior.lock() {
            *current = behavior;
        }
    }

    /// 控制 list_assistants 是否成功
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// 已收到的外呼请求（按顺序）
    pub fn placed_calls(&self) -> Vec<PlaceCallRequest> {
        self.placed.lock().map(|p| p.clone()).unwrap_or_default()
    }

    fn issue_handle(&self) -> CallHandle {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        CallHandle {
            call_id: Some(format!("mock-call-{n}")),
        }
    }

    fn current_behavior(&self) -> MockBehavior {
        self.behavior
            .lock()
            .map(|b| b.clone())
            .unwrap_or(MockBehavior::Succeed)
    }
}

#[async_trait]
impl TelephonyClient for MockTelephonyClient {
    async fn place_call(&self, request: &PlaceCallRequest) -> Result<CallHandle, CollaboratorError> {
        if let Ok(mut placed) = self.placed.lock() {
            placed.push(request.clone());
        }

        match self.current_behavior() {
            MockBehavior::Succeed => Ok(self.issue_handle()),
            MockBehavior::SucceedAfter(delay) => {
                tokio::time::sleep(delay).await;
                Ok(self.issue_handle())
            }
            MockBehavior::SucceedWithoutId => Ok(CallHandle { call_id: None }),
            MockBehavior::Fail(err) => Err(err),
            MockBehavior::Hang => {
                std::future::pending::<()>().await;
                Err(CollaboratorError::Transport("unreachable".to_string()))
            }
        }
    }

    async fn list_assistants(&self, limit: usize) -> Result<Vec<AssistantSummary>, CollaboratorError> {
        if !self.reachable.load(Ordering::SeqCst) {
            return Err(CollaboratorError::Transport("connection refused".to_string()));
        }
        Ok(vec![AssistantSummary {
            id: "mock-assistant".to_string(),
            name: Some("Mock Assistant".to_string()),
        }]
        .into_iter()
        .take(limit)
        .collect())
    }
}
