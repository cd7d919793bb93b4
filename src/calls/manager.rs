//! 通话管理器
//!
//! 持有 active_calls（当前状态）与 call_history（只追加的事件日志），两者共用一把 RwLock，
//! 每个操作只加锁一次。外呼时对平台的调用在锁外进行，慢接口不会阻塞并发读取。

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::calls::{CallDirection, CallEvent, CallEventKind, CallRecord, CallStatus};
use crate::core::CallError;
use crate::telephony::{PlaceCallRequest, TelephonyClient};

/// 外呼所需的配置
#[derive(Debug, Clone)]
pub struct OutboundSettings {
    pub assistant_id: Option<String>,
    pub phone_number_id: Option<String>,
    /// 请求未指定 transfer_to 时使用
    pub default_transfer_to: Option<String>,
    pub placement_timeout: Duration,
}

impl Default for OutboundSettings {
    fn default() -> Self {
        Self {
            assistant_id: None,
            phone_number_id: None,
            default_transfer_to: None,
            placement_timeout: Duration::from_secs(10),
        }
    }
}

/// 外呼请求
#[derive(Debug, Clone, Default)]
pub struct OutboundRequest {
    pub phone_number: String,
    pub transfer_to: Option<String>,
    /// 随通话下发给平台的上下文
    pub context: Option<serde_json::Value>,
}

impl OutboundRequest {
    pub fn new(phone_number: impl Into<String>) -> Self {
        Self {
            phone_number: phone_number.into(),
            ..Default::default()
        }
    }
}

/// 由 call_history 推导出的统计
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallStatistics {
    pub uptime_secs: f64,
    pub active_count: usize,
    /// 已结束（含失败）的通话数
    pub total_handled: usize,
    pub successful_calls: usize,
    pub failed_calls: usize,
    /// 百分比；total_handled 为 0 时为 0
    pub success_rate: f64,
    pub average_duration_secs: f64,
}

#[derive(Default)]
struct CallBook {
    active: HashMap<String, CallRecord>,
    history: Vec<CallEvent>,
}

/// 通话管理器：显式构造，以 Arc 共享给调度循环与请求处理方
pub struct CallManager {
    book: RwLock<CallBook>,
    client: Arc<dyn TelephonyClient>,
    outbound: OutboundSettings,
    started: Instant,
    accepting: AtomicBool,
}

impl CallManager {
    pub fn new(client: Arc<dyn TelephonyClient>, outbound: OutboundSettings) -> Self {
        Self {
            book: RwLock::new(CallBook::default()),
            client,
            outbound,
            started: Instant::now(),
            accepting: AtomicBool::new(true),
        }
    }

    pub fn outbound_settings(&self) -> &OutboundSettings {
        &self.outbound
    }

    /// 登记一通呼入；call_id 已存在时拒绝
    pub async fn start_inbound(
        &self,
        call_id: &str,
        counterpart: &str,
    ) -> Result<CallRecord, CallError> {
        let mut book = self.book.write().await;
        self.ensure_accepting()?;
        if book.active.contains_key(call_id) {
            tracing::warn!(call_id, "Rejecting duplicate inbound call");
            return Err(CallError::DuplicateCall(call_id.to_string()));
        }

        let record = CallRecord::new(
            call_id.to_string(),
            CallDirection::Inbound,
            counterpart.to_string(),
        );
        book.history.push(CallEvent::new(CallEventKind::Started, &record));
        book.active.insert(call_id.to_string(), record.clone());

        tracing::info!(call_id, caller = counterpart, "Handling inbound call");
        Ok(record)
    }

    /// 发起外呼（仅号码）
    pub async fn start_outbound(&self, counterpart: &str) -> Result<CallRecord, CallError> {
        self.start_outbound_with(OutboundRequest::new(counterpart)).await
    }

    /// 发起外呼：平台调用在锁外并受超时约束；失败时只记一条 Failed / Error 历史，不产生活跃记录
    pub async fn start_outbound_with(
        &self,
        request: OutboundRequest,
    ) -> Result<CallRecord, CallError> {
        self.ensure_accepting()?;

        let number = request.phone_number.trim();
        if number.is_empty() {
            return Err(CallError::InvalidNumber(request.phone_number.clone()));
        }
        let assistant_id = self
            .outbound
            .assistant_id
            .clone()
            .ok_or(CallError::ConfigurationMissing("telephony.assistant_id"))?;

        let transfer_to = request
            .transfer_to
            .clone()
            .or_else(|| self.outbound.default_transfer_to.clone());
        let placement = PlaceCallRequest {
            assistant_id,
            phone_number_id: self.outbound.phone_number_id.clone(),
            customer_number: number.to_string(),
            metadata: Some(serde_json::json!({
                "call_type": "outbound",
                "transfer_to": transfer_to,
                "context": request.context.clone().unwrap_or(serde_json::Value::Null),
            })),
        };

        let mut record = CallRecord::new(String::new(), CallDirection::Outbound, number.to_string());
        record.transfer_to = transfer_to;
        record.metadata = request.context;

        tracing::info!(callee = number, "Initiating outbound call");
        let timeout = self.outbound.placement_timeout;
        let outcome = tokio::time::timeout(timeout, self.client.place_call(&placement)).await;

        match outcome {
            Ok(Ok(handle)) => {
                record.call_id = handle
                    .call_id
                    .filter(|id| !id.trim().is_empty())
                    .unwrap_or_else(generate_call_id);

                let mut book = self.book.write().await;
                // 外呼期间可能已停机：close 之后不再插入活跃记录
                if !self.is_accepting() {
                    record.finish(CallStatus::Ended);
                    tracing::warn!(call_id = %record.call_id, "Outbound call placed during shutdown");
                    book.history
                        .push(CallEvent::new(CallEventKind::Ended, &record).with_reason("shutdown"));
                    return Err(CallError::ManagerClosed);
                }
                if book.active.contains_key(&record.call_id) {
                    let duplicate = record.call_id.clone();
                    tracing::warn!(call_id = %duplicate, "Platform returned an already tracked call id");
                    record.call_id = generate_call_id();
                    record.finish(CallStatus::Error);
                    book.history.push(
                        CallEvent::new(CallEventKind::Error, &record)
                            .with_error(format!("platform returned already tracked call id {duplicate}")),
                    );
                    return Err(CallError::DuplicateCall(duplicate));
                }
                book.history.push(CallEvent::new(CallEventKind::Started, &record));
                book.active.insert(record.call_id.clone(), record.clone());

                tracing::info!(call_id = %record.call_id, callee = number, "Outbound call initiated");
                Ok(record)
            }
            Ok(Err(err)) => {
                record.call_id = generate_call_id();
                record.finish(CallStatus::Error);
                tracing::error!(callee = number, error = %err, "Failed to place outbound call");

                let event = CallEvent::new(CallEventKind::Error, &record).with_error(err.to_string());
                self.book.write().await.history.push(event);
                Err(CallError::Collaborator(err))
            }
            Err(_) => {
                record.call_id = generate_call_id();
                record.finish(CallStatus::Failed);
                tracing::error!(
                    callee = number,
                    timeout_secs = timeout.as_secs(),
                    "Outbound call placement timed out"
                );

                let event = CallEvent::new(CallEventKind::Failed, &record)
                    .with_error(format!("placement timed out after {}s", timeout.as_secs()));
                self.book.write().await.history.push(event);
                Err(CallError::PlacementTimeout(timeout.as_secs()))
            }
        }
    }

    /// 结束通话；未知或已结束的 call_id 静默忽略并返回 false
    pub async fn end(&self, call_id: &str, reason: &str) -> bool {
        self.finish(call_id, CallStatus::Ended, |event| event.with_reason(reason))
            .await
    }

    /// 标记通话失败；容忍规则同 end
    pub async fn fail(&self, call_id: &str, error: &str) -> bool {
        self.finish(call_id, CallStatus::Failed, |event| event.with_error(error))
            .await
    }

    async fn finish(
        &self,
        call_id: &str,
        status: CallStatus,
        decorate: impl FnOnce(CallEvent) -> CallEvent,
    ) -> bool {
        let mut book = self.book.write().await;
        let Some(record) = book.active.get_mut(call_id) else {
            tracing::debug!(call_id, "Ignoring unknown call");
            return false;
        };
        if !record.finish(status) {
            tracing::debug!(call_id, status = ?record.status, "Call already finished");
            return false;
        }

        let kind = match status {
            CallStatus::Failed => CallEventKind::Failed,
            CallStatus::Error => CallEventKind::Error,
            _ => CallEventKind::Ended,
        };
        let event = decorate(CallEvent::new(kind, record));
        tracing::info!(call_id, duration_secs = record.duration_secs, ?status, "Call finished");
        book.history.push(event);
        true
    }

    /// 查询单个通话（duration 按当前时间投影）
    pub async fn get(&self, call_id: &str) -> Option<CallRecord> {
        let now = Instant::now();
        self.book
            .read()
            .await
            .active
            .get(call_id)
            .map(|r| r.projected(now))
    }

    /// 所有进行中的通话快照
    pub async fn active_calls(&self) -> HashMap<String, CallRecord> {
        let now = Instant::now();
        self.book
            .read()
            .await
            .active
            .iter()
            .filter(|(_, r)| r.is_active())
            .map(|(id, r)| (id.clone(), r.projected(now)))
            .collect()
    }

    pub async fn history(&self) -> Vec<CallEvent> {
        self.book.read().await.history.clone()
    }

    pub async fn statistics(&self) -> CallStatistics {
        let book = self.book.read().await;

        let mut total = 0usize;
        let mut successful = 0usize;
        let mut duration_sum = 0.0f64;
        for event in book.history.iter().filter(|e| e.kind.is_terminal()) {
            total += 1;
            if event.kind == CallEventKind::Ended {
                successful += 1;
            }
            duration_sum += event.record.duration_secs;
        }

        let (success_rate, average_duration_secs) = if total == 0 {
            (0.0, 0.0)
        } else {
            (
                successful as f64 / total as f64 * 100.0,
                duration_sum / total as f64,
            )
        };

        CallStatistics {
            uptime_secs: self.uptime().as_secs_f64(),
            active_count: book.active.values().filter(|r| r.is_active()).count(),
            total_handled: total,
            successful_calls: successful,
            failed_calls: total - successful,
            success_rate,
            average_duration_secs,
        }
    }

    /// 清理超过保留期的终态通话与历史事件，返回删除条数
    pub async fn cleanup(&self, retention: Duration) -> usize {
        let now = Instant::now();
        let mut book = self.book.write().await;

        let calls_before = book.active.len();
        book.active.retain(|_, record| match record.end_time {
            Some(end) if record.status.is_terminal() => {
                now.saturating_duration_since(end) < retention
            }
            _ => true,
        });
        let calls_removed = calls_before - book.active.len();

        let events_before = book.history.len();
        book.history
            .retain(|event| now.saturating_duration_since(event.at) < retention);
        let events_removed = events_before - book.history.len();

        if calls_removed + events_removed > 0 {
            tracing::info!(calls_removed, events_removed, "Cleaned up expired call data");
        }
        calls_removed + events_removed
    }

    /// 结束所有进行中的通话（停机时使用）
    pub async fn end_all(&self, reason: &str) -> usize {
        let ids: Vec<String> = self.active_calls().await.into_keys().collect();
        let mut ended = 0;
        for id in ids {
            if self.end(&id, reason).await {
                ended += 1;
            }
        }
        ended
    }

    pub fn uptime(&self) -> Duration {
        Instant::now().saturating_duration_since(self.started)
    }

    /// 停止接受新通话
    pub fn close(&self) {
        self.accepting.store(false, Ordering::SeqCst);
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    fn ensure_accepting(&self) -> Result<(), CallError> {
        if self.is_accepting() {
            Ok(())
        } else {
            Err(CallError::ManagerClosed)
        }
    }
}

fn generate_call_id() -> String {
    format!("outbound-{}", uuid::Uuid::new_v4())
}
