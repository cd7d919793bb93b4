//! 通话记录与历史事件
//!
//! CallRecord 是某个 call_id 的当前状态；CallEvent 是生命周期事件的快照，只追加不修改。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// 通话方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallDirection {
    Inbound,
    Outbound,
}

/// 通话状态：Active 只能流向三种终态之一，终态不再变化
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    Active,
    Ended,
    Failed,
    Error,
}

impl CallStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, CallStatus::Active)
    }
}

/// 单个通话的状态
#[derive(Debug, Clone, Serialize)]
pub struct CallRecord {
    pub call_id: String,
    pub direction: CallDirection,
    /// 对端号码：呼入为主叫，外呼为被叫
    pub counterpart: String,
    pub status: CallStatus,
    #[serde(skip)]
    pub start_time: Instant,
    /// 进行中为 None
    #[serde(skip)]
    pub end_time: Option<Instant>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// 读取时按当前时间重算，不作为权威数据
    pub duration_secs: f64,
    /// 需要转人工时的目标号码
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl CallRecord {
    pub fn new(call_id: String, direction: CallDirection, counterpart: String) -> Self {
        Self {
            call_id,
            direction,
            counterpart,
            status: CallStatus::Active,
            start_time: Instant::now(),
            end_time: None,
            started_at: Utc::now(),
            ended_at: None,
            duration_secs: 0.0,
            transfer_to: None,
            metadata: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == CallStatus::Active
    }

    /// (end_time 或 now) - start_time
    pub fn duration_at(&self, now: Instant) -> f64 {
        self.end_time
            .unwrap_or(now)
            .saturating_duration_since(self.start_time)
            .as_secs_f64()
    }

    /// 返回一份 duration_secs 已按 now 重算的副本
    pub fn projected(&self, now: Instant) -> Self {
        let mut record = self.clone();
        record.duration_secs = self.duration_at(now);
        record
    }

    /// 进入终态；已是终态时返回 false 且不做任何修改
    pub(crate) fn finish(&mut self, status: CallStatus) -> bool {
        if self.status.is_terminal() || !status.is_terminal() {
            return false;
        }
        let now = Instant::now();
        self.status = status;
        self.end_time = Some(now);
        self.ended_at = Some(Utc::now());
        self.duration_secs = self.duration_at(now);
        true
    }
}

/// 历史事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallEventKind {
    Started,
    Ended,
    Failed,
    Error,
}

impl CallEventKind {
    /// Ended / Failed / Error 计入已处理通话
    pub fn is_terminal(self) -> bool {
        !matches!(self, CallEventKind::Started)
    }
}

/// 历史事件：事件发生时 CallRecord 的快照加上原因 / 错误信息
#[derive(Debug, Clone, Serialize)]
pub struct CallEvent {
    pub kind: CallEventKind,
    pub record: CallRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    pub at: Instant,
    pub recorded_at: DateTime<Utc>,
}

impl CallEvent {
    pub fn new(kind: CallEventKind, record: &CallRecord) -> Self {
        let at = Instant::now();
        Self {
            kind,
            record: record.projected(at),
            reason: None,
            error: None,
            at,
            recorded_at: Utc::now(),
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}
