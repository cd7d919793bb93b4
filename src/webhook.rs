//! 电话平台 webhook 事件接入
//!
//! 只做「载荷 → CallManager 操作」的翻译，不含 HTTP 层。载荷形如：
//! `{"type": "call.ended", "call": {"id": "...", "customer": {"number": "..."}, "endedReason": "..."}}`

use serde::{Deserialize, Serialize};

use crate::calls::CallManager;
use crate::core::CallError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookCustomer {
    pub number: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookCall {
    pub id: Option<String>,
    #[serde(default)]
    pub customer: Option<WebhookCustomer>,
    #[serde(rename = "endedReason", default)]
    pub ended_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookTranscript {
    pub role: Option<String>,
    pub text: Option<String>,
}

/// 平台推送的原始载荷；未知字段忽略
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookPayload {
    #[serde(rename = "type", default)]
    pub event_type: String,
    #[serde(default)]
    pub call: Option<WebhookCall>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub transcript: Option<WebhookTranscript>,
}

/// 归一化后的事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    CallStarted {
        call_id: Option<String>,
        caller: String,
    },
    CallEnded {
        call_id: Option<String>,
        reason: String,
    },
    CallFailed {
        call_id: Option<String>,
        error: String,
    },
    Transcript {
        call_id: Option<String>,
        role: String,
        text: String,
    },
    Unknown(String),
}

impl WebhookPayload {
    pub fn into_event(self) -> WebhookEvent {
        let call = self.call.unwrap_or_default();
        let call_id = call.id.filter(|id| !id.trim().is_empty());

        match self.event_type.as_str() {
            "call.started" => WebhookEvent::CallStarted {
                call_id,
                caller: call
                    .customer
                    .and_then(|c| c.number)
                    .unwrap_or_else(|| "unknown".to_string()),
            },
            "call.ended" => WebhookEvent::CallEnded {
                call_id,
                reason: call.ended_reason.unwrap_or_else(|| "completed".to_string()),
            },
            "call.failed" => WebhookEvent::CallFailed {
                call_id,
                error: self.error.unwrap_or_else(|| "unknown error".to_string()),
            },
            "transcript" => {
                let transcript = self.transcript.unwrap_or_default();
                WebhookEvent::Transcript {
                    call_id,
                    role: transcript.role.unwrap_or_else(|| "unknown".to_string()),
                    text: transcript.text.unwrap_or_default(),
                }
            }
            other => WebhookEvent::Unknown(other.to_string()),
        }
    }
}

/// 回给平台的确认
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookAck {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
}

impl WebhookAck {
    fn ok(message: impl Into<String>, call_id: Option<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            call_id,
        }
    }

    fn rejected(message: impl Into<String>, call_id: Option<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            call_id,
        }
    }
}

/// 处理一条 webhook 事件
pub async fn handle_webhook(manager: &CallManager, payload: WebhookPayload) -> WebhookAck {
    let event_type = payload.event_type.clone();
    match payload.into_event() {
        WebhookEvent::CallStarted { call_id: None, .. }
        | WebhookEvent::CallEnded { call_id: None, .. }
        | WebhookEvent::CallFailed { call_id: None, .. } => {
            tracing::warn!(event_type = %event_type, "Webhook call event without call id");
            WebhookAck::rejected("missing call id", None)
        }
        WebhookEvent::CallStarted {
            call_id: Some(id),
            caller,
        } => match manager.start_inbound(&id, &caller).await {
            Ok(_) => WebhookAck::ok("Call started event processed", Some(id)),
            Err(CallError::DuplicateCall(_)) => {
                WebhookAck::ok("Call already tracked", Some(id))
            }
            Err(e) => {
                tracing::error!(call_id = %id, error = %e, "Failed to register inbound call");
                WebhookAck::rejected(e.to_string(), Some(id))
            }
        },
        WebhookEvent::CallEnded {
            call_id: Some(id),
            reason,
        } => {
            let message = if manager.end(&id, &reason).await {
                "Call ended event processed"
            } else {
                "Call not active"
            };
            WebhookAck::ok(message, Some(id))
        }
        WebhookEvent::CallFailed {
            call_id: Some(id),
            error,
        } => {
            tracing::error!(call_id = %id, error = %error, "Call failed");
            let message = if manager.fail(&id, &error).await {
                "Call failed event processed"
            } else {
                "Call not active"
            };
            WebhookAck::ok(message, Some(id))
        }
        WebhookEvent::Transcript {
            call_id,
            role,
            text,
        } => {
            tracing::info!(call_id = ?call_id, role = %role, "Transcript: {text}");
            WebhookAck::ok("Transcript event processed", call_id)
        }
        WebhookEvent::Unknown(kind) => {
            tracing::warn!(event_type = %kind, "Unknown webhook event type");
            WebhookAck::ok("Event received", None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::calls::{CallEventKind, CallStatus, OutboundSettings};
    use crate::telephony::MockTelephonyClient;

    fn manager() -> CallManager {
        CallManager::new(
            Arc::new(MockTelephonyClient::default()),
            OutboundSettings::default(),
        )
    }

    fn payload(value: serde_json::Value) -> WebhookPayload {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_payload_parsing() {
        let event = payload(serde_json::json!({
            "type": "call.ended",
            "call": {"id": "c-1", "endedReason": "customer-hangup", "duration": 120}
        }))
        .into_event();
        assert_eq!(
            event,
            WebhookEvent::CallEnded {
                call_id: Some("c-1".to_string()),
                reason: "customer-hangup".to_string()
            }
        );

        let event = payload(serde_json::json!({"type": "status-update"})).into_event();
        assert_eq!(event, WebhookEvent::Unknown("status-update".to_string()));
    }

    #[tokio::test]
    async fn test_started_ended_sequence() {
        let manager = manager();
        let ack = handle_webhook(
            &manager,
            payload(serde_json::json!({
                "type": "call.started",
                "call": {"id": "test-call-123", "customer": {"number": "+1234567890"}}
            })),
        )
        .await;
        assert!(ack.success);
        assert_eq!(ack.call_id.as_deref(), Some("test-call-123"));

        let record = manager.get("test-call-123").await.unwrap();
        assert_eq!(record.counterpart, "+1234567890");

        let ack = handle_webhook(
            &manager,
            payload(serde_json::json!({
                "type": "transcript",
                "call": {"id": "test-call-123"},
                "transcript": {"role": "user", "text": "Hello"}
            })),
        )
        .await;
        assert!(ack.success);

        let ack = handle_webhook(
            &manager,
            payload(serde_json::json!({"type": "call.ended", "call": {"id": "test-call-123"}})),
        )
        .await;
        assert!(ack.success);

        let history = manager.history().await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].kind, CallEventKind::Ended);
        assert_eq!(history[1].reason.as_deref(), Some("completed"));
    }

    #[tokio::test]
    async fn test_failed_event_marks_call_failed() {
        let manager = manager();
        manager.start_inbound("c-9", "+1").await.unwrap();

        let ack = handle_webhook(
            &manager,
            payload(serde_json::json!({
                "type": "call.failed",
                "call": {"id": "c-9"},
                "error": "carrier rejected"
            })),
        )
        .await;
        assert!(ack.success);

        let record = manager.get("c-9").await.unwrap();
        assert_eq!(record.status, CallStatus::Failed);
        let history = manager.history().await;
        assert_eq!(history[1].error.as_deref(), Some("carrier rejected"));
    }

    #[tokio::test]
    async fn test_duplicate_start_is_acknowledged_once() {
        let manager = manager();
        let start = serde_json::json!({"type": "call.started", "call": {"id": "dup"}});
        assert!(handle_webhook(&manager, payload(start.clone())).await.success);
        assert!(handle_webhook(&manager, payload(start)).await.success);
        assert_eq!(manager.history().await.len(), 1);
    }

    #[tokio::test]
    async fn test_call_event_without_id_is_rejected() {
        let manager = manager();
        let ack = handle_webhook(&manager, payload(serde_json::json!({"type": "call.ended"}))).await;
        assert!(!ack.success);
        assert!(manager.history().await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_event_is_acknowledged() {
        let manager = manager();
        let ack = handle_webhook(&manager, payload(serde_json::json!({"type": "speech-update"}))).await;
        assert!(ack.success);
        assert!(ack.call_id.is_none());
    }
}
