//! 电话平台客户端抽象
//!
//! 只用到两个能力：place_call（发起外呼）与 list_assistants（存活探测）。

use async_trait::async_trait;
use serde::Serialize;

use crate::core::CollaboratorError;

/// 外呼请求：助手、主叫号码 ID、被叫号码与附带的通话上下文
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaceCallRequest {
    pub assistant_id: String,
    pub phone_number_id: Option<String>,
    pub customer_number: String,
    pub metadata: Option<serde_json::Value>,
}

/// 平台返回的通话句柄；部分平台不返回 ID
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallHandle {
    pub call_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistantSummary {
    pub id: String,
    pub name: Option<String>,
}

/// 电话平台客户端 trait
#[async_trait]
pub trait TelephonyClient: Send + Sync {
    /// 发起外呼
    async fn place_call(&self, request: &PlaceCallRequest) -> Result<CallHandle, CollaboratorError>;

    /// 列出助手；健康检查只把它当存活探测用
    async fn list_assistants(&self, limit: usize) -> Result<Vec<AssistantSummary>, CollaboratorError>;
}

/// 未接入任何平台时的占位客户端：所有调用都失败
#[derive(Debug, Default)]
pub struct UnavailableClient;

#[async_trait]
impl TelephonyClient for UnavailableClient {
    async fn place_call(&self, _request: &PlaceCallRequest) -> Result<CallHandle, CollaboratorError> {
        Err(CollaboratorError::Unavailable(
            "no telephony client configured".to_string(),
        ))
    }

    async fn list_assistants(&self, _limit: usize) -> Result<Vec<AssistantSummary>, CollaboratorError> {
        Err(CollaboratorError::Unavailable(
            "no telephony client configured".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unavailable_client_always_fails() {
        let client = UnavailableClient;
        let request = PlaceCallRequest {
            assistant_id: "asst".to_string(),
            phone_number_id: None,
            customer_number: "+15550001111".to_string(),
            metadata: None,
        };
        assert!(matches!(
            client.place_call(&request).await,
            Err(CollaboratorError::Unavailable(_))
        ));
        assert!(client.list_assistants(1).await.is_err());
    }
}
