//! 错误类型：通话操作、外部协作方、健康探针
//!
//! 未知通话（end / fail 一个不存在的 call_id）不算错误，由调用方拿到 `false` 自行处理。

use thiserror::Error;

/// 外部协作方（电话平台 / 语音助手 API）返回的错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    /// 平台明确拒绝（号码无效、额度不足等）
    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Transport error: {0}")]
    Transport(String),

    /// 没有接入任何平台客户端
    #[error("Telephony client unavailable: {0}")]
    Unavailable(String),
}

/// CallManager 各操作可能返回的错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    #[error("Call already tracked: {0}")]
    DuplicateCall(String),

    #[error("Invalid phone number: {0:?}")]
    InvalidNumber(String),

    /// 缺少必需配置项（参数为配置键名）
    #[error("Missing configuration: {0}")]
    ConfigurationMissing(&'static str),

    #[error("Call placement failed: {0}")]
    Collaborator(#[from] CollaboratorError),

    #[error("Call placement timed out after {0}s")]
    PlacementTimeout(u64),

    /// 已关闭（停机中），不再接受新通话
    #[error("Call manager is closed")]
    ManagerClosed,
}

/// 健康探针错误：探针失败时记为 false，不向上抛
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("Collaborator probe failed: {0}")]
    Collaborator(#[from] CollaboratorError),

    #[error("Probe timed out after {0}s")]
    Timeout(u64),

    #[error("{0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collaborator_error_converts_into_call_error() {
        let err: CallError = CollaboratorError::Rejected("busy".to_string()).into();
        assert!(matches!(err, CallError::Collaborator(CollaboratorError::Rejected(_))));
        assert_eq!(err.to_string(), "Call placement failed: Request rejected: busy");
    }

    #[test]
    fn test_configuration_missing_names_key() {
        let err = CallError::ConfigurationMissing("telephony.assistant_id");
        assert!(err.to_string().contains("telephony.assistant_id"));
    }
}
