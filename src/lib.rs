//! callwatch - 语音通话监控服务
//!
//! 模块划分：
//! - **calls**: 通话记录、事件历史与 CallManager（生命周期、统计、清理）
//! - **telephony**: 电话平台客户端抽象（Mock / Unavailable）
//! - **monitor**: 健康检查、状态报告、告警、资源采样与后台调度循环
//! - **webhook**: 平台 webhook 事件到 CallManager 操作的翻译
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、组件装配、优雅停机
//! - **observability**: 日志初始化

pub mod calls;
pub mod config;
pub mod core;
pub mod monitor;
pub mod observability;
pub mod telephony;
pub mod webhook;

pub use calls::{CallManager, CallRecord, CallStatistics};
pub use config::{load_config, AppConfig};
pub use monitor::{StatusReport, StatusReporter};
pub use webhook::{handle_webhook, WebhookAck, WebhookPayload};
