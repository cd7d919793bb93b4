//! 电话平台协作方：客户端抽象与实现（Mock / Unavailable）
//!
//! 真实的厂商 SDK 不在本 crate 内，由上层实现 TelephonyClient 后注入。

pub mod mock;
pub mod traits;

pub use mock::{MockBehavior, MockTelephonyClient};
pub use traits::{AssistantSummary, CallHandle, PlaceCallRequest, TelephonyClient, UnavailableClient};
