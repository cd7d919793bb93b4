//! 通话生命周期：记录、历史事件与管理器

pub mod manager;
pub mod record;

pub use manager::{CallManager, CallStatistics, OutboundRequest, OutboundSettings};
pub use record::{CallDirection, CallEvent, CallEventKind, CallRecord, CallStatus};
