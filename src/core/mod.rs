//! 核心层：错误类型、组件装配、优雅停机

pub mod builder;
pub mod error;
pub mod shutdown;

pub use builder::{create_monitor_builder, MonitorBuilder, MonitorComponents};
pub use error::{CallError, CollaboratorError, ProbeError};
pub use shutdown::{
    run_with_graceful_shutdown, CallDrainCleanup, FinalReportCleanup, ShutdownCleanup,
    ShutdownCoordinator, ShutdownManager, ShutdownReason,
};
