//! 引擎核心：错误分类、结果与报告、执行上下文、动作解析、计划编排、关闭信号

pub mod context;
pub mod error;
pub mod recovery;
mod resolver;
pub mod shutdown;
pub mod state;

pub use context::{CachedResult, ExecutionContext, ResolveMode, ResultCache};
pub use error::{FailureKind, RecoveryError};
pub use recovery::{EngineConfig, RecoveryEngine, RunOptions};
pub use shutdown::{ShutdownManager, ShutdownReason};
pub use state::{ActionResult, PlanReport, PlanStatus, RunReport};
