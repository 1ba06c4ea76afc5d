//! 引擎错误类型与失败分类
//!
//! FailureKind 是引擎层面的失败分类（与底层 SSH 退出码等无关），随结果写入指标；
//! RecoveryError 是对整个运行致命的错误（配置非法、未知 exec、取消等），通过 `?` 向上传播。

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 失败分类：供运维事后区分「前置条件不满足」「修复无效」「硬件超时」
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// 条件不满足（非致命，结果为 Skipped）
    ConditionNotMet,
    /// 依赖动作失败，本动作未执行 exec
    DependencyFailed,
    /// exec 返回错误
    ExecFailed,
    /// exec 超过 timeout
    ExecTimeout,
    /// 所有 recovery 都未能让重试成功
    RecoveryExhausted,
    /// 计划内关键动作失败（快速失败）
    PlanAborted,
    /// 非 allow_fail 计划失败导致整个配置中止
    ConfigurationAborted,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConditionNotMet => "condition_not_met",
            Self::DependencyFailed => "dependency_failed",
            Self::ExecFailed => "exec_failed",
            Self::ExecTimeout => "exec_timeout",
            Self::RecoveryExhausted => "recovery_exhausted",
            Self::PlanAborted => "plan_aborted",
            Self::ConfigurationAborted => "configuration_aborted",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 对整个运行致命的错误
#[derive(Error, Debug)]
pub enum RecoveryError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Unknown exec: {0}")]
    UnknownExec(String),

    #[error("Unknown action '{action}' in plan '{plan}'")]
    UnknownAction { plan: String, action: String },

    #[error("Cyclic reference through action '{action}' in plan '{plan}'")]
    CyclicReference { plan: String, action: String },

    #[error("Resolution depth exceeded at action '{0}'")]
    DepthExceeded(String),

    #[error("Run cancelled")]
    Cancelled,
}

impl RecoveryError {
    /// 是否为取消（操作员中止 / 关闭信号），调用方通常只记录而不报警
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
