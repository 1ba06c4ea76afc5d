//! cros-recovery - 实验室设备修复与校验引擎
//!
//! 把声明式的 Configuration → Plan → Action 图解释执行到一台设备（DUT、servo 主机、labstation…）上：
//! 条件决定是否执行，依赖先行，失败时依次尝试恢复动作并重试一次，结果按 RunControl 在一次运行内缓存。
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误分类、执行上下文、动作解析与计划编排、关闭信号
//! - **execs**: exec 注册表、执行器（超时 / 取消）、参数解析、内置 exec
//! - **metrics**: 观测记录与接收端（日志 / 内存 / 通道转发）
//! - **observability**: 日志初始化
//! - **plan**: 配置数据模型、构建器、动作图校验与诊断树
//! - **resource**: 被修复设备的抽象句柄
//! - **scope**: 运行参数与运行状态

pub mod config;
pub mod core;
pub mod execs;
pub mod metrics;
pub mod observability;
pub mod plan;
pub mod resource;
pub mod scope;

pub use crate::core::{
    ActionResult, EngineConfig, ExecutionContext, FailureKind, RecoveryEngine, RecoveryError,
    ResolveMode, RunOptions, RunReport,
};
pub use execs::{Exec, ExecInfo, ExecRegistry};
pub use plan::{Action, Configuration, Plan, RunControl};
