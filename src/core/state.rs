//! 运行时结果：ActionResult、计划报告与整次运行报告
//!
//! 这些值只存在于一次 run_configuration 调用之内，不会跨运行保留。

use serde::Serialize;

use crate::core::FailureKind;

/// 单个动作的解析结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "kind", rename_all = "snake_case")]
pub enum ActionResult {
    Pass,
    Fail(FailureKind),
    /// 条件不满足，调用方视为非致命的通过
    Skipped,
}

impl ActionResult {
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }

    pub fn is_fail(&self) -> bool {
        matches!(self, Self::Fail(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }

    /// Pass 与 Skipped 都不阻断调用方
    pub fn is_success(&self) -> bool {
        !self.is_fail()
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Fail(kind) => Some(*kind),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail(_) => "fail",
            Self::Skipped => "skipped",
        }
    }
}

/// 计划执行状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PlanStatus {
    Pass,
    /// 第一个失败的关键动作及其失败分类
    Fail { action: String, kind: FailureKind },
    /// 前面的计划中止了配置，本计划未执行
    NotRun,
}

impl PlanStatus {
    pub fn is_fail(&self) -> bool {
        matches!(self, Self::Fail { .. })
    }
}

/// 单个计划的执行报告
#[derive(Debug, Clone, Serialize)]
pub struct PlanReport {
    pub name: String,
    pub status: PlanStatus,
    pub allow_fail: bool,
    pub duration_ms: u64,
}

impl PlanReport {
    pub fn not_run(name: impl Into<String>, allow_fail: bool) -> Self {
        Self {
            name: name.into(),
            status: PlanStatus::NotRun,
            allow_fail,
            duration_ms: 0,
        }
    }
}

/// 一次 run_configuration 的总报告
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub resource: String,
    /// 按执行顺序排列；Closing 计划（若存在）总在最后
    pub plans: Vec<PlanReport>,
    /// 是否有非 allow_fail 计划失败
    pub aborted: bool,
    pub duration_ms: u64,
}

impl RunReport {
    /// 整体是否通过：allow_fail 计划与 Closing 的失败不影响结论
    pub fn passed(&self) -> bool {
        !self.aborted
    }

    pub fn plan(&self, name: &str) -> Option<&PlanReport> {
        self.plans.iter().find(|p| p.name == name)
    }

    pub fn outcome(&self) -> ActionResult {
        if self.aborted {
            ActionResult::Fail(FailureKind::ConfigurationAborted)
        } else {
            ActionResult::Pass
        }
    }
}
