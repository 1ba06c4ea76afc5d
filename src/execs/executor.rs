//! exec 执行器
//!
//! 持有 ExecRegistry，execute 在动作的 timeout 内调用 exec，同时监听整次运行的取消信号；
//! 超时映射为 TimedOut（与普通失败区分），取消映射为 RecoveryError::Cancelled。每次调用输出结构化审计日志（JSON）。

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::core::{ActionResult, FailureKind, RecoveryError};
use crate::execs::{ExecInfo, ExecRegistry};

/// 单次 exec 调用的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecOutcome {
    Passed,
    /// exec 返回的错误链
    Failed(String),
    TimedOut(Duration),
}

impl ExecOutcome {
    pub fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Passed => None,
            Self::Failed(_) => Some(FailureKind::ExecFailed),
            Self::TimedOut(_) => Some(FailureKind::ExecTimeout),
        }
    }

    pub fn as_result(&self) -> ActionResult {
        match self.failure_kind() {
            None => ActionResult::Pass,
            Some(kind) => ActionResult::Fail(kind),
        }
    }
}

/// exec 执行器：对每次调用施加超时与取消
pub struct ExecRunner {
    registry: Arc<ExecRegistry>,
}

impl ExecRunner {
    pub fn new(registry: Arc<ExecRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ExecRegistry {
        &self.registry
    }

    /// 执行 info 指定的 exec；返回结果与耗时
    ///
    /// 未注册的 exec 名是配置错误，对整次运行致命。
    pub async fn execute(
        &self,
        info: &mut ExecInfo<'_>,
        run_cancel: &CancellationToken,
    ) -> Result<(ExecOutcome, Duration), RecoveryError> {
        let exec_name = info.exec_name().to_string();
        let exec = self
            .registry
            .get(&exec_name)
            .ok_or_else(|| RecoveryError::UnknownExec(exec_name.clone()))?;
        let limit = info.timeout();
        let exec_token = info.cancel_token().clone();
        let action_name = info.action_name().to_string();
        let args_preview = args_preview(info.raw_args());

        let start = Instant::now();
        let result = tokio::select! {
            biased;
            _ = run_cancel.cancelled() => None,
            r = timeout(limit, exec.run(info)) => Some(r),
        };
        let elapsed = start.elapsed();

        let (outcome, label) = match result {
            None => {
                exec_token.cancel();
                audit(&action_name, &exec_name, "cancelled", elapsed, &args_preview);
                return Err(RecoveryError::Cancelled);
            }
            Some(Ok(Ok(()))) => (ExecOutcome::Passed, "ok"),
            Some(Ok(Err(e))) => (ExecOutcome::Failed(format!("{e:#}")), "error"),
            Some(Err(_)) => {
                // 通知仍在后台运行的调用尽力中止
                exec_token.cancel();
                (ExecOutcome::TimedOut(limit), "timeout")
            }
        };
        audit(&action_name, &exec_name, label, elapsed, &args_preview);
        if let ExecOutcome::Failed(reason) = &outcome {
            tracing::debug!(action = %action_name, exec = %exec_name, %reason, "exec failed");
        }
        Ok((outcome, elapsed))
    }
}

fn audit(action: &str, exec: &str, outcome: &str, elapsed: Duration, args_preview: &str) {
    let audit = serde_json::json!({
        "event": "exec_audit",
        "action": action,
        "exec": exec,
        "ok": outcome == "ok",
        "outcome": outcome,
        "duration_ms": elapsed.as_millis() as u64,
        "args_preview": args_preview,
    });
    tracing::info!(audit = %audit, "exec");
}

fn args_preview(args: &[String]) -> String {
    let s = args.join(" ");
    if s.len() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}
