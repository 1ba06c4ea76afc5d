//! 动作解析：缓存 → 条件 → 依赖 → exec → 恢复
//!
//! 递归通过 BoxFuture 实现；深度受 EngineConfig::max_depth 限制。
//! condition-only 模式（条件与恢复动作）不会再触发自己的恢复，这是整棵树有界的原因。

use std::time::Instant;

use futures_util::future::BoxFuture;

use crate::core::context::{CachedResult, ExecutionContext, ResolveMode};
use crate::core::{ActionResult, FailureKind, RecoveryEngine, RecoveryError};
use crate::execs::{ExecInfo, ExecOutcome};
use crate::metrics::{Observation, ObservationKind};
use crate::plan::{Action, PlanNode};

/// 一次解析的结果：reported 返回给调用方并写入缓存，actual 写入指标
#[derive(Debug, Clone, Copy)]
struct Resolution {
    reported: ActionResult,
    actual: ActionResult,
}

impl Resolution {
    fn same(result: ActionResult) -> Self {
        Self {
            reported: result,
            actual: result,
        }
    }
}

impl RecoveryEngine {
    /// 在计划的命名空间内解析一个动作
    pub async fn run_action(
        &self,
        ctx: &mut ExecutionContext,
        plan: &PlanNode<'_>,
        name: &str,
        mode: ResolveMode,
    ) -> Result<ActionResult, RecoveryError> {
        self.resolve(ctx, plan, name, mode, 0).await
    }

    fn resolve<'a>(
        &'a self,
        ctx: &'a mut ExecutionContext,
        plan: &'a PlanNode<'a>,
        name: &'a str,
        mode: ResolveMode,
        depth: usize,
    ) -> BoxFuture<'a, Result<ActionResult, RecoveryError>> {
        Box::pin(async move {
            if ctx.is_cancelled() {
                return Err(RecoveryError::Cancelled);
            }
            if depth > self.config.max_depth {
                return Err(RecoveryError::DepthExceeded(name.to_string()));
            }
            let action = plan.action(name)?;
            let policy = action.run_control.unwrap_or(self.config.default_run_control);
            let definition = action.fingerprint();

            if policy.is_cacheable() {
                if let Some(result) =
                    ctx.cache
                        .lookup(name, definition, mode, !action.recoveries.is_empty())
                {
                    tracing::debug!(action = name, result = result.label(), "cached result reused");
                    return Ok(result);
                }
            }

            let start = Instant::now();
            let resolution = self.resolve_uncached(ctx, plan, action, mode, depth).await?;
            ctx.cache.store(
                name,
                CachedResult {
                    result: resolution.reported,
                    actual: resolution.actual,
                    mode,
                    policy,
                    definition,
                },
            );
            ctx.metrics.observe(
                Observation::new(
                    ObservationKind::Action,
                    name,
                    resolution.actual,
                    start.elapsed(),
                )
                .with_tag("plan", plan.name())
                .with_tag("mode", mode.as_str())
                .with_tag("run_control", policy.as_str())
                .with_tag("reported", resolution.reported.label())
                .with_tag("resource", ctx.resource_name())
                .with_tag("run_id", ctx.run_id()),
            );
            Ok(resolution.reported)
        })
    }

    async fn resolve_uncached(
        &self,
        ctx: &mut ExecutionContext,
        plan: &PlanNode<'_>,
        action: &Action,
        mode: ResolveMode,
        depth: usize,
    ) -> Result<Resolution, RecoveryError> {
        let name = action.name.as_str();

        for condition in &action.conditions {
            let result = self
                .resolve(ctx, plan, condition, ResolveMode::ConditionOnly, depth + 1)
                .await?;
            if result.is_fail() {
                tracing::info!(action = name, condition = %condition, "condition not met, action skipped");
                return Ok(Resolution::same(ActionResult::Skipped));
            }
        }

        for dependency in &action.dependencies {
            let result = self.resolve(ctx, plan, dependency, mode, depth + 1).await?;
            if result.is_fail() {
                tracing::warn!(action = name, dependency = %dependency, "dependency failed");
                return Ok(Resolution::same(ActionResult::Fail(
                    FailureKind::DependencyFailed,
                )));
            }
        }

        let mut attempt = 1;
        let mut last = self.attempt(ctx, plan, action, attempt).await?;
        if last.is_passed() {
            return Ok(Resolution::same(ActionResult::Pass));
        }

        if mode == ResolveMode::Full {
            for recovery in &action.recoveries {
                let result = self
                    .resolve(ctx, plan, recovery, ResolveMode::ConditionOnly, depth + 1)
                    .await?;
                if !result.is_pass() {
                    tracing::info!(
                        action = name,
                        recovery = %recovery,
                        result = result.label(),
                        "recovery did not apply"
                    );
                    continue;
                }
                let invalidated = ctx.cache.invalidate_after_recovery();
                tracing::info!(action = name, recovery = %recovery, invalidated, "recovery passed, retrying action");
                attempt += 1;
                last = self.attempt(ctx, plan, action, attempt).await?;
                if last.is_passed() {
                    tracing::info!(action = name, recovery = %recovery, "action recovered");
                    return Ok(Resolution::same(ActionResult::Pass));
                }
            }
        }

        let kind = if mode == ResolveMode::Full && !action.recoveries.is_empty() {
            FailureKind::RecoveryExhausted
        } else {
            last.failure_kind().unwrap_or(FailureKind::ExecFailed)
        };
        let actual = ActionResult::Fail(kind);
        if action.allow_fail_after_recovery {
            tracing::warn!(action = name, %kind, "action failed, allowed to fail after recovery");
            return Ok(Resolution {
                reported: ActionResult::Pass,
                actual,
            });
        }
        tracing::warn!(action = name, %kind, attempts = attempt, "action failed");
        Ok(Resolution::same(actual))
    }

    /// 调用一次 exec，并记录一条 ExecAttempt 观测
    async fn attempt(
        &self,
        ctx: &mut ExecutionContext,
        plan: &PlanNode<'_>,
        action: &Action,
        attempt: u32,
    ) -> Result<ExecOutcome, RecoveryError> {
        let limit = action
            .exec_timeout
            .unwrap_or(self.config.default_exec_timeout);
        let exec_token = ctx.cancel.child_token();
        let (outcome, elapsed) = {
            let mut info = ExecInfo::new(
                &action.name,
                action.exec_name(),
                &action.exec_args,
                limit,
                ctx.resource.as_ref(),
                &mut ctx.scope,
                exec_token,
            );
            self.runner.execute(&mut info, &ctx.cancel).await?
        };

        let mut observation = Observation::new(
            ObservationKind::ExecAttempt,
            action.name.as_str(),
            outcome.as_result(),
            elapsed,
        )
        .with_tag("plan", plan.name())
        .with_tag("exec", action.exec_name())
        .with_tag("attempt", attempt.to_string())
        .with_tag("resource", ctx.resource_name())
        .with_tag("run_id", ctx.run_id());
        if let ExecOutcome::Failed(reason) = &outcome {
            observation = observation.with_tag("error", reason.as_str());
        }
        ctx.metrics.observe(observation);
        Ok(outcome)
    }
}
