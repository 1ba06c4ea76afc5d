//! 恢复引擎：按配置顺序执行计划
//!
//! 计划按源顺序执行，收尾计划（默认 "Closing"）总在最后；非 allow_fail 计划失败后其余计划记为 NotRun。
//! 计划内部按关键动作顺序快速失败。动作解析见 resolver 模块。

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::EngineSection;
use crate::core::context::{ExecutionContext, ResolveMode};
use crate::core::{ActionResult, FailureKind, PlanReport, PlanStatus, RecoveryError, RunReport};
use crate::execs::{ExecRegistry, ExecRunner};
use crate::metrics::{MetricsSink, Observation, ObservationKind};
use crate::plan::{ActionGraph, Configuration, PlanNode, RunControl};
use crate::resource::Resource;
use crate::scope::Params;

/// 引擎参数（由配置文件的 [engine] 段转换而来）
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub default_exec_timeout: Duration,
    pub max_depth: usize,
    pub default_run_control: RunControl,
    pub closing_plan: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from(&EngineSection::default())
    }
}

impl From<&EngineSection> for EngineConfig {
    fn from(section: &EngineSection) -> Self {
        Self {
            default_exec_timeout: Duration::from_secs(section.default_exec_timeout_secs),
            max_depth: section.max_depth,
            default_run_control: section.default_run_control,
            closing_plan: section.closing_plan.clone(),
        }
    }
}

/// 单次运行的输入：只读参数与取消 token
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub params: Params,
    pub cancel: CancellationToken,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    /// 通常传入 ShutdownManager::child_token()，运维中止或进程退出时取消运行
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// 恢复引擎：注册表与配置只读，可在多个资源的并发运行间共享
pub struct RecoveryEngine {
    pub(super) runner: ExecRunner,
    pub(super) metrics: Arc<dyn MetricsSink>,
    pub(super) config: EngineConfig,
}

impl RecoveryEngine {
    pub fn new(
        registry: Arc<ExecRegistry>,
        metrics: Arc<dyn MetricsSink>,
        config: EngineConfig,
    ) -> Self {
        Self {
            runner: ExecRunner::new(registry),
            metrics,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &ExecRegistry {
        self.runner.registry()
    }

    /// 校验配置并构建动作图；不产生任何副作用
    pub fn validate<'a>(&self, configuration: &'a Configuration) -> Result<ActionGraph<'a>, RecoveryError> {
        ActionGraph::new(configuration, self.registry())
    }

    pub fn new_context(&self, resource: Arc<dyn Resource>, options: RunOptions) -> ExecutionContext {
        ExecutionContext::new(resource, options.params, self.metrics.clone(), options.cancel)
    }

    /// 对一个资源执行整份配置
    pub async fn run_configuration(
        &self,
        resource: Arc<dyn Resource>,
        configuration: &Configuration,
        options: RunOptions,
    ) -> Result<RunReport, RecoveryError> {
        let mut ctx = self.new_context(resource, options);
        self.run_configuration_with(&mut ctx, configuration).await
    }

    /// 同 run_configuration，但由调用方持有上下文：运行结束或被取消后仍可查看缓存与 Scope
    pub async fn run_configuration_with(
        &self,
        ctx: &mut ExecutionContext,
        configuration: &Configuration,
    ) -> Result<RunReport, RecoveryError> {
        let graph = self.validate(configuration)?;
        let span = tracing::info_span!(
            "recovery_run",
            run_id = %ctx.run_id(),
            resource = %ctx.resource_name()
        );
        let result = self.run_graph(ctx, &graph).instrument(span).await;
        if let Err(RecoveryError::Cancelled) = &result {
            tracing::warn!(
                run_id = %ctx.run_id(),
                cached = ctx.cache().len(),
                "run cancelled, cached results kept"
            );
        }
        result
    }

    async fn run_graph(
        &self,
        ctx: &mut ExecutionContext,
        graph: &ActionGraph<'_>,
    ) -> Result<RunReport, RecoveryError> {
        let start = Instant::now();
        let (regular, closing) = graph.execution_order(&self.config.closing_plan);
        tracing::info!(plans = regular.len(), closing = closing.is_some(), "run started");

        let mut plans = Vec::with_capacity(graph.plans().len());
        let mut aborted = false;
        // 非取消的引擎错误：收尾计划照常执行，之后再把它返回给调用方
        let mut fatal = None;
        for plan in regular {
            if aborted {
                plans.push(PlanReport::not_run(plan.name(), plan.allow_fail()));
                continue;
            }
            let report = match self.run_plan(ctx, plan).await {
                Ok(report) => report,
                Err(RecoveryError::Cancelled) => return Err(RecoveryError::Cancelled),
                Err(e) => {
                    tracing::error!(plan = plan.name(), error = %e, "plan errored, configuration aborted");
                    fatal = Some(e);
                    break;
                }
            };
            if report.status.is_fail() {
                if plan.allow_fail() {
                    tracing::warn!(plan = plan.name(), "plan failed, allowed to fail");
                } else {
                    tracing::error!(plan = plan.name(), "plan failed, configuration aborted");
                    aborted = true;
                }
            }
            plans.push(report);
        }

        if let Some(closing) = closing {
            match self.run_plan(ctx, closing).await {
                Ok(report) => {
                    if report.status.is_fail() {
                        tracing::warn!(plan = closing.name(), "closing plan failed");
                    }
                    plans.push(report);
                }
                Err(e) if fatal.is_none() || e.is_cancelled() => return Err(e),
                Err(e) => tracing::error!(plan = closing.name(), error = %e, "closing plan errored"),
            }
        }
        if let Some(e) = fatal {
            return Err(e);
        }

        let elapsed = start.elapsed();
        let report = RunReport {
            run_id: ctx.run_id().to_string(),
            resource: ctx.resource_name().to_string(),
            plans,
            aborted,
            duration_ms: elapsed.as_millis() as u64,
        };
        ctx.metrics.observe(
            Observation::new(
                ObservationKind::Configuration,
                ctx.resource_name(),
                report.outcome(),
                elapsed,
            )
            .with_tag("run_id", ctx.run_id())
            .with_tag("plans", report.plans.len().to_string()),
        );
        tracing::info!(
            result = report.outcome().label(),
            aborted,
            duration_ms = report.duration_ms,
            "run finished"
        );
        Ok(report)
    }

    /// 依次解析关键动作，第一个 Fail 即停止
    pub async fn run_plan(
        &self,
        ctx: &mut ExecutionContext,
        plan: &PlanNode<'_>,
    ) -> Result<PlanReport, RecoveryError> {
        let start = Instant::now();
        tracing::info!(plan = plan.name(), critical = plan.critical_actions().len(), "plan started");

        let mut status = PlanStatus::Pass;
        for name in plan.critical_actions() {
            let result = self.run_action(ctx, plan, name, ResolveMode::Full).await?;
            if let ActionResult::Fail(kind) = result {
                tracing::warn!(plan = plan.name(), action = %name, %kind, "critical action failed");
                status = PlanStatus::Fail {
                    action: name.clone(),
                    kind,
                };
                break;
            }
        }

        let elapsed = start.elapsed();
        let outcome = if status.is_fail() {
            ActionResult::Fail(FailureKind::PlanAborted)
        } else {
            ActionResult::Pass
        };
        let mut observation = Observation::new(ObservationKind::Plan, plan.name(), outcome, elapsed)
            .with_tag("allow_fail", plan.allow_fail().to_string())
            .with_tag("resource", ctx.resource_name())
            .with_tag("run_id", ctx.run_id());
        if let PlanStatus::Fail { action, kind } = &status {
            observation = observation
                .with_tag("failed_action", action.as_str())
                .with_tag("cause", kind.as_str());
        }
        ctx.metrics.observe(observation);
        tracing::info!(
            plan = plan.name(),
            result = outcome.label(),
            duration_ms = elapsed.as_millis() as u64,
            "plan finished"
        );

        Ok(PlanReport {
            name: plan.name().to_string(),
            status,
            allow_fail: plan.allow_fail(),
            duration_ms: elapsed.as_millis() as u64,
        })
    }
}
