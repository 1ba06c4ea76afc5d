//! 指标
//!
//! 引擎对每次 exec 尝试、每个动作的真实结果、每个计划与整次运行各记录一条 Observation。
//! MetricsSink::observe 是同步、即发即忘的：后端不可用时只记日志，不阻塞引擎。

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::config::MetricsSection;
use crate::core::ActionResult;

pub mod channel;
pub mod memory;

pub use channel::{ChannelMetrics, MetricsBackend};
pub use memory::MemoryMetrics;

/// 观测对象的层级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationKind {
    ExecAttempt,
    Action,
    Plan,
    Configuration,
}

/// 一条观测记录
#[derive(Debug, Clone, Serialize)]
pub struct Observation {
    pub kind: ObservationKind,
    /// 动作名 / 计划名 / 资源名
    pub name: String,
    /// 真实结果（allow_fail_after_recovery 的软通过在这里仍记为 Fail）
    pub outcome: ActionResult,
    pub duration_ms: u64,
    pub tags: BTreeMap<String, String>,
    pub recorded_at: i64,
}

impl Observation {
    pub fn new(
        kind: ObservationKind,
        name: impl Into<String>,
        outcome: ActionResult,
        duration: Duration,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            outcome,
            duration_ms: duration.as_millis() as u64,
            tags: BTreeMap::new(),
            recorded_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

/// 指标接收端
pub trait MetricsSink: Send + Sync {
    fn observe(&self, observation: Observation);
}

/// 丢弃所有观测
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn observe(&self, _observation: Observation) {}
}

/// 以结构化日志输出观测
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMetrics;

impl MetricsSink for TracingMetrics {
    fn observe(&self, observation: Observation) {
        match serde_json::to_string(&observation) {
            Ok(json) => tracing::info!(metric = %json, "observation"),
            Err(e) => tracing::warn!(error = %e, name = %observation.name, "observation not serializable"),
        }
    }
}

/// 按配置选择默认的接收端
pub fn from_config(section: &MetricsSection) -> Arc<dyn MetricsSink> {
    if section.enabled {
        Arc::new(TracingMetrics)
    } else {
        Arc::new(NoopMetrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FailureKind;

    #[test]
    fn test_observation_tags_and_json() {
        let obs = Observation::new(
            ObservationKind::Action,
            "servo_host_ping",
            ActionResult::Fail(FailureKind::RecoveryExhausted),
            Duration::from_millis(1200),
        )
        .with_tag("plan", "servo");
        assert_eq!(obs.tag("plan"), Some("servo"));
        assert_eq!(obs.duration_ms, 1200);

        let json = serde_json::to_value(&obs).unwrap();
        assert_eq!(json["kind"], "action");
        assert_eq!(json["outcome"]["kind"], "recovery_exhausted");
    }

    #[test]
    fn test_from_config() {
        let disabled = MetricsSection {
            enabled: false,
            ..Default::default()
        };
        // 不应 panic
        from_config(&disabled).observe(Observation::new(
            ObservationKind::Plan,
            "p",
            ActionResult::Pass,
            Duration::ZERO,
        ));
        from_config(&MetricsSection::default()).observe(Observation::new(
            ObservationKind::Plan,
            "p",
            ActionResult::Skipped,
            Duration::ZERO,
        ));
    }
}
