//! 内存指标：保留本进程内的全部观测，供诊断与测试查询

use parking_lot::Mutex;

use crate::metrics::{MetricsSink, Observation, ObservationKind};

#[derive(Debug, Default)]
pub struct MemoryMetrics {
    observations: Mutex<Vec<Observation>>,
}

impl MemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observations(&self) -> Vec<Observation> {
        self.observations.lock().clone()
    }

    /// 指定层级与名字的观测（按记录顺序）
    pub fn find(&self, kind: ObservationKind, name: &str) -> Vec<Observation> {
        self.observations
            .lock()
            .iter()
            .filter(|o| o.kind == kind && o.name == name)
            .cloned()
            .collect()
    }

    pub fn count(&self, kind: ObservationKind, name: &str) -> usize {
        self.observations
            .lock()
            .iter()
            .filter(|o| o.kind == kind && o.name == name)
            .count()
    }

    pub fn len(&self) -> usize {
        self.observations.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.lock().is_empty()
    }
}

impl MetricsSink for MemoryMetrics {
    fn observe(&self, observation: Observation) {
        self.observations.lock().push(observation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ActionResult;
    use std::time::Duration;

    #[test]
    fn test_find_and_count() {
        let metrics = MemoryMetrics::new();
        assert!(metrics.is_empty());
        for name in ["a", "b", "a"] {
            metrics.observe(Observation::new(
                ObservationKind::ExecAttempt,
                name,
                ActionResult::Pass,
                Duration::ZERO,
            ));
        }
        metrics.observe(Observation::new(
            ObservationKind::Action,
            "a",
            ActionResult::Pass,
            Duration::ZERO,
        ));
        assert_eq!(metrics.count(ObservationKind::ExecAttempt, "a"), 2);
        assert_eq!(metrics.find(ObservationKind::Action, "a").len(), 1);
        assert_eq!(metrics.len(), 4);
    }
}
