//! 通道指标：observe 只做 try_send，由后台任务转发到真正的后端
//!
//! 通道满或后端已关闭时丢弃并告警，保证引擎永远不会因为指标后端而阻塞。

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

use crate::metrics::{MetricsSink, Observation};

/// 指标后端（如远程时序库），由调用方实现
#[async_trait]
pub trait MetricsBackend: Send + Sync {
    async fn record(&self, observation: Observation) -> anyhow::Result<()>;
}

pub struct ChannelMetrics {
    tx: mpsc::Sender<Observation>,
}

impl ChannelMetrics {
    /// 创建通道并在当前 tokio 运行时上启动转发任务
    ///
    /// 所有 ChannelMetrics 被 drop 后转发任务在排空通道后退出。
    pub fn spawn(buffer_size: usize, backend: Arc<dyn MetricsBackend>) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<Observation>(buffer_size.max(1));
        let handle = tokio::spawn(async move {
            while let Some(observation) = rx.recv().await {
                let name = observation.name.clone();
                if let Err(e) = backend.record(observation).await {
                    tracing::warn!(error = %e, name = %name, "metrics backend rejected observation");
                }
            }
            tracing::debug!("metrics forwarder stopped");
        });
        (Self { tx }, handle)
    }
}

impl MetricsSink for ChannelMetrics {
    fn observe(&self, observation: Observation) {
        match self.tx.try_send(observation) {
            Ok(()) => {}
            Err(TrySendError::Full(o)) => {
                tracing::warn!(name = %o.name, "metrics buffer full, observation dropped");
            }
            Err(TrySendError::Closed(o)) => {
                tracing::warn!(name = %o.name, "metrics forwarder closed, observation dropped");
            }
        }
    }
}
