//! 内置 exec：不含任何硬件逻辑，只依赖引擎自身能力（Scope、超时、资源 ping）
//!
//! - sample_pass / sample_fail：固定通过 / 失败，用于配置占位与测试
//! - sample_sleep：`sleep:<秒>`，可被超时与取消打断
//! - scope_set：把 `key:value` 写入运行状态
//! - scope_has：所有列出的 key 都存在于运行状态或参数表时通过
//! - resource_ping：调用 Resource::ping（`count:<n>`，默认 2）

use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;

use crate::execs::{Exec, ExecInfo, ExecRegistry};

/// sample_sleep
pub struct SleepExec;

#[async_trait]
impl Exec for SleepExec {
    async fn run(&self, info: &mut ExecInfo<'_>) -> anyhow::Result<()> {
        let wait = info
            .action_args()
            .get_duration_secs("sleep", Duration::from_secs(1));
        tokio::select! {
            _ = tokio::time::sleep(wait) => Ok(()),
            _ = info.cancel_token().cancelled() => bail!("sleep interrupted"),
        }
    }
}

/// resource_ping
pub struct PingExec;

#[async_trait]
impl Exec for PingExec {
    async fn run(&self, info: &mut ExecInfo<'_>) -> anyhow::Result<()> {
        let raw = info.action_args().get_int("count", 2);
        let count = match u32::try_from(raw) {
            Ok(n) if n >= 1 => n,
            _ => {
                tracing::warn!(count = raw, "invalid ping count, using default");
                2
            }
        };
        let resource = info.resource();
        resource
            .ping(count)
            .await
            .with_context(|| format!("ping {}", resource.name()))
    }
}

fn scope_set(info: &mut ExecInfo<'_>) -> anyhow::Result<()> {
    let pairs: Vec<(String, String)> = info
        .raw_args()
        .iter()
        .filter_map(|raw| raw.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, _)| !k.is_empty())
        .collect();
    if pairs.is_empty() {
        bail!("scope_set requires at least one key:value arg");
    }
    for (key, value) in pairs {
        info.scope_mut().set(key, value);
    }
    Ok(())
}

fn scope_has(info: &mut ExecInfo<'_>) -> anyhow::Result<()> {
    let missing: Vec<&str> = info
        .raw_args()
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty() && !info.scope().contains_key(k))
        .collect();
    if !missing.is_empty() {
        bail!("missing scope keys: {}", missing.join(", "));
    }
    Ok(())
}

impl ExecRegistry {
    /// 预注册内置 exec 的注册表
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        register_builtins(&mut registry);
        registry
    }
}

pub fn register_builtins(registry: &mut ExecRegistry) {
    registry.register_fn("sample_pass", |_| Ok(()));
    registry.register_fn("sample_fail", |info| {
        bail!("sample_fail called by action '{}'", info.action_name())
    });
    registry.register("sample_sleep", SleepExec);
    registry.register_fn("scope_set", scope_set);
    registry.register_fn("scope_has", scope_has);
    registry.register("resource_ping", PingExec);
}
