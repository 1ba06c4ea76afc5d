//! 执行上下文与结果缓存
//!
//! ExecutionContext 由一次运行独占：资源句柄、Scope、结果缓存、指标句柄与取消 token。
//! 单个运行内严格串行，缓存就是普通 HashMap，不需要锁。

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::core::ActionResult;
use crate::metrics::MetricsSink;
use crate::plan::RunControl;
use crate::resource::Resource;
use crate::scope::{Params, Scope};

/// 解析模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolveMode {
    /// 完整解析：失败后尝试本动作的恢复
    Full,
    /// 只求值：条件与恢复动作使用，不会再触发自己的恢复
    ConditionOnly,
}

impl ResolveMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::ConditionOnly => "condition_only",
        }
    }
}

/// 一条缓存记录
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachedResult {
    /// 返回给调用方的结果
    pub result: ActionResult,
    /// 真实结果（allow_fail_after_recovery 时可能与 result 不同）
    pub actual: ActionResult,
    pub mode: ResolveMode,
    pub policy: RunControl,
    /// 动作定义的指纹（Action::fingerprint）
    pub definition: u64,
}

/// 按动作名缓存的解析结果
///
/// 各计划有独立的动作命名空间：同名但定义不同的动作各占一条记录，互不复用；
/// 定义完全相同的动作在整次运行内共享。
#[derive(Debug, Default)]
pub struct ResultCache {
    entries: HashMap<String, Vec<CachedResult>>,
}

impl ResultCache {
    /// 查找可复用的结果
    ///
    /// condition-only 模式下得到的失败没有尝试过恢复，完整解析一个带恢复的动作时不复用它。
    pub fn lookup(
        &self,
        name: &str,
        definition: u64,
        mode: ResolveMode,
        has_recoveries: bool,
    ) -> Option<ActionResult> {
        let entry = self
            .entries
            .get(name)?
            .iter()
            .find(|e| e.definition == definition)?;
        if mode == ResolveMode::Full
            && entry.mode == ResolveMode::ConditionOnly
            && has_recoveries
            && entry.actual.is_fail()
        {
            return None;
        }
        Some(entry.result)
    }

    /// AlwaysRun 的结果不入缓存；同一定义的旧记录被替换
    pub fn store(&mut self, name: &str, entry: CachedResult) {
        if !entry.policy.is_cacheable() {
            return;
        }
        let slot = self.entries.entry(name.to_string()).or_default();
        match slot.iter_mut().find(|e| e.definition == entry.definition) {
            Some(existing) => *existing = entry,
            None => slot.push(entry),
        }
    }

    /// 恢复动作成功后调用：清掉所有 RerunAfterRecovery 的记录，返回清掉的条数
    pub fn invalidate_after_recovery(&mut self) -> usize {
        let before = self.len();
        for slot in self.entries.values_mut() {
            slot.retain(|e| e.policy != RunControl::RerunAfterRecovery);
        }
        self.entries.retain(|_, slot| !slot.is_empty());
        before - self.len()
    }

    /// 该名字下最早写入的一条记录
    pub fn get(&self, name: &str) -> Option<&CachedResult> {
        self.entries.get(name).and_then(|slot| slot.first())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CachedResult)> {
        self.entries
            .iter()
            .flat_map(|(k, slot)| slot.iter().map(move |v| (k.as_str(), v)))
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 一次运行独占的执行上下文
pub struct ExecutionContext {
    pub(crate) run_id: String,
    pub(crate) resource: Arc<dyn Resource>,
    pub(crate) scope: Scope,
    pub(crate) cache: ResultCache,
    pub(crate) metrics: Arc<dyn MetricsSink>,
    pub(crate) cancel: CancellationToken,
}

impl ExecutionContext {
    pub fn new(
        resource: Arc<dyn Resource>,
        params: Params,
        metrics: Arc<dyn MetricsSink>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            resource,
            scope: Scope::new(params),
            cache: ResultCache::default(),
            metrics,
            cancel,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn resource(&self) -> &dyn Resource {
        self.resource.as_ref()
    }

    pub fn resource_name(&self) -> &str {
        self.resource.name()
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn scope_mut(&mut self) -> &mut Scope {
        &mut self.scope
    }

    /// 运行结束（或被取消）后仍可查看已缓存的结果
    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
