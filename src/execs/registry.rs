//! exec 注册表
//!
//! 所有 exec 实现 Exec trait，由 ExecRegistry 按名注册与查找。注册表在启动时显式构造并交给引擎，
//! 之后只读，可通过 Arc 在多个资源的并发运行间共享。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::execs::ExecInfo;

/// exec trait：对资源执行一个有副作用的操作，返回 Ok 表示通过
#[async_trait]
pub trait Exec: Send + Sync {
    async fn run(&self, info: &mut ExecInfo<'_>) -> anyhow::Result<()>;
}

/// 把同步闭包包装为 Exec（适合只读写 Scope 的轻量 exec）
pub struct FnExec<F>(F);

impl<F> FnExec<F>
where
    F: Fn(&mut ExecInfo<'_>) -> anyhow::Result<()> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F> Exec for FnExec<F>
where
    F: Fn(&mut ExecInfo<'_>) -> anyhow::Result<()> + Send + Sync,
{
    async fn run(&self, info: &mut ExecInfo<'_>) -> anyhow::Result<()> {
        (self.0)(info)
    }
}

/// exec 注册表：按名称存储 Arc<dyn Exec>
#[derive(Default)]
pub struct ExecRegistry {
    execs: HashMap<String, Arc<dyn Exec>>,
}

impl ExecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册 exec；同名覆盖并告警
    pub fn register(&mut self, name: impl Into<String>, exec: impl Exec + 'static) {
        let name = name.into();
        if self.execs.insert(name.clone(), Arc::new(exec)).is_some() {
            tracing::warn!(exec = %name, "exec re-registered, previous implementation replaced");
        }
    }

    pub fn register_fn<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&mut ExecInfo<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.register(name, FnExec::new(f));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Exec>> {
        self.execs.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.execs.contains_key(name)
    }

    /// 已注册的 exec 名（排序后返回，便于日志与诊断）
    pub fn exec_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.execs.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.execs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.execs.is_empty()
    }
}
