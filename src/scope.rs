//! 参数与运行期状态
//!
//! Params 由调用方构造、运行期间只读，可在多个资源的并发运行间共享；
//! Scope 在 Params 之上叠加一份本次运行私有的 key/value 状态，随 ExecutionContext 显式传递给每个 exec。

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

/// 不可变参数表（配置参数，如 board / model / 镜像路径）
#[derive(Debug, Clone, Default)]
pub struct Params(Arc<HashMap<String, Value>>);

impl Params {
    pub fn new(map: HashMap<String, Value>) -> Self {
        Self(Arc::new(map))
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        Self::new(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// 单次运行的作用域：只读 Params + 可写运行状态
#[derive(Debug, Default)]
pub struct Scope {
    params: Params,
    state: HashMap<String, Value>,
}

impl Scope {
    pub fn new(params: Params) -> Self {
        Self {
            params,
            state: HashMap::new(),
        }
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// 查找顺序：先运行状态，再参数表
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.state.get(key).or_else(|| self.params.get(key))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.state.contains_key(key) || self.params.contains_key(key)
    }

    /// 写入运行状态，返回旧值
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.state.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.state.remove(key)
    }

    pub fn state(&self) -> &HashMap<String, Value> {
        &self.state
    }
}
