//! exec 参数解析
//!
//! exec_args 中每一项形如 `key:value`，只在第一个 `:` 处切分；没有 `:` 的裸 key 视为布尔开关（true）。

use std::collections::HashMap;
use std::time::Duration;

/// 解析后的动作参数
#[derive(Debug, Clone, Default)]
pub struct ParsedArgs {
    values: HashMap<String, String>,
}

impl ParsedArgs {
    pub fn parse(args: &[String]) -> Self {
        let mut values = HashMap::new();
        for raw in args {
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            let (key, value) = match raw.split_once(':') {
                Some((k, v)) => (k.trim(), v.trim()),
                None => (raw, ""),
            };
            if key.is_empty() {
                tracing::warn!(arg = %raw, "exec arg without key ignored");
                continue;
            }
            values.insert(key.to_string(), value.to_string());
        }
        Self { values }
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn get_string(&self, key: &str, default: &str) -> String {
        self.values
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }

    /// 裸 key 为 true；无法识别的值回退到 default
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.values.get(key).map(|v| v.to_lowercase()) {
            None => default,
            Some(v) => match v.as_str() {
                "" | "true" | "1" | "yes" => true,
                "false" | "0" | "no" => false,
                _ => {
                    tracing::warn!(key, value = %v, "unrecognised bool arg, using default");
                    default
                }
            },
        }
    }

    pub fn get_int(&self, key: &str, default: i64) -> i64 {
        match self.values.get(key) {
            None => default,
            Some(v) => v.parse().unwrap_or_else(|_| {
                tracing::warn!(key, value = %v, "unrecognised int arg, using default");
                default
            }),
        }
    }

    /// 以秒为单位（可带小数）
    pub fn get_duration_secs(&self, key: &str, default: Duration) -> Duration {
        match self.values.get(key).map(|v| v.parse::<f64>()) {
            Some(Ok(secs)) if secs.is_finite() && secs >= 0.0 => {
                match Duration::try_from_secs_f64(secs) {
                    Ok(d) => d,
                    Err(_) => {
                        tracing::warn!(key, secs, "duration arg out of range, using default");
                        default
                    }
                }
            }
            Some(_) => {
                tracing::warn!(key, "unrecognised duration arg, using default");
                default
            }
            None => default,
        }
    }

    /// 逗号分隔列表，去掉空项
    pub fn get_slice(&self, key: &str) -> Vec<String> {
        self.values
            .get(key)
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
