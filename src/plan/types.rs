//! 动作图类型定义
//!
//! Configuration → Plan → Action。动作之间通过名字互相引用（条件、依赖、恢复），
//! 这些定义在运行期间不可变，可在多次运行间只读共享；运行期结果另存于 ExecutionContext。

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::core::RecoveryError;

/// 默认的收尾计划名：总在最后执行，且不受前面失败的影响
pub const DEFAULT_CLOSING_PLAN: &str = "Closing";

/// 同一次运行中重复引用同一动作时，是否重新执行 exec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunControl {
    /// 从不缓存：每次引用都重新执行（适合会被其他恢复动作改变结果的探测）
    AlwaysRun,
    /// 首次解析后缓存，本次运行内一直复用
    RunOnce,
    /// 与 RunOnce 相同，但任何恢复动作成功后缓存失效
    RerunAfterRecovery,
}

impl RunControl {
    pub fn is_cacheable(self) -> bool {
        !matches!(self, Self::AlwaysRun)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::AlwaysRun => "always_run",
            Self::RunOnce => "run_once",
            Self::RerunAfterRecovery => "rerun_after_recovery",
        }
    }
}

/// 动作定义
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Action {
    /// 计划命名空间内唯一
    pub name: String,
    /// 说明文字，无行为
    pub docs: Vec<String>,
    /// 条件：以 condition-only 方式解析，任一失败则本动作 Skipped
    pub conditions: Vec<String>,
    /// 依赖：以完整方式解析（含各自的恢复），任一失败则本动作失败
    pub dependencies: Vec<String>,
    /// 为空时使用动作名
    pub exec_name: String,
    pub exec_args: Vec<String>,
    /// 单次 exec 的超时；未设置时用引擎默认值
    #[serde(
        rename = "exec_timeout_secs",
        serialize_with = "serialize_secs_opt",
        deserialize_with = "deserialize_secs_opt"
    )]
    pub exec_timeout: Option<Duration>,
    /// 恢复动作：以 condition-only 方式解析，不再递归恢复
    pub recoveries: Vec<String>,
    /// 恢复耗尽后仍视为通过（指标中记录真实失败）
    pub allow_fail_after_recovery: bool,
    /// 未设置时用引擎默认策略
    pub run_control: Option<RunControl>,
}

impl Action {
    pub fn exec_name(&self) -> &str {
        if self.exec_name.is_empty() {
            &self.name
        } else {
            &self.exec_name
        }
    }

    /// 本动作直接引用的所有动作名（条件、依赖、恢复）
    pub fn references(&self) -> impl Iterator<Item = &String> {
        self.conditions
            .iter()
            .chain(self.dependencies.iter())
            .chain(self.recoveries.iter())
    }

    /// 定义指纹：结果缓存据此区分不同计划里同名但定义不同的动作
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

/// 计划：一组按顺序执行的关键动作
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Plan {
    pub name: String,
    pub critical_actions: Vec<String>,
    /// 失败时不中止整个配置
    pub allow_fail: bool,
    /// 本计划的动作命名空间
    pub actions: Vec<Action>,
}

impl Plan {
    pub fn action(&self, name: &str) -> Option<&Action> {
        self.actions.iter().find(|a| a.name == name)
    }
}

/// 配置：按源顺序排列的计划
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub plans: Vec<Plan>,
}

impl Configuration {
    /// 从外部生成的 JSON 加载
    pub fn from_json(raw: &str) -> Result<Self, RecoveryError> {
        serde_json::from_str(raw).map_err(|e| RecoveryError::Config(format!("invalid configuration JSON: {e}")))
    }

    pub fn to_json(&self) -> Result<String, RecoveryError> {
        serde_json::to_string_pretty(self).map_err(|e| RecoveryError::Config(e.to_string()))
    }

    pub fn plan(&self, name: &str) -> Option<&Plan> {
        self.plans.iter().find(|p| p.name == name)
    }

    pub fn plan_names(&self) -> Vec<&str> {
        self.plans.iter().map(|p| p.name.as_str()).collect()
    }
}

// ---------------------------------------------------------------------------
// Duration 以秒（可带小数）序列化
// ---------------------------------------------------------------------------

fn serialize_secs_opt<S>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match d {
        Some(dur) => s.serialize_some(&dur.as_secs_f64()),
        None => s.serialize_none(),
    }
}

fn deserialize_secs_opt<'de, D>(d: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt: Option<f64> = Option::deserialize(d)?;
    match opt {
        Some(secs) if !secs.is_finite() || secs < 0.0 => Err(serde::de::Error::custom(format!(
            "exec_timeout_secs must be a non-negative number, got {secs}"
        ))),
        Some(secs) => Duration::try_from_secs_f64(secs).map(Some).map_err(|e| {
            serde::de::Error::custom(format!("exec_timeout_secs {secs} out of range: {e}"))
        }),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json() {
        let raw = r#"{
            "plans": [{
                "name": "servo",
                "critical_actions": ["servo_host_ping"],
                "actions": [{
                    "name": "servo_host_ping",
                    "docs": ["Servo host must answer ping."],
                    "exec_name": "resource_ping",
                    "exec_args": ["count:3"],
                    "exec_timeout_secs": 1.5,
                    "recoveries": ["reboot_servo_host"],
                    "run_control": "always_run"
                }, {
                    "name": "reboot_servo_host",
                    "exec_name": "sample_pass"
                }]
            }]
        }"#;
        let cfg = Configuration::from_json(raw).unwrap();
        assert_eq!(cfg.plan_names(), vec!["servo"]);
        let plan = cfg.plan("servo").unwrap();
        assert!(!plan.allow_fail);
        let ping = plan.action("servo_host_ping").unwrap();
        assert_eq!(ping.exec_timeout, Some(Duration::from_millis(1500)));
        assert_eq!(ping.run_control, Some(RunControl::AlwaysRun));
        let reboot = plan.action("reboot_servo_host").unwrap();
        assert_eq!(reboot.exec_timeout, None);
        assert_eq!(reboot.run_control, None);
    }

    #[test]
    fn test_from_json_rejects_negative_timeout() {
        let raw = r#"{"plans":[{"name":"p","actions":[{"name":"a","exec_timeout_secs":-1}]}]}"#;
        let err = Configuration::from_json(raw).unwrap_err();
        assert!(matches!(err, RecoveryError::Config(_)));
    }

    #[test]
    fn test_from_json_rejects_huge_timeout() {
        let raw = r#"{"plans":[{"name":"p","actions":[{"name":"a","exec_timeout_secs":1e30}]}]}"#;
        let err = Configuration::from_json(raw).unwrap_err();
        assert!(matches!(err, RecoveryError::Config(_)), "{err:?}");
    }

    #[test]
    fn test_fingerprint_follows_definition() {
        let servo_ping = Action {
            name: "ping".into(),
            exec_name: "servo_ping".into(),
            ..Default::default()
        };
        let dut_ping = Action {
            exec_name: "dut_ping".into(),
            ..servo_ping.clone()
        };
        assert_eq!(servo_ping.fingerprint(), servo_ping.clone().fingerprint());
        assert_ne!(servo_ping.fingerprint(), dut_ping.fingerprint());
    }

    #[test]
    fn test_exec_name_defaults_to_action_name() {
        let action = Action {
            name: "sample_pass".into(),
            ..Default::default()
        };
        assert_eq!(action.exec_name(), "sample_pass");
        assert!(RunControl::RunOnce.is_cacheable());
        assert!(!RunControl::AlwaysRun.is_cacheable());
    }

    #[test]
    fn test_json_round_trip_keeps_timeout() {
        let cfg = Configuration {
            plans: vec![Plan {
                name: "p".into(),
                actions: vec![Action {
                    name: "a".into(),
                    exec_timeout: Some(Duration::from_secs(2)),
                    ..Default::default()
                }],
                ..Default::default()
            }],
        };
        let again = Configuration::from_json(&cfg.to_json().unwrap()).unwrap();
        assert_eq!(again, cfg);
    }
}
