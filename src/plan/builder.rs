//! 动作图构建器
//!
//! 提供流畅的API来在代码中构建配置（嵌入方与测试使用）

use std::collections::HashSet;
use std::time::Duration;

use crate::core::RecoveryError;
use crate::plan::types::*;

/// 动作构建器
pub struct ActionBuilder {
    action: Action,
}

impl ActionBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            action: Action {
                name: name.into(),
                ..Default::default()
            },
        }
    }

    /// 添加说明
    pub fn docs(mut self, line: impl Into<String>) -> Self {
        self.action.docs.push(line.into());
        self
    }

    /// 设置 exec 名
    pub fn exec(mut self, exec_name: impl Into<String>) -> Self {
        self.action.exec_name = exec_name.into();
        self
    }

    /// 追加 exec 参数
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.action.exec_args.push(arg.into());
        self
    }

    pub fn condition(mut self, name: impl Into<String>) -> Self {
        self.action.conditions.push(name.into());
        self
    }

    pub fn dependency(mut self, name: impl Into<String>) -> Self {
        self.action.dependencies.push(name.into());
        self
    }

    pub fn recovery(mut self, name: impl Into<String>) -> Self {
        self.action.recoveries.push(name.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.action.exec_timeout = Some(timeout);
        self
    }

    pub fn allow_fail_after_recovery(mut self, allow: bool) -> Self {
        self.action.allow_fail_after_recovery = allow;
        self
    }

    pub fn run_control(mut self, run_control: RunControl) -> Self {
        self.action.run_control = Some(run_control);
        self
    }

    pub fn build(self) -> Action {
        self.action
    }
}

/// 计划构建器
pub struct PlanBuilder {
    plan: Plan,
}

impl PlanBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            plan: Plan {
                name: name.into(),
                ..Default::default()
            },
        }
    }

    /// 追加关键动作
    pub fn critical(mut self, name: impl Into<String>) -> Self {
        self.plan.critical_actions.push(name.into());
        self
    }

    pub fn allow_fail(mut self, allow: bool) -> Self {
        self.plan.allow_fail = allow;
        self
    }

    /// 注册动作到本计划的命名空间
    pub fn action(mut self, action: Action) -> Self {
        self.plan.actions.push(action);
        self
    }

    pub fn build(self) -> Plan {
        self.plan
    }
}

/// 配置构建器
#[derive(Default)]
pub struct ConfigurationBuilder {
    plans: Vec<Plan>,
}

impl ConfigurationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn plan(mut self, plan: Plan) -> Self {
        self.plans.push(plan);
        self
    }

    /// 构建配置：计划名非空且唯一，动作名在各自计划内非空且唯一
    ///
    /// 引用与 exec 名的完整校验在 ActionGraph::new 中进行（需要注册表）。
    pub fn build(self) -> Result<Configuration, RecoveryError> {
        let mut plan_names = HashSet::new();
        for plan in &self.plans {
            if plan.name.is_empty() {
                return Err(RecoveryError::Config("plan name is required".to_string()));
            }
            if !plan_names.insert(plan.name.as_str()) {
                return Err(RecoveryError::Config(format!("duplicate plan '{}'", plan.name)));
            }
            let mut action_names = HashSet::new();
            for action in &plan.actions {
                if action.name.is_empty() {
                    return Err(RecoveryError::Config(format!(
                        "action without name in plan '{}'",
                        plan.name
                    )));
                }
                if !action_names.insert(action.name.as_str()) {
                    return Err(RecoveryError::Config(format!(
                        "duplicate action '{}' in plan '{}'",
                        action.name, plan.name
                    )));
                }
            }
        }
        Ok(Configuration { plans: self.plans })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_simple_configuration() {
        let cfg = ConfigurationBuilder::new()
            .plan(
                PlanBuilder::new("dut")
                    .critical("dut_ssh")
                    .action(
                        ActionBuilder::new("dut_ssh")
                            .docs("DUT must be reachable over SSH.")
                            .exec("resource_ping")
                            .arg("count:2")
                            .recovery("power_cycle")
                            .timeout(Duration::from_secs(30))
                            .run_control(RunControl::AlwaysRun)
                            .build(),
                    )
                    .action(ActionBuilder::new("power_cycle").exec("sample_pass").build())
                    .build(),
            )
            .build()
            .expect("Failed to build configuration");

        let plan = cfg.plan("dut").unwrap();
        assert_eq!(plan.critical_actions, vec!["dut_ssh"]);
        let ssh = plan.action("dut_ssh").unwrap();
        assert_eq!(ssh.recoveries, vec!["power_cycle"]);
        assert_eq!(ssh.exec_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_build_duplicate_plan_fails() {
        let result = ConfigurationBuilder::new()
            .plan(PlanBuilder::new("repair").build())
            .plan(PlanBuilder::new("repair").build())
            .build();
        assert!(matches!(result, Err(RecoveryError::Config(_))));
    }

    #[test]
    fn test_build_duplicate_action_fails() {
        let result = ConfigurationBuilder::new()
            .plan(
                PlanBuilder::new("repair")
                    .action(ActionBuilder::new("a").build())
                    .action(ActionBuilder::new("a").build())
                    .build(),
            )
            .build();
        assert!(result.is_err());
    }
}
