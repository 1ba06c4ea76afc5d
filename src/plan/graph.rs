//! 动作图：按名字索引的只读查找表
//!
//! 每次运行前由 Configuration 构建一次：校验计划名、动作引用、exec 名与条件/依赖环，
//! 之后引擎只读它，运行期的可变状态（结果缓存）另存于 ExecutionContext。

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::Serialize;

use crate::core::RecoveryError;
use crate::execs::ExecRegistry;
use crate::plan::types::*;

/// 诊断树的最大深度
const MAX_TREE_DEPTH: usize = 64;

/// 单个计划的动作命名空间
#[derive(Debug)]
pub struct PlanNode<'a> {
    plan: &'a Plan,
    actions: HashMap<&'a str, &'a Action>,
}

impl<'a> PlanNode<'a> {
    fn new(plan: &'a Plan) -> Result<Self, RecoveryError> {
        let mut actions = HashMap::with_capacity(plan.actions.len());
        for action in &plan.actions {
            if actions.insert(action.name.as_str(), action).is_some() {
                return Err(RecoveryError::Config(format!(
                    "duplicate action '{}' in plan '{}'",
                    action.name, plan.name
                )));
            }
        }
        Ok(Self { plan, actions })
    }

    pub fn name(&self) -> &'a str {
        &self.plan.name
    }

    pub fn allow_fail(&self) -> bool {
        self.plan.allow_fail
    }

    pub fn critical_actions(&self) -> &'a [String] {
        &self.plan.critical_actions
    }

    pub fn action(&self, name: &str) -> Result<&'a Action, RecoveryError> {
        self.actions
            .get(name)
            .copied()
            .ok_or_else(|| RecoveryError::UnknownAction {
                plan: self.plan.name.clone(),
                action: name.to_string(),
            })
    }

    fn validate(&self, registry: &ExecRegistry) -> Result<(), RecoveryError> {
        for name in &self.plan.critical_actions {
            self.action(name)?;
        }
        for action in &self.plan.actions {
            for reference in action.references() {
                self.action(reference)?;
            }
            if !registry.contains(action.exec_name()) {
                return Err(RecoveryError::UnknownExec(action.exec_name().to_string()));
            }
        }
        self.check_cycles()
    }

    /// 条件 / 依赖边上不允许有环（恢复边只会走一层，不参与）
    fn check_cycles(&self) -> Result<(), RecoveryError> {
        let mut done: HashSet<&str> = HashSet::new();
        let mut visiting: HashSet<&str> = HashSet::new();
        for action in &self.plan.actions {
            self.visit(action.name.as_str(), &mut visiting, &mut done)?;
        }
        Ok(())
    }

    fn visit(
        &self,
        name: &'a str,
        visiting: &mut HashSet<&'a str>,
        done: &mut HashSet<&'a str>,
    ) -> Result<(), RecoveryError> {
        if done.contains(name) {
            return Ok(());
        }
        if !visiting.insert(name) {
            return Err(RecoveryError::CyclicReference {
                plan: self.plan.name.clone(),
                action: name.to_string(),
            });
        }
        let action = self.action(name)?;
        for next in action.conditions.iter().chain(action.dependencies.iter()) {
            self.visit(next.as_str(), visiting, done)?;
        }
        visiting.remove(name);
        done.insert(name);
        Ok(())
    }

    fn build_tree(
        &self,
        name: &str,
        condition_only: bool,
        depth: usize,
    ) -> Result<ActionTree, RecoveryError> {
        if depth > MAX_TREE_DEPTH {
            return Err(RecoveryError::DepthExceeded(name.to_string()));
        }
        let action = self.action(name)?;
        let conditions = action
            .conditions
            .iter()
            .map(|c| self.build_tree(c, true, depth + 1))
            .collect::<Result<Vec<_>, _>>()?;
        let dependencies = action
            .dependencies
            .iter()
            .map(|d| self.build_tree(d, condition_only, depth + 1))
            .collect::<Result<Vec<_>, _>>()?;
        let recoveries = if condition_only {
            Vec::new()
        } else {
            action
                .recoveries
                .iter()
                .map(|r| self.build_tree(r, true, depth + 1))
                .collect::<Result<Vec<_>, _>>()?
        };
        Ok(ActionTree {
            name: action.name.clone(),
            exec_name: action.exec_name().to_string(),
            condition_only,
            conditions,
            dependencies,
            recoveries,
        })
    }
}

/// 已校验的动作图
#[derive(Debug)]
pub struct ActionGraph<'a> {
    plans: Vec<PlanNode<'a>>,
}

impl<'a> ActionGraph<'a> {
    /// 构建并校验动作图；任何错误都对整次运行致命，且发生在任何副作用之前
    pub fn new(configuration: &'a Configuration, registry: &ExecRegistry) -> Result<Self, RecoveryError> {
        let mut names = HashSet::new();
        let mut plans = Vec::with_capacity(configuration.plans.len());
        for plan in &configuration.plans {
            if plan.name.is_empty() {
                return Err(RecoveryError::Config("plan name is required".to_string()));
            }
            if !names.insert(plan.name.as_str()) {
                return Err(RecoveryError::Config(format!("duplicate plan '{}'", plan.name)));
            }
            let node = PlanNode::new(plan)?;
            node.validate(registry)?;
            plans.push(node);
        }
        Ok(Self { plans })
    }

    pub fn plans(&self) -> &[PlanNode<'a>] {
        &self.plans
    }

    pub fn plan(&self, name: &str) -> Option<&PlanNode<'a>> {
        self.plans.iter().find(|p| p.name() == name)
    }

    /// 执行顺序：非收尾计划按源顺序，收尾计划（若存在）单独返回，由调用方最后执行
    pub fn execution_order(&self, closing_plan: &str) -> (Vec<&PlanNode<'a>>, Option<&PlanNode<'a>>) {
        let regular = self.plans.iter().filter(|p| p.name() != closing_plan).collect();
        (regular, self.plan(closing_plan))
    }

    /// 某个动作的解析树；condition-only 节点不展开恢复
    pub fn tree(&self, plan: &str, action: &str) -> Result<ActionTree, RecoveryError> {
        let node = self
            .plan(plan)
            .ok_or_else(|| RecoveryError::Config(format!("unknown plan '{plan}'")))?;
        node.build_tree(action, false, 0)
    }
}

/// 诊断用的解析树
#[derive(Debug, Clone, Serialize)]
pub struct ActionTree {
    pub name: String,
    pub exec_name: String,
    pub condition_only: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<ActionTree>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<ActionTree>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub recoveries: Vec<ActionTree>,
}

impl ActionTree {
    fn write_indented(&self, f: &mut fmt::Formatter<'_>, prefix: &str, indent: usize) -> fmt::Result {
        writeln!(
            f,
            "{}{}{} ({})",
            " ".repeat(indent * 2),
            prefix,
            self.name,
            self.exec_name
        )?;
        for c in &self.conditions {
            c.write_indented(f, "C: ", indent + 1)?;
        }
        for d in &self.dependencies {
            d.write_indented(f, "D: ", indent + 1)?;
        }
        for r in &self.recoveries {
            r.write_indented(f, "R: ", indent + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for ActionTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_indented(f, "", 0)
    }
}
