//! ExecInfo：引擎调用 exec 时传入的上下文
//!
//! 借用 ExecutionContext 中的资源句柄与 Scope，只在一次 exec 调用期间有效。

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::execs::ParsedArgs;
use crate::resource::Resource;
use crate::scope::{Params, Scope};

/// 单次 exec 调用的上下文
pub struct ExecInfo<'a> {
    action_name: &'a str,
    exec_name: &'a str,
    args: &'a [String],
    timeout: Duration,
    resource: &'a dyn Resource,
    scope: &'a mut Scope,
    cancel: CancellationToken,
}

impl<'a> ExecInfo<'a> {
    pub fn new(
        action_name: &'a str,
        exec_name: &'a str,
        args: &'a [String],
        timeout: Duration,
        resource: &'a dyn Resource,
        scope: &'a mut Scope,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            action_name,
            exec_name,
            args,
            timeout,
            resource,
            scope,
            cancel,
        }
    }

    pub fn action_name(&self) -> &str {
        self.action_name
    }

    pub fn exec_name(&self) -> &str {
        self.exec_name
    }

    /// 原始参数列表
    pub fn raw_args(&self) -> &[String] {
        self.args
    }

    /// 按 `key:value` 解析后的参数
    pub fn action_args(&self) -> ParsedArgs {
        ParsedArgs::parse(self.args)
    }

    /// 本次调用的超时预算
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn resource(&self) -> &dyn Resource {
        self.resource
    }

    pub fn params(&self) -> &Params {
        self.scope.params()
    }

    pub fn scope(&self) -> &Scope {
        &*self.scope
    }

    pub fn scope_mut(&mut self) -> &mut Scope {
        &mut *self.scope
    }

    /// 超时或运行取消时被触发；长时间运行的 exec 应监听它并尽力中止（如关闭 SSH 会话）
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}
