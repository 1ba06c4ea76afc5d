//! 目标资源句柄
//!
//! 引擎把资源当作不透明对象，只负责经由 ExecInfo 传给 exec。具体的 SSH / servod 实现由调用方提供。

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// 资源类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Dut,
    Servo,
    BluetoothPeer,
    WifiRouter,
    Dongle,
    Other,
}

/// 命令执行结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl RunOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// 资源访问错误
#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("Resource unreachable: {0}")]
    Unreachable(String),

    #[error("Command '{command}' exited with {exit_code}: {stderr}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("Resource call timed out: {0}")]
    Timeout(String),

    #[error("Not supported by resource: {0}")]
    Unsupported(String),

    #[error("Resource error: {0}")]
    Other(String),
}

/// 资源句柄：SSH 风格的命令执行 + 可选的外设控制
#[async_trait]
pub trait Resource: Send + Sync {
    /// 资源名（主机名 / servo 名）
    fn name(&self) -> &str;

    fn kind(&self) -> ResourceKind {
        ResourceKind::Dut
    }

    /// 前台执行命令，带超时
    async fn run(&self, timeout: Duration, command: &str) -> Result<RunOutput, ResourceError>;

    /// 后台执行命令，不等待结束
    async fn run_background(&self, command: &str) -> Result<(), ResourceError>;

    /// 连通性检查
    async fn ping(&self, count: u32) -> Result<(), ResourceError>;

    fn servod(&self) -> Option<&dyn Servod> {
        None
    }

    fn versioner(&self) -> Option<&dyn Versioner> {
        None
    }
}

/// servod 控制接口
#[async_trait]
pub trait Servod: Send + Sync {
    async fn get(&self, command: &str) -> Result<Value, ResourceError>;

    async fn set(&self, command: &str, value: Value) -> Result<(), ResourceError>;

    async fn has(&self, command: &str) -> Result<bool, ResourceError>;
}

/// 设备上的系统 / 固件版本
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub os_image: String,
    pub fw_image: String,
    pub fw_version: String,
}

/// 版本查询接口
#[async_trait]
pub trait Versioner: Send + Sync {
    async fn version(&self, resource: &str) -> Result<VersionInfo, ResourceError>;
}

/// 只有名字的资源：所有远程调用都返回 Unsupported
///
/// 适用于只使用 scope / sample 类 exec 的配置（例如校验配置本身）。
#[derive(Debug, Clone)]
pub struct DetachedResource {
    name: String,
    kind: ResourceKind,
}

impl DetachedResource {
    pub fn new(name: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

#[async_trait]
impl Resource for DetachedResource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ResourceKind {
        self.kind
    }

    async fn run(&self, _timeout: Duration, command: &str) -> Result<RunOutput, ResourceError> {
        Err(ResourceError::Unsupported(format!("run '{command}' on {}", self.name)))
    }

    async fn run_background(&self, command: &str) -> Result<(), ResourceError> {
        Err(ResourceError::Unsupported(format!(
            "run_background '{command}' on {}",
            self.name
        )))
    }

    async fn ping(&self, _count: u32) -> Result<(), ResourceError> {
        Err(ResourceError::Unsupported(format!("ping {}", self.name)))
    }
}
