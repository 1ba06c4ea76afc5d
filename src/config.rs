//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `RECOVERY__*` 覆盖（双下划线表示嵌套，如 `RECOVERY__ENGINE__MAX_DEPTH=16`）。

use std::path::PathBuf;

use serde::Deserialize;

use crate::plan::{RunControl, DEFAULT_CLOSING_PLAN};

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineSection,
    pub metrics: MetricsSection,
    pub log: LogSection,
}

/// [engine] 段：超时、递归深度、默认缓存策略、收尾计划名
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    /// 动作未设置 exec_timeout 时的单次 exec 超时（秒）
    pub default_exec_timeout_secs: u64,
    /// 条件 / 依赖 / 恢复嵌套解析的最大深度
    pub max_depth: usize,
    /// 动作未设置 run_control 时使用的策略
    pub default_run_control: RunControl,
    /// 总在最后执行的计划名
    pub closing_plan: String,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            default_exec_timeout_secs: 60,
            max_depth: 32,
            default_run_control: RunControl::RerunAfterRecovery,
            closing_plan: DEFAULT_CLOSING_PLAN.to_string(),
        }
    }
}

/// [metrics] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsSection {
    pub enabled: bool,
    /// ChannelMetrics 的缓冲条数，满了就丢弃
    pub buffer_size: usize,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            enabled: true,
            buffer_size: 1024,
        }
    }
}

/// [log] 段：默认日志过滤（RUST_LOG 优先）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogSection {
    pub filter: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 RECOVERY__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 RECOVERY__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        } else {
            tracing::warn!(path = %path.display(), "config file not found, using defaults");
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("RECOVERY")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

/// 重新从磁盘与环境变量加载配置（调用方在两次运行之间调用，并用新配置重建引擎）
pub fn reload_config() -> Result<AppConfig, config::ConfigError> {
    load_config(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.engine.default_exec_timeout_secs, 60);
        assert_eq!(cfg.engine.max_depth, 32);
        assert_eq!(cfg.engine.default_run_control, RunControl::RerunAfterRecovery);
        assert_eq!(cfg.engine.closing_plan, "Closing");
        assert!(cfg.metrics.enabled);
        assert_eq!(cfg.log.filter, "info");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[engine]
default_exec_timeout_secs = 5
default_run_control = "run_once"
closing_plan = "close"

[metrics]
enabled = false
"#
        )
        .unwrap();

        let cfg = load_config(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(cfg.engine.default_exec_timeout_secs, 5);
        assert_eq!(cfg.engine.default_run_control, RunControl::RunOnce);
        assert_eq!(cfg.engine.closing_plan, "close");
        // 未写的键保持默认
        assert_eq!(cfg.engine.max_depth, 32);
        assert!(!cfg.metrics.enabled);
        assert_eq!(cfg.metrics.buffer_size, 1024);
    }
}
