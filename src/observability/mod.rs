//! 可观测性：日志初始化

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LogSection;

/// 安装全局 tracing subscriber；RUST_LOG 优先于配置中的 filter
///
/// 重复调用（例如多个测试）只会告警，不会 panic。
pub fn init(section: &LogSection) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&section.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .try_init()
        .is_err()
    {
        tracing::warn!("tracing subscriber already installed");
    }
}
