//! cros-recovery 命令行
//!
//! 只带内置 exec，用于校验配置、查看解析树，或对一个不可远程访问的资源试运行配置：
//!
//! ```text
//! cros-recovery check <configuration.json>
//! cros-recovery tree  <configuration.json> <plan> <action>
//! cros-recovery run   <configuration.json> <resource> [key=value ...]
//! ```

use std::sync::Arc;

use anyhow::{bail, Context};
use cros_recovery::config::load_config;
use cros_recovery::core::ShutdownManager;
use cros_recovery::metrics;
use cros_recovery::observability;
use cros_recovery::resource::{DetachedResource, ResourceKind};
use cros_recovery::scope::Params;
use cros_recovery::{Configuration, EngineConfig, ExecRegistry, RecoveryEngine, RunOptions};

const USAGE: &str = "usage: cros-recovery <check|tree|run> <configuration.json> [args...]";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_config = load_config(None).context("Failed to load config")?;
    observability::init(&app_config.log);

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (command, path) = match (args.first(), args.get(1)) {
        (Some(c), Some(p)) => (c.as_str(), p.as_str()),
        _ => bail!(USAGE),
    };
    let raw = std::fs::read_to_string(path).with_context(|| format!("read {path}"))?;
    let configuration = Configuration::from_json(&raw)?;

    let engine = RecoveryEngine::new(
        Arc::new(ExecRegistry::with_builtins()),
        metrics::from_config(&app_config.metrics),
        EngineConfig::from(&app_config.engine),
    );

    match command {
        "check" => {
            let graph = engine.validate(&configuration)?;
            for plan in graph.plans() {
                println!("{}: {} critical action(s)", plan.name(), plan.critical_actions().len());
            }
        }
        "tree" => {
            let (plan, action) = match (args.get(2), args.get(3)) {
                (Some(p), Some(a)) => (p.as_str(), a.as_str()),
                _ => bail!("usage: cros-recovery tree <configuration.json> <plan> <action>"),
            };
            let graph = engine.validate(&configuration)?;
            print!("{}", graph.tree(plan, action)?);
        }
        "run" => {
            let Some(resource) = args.get(2) else {
                bail!("usage: cros-recovery run <configuration.json> <resource> [key=value ...]");
            };
            let params = Params::from_pairs(args.iter().skip(3).filter_map(|kv| {
                kv.split_once('=')
                    .map(|(k, v)| (k.to_string(), v.to_string()))
            }));

            let shutdown = Arc::new(ShutdownManager::new());
            let mut reasons = shutdown.subscribe();
            shutdown.install_signal_handlers();
            let options = RunOptions::new()
                .with_params(params)
                .with_cancel(shutdown.child_token());
            let result = engine
                .run_configuration(
                    Arc::new(DetachedResource::new(resource.as_str(), ResourceKind::Dut)),
                    &configuration,
                    options,
                )
                .await;
            let report = match result {
                Ok(report) => report,
                Err(e) if e.is_cancelled() => {
                    match reasons.try_recv() {
                        Ok(reason) => tracing::warn!(?reason, "run cancelled by shutdown"),
                        Err(_) => tracing::warn!("run cancelled"),
                    }
                    return Err(e.into());
                }
                Err(e) => return Err(e.into()),
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.passed() {
                std::process::exit(1);
            }
        }
        other => bail!("unknown command '{other}'\n{USAGE}"),
    }
    Ok(())
}
