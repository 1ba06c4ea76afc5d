//! 引擎集成测试：假设备 + 计数 exec，覆盖 JSON 配置加载、恢复、收尾计划与指标转发

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;
use serde_json::Value;

use cros_recovery::core::PlanStatus;
use cros_recovery::metrics::{
    ChannelMetrics, MemoryMetrics, MetricsBackend, MetricsSink, Observation, ObservationKind,
};
use cros_recovery::resource::{Resource, ResourceError, RunOutput, Servod};
use cros_recovery::scope::Params;
use cros_recovery::{
    ActionResult, Configuration, EngineConfig, Exec, ExecInfo, ExecRegistry, FailureKind,
    RecoveryEngine, RunOptions,
};

/// 假 DUT：SSH 初始不可达，servo 执行 power_state:reset 后恢复
struct FakeDut {
    name: String,
    ssh_up: AtomicBool,
    commands: AtomicUsize,
    servo: FakeServo,
}

struct FakeServo {
    resets: AtomicUsize,
}

impl FakeDut {
    fn new(name: &str, ssh_up: bool) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            ssh_up: AtomicBool::new(ssh_up),
            commands: AtomicUsize::new(0),
            servo: FakeServo {
                resets: AtomicUsize::new(0),
            },
        })
    }
}

#[async_trait]
impl Resource for FakeDut {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, _timeout: Duration, command: &str) -> Result<RunOutput, ResourceError> {
        self.commands.fetch_add(1, Ordering::SeqCst);
        if !self.ssh_up.load(Ordering::SeqCst) {
            return Err(ResourceError::Unreachable(self.name.clone()));
        }
        Ok(RunOutput {
            exit_code: 0,
            stdout: format!("ran {command}"),
            stderr: String::new(),
        })
    }

    async fn run_background(&self, _command: &str) -> Result<(), ResourceError> {
        Ok(())
    }

    async fn ping(&self, _count: u32) -> Result<(), ResourceError> {
        if self.ssh_up.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ResourceError::Unreachable(self.name.clone()))
        }
    }

    fn servod(&self) -> Option<&dyn Servod> {
        Some(self)
    }
}

#[async_trait]
impl Servod for FakeDut {
    async fn get(&self, command: &str) -> Result<Value, ResourceError> {
        match command {
            "power_state" => Ok(Value::from("on")),
            other => Err(ResourceError::Unsupported(other.to_string())),
        }
    }

    async fn set(&self, command: &str, value: Value) -> Result<(), ResourceError> {
        if command == "power_state" && value == "reset" {
            self.servo.resets.fetch_add(1, Ordering::SeqCst);
            self.ssh_up.store(true, Ordering::SeqCst);
            return Ok(());
        }
        Err(ResourceError::Unsupported(format!("{command}:{value}")))
    }

    async fn has(&self, command: &str) -> Result<bool, ResourceError> {
        Ok(command == "power_state")
    }
}

/// 在设备上执行 `cmd:<命令>`
struct SshExec;

#[async_trait]
impl Exec for SshExec {
    async fn run(&self, info: &mut ExecInfo<'_>) -> anyhow::Result<()> {
        let command = info.action_args().get_string("cmd", "true");
        let output = info
            .resource()
            .run(info.timeout(), &command)
            .await
            .with_context(|| format!("ssh to {}", info.resource().name()))?;
        if !output.success() {
            bail!("'{command}' exited with {}", output.exit_code);
        }
        Ok(())
    }
}

/// 通过 servod 设置 `<control>:<value>`
struct ServoSetExec;

#[async_trait]
impl Exec for ServoSetExec {
    async fn run(&self, info: &mut ExecInfo<'_>) -> anyhow::Result<()> {
        let args = info.action_args();
        let control = args.get_string("control", "");
        let value = args.get_string("value", "");
        let Some(servod) = info.resource().servod() else {
            bail!("resource {} has no servo", info.resource().name());
        };
        servod
            .set(&control, Value::from(value))
            .await
            .with_context(|| format!("servo set {control}"))?;
        Ok(())
    }
}

fn registry() -> (ExecRegistry, Arc<AtomicUsize>) {
    let mut registry = ExecRegistry::with_builtins();
    registry.register("cros_ssh", SshExec);
    registry.register("servo_set", ServoSetExec);
    let closing_calls = Arc::new(AtomicUsize::new(0));
    let counter = closing_calls.clone();
    registry.register_fn("close_logs", move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    (registry, closing_calls)
}

const REPAIR_CONFIG: &str = r#"{
  "plans": [
    {
      "name": "dut",
      "critical_actions": ["dut_ssh", "board_known"],
      "actions": [
        {
          "name": "dut_ssh",
          "docs": ["Device is reachable over SSH."],
          "exec_name": "cros_ssh",
          "exec_args": ["cmd:true"],
          "exec_timeout_secs": 2,
          "conditions": ["has_servo"],
          "recoveries": ["servo_reset"]
        },
        {
          "name": "has_servo",
          "exec_name": "scope_has",
          "exec_args": ["servo_host"],
          "run_control": "run_once"
        },
        {
          "name": "servo_reset",
          "exec_name": "servo_set",
          "exec_args": ["control:power_state", "value:reset"],
          "run_control": "always_run"
        },
        {
          "name": "board_known",
          "exec_name": "scope_has",
          "exec_args": ["board"]
        }
      ]
    },
    {
      "name": "Closing",
      "critical_actions": ["collect_logs"],
      "actions": [
        { "name": "collect_logs", "exec_name": "close_logs" }
      ]
    }
  ]
}"#;

fn params() -> Params {
    Params::from_pairs([("servo_host", "labstation1"), ("board", "octopus")])
}

#[tokio::test]
async fn test_json_configuration_recovers_unreachable_dut() {
    let (registry, closing_calls) = registry();
    let metrics = Arc::new(MemoryMetrics::new());
    let engine = RecoveryEngine::new(Arc::new(registry), metrics.clone(), EngineConfig::default());
    let cfg = Configuration::from_json(REPAIR_CONFIG).unwrap();
    let dut = FakeDut::new("chromeos6-row2-rack3-host4", false);

    let report = engine
        .run_configuration(dut.clone(), &cfg, RunOptions::new().with_params(params()))
        .await
        .unwrap();

    assert!(report.passed(), "{report:?}");
    assert_eq!(report.plans.len(), 2);
    assert_eq!(report.plans[1].name, "Closing");
    assert_eq!(dut.servo.resets.load(Ordering::SeqCst), 1);
    // 首次失败 + 恢复后重试
    assert_eq!(dut.commands.load(Ordering::SeqCst), 2);
    assert_eq!(closing_calls.load(Ordering::SeqCst), 1);

    let attempts = metrics.find(ObservationKind::ExecAttempt, "dut_ssh");
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[0].outcome, ActionResult::Fail(FailureKind::ExecFailed));
    assert!(attempts[0].tag("error").unwrap().contains("ssh to"));
    assert_eq!(attempts[1].outcome, ActionResult::Pass);
    assert_eq!(metrics.count(ObservationKind::Configuration, "chromeos6-row2-rack3-host4"), 1);
}

#[tokio::test]
async fn test_missing_servo_param_skips_ssh_and_fails_on_board() {
    let (registry, closing_calls) = registry();
    let engine = RecoveryEngine::new(
        Arc::new(registry),
        Arc::new(MemoryMetrics::new()),
        EngineConfig::default(),
    );
    let cfg = Configuration::from_json(REPAIR_CONFIG).unwrap();
    let dut = FakeDut::new("chromeos6-row2-rack3-host5", false);

    let report = engine
        .run_configuration(dut.clone(), &cfg, RunOptions::default())
        .await
        .unwrap();

    // 没有 servo_host：dut_ssh 被跳过（不算失败），board_known 失败，计划中止
    assert_eq!(dut.commands.load(Ordering::SeqCst), 0);
    assert!(report.aborted);
    assert_eq!(
        report.plan("dut").unwrap().status,
        PlanStatus::Fail {
            action: "board_known".to_string(),
            kind: FailureKind::ExecFailed,
        }
    );
    assert_eq!(closing_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_concurrent_runs_share_engine() {
    let (registry, closing_calls) = registry();
    let engine = Arc::new(RecoveryEngine::new(
        Arc::new(registry),
        Arc::new(MemoryMetrics::new()),
        EngineConfig::default(),
    ));
    let cfg = Arc::new(Configuration::from_json(REPAIR_CONFIG).unwrap());

    let mut handles = Vec::new();
    for i in 0..4 {
        let engine = engine.clone();
        let cfg = cfg.clone();
        handles.push(tokio::spawn(async move {
            let dut = FakeDut::new(&format!("host{i}"), i % 2 == 0);
            engine
                .run_configuration(dut, &cfg, RunOptions::new().with_params(params()))
                .await
        }));
    }
    for handle in handles {
        let report = handle.await.unwrap().unwrap();
        assert!(report.passed());
    }
    assert_eq!(closing_calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_action_tree_for_diagnostics() {
    let (registry, _) = registry();
    let engine = RecoveryEngine::new(
        Arc::new(registry),
        Arc::new(MemoryMetrics::new()),
        EngineConfig::default(),
    );
    let cfg = Configuration::from_json(REPAIR_CONFIG).unwrap();
    let graph = engine.validate(&cfg).unwrap();

    let tree = graph.tree("dut", "dut_ssh").unwrap();
    let rendered = tree.to_string();
    assert!(rendered.starts_with("dut_ssh (cros_ssh)"));
    assert!(rendered.contains("C: has_servo (scope_has)"));
    assert!(rendered.contains("R: servo_reset (servo_set)"));

    let json = serde_json::to_value(&tree).unwrap();
    assert_eq!(json["recoveries"][0]["condition_only"], true);
}

struct Collect(Arc<MemoryMetrics>);

#[async_trait]
impl MetricsBackend for Collect {
    async fn record(&self, observation: Observation) -> anyhow::Result<()> {
        self.0.observe(observation);
        Ok(())
    }
}

#[tokio::test]
async fn test_channel_metrics_forward_run_observations() {
    let (registry, _) = registry();
    let store = Arc::new(MemoryMetrics::new());
    let (metrics, forwarder) = ChannelMetrics::spawn(256, Arc::new(Collect(store.clone())));
    let engine = RecoveryEngine::new(Arc::new(registry), Arc::new(metrics), EngineConfig::default());
    let cfg = Configuration::from_json(REPAIR_CONFIG).unwrap();

    engine
        .run_configuration(
            FakeDut::new("host-metrics", true),
            &cfg,
            RunOptions::new().with_params(params()),
        )
        .await
        .unwrap();
    // 引擎持有最后一个发送端，drop 后转发任务排空通道并退出
    drop(engine);
    forwarder.await.unwrap();

    assert_eq!(store.count(ObservationKind::Plan, "dut"), 1);
    assert_eq!(store.count(ObservationKind::Plan, "Closing"), 1);
    assert_eq!(store.count(ObservationKind::Configuration, "host-metrics"), 1);
    assert!(store
        .observations()
        .iter()
        .all(|o| o.tag("run_id").is_some()));
}

#[test]
fn test_validation_rejects_unregistered_execs() {
    let engine = RecoveryEngine::new(
        Arc::new(ExecRegistry::new()),
        Arc::new(MemoryMetrics::new()),
        EngineConfig::default(),
    );
    let cfg = Configuration::from_json(REPAIR_CONFIG).unwrap();
    let err = engine.validate(&cfg).unwrap_err();
    assert_eq!(err.to_string(), "Unknown exec: cros_ssh");
}
