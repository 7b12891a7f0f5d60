use std::sync::Arc;

use gridsim::config::{ModelConfig, SimulationConfig, TopologyConfig};
use gridsim::progress::{RecordingProgress, Tone};
use gridsim::scheduler::PolicyKind;
use gridsim::simulation::Simulation;
use gridsim::task::Task;
use gridsim::topology::{CenterKind, TopologyBuilder};
use gridsim::workload::WorkloadConfig;
use gridsim::{ConfigError, SimulationError};

const MODEL: &str = r#"{
    "topology": {
        "centers": [
            {"type": "master", "name": "master", "power": 100, "policy": {"type": "workqueue"},
             "slaves": ["fast", "slow"]},
            {"type": "switch", "name": "lan", "bandwidth": 100, "latency": 0.001},
            {"type": "machine", "name": "fast", "power": 80, "cores": 2},
            {"type": "machine", "name": "slow", "power": 20, "occupancy": 0.5}
        ],
        "connections": [
            {"from": "master", "to": "lan", "bidirectional": true},
            {"from": "lan", "to": "fast", "bidirectional": true},
            {"from": "lan", "to": "slow", "bidirectional": true}
        ]
    },
    "workload": [
        {"type": "tasks", "master": "master", "user": "alice", "tasks": [
            {"arrival": 0, "processing": 40, "send": 2, "result": 1},
            {"arrival": 1, "processing": 20, "send": 1}
        ]},
        {"type": "random", "master": "master", "user": "bob", "count": 20,
         "interarrival": {"type": "exponential", "mean": 0.5},
         "processing": {"type": "uniform", "min": 10, "max": 60},
         "send": {"type": "constant", "value": 1},
         "result": {"type": "constant", "value": 0.5}}
    ]
}"#;

fn recording() -> Arc<RecordingProgress> {
    Arc::new(RecordingProgress::new())
}

#[test]
fn json_model_runs_to_completion() {
    let model = ModelConfig::from_json(MODEL).unwrap();
    assert_eq!(model.workload.len(), 22);
    let (topology, tasks) = model.build(7).unwrap();
    assert_eq!(topology.kind(topology.find("lan").unwrap()), CenterKind::Switch);
    assert_eq!(tasks.len(), 22);
    assert_eq!(tasks.iter().map(|t| t.family()).collect::<Vec<_>>(), (0..22).collect::<Vec<_>>());
    assert_eq!(tasks[0].user(), "alice");
    assert_eq!(tasks[2].user(), "bob");
    assert!(tasks[2..].iter().all(|t| (10. ..=60.).contains(&t.processing_size())));

    let progress = recording();
    let mut sim =
        Simulation::with_progress(topology, tasks, SimulationConfig::default().with_threads(2), progress.clone()).unwrap();
    let result = sim.simulate().unwrap();
    assert_eq!(result.completed, 22);
    assert!(result.mean_turnaround().unwrap() > 0.);
    assert_eq!(progress.percent(), 100);
    let serialized = serde_json::to_value(&result).unwrap();
    assert_eq!(serialized["completed"], 22);
    assert_eq!(serialized["centers"][1]["kind"], "switch");
}

#[test]
fn generated_workload_depends_only_on_seed() {
    let model = ModelConfig::from_json(MODEL).unwrap();
    let (_, first) = model.build(42).unwrap();
    let (_, second) = model.build(42).unwrap();
    let (_, other) = model.build(43).unwrap();
    let sizes = |tasks: &[Task]| tasks.iter().map(|t| t.processing_size()).collect::<Vec<_>>();
    assert_eq!(sizes(&first), sizes(&second));
    assert_ne!(sizes(&first), sizes(&other));
}

#[test]
fn unknown_slave_name_is_rejected() {
    let json = r#"{"centers": [{"type": "master", "name": "m", "power": 1, "slaves": ["ghost"]}]}"#;
    let config: TopologyConfig = serde_json::from_str(json).unwrap();
    assert!(matches!(config.build(), Err(ConfigError::UnknownCenter(name)) if name == "ghost"));
}

#[test]
fn malformed_model_is_a_parse_error() {
    assert!(matches!(ModelConfig::from_json("{\"topology\": 3}"), Err(ConfigError::Parse(_))));
}

#[test]
fn missing_model_file_is_an_io_error() {
    let path = std::env::temp_dir().join("gridsim-no-such-model.json");
    assert!(matches!(ModelConfig::from_file(&path), Err(ConfigError::Io(_))));
}

#[test]
fn model_without_masters_is_rejected() {
    let mut builder = TopologyBuilder::new();
    builder.add_machine("machine", 10., 1, 0.);
    let topology = builder.build().unwrap();
    let tasks = vec![Task::new(0, "user", topology.find("machine").unwrap(), 0., 1., 1., 1.)];
    let err = Simulation::with_progress(topology, tasks, SimulationConfig::default(), recording()).err();
    assert!(matches!(err, Some(ConfigError::NoMasters)));
}

#[test]
fn empty_workload_is_rejected() {
    let mut builder = TopologyBuilder::new();
    builder.add_master("master", 10., PolicyKind::RoundRobin, None);
    let topology = builder.build().unwrap();
    let err = Simulation::with_progress(topology, vec![], SimulationConfig::default(), recording()).err();
    assert!(matches!(err, Some(ConfigError::EmptyWorkload)));
}

#[test]
fn tasks_must_start_at_a_master() {
    let mut builder = TopologyBuilder::new();
    let master = builder.add_master("master", 10., PolicyKind::RoundRobin, None);
    let machine = builder.add_machine("machine", 10., 1, 0.);
    builder.connect_both(master, machine);
    builder.add_slave(master, machine);
    let topology = builder.build().unwrap();
    let tasks = vec![Task::new(5, "user", machine, 0., 1., 1., 1.)];
    let err = Simulation::with_progress(topology, tasks, SimulationConfig::default(), recording()).err();
    assert!(matches!(err, Some(ConfigError::InvalidOrigin { task: 5, ref center }) if center == "machine"));
}

#[test]
fn master_with_tasks_needs_slaves() {
    let mut builder = TopologyBuilder::new();
    let master = builder.add_master("master", 10., PolicyKind::RoundRobin, None);
    let topology = builder.build().unwrap();
    let tasks = vec![Task::new(0, "user", master, 0., 1., 1., 1.)];
    let progress = recording();
    let err = Simulation::with_progress(topology, tasks, SimulationConfig::default(), progress.clone()).err();
    assert!(matches!(err, Some(ConfigError::NoSlaves(ref name)) if name == "master"));
    assert!(progress.contains("The model has no networks.", Tone::Warn));
    assert!(progress.contains("The model has no processing slaves.", Tone::Warn));
}

#[test]
fn unreachable_slave_fails_before_time_advances() {
    let mut builder = TopologyBuilder::new();
    let master = builder.add_master("master", 10., PolicyKind::RoundRobin, None);
    let link = builder.add_link("link", 10., 0., 0.);
    let machine = builder.add_machine("machine", 10., 1, 0.);
    builder.connect_both(master, link);
    builder.add_slave(master, machine);
    let topology = builder.build().unwrap();
    let tasks = vec![Task::new(0, "user", master, 3., 1., 1., 1.)];

    let mut sim = Simulation::with_progress(topology, tasks, SimulationConfig::default(), recording()).unwrap();
    let err = sim.simulate().unwrap_err();
    assert!(matches!(err, SimulationError::Config(ConfigError::NoRoute { .. })));
    assert_eq!(sim.current_time(None), Some(0.));
    assert_eq!(sim.pending_events(), 0);
}

#[test]
fn direct_connection_without_networks_still_runs() {
    let mut builder = TopologyBuilder::new();
    let master = builder.add_master("master", 10., PolicyKind::RoundRobin, None);
    let machine = builder.add_machine("machine", 10., 1, 0.);
    builder.connect_both(master, machine);
    builder.add_slave(master, machine);
    let topology = builder.build().unwrap();
    let tasks = vec![Task::new(0, "user", master, 0., 10., 1., 1.)];

    let progress = recording();
    let mut sim = Simulation::with_progress(topology, tasks, SimulationConfig::default(), progress.clone()).unwrap();
    let result = sim.simulate().unwrap();
    assert!(progress.contains("The model has no networks.", Tone::Warn));
    assert_eq!(result.completed, 1);
    assert!((result.final_time - 1.).abs() < 1e-9);
    assert_eq!(result.tasks[0].hops_planned(), 2);
}

#[test]
fn event_log_file_is_written() {
    let path = std::env::temp_dir().join(format!("gridsim-model-{}.jsonl", std::process::id()));
    let model = ModelConfig::from_json(MODEL).unwrap();
    let (topology, tasks) = model.build(1).unwrap();
    let config = SimulationConfig::default()
        .with_threads(2)
        .with_log_file(&path)
        .with_trace(true);
    let mut sim = Simulation::with_progress(topology, tasks, config, recording()).unwrap();
    sim.simulate().unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    let entries: Vec<serde_json::Value> = content.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
    assert_eq!(entries.len(), sim.trace().len());
    let completed = entries.iter().filter(|e| e.get("TaskCompleted").is_some()).count();
    assert_eq!(completed, 22);
}

#[test]
fn trace_is_kept_only_on_request() {
    let model = ModelConfig::from_json(MODEL).unwrap();
    let (topology, tasks) = model.build(3).unwrap();
    let config = SimulationConfig::default().with_threads(2);
    assert!(!config.trace);
    let mut sim = Simulation::with_progress(topology, tasks, config, recording()).unwrap();
    let result = sim.simulate().unwrap();
    assert_eq!(result.completed, 22);
    assert!(sim.trace().is_empty());
}

#[test]
fn random_group_cannot_start_before_zero() {
    let mut builder = TopologyBuilder::new();
    builder.add_master("master", 10., PolicyKind::RoundRobin, None);
    let topology = builder.build().unwrap();
    let json = r#"[{"type": "random", "master": "master", "count": 3, "start": -1,
        "interarrival": {"type": "constant", "value": 1},
        "processing": {"type": "constant", "value": 1},
        "send": {"type": "constant", "value": 1},
        "result": {"type": "constant", "value": 1}}]"#;
    let workload: WorkloadConfig = serde_json::from_str(json).unwrap();
    assert!(matches!(
        workload.build(&topology, 1),
        Err(ConfigError::InvalidParameter { ref center, .. }) if center == "master"
    ));
}
