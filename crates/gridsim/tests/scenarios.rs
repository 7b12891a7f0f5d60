use std::sync::Arc;

use rstest::rstest;

use gridsim::config::SimulationConfig;
use gridsim::log::LogEntry;
use gridsim::progress::RecordingProgress;
use gridsim::scheduler::PolicyKind;
use gridsim::simulation::Simulation;
use gridsim::task::{MessageKind, Task, TaskState};
use gridsim::topology::{CenterId, Topology, TopologyBuilder};
use gridsim::SimulationResult;

const EPS: f64 = 1e-9;

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < EPS
}

struct Grid {
    topology: Topology,
    master: CenterId,
}

fn single_link(link_latency: f64, update_interval: Option<f64>, policy: PolicyKind) -> Grid {
    let mut builder = TopologyBuilder::new();
    let master = builder.add_master("master", 100., policy, update_interval);
    let link = builder.add_link("link", 10., 0., link_latency);
    let machine = builder.add_machine("machine", 50., 1, 0.);
    builder.connect_both(master, link);
    builder.connect_both(link, machine);
    builder.add_slave(master, machine);
    Grid {
        topology: builder.build().unwrap(),
        master,
    }
}

// master - switch - {machine0 .. machineN}
fn star(machines: &[(f64, u32)], policy: PolicyKind, update_interval: Option<f64>) -> Grid {
    let mut builder = TopologyBuilder::new();
    let master = builder.add_master("master", 100., policy, update_interval);
    let switch = builder.add_switch("switch", 100., 0., 0.001);
    builder.connect_both(master, switch);
    for (i, (power, cores)) in machines.iter().enumerate() {
        let machine = builder.add_machine(&format!("machine{}", i), *power, *cores, 0.);
        builder.connect_both(switch, machine);
        builder.add_slave(master, machine);
    }
    Grid {
        topology: builder.build().unwrap(),
        master,
    }
}

fn run(grid: &Grid, tasks: Vec<Task>, threads: usize) -> (Simulation, SimulationResult) {
    let config = SimulationConfig::default().with_threads(threads).with_trace(true);
    let progress = Arc::new(RecordingProgress::new());
    let mut sim = Simulation::with_progress(grid.topology.clone(), tasks, config, progress).unwrap();
    let result = sim.simulate().unwrap();
    (sim, result)
}

fn assert_hops_consumed(result: &SimulationResult) {
    for task in result.completed_tasks() {
        assert!(task.path().is_empty(), "task {} has hops left", task.key());
        assert_eq!(task.hops_traversed(), task.hops_planned(), "task {}", task.key());
    }
}

#[rstest]
fn three_tasks_over_single_link(#[values(1, 2, 4)] threads: usize) {
    let grid = single_link(0., None, PolicyKind::RoundRobin);
    let tasks = (0..3)
        .map(|i| Task::new(i, "user", grid.master, i as f64, 5., 2., 0.))
        .collect();
    let (sim, result) = run(&grid, tasks, threads);

    assert_eq!(result.completed, 3);
    assert_eq!(result.completed_tasks().count(), 3);
    assert!(close(result.final_time, 2.3), "final time {}", result.final_time);
    assert!(close(sim.current_time(None).unwrap(), result.final_time));

    let link = result.center("link").unwrap();
    assert_eq!(link.services, 6);
    assert!(close(link.units, 6.));
    assert!(close(link.busy_seconds, 3. * 0.2));

    let machine = result.center("machine").unwrap();
    assert_eq!(machine.services, 3);
    assert!(close(machine.units, 15.));
    assert!(close(machine.busy_seconds, 0.3));
    assert_eq!(machine.cancelled, 0);

    for task in result.completed_tasks() {
        assert_eq!(task.hops_planned(), 4);
        assert!(close(task.processing_time(), 0.1));
        assert!(close(task.communication_time(), 0.2));
    }
    assert_hops_consumed(&result);
}

#[rstest]
#[case(0.)]
#[case(0.05)]
fn link_transmits_send_and_result_sizes(#[case] latency: f64) {
    let grid = single_link(latency, None, PolicyKind::RoundRobin);
    let tasks: Vec<_> = (0..10)
        .map(|i| Task::new(i, "user", grid.master, i as f64 * 0.5, 10., 1. + i as f64, 0.5))
        .collect();
    let expected_units: f64 = (0..10).map(|i| 1. + i as f64 + 0.5).sum();
    let (_, result) = run(&grid, tasks, 2);

    let link = result.center("link").unwrap();
    assert_eq!(link.services, 20);
    assert!(close(link.units, expected_units));
    assert!(close(link.busy_seconds, expected_units / 10. + 20. * latency));
    assert_hops_consumed(&result);
}

#[rstest]
fn clocks_never_pass_last_event(#[values(1, 3)] threads: usize) {
    let grid = star(&[(10., 1), (20., 2), (40., 1)], PolicyKind::Workqueue, None);
    let tasks = (0..40)
        .map(|i| Task::new(i, "user", grid.master, (i / 4) as f64, 20. + i as f64, 1., 1.))
        .collect();
    let (sim, result) = run(&grid, tasks, threads);

    assert_eq!(result.completed, 40);
    for center in &result.centers {
        assert!(center.clock <= result.final_time);
        let id = grid.topology.find(&center.name);
        assert!(close(center.clock, sim.current_time(id).unwrap()));
    }
    let last_completion = result
        .completed_tasks()
        .filter_map(|t| t.completed_at())
        .fold(0., f64::max);
    assert!(last_completion <= result.final_time);
    assert_hops_consumed(&result);
}

#[rstest]
#[case(PolicyKind::RoundRobin)]
#[case(PolicyKind::Workqueue)]
#[case(PolicyKind::LoadBased)]
#[case(PolicyKind::Wqr { replicas: 1 })]
fn every_policy_completes_workload(#[case] policy: PolicyKind, #[values(1, 4)] threads: usize) {
    let grid = star(&[(10., 1), (25., 1), (50., 2)], policy, None);
    let tasks = (0..30)
        .map(|i| Task::new(i, "user", grid.master, i as f64 * 0.3, 50., 2., 1.))
        .collect();
    let (_, result) = run(&grid, tasks, threads);

    assert_eq!(result.completed, 30);
    let mut families: Vec<_> = result.completed_tasks().map(|t| t.family()).collect();
    families.dedup();
    assert_eq!(families, (0..30).collect::<Vec<_>>());
    assert_hops_consumed(&result);

    let processed: u64 = result
        .centers
        .iter()
        .filter(|c| c.name.starts_with("machine"))
        .map(|c| c.services)
        .sum();
    assert!(processed >= 30);
    if !matches!(policy, PolicyKind::Wqr { .. }) {
        assert_eq!(processed, 30);
        assert_eq!(result.tasks.len(), 30);
    }
}

#[test]
fn round_robin_spreads_tasks_evenly() {
    let grid = star(&[(10., 1), (10., 1), (10., 1)], PolicyKind::RoundRobin, None);
    let tasks = (0..9)
        .map(|i| Task::new(i, "user", grid.master, 0., 10., 1., 1.))
        .collect();
    let (_, result) = run(&grid, tasks, 2);
    for i in 0..3 {
        assert_eq!(result.center(&format!("machine{}", i)).unwrap().services, 3);
    }
}

#[rstest]
fn dynamic_ticks_precede_later_arrival(#[values(1, 2, 4)] threads: usize) {
    let grid = star(&[(10., 1), (20., 1)], PolicyKind::LoadBased, Some(10.));
    let tasks = vec![Task::new(0, "user", grid.master, 25., 5., 2., 0.)];
    let (sim, result) = run(&grid, tasks, threads);
    assert_eq!(result.completed, 1);

    // entries of the master, in the order it produced them
    let trace = sim.trace();
    let master: Vec<_> = trace
        .iter()
        .filter(|e| match e {
            LogEntry::SchedulerTick { .. } | LogEntry::TaskSubmitted { .. } => true,
            LogEntry::MessageSent { src, .. } => src == "master",
            _ => false,
        })
        .collect();
    assert_eq!(master.len(), 7, "{:?}", master);
    for (i, tick) in [10., 20.].into_iter().enumerate() {
        let at = 3 * i;
        assert!(matches!(master[at], LogEntry::SchedulerTick { time, .. } if *time == tick));
        let mut targets: Vec<_> = master[at + 1..at + 3]
            .iter()
            .map(|e| match e {
                LogEntry::MessageSent {
                    time,
                    kind: MessageKind::Update,
                    dst,
                    ..
                } if *time == tick => dst.as_str(),
                other => panic!("expected update at {}, got {:?}", tick, other),
            })
            .collect();
        targets.sort();
        assert_eq!(targets, vec!["machine0", "machine1"]);
    }
    assert!(matches!(master[6], LogEntry::TaskSubmitted { time, .. } if *time == 25.));

    // every update is answered
    let received = |kind: MessageKind| {
        trace
            .iter()
            .filter(|e| matches!(e, LogEntry::MessageReceived { kind: k, .. } if *k == kind))
            .count()
    };
    assert_eq!(received(MessageKind::Update), 4);
    assert_eq!(received(MessageKind::UpdateResult), 4);
}

#[test]
fn static_master_never_ticks() {
    let grid = single_link(0., None, PolicyKind::LoadBased);
    let tasks = vec![Task::new(0, "user", grid.master, 25., 5., 2., 0.)];
    let (sim, _) = run(&grid, tasks, 2);
    assert!(!sim
        .trace()
        .iter()
        .any(|e| matches!(e, LogEntry::SchedulerTick { .. } | LogEntry::MessageSent { .. })));
}

#[rstest]
fn replication_completes_each_task_once(#[values(1, 2, 4)] threads: usize) {
    // the slow machine gets the original, the fast one a replica
    let grid = star(&[(10., 1), (100., 1)], PolicyKind::Wqr { replicas: 1 }, None);
    let tasks = vec![Task::new(0, "user", grid.master, 0., 100., 1., 0.)];
    let (sim, result) = run(&grid, tasks, threads);

    assert_eq!(result.completed, 1);
    assert_eq!(result.tasks.len(), 2);
    assert_eq!(result.completed_tasks().count(), 1);
    let other = result
        .tasks
        .iter()
        .find(|t| t.state() != TaskState::Completed)
        .unwrap();
    assert!(matches!(other.state(), TaskState::Cancelled | TaskState::Processed));

    let trace = sim.trace();
    let scheduled = trace
        .iter()
        .filter(|e| matches!(e, LogEntry::TaskScheduled { .. }))
        .count();
    assert_eq!(scheduled, 2);
    let retracted = trace
        .iter()
        .filter(|e| matches!(e, LogEntry::TaskCancelled { .. } | LogEntry::CopyDiscarded { .. }))
        .count();
    assert_eq!(retracted, 1);

    let machines: Vec<_> = result
        .centers
        .iter()
        .filter(|c| c.name.starts_with("machine"))
        .collect();
    let finished: u64 = machines.iter().map(|c| c.services + c.cancelled).sum();
    assert_eq!(finished, 2);
}

#[test]
fn machine_cores_serve_in_parallel() {
    let grid = star(&[(10., 2)], PolicyKind::Workqueue, None);
    let tasks = (0..4)
        .map(|i| Task::new(i, "user", grid.master, 0., 10., 0., 0.))
        .collect();
    let (_, result) = run(&grid, tasks, 2);

    let machine = result.center("machine0").unwrap();
    assert_eq!(machine.services, 4);
    assert!(close(machine.busy_seconds, 4.));
    // two waves of one second each, plus the switch latency there and back
    assert!(result.final_time < 2.1, "final time {}", result.final_time);
}
