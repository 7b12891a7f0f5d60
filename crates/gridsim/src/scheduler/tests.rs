use rstest::rstest;

use crate::task::{Task, TaskKey};
use crate::topology::CenterId;

use super::{LoadBased, PolicyKind, RoundRobin, SchedulingPolicy, SlaveStatus, Workqueue};

fn slaves(count: usize) -> Vec<SlaveStatus> {
    (0..count)
        .map(|i| SlaveStatus::new(CenterId(i + 1), &format!("machine{}", i), 10., 1))
        .collect()
}

fn task(id: u64, size: f64) -> Task {
    Task::new(id, "user", CenterId(0), 0., size, 1., 1.)
}

#[test]
fn round_robin_cycles() {
    let slaves = slaves(3);
    let mut policy = RoundRobin::new();
    let picks: Vec<_> = (0..7).map(|i| policy.select(&task(i, 1.), &slaves).unwrap()).collect();
    assert_eq!(picks, vec![0, 1, 2, 0, 1, 2, 0]);
}

#[test]
fn round_robin_without_slaves_waits() {
    let mut policy = RoundRobin::new();
    assert_eq!(policy.select(&task(0, 1.), &[]), None);
}

#[test]
fn workqueue_waits_when_saturated() {
    let mut slaves = slaves(2);
    let mut policy = Workqueue::new();

    let first = policy.select(&task(0, 1.), &slaves).unwrap();
    slaves[first].outstanding.insert(TaskKey { id: 0, copy: 0 });
    let second = policy.select(&task(1, 1.), &slaves).unwrap();
    slaves[second].outstanding.insert(TaskKey { id: 1, copy: 0 });
    assert_ne!(first, second);
    assert_eq!(policy.select(&task(2, 1.), &slaves), None);

    slaves[first].outstanding.clear();
    assert_eq!(policy.select(&task(2, 1.), &slaves), Some(first));
}

#[test]
fn load_based_prefers_fastest_finish() {
    let mut slaves = slaves(3);
    slaves[0].estimated_work = 50.;
    slaves[1].power = 40.;
    slaves[1].estimated_work = 100.;
    slaves[2].estimated_work = 30.;

    let mut policy = LoadBased::new();
    // (100 + 20) / 40 = 3 beats (30 + 20) / 10 = 5
    assert_eq!(policy.select(&task(0, 20.), &slaves), Some(1));

    slaves[1].estimated_work = 400.;
    assert_eq!(policy.select(&task(1, 20.), &slaves), Some(2));
}

#[rstest]
#[case(PolicyKind::RoundRobin, "round robin", 0)]
#[case(PolicyKind::Workqueue, "workqueue", 0)]
#[case(PolicyKind::LoadBased, "load based", 0)]
#[case(PolicyKind::Wqr { replicas: 2 }, "workqueue with replication", 2)]
fn policy_kind_builds_policy(#[case] kind: PolicyKind, #[case] name: &str, #[case] replicas: u32) {
    let policy = kind.build();
    assert_eq!(policy.name(), name);
    assert_eq!(policy.replicas(), replicas);
}

#[test]
fn policy_kind_from_json() {
    let kind: PolicyKind = serde_json::from_str(r#"{"type": "wqr", "replicas": 1}"#).unwrap();
    assert_eq!(kind, PolicyKind::Wqr { replicas: 1 });
    let kind: PolicyKind = serde_json::from_str(r#"{"type": "load_based"}"#).unwrap();
    assert_eq!(kind, PolicyKind::LoadBased);
}

#[test]
fn holds_family_ignores_copy_number() {
    let mut slave = SlaveStatus::new(CenterId(1), "machine", 10., 2);
    slave.outstanding.insert(TaskKey { id: 7, copy: 2 });
    assert!(slave.holds_family(7));
    assert!(!slave.holds_family(8));
    assert_eq!(slave.free_cores(), 1);
}
