use crate::scheduler::PolicyKind;
use crate::topology::{CenterKind, TopologyBuilder};

use super::{build_center, Communication, Machine, Master, Metrics};

#[test]
fn transmission_time_accounts_for_occupancy_and_latency() {
    let link = Communication::new(CenterKind::Link, 10., 0., 0.);
    assert!((link.transmission_time(2.) - 0.2).abs() < 1e-12);

    let busy = Communication::new(CenterKind::Internet, 10., 0.5, 0.3);
    assert!((busy.transmission_time(2.) - 0.7).abs() < 1e-12);
    assert_eq!(busy.kind(), CenterKind::Internet);
}

#[test]
fn idle_machine_reports_no_load() {
    let machine = Machine::new(50., 2, 0.2);
    assert!((machine.rate() - 40.).abs() < 1e-12);
    let load = machine.snapshot(3.);
    assert_eq!(load.time, 3.);
    assert_eq!(load.waiting, 0);
    assert_eq!(load.running, 0);
    assert_eq!(load.remaining_work, 0.);
}

#[test]
fn metrics_accumulate() {
    let mut metrics = Metrics::default();
    metrics.record_service(2., 0.2);
    metrics.record_service(3., 0.3);
    assert_eq!(metrics.services, 2);
    assert!((metrics.units - 5.).abs() < 1e-12);
    assert!((metrics.busy_seconds - 0.5).abs() < 1e-12);
    assert_eq!(metrics.cancelled, 0);
}

#[test]
fn centers_are_built_from_topology() {
    let mut builder = TopologyBuilder::new();
    let master = builder.add_master("master", 100., PolicyKind::LoadBased, Some(5.));
    let switch = builder.add_switch("switch", 100., 0., 0.01);
    let machine = builder.add_machine("machine", 40., 4, 0.25);
    builder.connect_both(master, switch);
    builder.connect_both(switch, machine);
    builder.add_slave(master, machine);
    let topology = builder.build().unwrap();

    let mut center = build_center(&topology, master);
    assert_eq!(center.update_interval(), Some(5.));
    assert!(!center.has_pending_work());
    let master = center.downcast_mut::<Master>().unwrap();
    assert_eq!(master.policy_name(), "load based");
    assert_eq!(master.power(), 100.);
    master.expect_tasks(2);
    assert!(center.has_pending_work());

    let master = center.downcast_ref::<Master>().unwrap();
    let slaves = master.slaves();
    assert_eq!(slaves.len(), 1);
    assert_eq!(slaves[0].name, "machine");
    assert_eq!(slaves[0].cores, 4);
    assert!((slaves[0].power - 30.).abs() < 1e-12);

    let center = build_center(&topology, switch);
    assert!(center.is::<Communication>());
    assert_eq!(center.update_interval(), None);
    assert_eq!(center.load(), 0);

    let mut center = build_center(&topology, machine);
    assert!(center.downcast_ref::<Machine>().is_some());
    assert!(center.take_tasks().is_empty());
}
