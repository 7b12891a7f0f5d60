use std::error::Error;
use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, ValueEnum};
use colored::Colorize;
use env_logger::Builder;
use log::LevelFilter;

use gridsim::config::{ModelConfig, SimulationConfig};
use gridsim::report::SimulationResult;
use gridsim::simulation::Simulation;
use gridsim::topology::RoutingMetric;

/// Route cost used by the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Routing {
    /// Every hop costs the same.
    Hops,
    /// A hop costs the latency of the communication center it enters.
    Latency,
}

impl From<Routing> for RoutingMetric {
    fn from(routing: Routing) -> Self {
        match routing {
            Routing::Hops => RoutingMetric::Hops,
            Routing::Latency => RoutingMetric::Latency,
        }
    }
}

/// Runs a grid simulation described by a JSON model.
#[derive(Parser, Debug)]
#[clap(about, long_about = None)]
struct Args {
    /// Model file with topology and workload.
    #[clap(long, short)]
    model: PathBuf,

    /// Number of worker threads, all available cores by default.
    #[clap(long, short)]
    threads: Option<usize>,

    /// Route cost.
    #[clap(long, value_enum, default_value_t = Routing::Hops)]
    routing: Routing,

    /// Write the event trace to this file as JSON lines.
    #[clap(long)]
    log_file: Option<PathBuf>,

    /// Write the simulation result to this file as JSON.
    #[clap(long)]
    report: Option<PathBuf>,

    /// Seed of generated workloads.
    #[clap(long, default_value_t = 123)]
    seed: u64,

    /// Increase verbosity, twice prints the event trace.
    #[clap(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let args = Args::parse();

    let level = match args.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    Builder::new()
        .filter_level(level)
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .init();

    if let Err(e) = run(&args) {
        log::error!("{}", e.to_string().red());
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn Error>> {
    let mut config = SimulationConfig::default()
        .with_routing(args.routing.into())
        .with_seed(args.seed);
    if let Some(threads) = args.threads {
        config = config.with_threads(threads);
    }
    if let Some(path) = &args.log_file {
        config = config.with_log_file(path);
    }

    let model = ModelConfig::from_file(&args.model)?;
    let (topology, tasks) = model.build(config.seed)?;
    log::info!(
        "{} centers, {} tasks, {} threads",
        topology.len(),
        tasks.len(),
        config.threads
    );

    let mut sim = Simulation::new(topology, tasks, config)?;
    let started = Instant::now();
    let result = sim.simulate()?;
    log::info!("Finished in {:.2?}", started.elapsed());

    print_report(&result);
    if let Some(path) = &args.report {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(file, &result)?;
    }
    Ok(())
}

fn print_report(result: &SimulationResult) {
    println!();
    println!(
        "{:<16} {:<9} {:>12} {:>12} {:>9} {:>9} {:>8}",
        "center".bold(),
        "kind".bold(),
        "units".bold(),
        "busy".bold(),
        "services".bold(),
        "cancelled".bold(),
        "util".bold()
    );
    for center in &result.centers {
        let utilization = center.utilization(result.final_time);
        let util = format!("{:>7.1}%", utilization * 100.);
        let util = if utilization > 0.9 {
            util.red()
        } else if utilization > 0.5 {
            util.yellow()
        } else {
            util.green()
        };
        println!(
            "{:<16} {:<9} {:>12.3} {:>12.3} {:>9} {:>9} {}",
            center.name,
            center.kind.to_string(),
            center.units,
            center.busy_seconds,
            center.services,
            center.cancelled,
            util
        );
    }
    println!();
    println!("{} {:.3}", "Simulated time:".bold(), result.final_time);
    println!("{} {}", "Completed tasks:".bold(), result.completed);
    if let Some(turnaround) = result.mean_turnaround() {
        println!("{} {:.3}", "Mean turnaround:".bold(), turnaround);
    }
}
