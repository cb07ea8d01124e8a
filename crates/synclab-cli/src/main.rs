use clap::{Parser, Subcommand};
use log::info;
use std::error::Error;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use synclab_core::graph::EdgeKind;
use synclab_core::problems::readers_writers::Preference;
use synclab_core::{
    ActorCounts, Controller, LabConfig, LogSink, ProblemKind, ResourceGraph, StateSink,
    StrategyKind, Tee,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one problem under one synchronization strategy
    Run {
        /// Problem to run (see `list`)
        #[arg(long, short)]
        problem: ProblemKind,

        /// Strategy backing the coordinator (see `list`)
        #[arg(long, short)]
        strategy: StrategyKind,

        /// How long to let the actors run
        #[arg(long, default_value_t = 10)]
        seconds: u64,

        /// Factor applied to every actor delay (0.1 runs ten times faster)
        #[arg(long, default_value_t = 1.0)]
        scale: f64,

        /// Print the resource-allocation graph when the run ends
        #[arg(long)]
        graph: bool,

        /// Philosophers at the table
        #[arg(long)]
        seats: Option<usize>,

        /// Waiting-room chairs in the barber shop
        #[arg(long)]
        chairs: Option<usize>,

        /// Charging bays at the station
        #[arg(long)]
        bays: Option<usize>,

        /// Per-queue limit on waiting drones
        #[arg(long)]
        queue_limit: Option<usize>,

        /// Readers/writers preference (readers or writers)
        #[arg(long)]
        preference: Option<Preference>,

        #[arg(long)]
        producers: Option<u32>,

        #[arg(long)]
        consumers: Option<u32>,

        #[arg(long)]
        customers: Option<u32>,

        #[arg(long)]
        readers: Option<u32>,

        #[arg(long)]
        writers: Option<u32>,

        #[arg(long)]
        drones: Option<u32>,
    },
    /// List the available problems and strategies
    List,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::List => {
            println!("Problems:");
            for problem in ProblemKind::ALL {
                println!("  {}", problem);
            }
            println!("Strategies:");
            for strategy in StrategyKind::ALL {
                println!("  {}", strategy);
            }
        }
        Commands::Run {
            problem,
            strategy,
            seconds,
            scale,
            graph,
            seats,
            chairs,
            bays,
            queue_limit,
            preference,
            producers,
            consumers,
            customers,
            readers,
            writers,
            drones,
        } => {
            let defaults = LabConfig::default();
            let config = LabConfig {
                seats: seats.unwrap_or(defaults.seats),
                waiting_chairs: chairs.unwrap_or(defaults.waiting_chairs),
                bays: bays.unwrap_or(defaults.bays),
                drone_queue_limit: queue_limit.or(defaults.drone_queue_limit),
                preference: preference.unwrap_or(defaults.preference),
                timing: defaults.timing.scaled(scale),
                ..defaults
            };
            let base = ActorCounts::default();
            let counts = ActorCounts {
                producers: producers.unwrap_or(base.producers),
                consumers: consumers.unwrap_or(base.consumers),
                customers: customers.unwrap_or(base.customers),
                readers: readers.unwrap_or(base.readers),
                writers: writers.unwrap_or(base.writers),
                drones: drones.unwrap_or(base.drones),
            };

            let resource_graph = Arc::new(ResourceGraph::new());
            let mut sink = Tee::default().with(Arc::new(LogSink));
            if graph {
                sink = sink.with(Arc::clone(&resource_graph) as Arc<dyn StateSink>);
            }

            println!("Running {} under the {} strategy for {}s...", problem, strategy, seconds);
            let mut controller = Controller::new(config, Arc::new(sink));
            let coordinator = controller.start(problem, strategy, &counts)?;

            for _ in 0..seconds {
                thread::sleep(Duration::from_secs(1));
                info!("{}", coordinator.summary());
            }

            if graph {
                print_graph(&resource_graph);
            }

            let shutdown = controller.cancel_all();
            println!(
                "Stopped {} actors ({} panicked).",
                shutdown.stopped, shutdown.panicked
            );
            println!("{}: {}", problem, coordinator.summary());
            if coordinator.is_faulted() {
                println!("The coordinator is faulted: an invariant was violated.");
            }
        }
    }

    Ok(())
}

fn print_graph(graph: &ResourceGraph) {
    let snapshot = graph.snapshot();
    println!("Actors:");
    for (actor, state) in &snapshot.actors {
        match state {
            Some(state) => println!("  {} [{}]", actor, state),
            None => println!("  {}", actor),
        }
    }
    println!("Resources:");
    for (resource, level) in &snapshot.resources {
        match level {
            Some(level) => println!("  {} = {}", resource, level),
            None => println!("  {}", resource),
        }
    }
    println!("Edges:");
    for edge in &snapshot.edges {
        match edge.kind {
            EdgeKind::Request => println!("  {} -> {}", edge.actor, edge.resource),
            EdgeKind::Grant => println!("  {} -> {}", edge.resource, edge.actor),
        }
    }
    match snapshot.find_cycle() {
        Some(cycle) => println!("Cycle found: {:?}", cycle),
        None => println!("No cycle."),
    }
}
