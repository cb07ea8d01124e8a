//! Full runs through the controller with real actor threads.

use std::sync::Arc;
use std::thread;
use std::time::Duration;
use synclab_core::{
    ActorCounts, ChannelSink, Controller, LabConfig, Notification, ProblemKind, ResourceGraph,
    StateSink, StrategyKind, Tee,
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn small_counts() -> ActorCounts {
    ActorCounts {
        producers: 2,
        consumers: 2,
        customers: 4,
        readers: 3,
        writers: 2,
        drones: 5,
    }
}

#[test]
fn every_problem_runs_under_every_strategy() {
    init_logger();
    let counts = small_counts();
    for problem in ProblemKind::ALL {
        for strategy in StrategyKind::ALL {
            let (sink, rx) = ChannelSink::new();
            let mut controller = Controller::new(LabConfig::fast(), Arc::new(sink));
            let coordinator = controller.start(problem, strategy, &counts).unwrap();
            assert_eq!(coordinator.problem(), problem);
            assert_eq!(coordinator.strategy(), strategy);

            thread::sleep(Duration::from_millis(150));
            let shutdown = controller.cancel_all();

            assert_eq!(shutdown.panicked, 0, "{} / {}", problem, strategy);
            assert_eq!(controller.running_actors(), 0);
            assert!(!coordinator.is_faulted(), "{} / {} faulted", problem, strategy);

            let notes: Vec<Notification> = rx.try_iter().collect();
            let arrived = notes
                .iter()
                .filter(|n| matches!(n, Notification::Arrived(_)))
                .count();
            let departed = notes
                .iter()
                .filter(|n| matches!(n, Notification::Departed(_)))
                .count();
            assert_eq!(arrived, shutdown.stopped);
            assert_eq!(departed, shutdown.stopped);
            assert!(!notes
                .iter()
                .any(|n| matches!(n, Notification::InvariantViolation(..))));
        }
    }
}

#[test]
fn buffer_levels_stay_on_step_boundaries() {
    init_logger();
    let (sink, rx) = ChannelSink::new();
    let mut controller = Controller::new(LabConfig::fast(), Arc::new(sink));
    controller
        .start(
            ProblemKind::BoundedBuffer,
            StrategyKind::Semaphore,
            &small_counts(),
        )
        .unwrap();
    thread::sleep(Duration::from_millis(200));
    controller.cancel_all();

    let levels: Vec<u32> = rx
        .try_iter()
        .filter_map(|n| match n {
            Notification::ResourceLevel(_, level) => Some(level),
            _ => None,
        })
        .collect();
    assert!(!levels.is_empty());
    assert!(levels.iter().all(|level| level % 10 == 0 && *level <= 100));
}

#[test]
fn graph_empties_once_actors_depart() {
    init_logger();
    let graph = Arc::new(ResourceGraph::new());
    let sink = Tee::default().with(Arc::clone(&graph) as Arc<dyn StateSink>);
    let mut controller = Controller::new(LabConfig::fast(), Arc::new(sink));
    controller
        .start(
            ProblemKind::DiningPhilosophers,
            StrategyKind::ConditionMonitor,
            &ActorCounts::default(),
        )
        .unwrap();

    thread::sleep(Duration::from_millis(150));
    let running = graph.snapshot();
    assert!(!running.actors.is_empty());
    assert!(running.resources.keys().all(|r| matches!(r, synclab_core::ResourceId::Fork(_))));

    controller.cancel_all();
    let stopped = graph.snapshot();
    assert!(stopped.actors.is_empty());
    assert!(stopped.edges.is_empty());
    assert!(stopped.find_cycle().is_none());
}

#[test]
fn switching_problems_replaces_the_actors() {
    init_logger();
    let mut controller = Controller::new(LabConfig::fast(), Arc::new(synclab_core::NullSink));
    controller
        .start(ProblemKind::Smokers, StrategyKind::IntrinsicMonitor, &small_counts())
        .unwrap();
    assert_eq!(controller.running_actors(), 4);

    let barber = controller
        .start(ProblemKind::SleepingBarber, StrategyKind::Lock, &small_counts())
        .unwrap();
    assert_eq!(barber.problem(), ProblemKind::SleepingBarber);
    assert_eq!(controller.running_actors(), 5);

    thread::sleep(Duration::from_millis(100));
    let shutdown = controller.cancel_all();
    assert_eq!(shutdown.stopped, 5);
    assert!(!barber.is_faulted());
}
