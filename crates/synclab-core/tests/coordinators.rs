//! Cross-thread behaviour of the coordinators, under every strategy.

use crossbeam_channel::{bounded, Receiver};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use synclab_core::problems::dining::DiningPolicy;
use synclab_core::problems::{BufferCoordinator, ChargingStation, TableCoordinator};
use synclab_core::{ActorId, Admission, CancelToken, NullSink, Outcome, StateSink, StrategyKind};

const POLL: Duration = Duration::from_millis(1);
const WATCHDOG: Duration = Duration::from_secs(10);

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn null_sink() -> Arc<dyn StateSink> {
    Arc::new(NullSink)
}

/// Runs `body` on its own thread and hands back a receiver for its result.
fn watched<T, F>(body: F) -> Receiver<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = bounded(1);
    thread::spawn(move || {
        let _ = tx.send(body());
    });
    rx
}

fn wait_until(what: &str, mut done: impl FnMut() -> bool) {
    let deadline = Instant::now() + WATCHDOG;
    while !done() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        thread::sleep(Duration::from_millis(2));
    }
}

#[test]
fn produce_raises_level_by_one_step() {
    init_logger();
    for strategy in StrategyKind::ALL {
        let buffer = BufferCoordinator::with_level(strategy, 50, POLL, null_sink());
        let cancel = CancelToken::new();
        let outcome = buffer.produce(ActorId::Producer(0), &cancel).unwrap();
        assert_eq!(outcome, Outcome::Done(60), "{}", strategy);
        assert_eq!(buffer.level(), 60);
    }
}

#[test]
fn consumer_on_empty_buffer_waits_for_a_producer() {
    init_logger();
    for strategy in StrategyKind::ALL {
        let buffer = Arc::new(BufferCoordinator::new(strategy, POLL, null_sink()));
        let consumer = {
            let buffer = Arc::clone(&buffer);
            watched(move || buffer.consume(ActorId::Consumer(0), &CancelToken::new()))
        };

        thread::sleep(Duration::from_millis(50));
        assert!(consumer.try_recv().is_err(), "{} consumed from an empty buffer", strategy);

        let produced = buffer.produce(ActorId::Producer(0), &CancelToken::new()).unwrap();
        assert_eq!(produced, Outcome::Done(10));

        let consumed = consumer
            .recv_timeout(WATCHDOG)
            .unwrap_or_else(|_| panic!("{} consumer never woke", strategy))
            .unwrap();
        assert_eq!(consumed, Outcome::Done(0));
        assert_eq!(buffer.level(), 0);
    }
}

#[test]
fn cancelled_consumer_returns_without_consuming() {
    init_logger();
    for strategy in StrategyKind::ALL {
        let buffer = Arc::new(BufferCoordinator::new(strategy, POLL, null_sink()));
        let cancel = CancelToken::new();
        let consumer = {
            let buffer = Arc::clone(&buffer);
            let cancel = cancel.clone();
            watched(move || buffer.consume(ActorId::Consumer(0), &cancel))
        };

        thread::sleep(Duration::from_millis(20));
        cancel.cancel();
        buffer.interrupt();

        let outcome = consumer.recv_timeout(WATCHDOG).unwrap().unwrap();
        assert!(outcome.is_cancelled(), "{}", strategy);
        assert_eq!(buffer.stats().consumed, 0);
        assert!(!buffer.is_faulted());
    }
}

#[test]
fn thousand_meals_with_ordered_forks() {
    init_logger();
    let table = Arc::new(TableCoordinator::with_policy(
        StrategyKind::Lock,
        DiningPolicy::ResourceOrdering,
        5,
        POLL,
        POLL,
        null_sink(),
    ));
    assert_eq!(table.fork_order(4), (0, 4));
    assert_eq!(table.fork_order(0), (0, 1));

    let done: Vec<_> = (0..5)
        .map(|seat| {
            let table = Arc::clone(&table);
            watched(move || {
                let cancel = CancelToken::new();
                for _ in 0..200 {
                    assert_eq!(table.pick_up(seat, &cancel)?, Outcome::Done(()));
                    table.put_down(seat)?;
                }
                Ok::<_, synclab_core::CoordinatorError>(())
            })
        })
        .collect();

    for rx in done {
        rx.recv_timeout(Duration::from_secs(60))
            .expect("philosophers deadlocked")
            .unwrap();
    }
    let stats = table.stats();
    assert_eq!(stats.meals.iter().sum::<u64>(), 1000);
    assert!(stats.eating.is_empty());
    assert!(!table.is_faulted());
}

#[test]
fn every_policy_keeps_the_table_moving() {
    init_logger();
    let policies = [
        DiningPolicy::ResourceOrdering,
        DiningPolicy::Waiter,
        DiningPolicy::StateTest,
    ];
    for strategy in StrategyKind::ALL {
        for policy in policies {
            let table = Arc::new(TableCoordinator::with_policy(
                strategy,
                policy,
                5,
                POLL,
                POLL,
                null_sink(),
            ));
            let done: Vec<_> = (0..5)
                .map(|seat| {
                    let table = Arc::clone(&table);
                    watched(move || {
                        let cancel = CancelToken::new();
                        for _ in 0..20 {
                            assert!(!table.pick_up(seat, &cancel)?.is_cancelled());
                            table.put_down(seat)?;
                        }
                        Ok::<_, synclab_core::CoordinatorError>(())
                    })
                })
                .collect();
            for rx in done {
                rx.recv_timeout(Duration::from_secs(30))
                    .unwrap_or_else(|_| panic!("{} / {:?} stalled", strategy, policy))
                    .unwrap();
            }
            assert!(table.stats().meals.iter().all(|&m| m == 20));
        }
    }
}

#[test]
fn critical_drone_jumps_the_queue() {
    init_logger();
    for strategy in StrategyKind::ALL {
        let station = Arc::new(ChargingStation::new(strategy, 1, None, POLL, null_sink()));
        let cancel = CancelToken::new();
        assert_eq!(
            station.request_recharge(1, false, &cancel).unwrap(),
            Outcome::Done(Admission::Admitted)
        );

        let (tx, admitted) = crossbeam_channel::unbounded();
        let spawn_drone = |drone: u32, critical: bool| {
            let station = Arc::clone(&station);
            let tx = tx.clone();
            thread::spawn(move || {
                let outcome = station.request_recharge(drone, critical, &CancelToken::new());
                let _ = tx.send((drone, outcome.map_err(|e| e.to_string())));
            })
        };

        spawn_drone(2, false);
        wait_until("normal drone to queue", || station.stats().normal_waiting == 1);
        spawn_drone(3, true);
        wait_until("critical drone to queue", || station.stats().critical_waiting == 1);

        station.release_bay(1).unwrap();
        let (first, outcome) = admitted.recv_timeout(WATCHDOG).unwrap();
        assert_eq!(first, 3, "{} served the normal drone first", strategy);
        assert_eq!(outcome, Ok(Outcome::Done(Admission::Admitted)));
        assert!(admitted.try_recv().is_err());

        station.release_bay(3).unwrap();
        let (second, _) = admitted.recv_timeout(WATCHDOG).unwrap();
        assert_eq!(second, 2);
        station.release_bay(2).unwrap();
        assert_eq!(station.stats().free_bays, 1);
    }
}

#[test]
fn no_drone_charges_without_power() {
    init_logger();
    let station = Arc::new(ChargingStation::new(
        StrategyKind::ConditionMonitor,
        2,
        None,
        POLL,
        null_sink(),
    ));
    station.set_power(false).unwrap();
    let drone = {
        let station = Arc::clone(&station);
        watched(move || station.request_recharge(7, true, &CancelToken::new()))
    };

    thread::sleep(Duration::from_millis(50));
    assert!(drone.try_recv().is_err());
    assert_eq!(station.stats().free_bays, 2);

    station.set_power(true).unwrap();
    let outcome = drone.recv_timeout(WATCHDOG).unwrap().unwrap();
    assert_eq!(outcome, Outcome::Done(Admission::Admitted));
}
