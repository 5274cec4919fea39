// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use ::anyhow::Result;
use ::crossbeam_channel::{
    Receiver,
    Sender,
};
use ::mlfq::{
    Config,
    SharedScheduler,
    ThreadTask,
    Tid,
    Yielder,
};
use ::std::{
    sync::{
        atomic::{
            AtomicUsize,
            Ordering,
        },
        Arc,
    },
    thread,
    time::{
        Duration,
        Instant,
    },
};

//======================================================================================================================
// Constants
//======================================================================================================================

const TIME_SLICE: Duration = Duration::from_millis(20);
const TIMEOUT: Duration = Duration::from_secs(10);

//======================================================================================================================
// Helpers
//======================================================================================================================

/// Creates a scheduler and starts its dispatch loop.
fn start_scheduler(capacity: usize) -> Result<SharedScheduler> {
    let scheduler: SharedScheduler = SharedScheduler::new(Config::new(TIME_SLICE, capacity)?);
    scheduler.start()?;
    Ok(scheduler)
}

/// Task that yields `rounds` times, requests termination, and reports its name on `done`.
fn worker(scheduler: &SharedScheduler, name: &str, rounds: usize, done: Sender<String>) -> Arc<ThreadTask> {
    let scheduler: SharedScheduler = scheduler.clone();
    let me: String = name.to_string();
    Arc::new(ThreadTask::new(name, move |yielder: Yielder| {
        for _ in 0..rounds {
            if yielder.yield_now().is_err() {
                return;
            }
            thread::sleep(Duration::from_millis(1));
        }
        if let Err(e) = scheduler.request_termination() {
            eprintln!("worker {}: request_termination() failed ({:?})", me, e);
        }
        let _ = done.send(me);
    }))
}

/// Waits for every name in `expected` to be reported, in any order.
fn wait_for_completions(rx: &Receiver<String>, expected: &[&str]) -> Result<()> {
    let mut pending: Vec<String> = expected.iter().map(|s| s.to_string()).collect();
    while !pending.is_empty() {
        match rx.recv_timeout(TIMEOUT) {
            Ok(name) => match pending.iter().position(|p| *p == name) {
                Some(i) => {
                    pending.swap_remove(i);
                },
                None => anyhow::bail!("unexpected completion (name={:?})", name),
            },
            Err(_) => anyhow::bail!("tasks did not finish (pending={:?})", pending),
        }
    }
    Ok(())
}

/// Waits until every admitted task was reaped.
fn wait_until_drained(scheduler: &SharedScheduler) -> Result<()> {
    let deadline: Instant = Instant::now() + TIMEOUT;
    while scheduler.live_count() != 0 {
        if Instant::now() > deadline {
            anyhow::bail!("tasks were not reaped (queues={:?})", scheduler.queue_lengths());
        }
        thread::sleep(Duration::from_millis(5));
    }
    Ok(())
}

//======================================================================================================================
// Tests
//======================================================================================================================

/// Runs a single task to completion.
#[test]
fn single_task_runs_to_completion() -> Result<()> {
    let scheduler: SharedScheduler = start_scheduler(8)?;
    let (tx, rx): (Sender<String>, Receiver<String>) = crossbeam_channel::unbounded();

    scheduler.admit(worker(&scheduler, "solo", 50, tx))?;

    wait_for_completions(&rx, &["solo"])?;
    wait_until_drained(&scheduler)?;
    mlfq::ensure_eq!(scheduler.queue_lengths(), [0, 0, 0]);
    Ok(())
}

/// Runs several tasks of different lengths and checks that all of them finish.
#[test]
fn mixed_workload_completes() -> Result<()> {
    let scheduler: SharedScheduler = start_scheduler(16)?;
    let (tx, rx): (Sender<String>, Receiver<String>) = crossbeam_channel::unbounded();

    let names: Vec<String> = (0..6).map(|i| format!("task-{}", i)).collect();
    for (i, name) in names.iter().enumerate() {
        scheduler.admit(worker(&scheduler, name, 10 + 40 * i, tx.clone()))?;
    }

    let expected: Vec<&str> = names.iter().map(|s| s.as_str()).collect();
    wait_for_completions(&rx, &expected)?;
    wait_until_drained(&scheduler)?;
    Ok(())
}

/// At most one task makes progress between two checkpoints at any time.
#[test]
fn only_one_task_progresses_at_a_time() -> Result<()> {
    const NUM_TASKS: usize = 3;
    const ROUNDS: usize = 15;
    let scheduler: SharedScheduler = start_scheduler(8)?;
    let (tx, rx): (Sender<String>, Receiver<String>) = crossbeam_channel::unbounded();
    let running: Arc<AtomicUsize> = Arc::new(AtomicUsize::new(0));
    let peak: Arc<AtomicUsize> = Arc::new(AtomicUsize::new(0));

    let names: Vec<String> = (0..NUM_TASKS).map(|i| format!("busy-{}", i)).collect();
    for name in names.iter() {
        let inner: SharedScheduler = scheduler.clone();
        let running: Arc<AtomicUsize> = running.clone();
        let peak: Arc<AtomicUsize> = peak.clone();
        let done: Sender<String> = tx.clone();
        let me: String = name.clone();
        scheduler.admit(Arc::new(ThreadTask::new(name, move |yielder: Yielder| {
            for _ in 0..ROUNDS {
                if yielder.yield_now().is_err() {
                    return;
                }
                let now: usize = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(7));
                running.fetch_sub(1, Ordering::SeqCst);
            }
            let _ = inner.request_termination();
            let _ = done.send(me);
        })))?;
    }

    let expected: Vec<&str> = names.iter().map(|s| s.as_str()).collect();
    wait_for_completions(&rx, &expected)?;
    wait_until_drained(&scheduler)?;
    mlfq::ensure_eq!(peak.load(Ordering::SeqCst), 1);
    Ok(())
}

/// A short task admitted while a long one runs still finishes first.
#[test]
fn short_task_overtakes_long_task() -> Result<()> {
    let scheduler: SharedScheduler = start_scheduler(8)?;
    let (tx, rx): (Sender<String>, Receiver<String>) = crossbeam_channel::unbounded();

    scheduler.admit(worker(&scheduler, "long", 2000, tx.clone()))?;
    // Let the long task sink below the highest level.
    thread::sleep(TIME_SLICE * 4);
    scheduler.admit(worker(&scheduler, "short", 1, tx))?;

    match rx.recv_timeout(TIMEOUT) {
        Ok(name) => mlfq::ensure_eq!(name.as_str(), "short"),
        Err(_) => anyhow::bail!("no task finished"),
    }
    wait_for_completions(&rx, &["long"])?;
    wait_until_drained(&scheduler)?;
    Ok(())
}

/// A task that admits another one becomes its parent.
#[test]
fn task_admitted_by_task_records_parent() -> Result<()> {
    let scheduler: SharedScheduler = start_scheduler(8)?;
    let (tx, rx): (Sender<String>, Receiver<String>) = crossbeam_channel::unbounded();
    let (ids_tx, ids_rx): (Sender<(Tid, Option<Tid>)>, Receiver<(Tid, Option<Tid>)>) = crossbeam_channel::bounded(1);

    let child_done: Sender<String> = tx.clone();
    let inner: SharedScheduler = scheduler.clone();
    let parent: Arc<ThreadTask> = Arc::new(ThreadTask::new("parent", move |_| {
        let me: Option<Tid> = inner.get_own_control_block().map(|cb| cb.get_tid());
        if let (Some(me), Ok(child)) = (me, inner.admit(worker(&inner, "child", 5, child_done))) {
            let _ = ids_tx.send((me, child.get_parent()));
        }
        let _ = inner.request_termination();
        let _ = tx.send("parent".to_string());
    }));
    scheduler.admit(parent)?;

    match ids_rx.recv_timeout(TIMEOUT) {
        Ok((me, parent)) => mlfq::ensure_eq!(parent, Some(me)),
        Err(_) => anyhow::bail!("parent did not admit its child"),
    }
    wait_for_completions(&rx, &["parent", "child"])?;
    wait_until_drained(&scheduler)?;
    Ok(())
}

/// Only scheduled tasks may request their own termination.
#[test]
fn request_termination_outside_task_fails() -> Result<()> {
    let scheduler: SharedScheduler = start_scheduler(8)?;
    match scheduler.request_termination() {
        Ok(()) => anyhow::bail!("request_termination() should fail outside a task"),
        Err(e) => mlfq::ensure_eq!(e.errno, libc::ESRCH),
    }
    Ok(())
}

/// A task that panics is reaped and does not stop the dispatch loop.
#[test]
fn panicking_task_is_reaped() -> Result<()> {
    let scheduler: SharedScheduler = start_scheduler(8)?;
    let (tx, rx): (Sender<String>, Receiver<String>) = crossbeam_channel::unbounded();

    let faulty: Arc<ThreadTask> = Arc::new(ThreadTask::new("faulty", |_| panic!("task failure")));
    scheduler.admit(faulty.clone())?;
    let deadline: Instant = Instant::now() + TIMEOUT;
    while !faulty.has_exited() {
        if Instant::now() > deadline {
            anyhow::bail!("faulty task was never started");
        }
        thread::sleep(Duration::from_millis(5));
    }
    match faulty.join() {
        Ok(()) => anyhow::bail!("join() should report the panic"),
        Err(e) => mlfq::ensure_eq!(e.errno, libc::EIO),
    }

    scheduler.admit(worker(&scheduler, "survivor", 5, tx))?;
    wait_for_completions(&rx, &["survivor"])?;
    wait_until_drained(&scheduler)?;
    Ok(())
}

/// Identifiers are handed out again once their tasks were reaped.
#[test]
fn capacity_is_reclaimed_after_reaping() -> Result<()> {
    const CAPACITY: usize = 2;
    let scheduler: SharedScheduler = start_scheduler(CAPACITY)?;
    let (tx, rx): (Sender<String>, Receiver<String>) = crossbeam_channel::unbounded();

    for round in 0..3 {
        // Tasks hold on to their identifiers until the gate opens.
        let (gate_tx, gate_rx): (Sender<()>, Receiver<()>) = crossbeam_channel::unbounded();
        let names: Vec<String> = (0..CAPACITY).map(|i| format!("r{}-t{}", round, i)).collect();
        for name in names.iter() {
            let inner: SharedScheduler = scheduler.clone();
            let gate: Receiver<()> = gate_rx.clone();
            let done: Sender<String> = tx.clone();
            let me: String = name.clone();
            scheduler.admit(Arc::new(ThreadTask::new(name, move |_| {
                let _ = gate.recv_timeout(TIMEOUT);
                let _ = inner.request_termination();
                let _ = done.send(me);
            })))?;
        }

        match scheduler.admit(worker(&scheduler, "overflow", 1, tx.clone())) {
            Ok(cb) => anyhow::bail!("admit() should be rejected (tid={:?})", cb.get_tid()),
            Err(e) => mlfq::ensure_eq!(e.errno, libc::EAGAIN),
        }
        mlfq::ensure_eq!(scheduler.live_count(), CAPACITY);

        for _ in 0..CAPACITY {
            gate_tx.send(())?;
        }
        let expected: Vec<&str> = names.iter().map(|s| s.as_str()).collect();
        wait_for_completions(&rx, &expected)?;
        wait_until_drained(&scheduler)?;
    }
    Ok(())
}
