// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Multi-level feedback queue scheduler.
//!
//! New tasks enter the highest level ([Level::Q0]). Every slice a task uses up without terminating moves it one
//! level down, until it reaches [Level::Q2], where it stays. Levels are served in strict priority order, and a task
//! running below [Level::Q0] is interrupted after half a slice if higher-priority work arrived meanwhile.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::{
    config::Config,
    runtime::{
        fail::Fail,
        limits::NUM_LEVELS,
        logging,
    },
    scheduler::{
        preempt::PreemptionController,
        queue::{
            FeedbackQueues,
            Level,
        },
        tid::{
            Tid,
            TidPool,
        },
    },
};
use ::crossbeam_channel::{
    Receiver,
    Sender,
};
use ::std::{
    ops::Deref,
    sync::{
        Arc,
        Mutex,
        MutexGuard,
        PoisonError,
    },
    thread::{
        self,
        JoinHandle,
    },
};

//======================================================================================================================
// Constants
//======================================================================================================================

/// Name of the thread that runs the dispatch loop.
const DISPATCH_THREAD_NAME: &str = "mlfq-dispatch";

//======================================================================================================================
// Structures
//======================================================================================================================

/// Task Scheduler
pub struct Scheduler {
    config: Config,
    /// Identifier pool.
    pub(super) tids: Mutex<TidPool>,
    /// Run queues, one per level.
    pub(super) queues: FeedbackQueues,
    pub(super) controller: PreemptionController,
    /// Rung on admission so that an idle dispatch loop wakes up.
    doorbell: Sender<()>,
    doorbell_rx: Receiver<()>,
}

/// Scheduler shared between the dispatch thread and the tasks it runs.
#[derive(Clone)]
pub struct SharedScheduler(Arc<Scheduler>);

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl Scheduler {
    pub fn new(config: Config) -> Self {
        let (doorbell, doorbell_rx): (Sender<()>, Receiver<()>) = crossbeam_channel::bounded(1);
        Self {
            tids: Mutex::new(TidPool::new(config.max_threads())),
            queues: FeedbackQueues::default(),
            controller: PreemptionController::new(config.time_slice()),
            config,
            doorbell,
            doorbell_rx,
        }
    }

    pub fn get_config(&self) -> &Config {
        &self.config
    }

    /// Maximum number of tasks that may be admitted at once.
    pub fn capacity(&self) -> usize {
        self.lock_tids().capacity()
    }

    /// Number of identifiers currently in use, i.e. admitted tasks that were not reaped yet.
    pub fn live_count(&self) -> usize {
        self.lock_tids().len()
    }

    /// Level whose queue holds `tid`, if any.
    pub fn locate(&self, tid: Tid) -> Option<Level> {
        self.queues.find(|cb| cb.get_tid() == tid).map(|(level, _)| level)
    }

    /// Identifiers queued in `level`, head first.
    pub fn queued(&self, level: Level) -> Vec<Tid> {
        self.queues.tids(level)
    }

    /// Number of control blocks in each level, highest first.
    pub fn queue_lengths(&self) -> [usize; NUM_LEVELS] {
        Level::ALL.map(|level| self.queues.len(level))
    }

    pub(super) fn lock_tids(&self) -> MutexGuard<TidPool> {
        self.tids.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(super) fn ring_doorbell(&self) {
        // A full doorbell already has a wake-up pending.
        let _ = self.doorbell.try_send(());
    }

    /// Blocks until something was admitted since the last wake-up.
    pub(super) fn wait_for_work(&self) {
        if self.doorbell_rx.recv().is_err() {
            // Unreachable while `self` holds the sender.
            error!("wait_for_work(): doorbell disconnected");
        }
    }
}

impl SharedScheduler {
    pub fn new(config: Config) -> Self {
        logging::initialize();
        Self(Arc::new(Scheduler::new(config)))
    }

    /// Spawns the dispatch loop on its own thread. The loop runs for the lifetime of the process.
    pub fn start(&self) -> Result<JoinHandle<()>, Fail> {
        let scheduler: SharedScheduler = self.clone();
        let handle: JoinHandle<()> = thread::Builder::new()
            .name(DISPATCH_THREAD_NAME.to_string())
            .spawn(move || {
                scheduler.run();
            })?;
        info!(
            "start(): dispatch loop running (time_slice={:?}, capacity={:?})",
            self.config.time_slice(),
            self.config.max_threads()
        );
        Ok(handle)
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl Default for Scheduler {
    /// Creates a scheduler with default values.
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Default for SharedScheduler {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Deref for SharedScheduler {
    type Target = Scheduler;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
