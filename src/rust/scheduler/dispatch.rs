// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::scheduler::{
    queue::Level,
    scheduler::Scheduler,
    tcb::ControlBlock,
    tid::{
        Tid,
        TidPool,
    },
};
use ::std::{
    sync::{
        Arc,
        MutexGuard,
    },
    time::Duration,
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// What the dispatch loop is doing, re-evaluated after every iteration.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DispatchState {
    Idle,
    RunningQ0,
    RunningQ1,
    RunningQ2,
}

/// Outcome of one dispatch loop iteration.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Dispatch {
    /// All queues were empty.
    Idle,
    /// The head of `level` had terminated. It was removed and its identifier released.
    Reaped { tid: Tid, level: Level },
    /// The head of `level` ran. `next` is where it went afterwards, or `None` if it ended during the slice and was
    /// left in place.
    Ran { tid: Tid, level: Level, next: Option<Level> },
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

/// Dispatch Loop
impl Scheduler {
    /// Current state, by strict priority of the non-empty queues.
    pub fn state(&self) -> DispatchState {
        DispatchState::from(self.queues.first_non_empty())
    }

    /// Runs the dispatch loop forever. Blocks while there is nothing to run.
    pub fn run(&self) -> ! {
        loop {
            if self.dispatch_once() == Dispatch::Idle {
                self.wait_for_work();
            }
        }
    }

    /// Runs one iteration of the dispatch loop on the highest non-empty level.
    pub fn dispatch_once(&self) -> Dispatch {
        match self.queues.first_non_empty() {
            Some(level) => self.run_level(level),
            None => Dispatch::Idle,
        }
    }

    /// Serves the head of `level`: reaps it if it terminated, otherwise runs it for the level's slice and demotes it.
    fn run_level(&self, level: Level) -> Dispatch {
        let cb: Arc<ControlBlock> = match self.queues.front(level) {
            Some(cb) => cb,
            None => return Dispatch::Idle,
        };

        if cb.is_terminated() || cb.has_exited_on_its_own() {
            return self.reap(level, &cb);
        }

        self.controller.run_slice(&cb, self.controller.half_slice());

        if self.queues.any_non_empty(level.higher()) {
            self.run_higher(level, &cb);
        }

        let remainder: Duration = self.controller.remainder(level);
        if !remainder.is_zero() && cb.get_task().is_alive() {
            self.controller.keep_running(remainder);
        }

        let next: Level = level.demoted();
        let demoted: bool = self.controller.pause_and_demote(&self.queues, level, next, &cb);
        Dispatch::Ran {
            tid: cb.get_tid(),
            level,
            next: if demoted { Some(next) } else { None },
        }
    }

    /// Hands the CPU from the head of `level` to one head of each higher level, then gives it back.
    fn run_higher(&self, level: Level, cb: &Arc<ControlBlock>) {
        if !self.controller.interrupt(cb) {
            return;
        }
        for higher in level.higher() {
            let outcome: Dispatch = self.run_level(*higher);
            trace!("run_higher(): tid={:?} interrupted by {:?}", cb.get_tid(), outcome);
        }
        self.controller.resume_interrupted(cb);
    }

    /// Removes a finished control block from its own level and releases its identifier.
    fn reap(&self, level: Level, cb: &Arc<ControlBlock>) -> Dispatch {
        let tid: Tid = cb.get_tid();
        if cb.set_terminated() {
            warn!(
                "reap(): task {:?} (tid={:?}) ended without requesting termination",
                cb.get_task().get_name(),
                tid
            );
        }

        let removed: bool = self.queues.remove(level, cb);
        debug_assert!(removed, "tid {} vanished from {}", tid, level);

        let mut tids: MutexGuard<TidPool> = self.lock_tids();
        let freed: bool = match tids.free(tid) {
            Ok(()) => true,
            Err(e) => {
                error!("reap(): failed to release tid={:?} ({:?})", tid, e);
                false
            },
        };
        debug_assert!(freed, "tid {} was reaped twice", tid);

        debug!("reap(): tid={:?}, level={}", tid, level);
        if tids.is_empty() {
            debug!("reap(): no tasks left");
        }
        Dispatch::Reaped { tid, level }
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl From<Option<Level>> for DispatchState {
    fn from(level: Option<Level>) -> Self {
        match level {
            None => DispatchState::Idle,
            Some(Level::Q0) => DispatchState::RunningQ0,
            Some(Level::Q1) => DispatchState::RunningQ1,
            Some(Level::Q2) => DispatchState::RunningQ2,
        }
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
