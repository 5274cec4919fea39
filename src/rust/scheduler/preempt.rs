// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::scheduler::{
    queue::{
        FeedbackQueues,
        Level,
    },
    task::TaskHandle,
    tcb::ControlBlock,
};
use ::std::{
    sync::Arc,
    thread,
    time::Duration,
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// Preemption Controller
///
/// Grants CPU time in half-slices. The scheduler sleeps while the selected task runs. A task is always paused before
/// the next one starts or resumes, and [crate::Task::pause] returns only once the task stopped, so at most one task
/// makes progress at a time.
pub struct PreemptionController {
    time_slice: Duration,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl PreemptionController {
    pub fn new(time_slice: Duration) -> Self {
        Self { time_slice }
    }

    /// Base quantum.
    pub fn time_slice(&self) -> Duration {
        self.time_slice
    }

    /// Unit of CPU time after which higher-priority arrivals are checked.
    pub fn half_slice(&self) -> Duration {
        self.time_slice / 2
    }

    /// Time a task at `level` keeps running after its first half-slice, unless interrupted in between.
    pub fn remainder(&self, level: Level) -> Duration {
        match level {
            Level::Q0 => Duration::ZERO,
            Level::Q1 => self.half_slice(),
            // The lowest level pays a full slice of penalty on top of the second half.
            Level::Q2 => self.time_slice + self.half_slice(),
        }
    }

    /// Starts the task if it never ran, resumes it otherwise, and waits for `duration` while it runs.
    pub fn run_slice(&self, cb: &ControlBlock, duration: Duration) {
        let task: &TaskHandle = cb.get_task();
        if cb.begin_slice() {
            trace!("run_slice(): start tid={:?}, name={:?}", cb.get_tid(), task.get_name());
            task.start();
        } else {
            trace!("run_slice(): resume tid={:?}, name={:?}", cb.get_tid(), task.get_name());
            task.resume();
        }
        Self::wait(duration);
    }

    /// Lets the task that is already running keep the CPU for `duration`.
    pub fn keep_running(&self, duration: Duration) {
        Self::wait(duration);
    }

    /// Pauses a running task so that higher-priority work can use the CPU. Returns `false` if the task already
    /// ended, in which case there is nothing to hand over from.
    pub fn interrupt(&self, cb: &ControlBlock) -> bool {
        let task: &TaskHandle = cb.get_task();
        if !task.is_alive() {
            return false;
        }
        trace!("interrupt(): tid={:?}", cb.get_tid());
        task.pause();
        true
    }

    /// Gives the CPU back to a task after [PreemptionController::interrupt].
    pub fn resume_interrupted(&self, cb: &ControlBlock) {
        trace!("resume_interrupted(): tid={:?}", cb.get_tid());
        cb.get_task().resume();
    }

    /// Pauses the task and moves its control block from `from` to the tail of `to`. If the task already ended the
    /// block stays where it is, for the dispatch loop to reap. Returns whether the block moved.
    pub fn pause_and_demote(&self, queues: &FeedbackQueues, from: Level, to: Level, cb: &Arc<ControlBlock>) -> bool {
        let task: &TaskHandle = cb.get_task();
        if !task.is_alive() {
            trace!("pause_and_demote(): tid={:?} already ended", cb.get_tid());
            return false;
        }
        task.pause();
        if !queues.move_to_back(from, to, cb) {
            warn!("pause_and_demote(): tid={:?} is not queued in {}", cb.get_tid(), from);
            return false;
        }
        trace!("pause_and_demote(): tid={:?}, {} -> {}", cb.get_tid(), from, to);
        true
    }

    fn wait(duration: Duration) {
        if !duration.is_zero() {
            thread::sleep(duration);
        }
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
