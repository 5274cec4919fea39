// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::scheduler::{
    task::TaskHandle,
    tid::Tid,
};
use ::std::{
    fmt,
    sync::atomic::{
        AtomicBool,
        AtomicUsize,
        Ordering,
    },
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// Task Control Block
///
/// Scheduling metadata for one admitted task. The identifier and parent are fixed at admission. The termination flag
/// only ever goes from unset to set, and only the owning task sets it.
pub struct ControlBlock {
    task: TaskHandle,
    tid: Tid,
    /// Control block of the task that admitted this one. `None` when admission did not come from a scheduled task.
    parent: Option<Tid>,
    terminated: AtomicBool,
    started: AtomicBool,
    /// Number of slices granted so far.
    slices: AtomicUsize,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl ControlBlock {
    pub fn new(task: TaskHandle, tid: Tid, parent: Option<Tid>) -> Self {
        Self {
            task,
            tid,
            parent,
            terminated: AtomicBool::new(false),
            started: AtomicBool::new(false),
            slices: AtomicUsize::new(0),
        }
    }

    pub fn get_task(&self) -> &TaskHandle {
        &self.task
    }

    pub fn get_tid(&self) -> Tid {
        self.tid
    }

    pub fn get_parent(&self) -> Option<Tid> {
        self.parent
    }

    /// Flags the task as done. Returns `false` if it was already flagged.
    pub fn set_terminated(&self) -> bool {
        !self.terminated.swap(true, Ordering::AcqRel)
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }

    /// Asserts whether the scheduler has granted this task at least one slice.
    pub fn has_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Asserts whether the task ended without asking to be terminated, e.g. it returned or panicked.
    pub fn has_exited_on_its_own(&self) -> bool {
        self.has_started() && !self.is_terminated() && !self.task.is_alive()
    }

    /// Number of slices granted so far.
    pub fn slices(&self) -> usize {
        self.slices.load(Ordering::Acquire)
    }

    /// Records a granted slice. Returns `true` if this is the first one.
    pub(super) fn begin_slice(&self) -> bool {
        self.slices.fetch_add(1, Ordering::AcqRel);
        !self.started.swap(true, Ordering::AcqRel)
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl fmt::Debug for ControlBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlBlock")
            .field("name", &self.task.get_name())
            .field("tid", &self.tid)
            .field("parent", &self.parent)
            .field("terminated", &self.is_terminated())
            .field("slices", &self.slices())
            .finish()
    }
}
