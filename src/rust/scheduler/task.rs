// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use ::std::sync::Arc;

//======================================================================================================================
// Traits
//======================================================================================================================

/// Execution primitive driven by the scheduler.
///
/// The scheduler assumes nothing about how a task runs beyond these capabilities. Every method must tolerate being
/// called on a task that has already finished on its own: task completion and scheduler bookkeeping race, so such
/// calls are no-ops rather than errors.
pub trait Task: Send + Sync {
    /// Name used in log records.
    fn get_name(&self) -> String;

    /// Runs the task for the first time.
    fn start(&self);

    /// Lets a paused task make progress again.
    fn resume(&self);

    /// Stops the task from making progress until the next [Task::resume]. Does not return while the task can still
    /// make progress, so the scheduler may hand the CPU to another task right after.
    fn pause(&self);

    /// Asserts whether the task has started and not yet finished.
    fn is_alive(&self) -> bool;

    /// Asserts whether the caller is running on this task's thread of control.
    fn is_current(&self) -> bool;
}

//======================================================================================================================
// Types
//======================================================================================================================

/// Shared reference to a task. The caller that created the task keeps its own copy.
pub type TaskHandle = Arc<dyn Task>;
