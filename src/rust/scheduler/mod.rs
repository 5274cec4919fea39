// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

mod admission;
mod dispatch;
mod preempt;
mod queue;
#[allow(clippy::module_inception)]
mod scheduler;
mod task;
mod tcb;
mod thread;
mod tid;
mod yielder;


//======================================================================================================================
// Exports
//======================================================================================================================

pub use self::{
    dispatch::{
        Dispatch,
        DispatchState,
    },
    preempt::PreemptionController,
    queue::{
        FeedbackQueues,
        Level,
    },
    scheduler::{
        Scheduler,
        SharedScheduler,
    },
    task::{
        Task,
        TaskHandle,
    },
    tcb::ControlBlock,
    thread::ThreadTask,
    tid::{
        Tid,
        TidPool,
    },
    yielder::{
        Signal,
        Yielder,
    },
};
