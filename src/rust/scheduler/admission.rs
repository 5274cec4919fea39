// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::{
    runtime::fail::Fail,
    scheduler::{
        queue::Level,
        scheduler::Scheduler,
        task::TaskHandle,
        tcb::ControlBlock,
        tid::Tid,
    },
};
use ::std::sync::Arc;

//======================================================================================================================
// Associate Functions
//======================================================================================================================

/// Admission
impl Scheduler {
    /// Admits a task at the tail of [Level::Q0]. The task is started the first time the dispatch loop selects it.
    ///
    /// When called from a scheduled task, that task becomes the parent of the new one.
    pub fn admit(&self, task: TaskHandle) -> Result<Arc<ControlBlock>, Fail> {
        let parent: Option<Tid> = self.get_own_control_block().map(|cb| cb.get_tid());
        let tid: Tid = match self.lock_tids().alloc() {
            Ok(tid) => tid,
            Err(e) => {
                warn!("admit(): rejected task {:?} ({:?})", task.get_name(), e);
                return Err(e);
            },
        };

        let cb: Arc<ControlBlock> = Arc::new(ControlBlock::new(task, tid, parent));
        self.queues.push_back(Level::Q0, cb.clone());
        self.ring_doorbell();
        debug!(
            "admit(): name={:?}, tid={:?}, parent={:?}",
            cb.get_task().get_name(),
            tid,
            parent
        );
        Ok(cb)
    }

    /// Flags the caller's task as terminated. The dispatch loop removes it and reclaims its identifier the next time
    /// it reaches it.
    pub fn request_termination(&self) -> Result<(), Fail> {
        match self.get_own_control_block() {
            Some(cb) => {
                if cb.set_terminated() {
                    debug!("request_termination(): tid={:?}", cb.get_tid());
                }
                Ok(())
            },
            None => {
                let cause: &str = "caller is not a scheduled task";
                debug!("request_termination(): {}", cause);
                Err(Fail::new(libc::ESRCH, cause))
            },
        }
    }

    /// Control block of the calling task, if the caller is a task that is still queued.
    pub fn get_own_control_block(&self) -> Option<Arc<ControlBlock>> {
        self.queues
            .find(|cb| cb.get_task().is_current())
            .map(|(_, cb)| cb)
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
