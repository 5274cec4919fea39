// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::fail::Fail;
use ::crossbeam_channel::{
    Receiver,
    Sender,
    TryRecvError,
};
use ::std::cell::Cell;

//======================================================================================================================
// Structures
//======================================================================================================================

/// Control signals sent from the scheduler to a task.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Signal {
    /// Your turn: make progress.
    Resume,
    /// Stop at the next checkpoint.
    Pause,
}

/// Yielder lets a single task cooperate with the scheduler. The task calls [Yielder::yield_now] at points where it
/// is safe to stop; if the scheduler has paused it, the call blocks until the task is resumed.
///
/// Every [Signal::Pause] is acknowledged exactly once, when the task has stopped at a checkpoint.
pub struct Yielder {
    /// Signals from the scheduler.
    signals: Receiver<Signal>,
    /// Pause acknowledgements back to the scheduler.
    acks: Sender<()>,
    /// Whether the last signal observed was a pause. Tasks start out paused until their first turn.
    paused: Cell<bool>,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl Yielder {
    /// Create a new Yielder listening on `signals` and acknowledging pauses on `acks`.
    pub fn new(signals: Receiver<Signal>, acks: Sender<()>) -> Self {
        Self {
            signals,
            acks,
            paused: Cell::new(true),
        }
    }

    /// Checkpoint. Applies every pending signal and then blocks for as long as the task is paused.
    pub fn yield_now(&self) -> Result<(), Fail> {
        loop {
            match self.signals.try_recv() {
                Ok(signal) => self.apply(signal),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => return Err(Self::cancelled()),
            }
        }
        self.wait_for_turn()
    }

    /// Blocks until the scheduler lets this task make progress.
    pub fn wait_for_turn(&self) -> Result<(), Fail> {
        while self.is_paused() {
            match self.signals.recv() {
                Ok(signal) => self.apply(signal),
                Err(_) => return Err(Self::cancelled()),
            }
        }
        Ok(())
    }

    /// Asserts whether the last signal observed was a pause.
    fn is_paused(&self) -> bool {
        self.paused.get()
    }

    /// Signals are only applied at a checkpoint, so a pause can be acknowledged right away.
    fn apply(&self, signal: Signal) {
        let pause: bool = signal == Signal::Pause;
        self.paused.set(pause);
        if pause && self.acks.send(()).is_err() {
            trace!("apply(): nobody is waiting for the pause acknowledgement");
        }
    }

    fn cancelled() -> Fail {
        Fail::new(libc::ECANCELED, "task was released by its owner")
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
