// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::{
    runtime::fail::Fail,
    scheduler::{
        task::Task,
        yielder::{
            Signal,
            Yielder,
        },
    },
};
use ::crossbeam_channel::{
    Receiver,
    RecvTimeoutError,
    Sender,
};
use ::std::{
    sync::{
        atomic::{
            AtomicBool,
            Ordering,
        },
        Arc,
        Mutex,
        OnceLock,
        PoisonError,
    },
    thread::{
        self,
        JoinHandle,
        ThreadId,
    },
    time::Duration,
};

//======================================================================================================================
// Constants
//======================================================================================================================

/// How often a pending pause re-checks whether the task exited instead of stopping at a checkpoint.
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

//======================================================================================================================
// Structures
//======================================================================================================================

/// Body of a task.
type Entry = Box<dyn FnOnce(Yielder) + Send + 'static>;

/// What the thread takes with it when spawned: the body, its signal receiver and its acknowledgement sender.
type Parked = (Entry, Receiver<Signal>, Sender<()>);

/// A task backed by an OS thread.
///
/// The thread is spawned on [Task::start] and waits for its first turn before running the body, so its identity is
/// known to the scheduler by the time the body can call back into it. Pausing is cooperative: [Task::pause] returns
/// once the task has stopped at its next [Yielder::yield_now] or has exited. A body that never yields keeps the CPU
/// until it returns.
pub struct ThreadTask {
    name: String,
    /// Taken when the thread is spawned.
    entry: Mutex<Option<Parked>>,
    signals: Sender<Signal>,
    acks: Receiver<()>,
    thread_id: OnceLock<ThreadId>,
    exited: Arc<AtomicBool>,
    join_handle: Mutex<Option<JoinHandle<()>>>,
}

/// Marks the task as exited when the body returns or unwinds.
struct ExitGuard(Arc<AtomicBool>);

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl ThreadTask {
    /// Creates a task that is not yet running.
    pub fn new<F>(name: &str, entry: F) -> Self
    where
        F: FnOnce(Yielder) + Send + 'static,
    {
        let (tx, rx): (Sender<Signal>, Receiver<Signal>) = crossbeam_channel::unbounded();
        let (ack_tx, ack_rx): (Sender<()>, Receiver<()>) = crossbeam_channel::unbounded();
        Self {
            name: name.to_string(),
            entry: Mutex::new(Some((Box::new(entry), rx, ack_tx))),
            signals: tx,
            acks: ack_rx,
            thread_id: OnceLock::new(),
            exited: Arc::new(AtomicBool::new(false)),
            join_handle: Mutex::new(None),
        }
    }

    /// Asserts whether the body has returned or unwound.
    pub fn has_exited(&self) -> bool {
        self.exited.load(Ordering::Acquire)
    }

    /// Waits for the underlying thread. Fails if the task was never started or its body panicked.
    pub fn join(&self) -> Result<(), Fail> {
        let handle: Option<JoinHandle<()>> = self
            .join_handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match handle {
            Some(handle) => match handle.join() {
                Ok(()) => Ok(()),
                Err(_) => {
                    let cause: String = format!("task {} panicked", self.name);
                    warn!("join(): {}", cause);
                    Err(Fail::new(libc::EIO, &cause))
                },
            },
            None => {
                let cause: String = format!("task {} is not running or was already joined", self.name);
                Err(Fail::new(libc::ESRCH, &cause))
            },
        }
    }

    fn signal(&self, signal: Signal) {
        // The receiver goes away with the thread, so a failed send just means the task already finished.
        if self.signals.send(signal).is_err() {
            trace!("signal(): task {} already finished (signal={:?})", self.name, signal);
        }
    }

    /// Blocks until the task acknowledges a pause or exits.
    fn wait_for_ack(&self) {
        loop {
            match self.acks.recv_timeout(EXIT_POLL_INTERVAL) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
                Err(RecvTimeoutError::Timeout) if self.has_exited() => {
                    trace!("wait_for_ack(): task {} exited before pausing", self.name);
                    return;
                },
                Err(RecvTimeoutError::Timeout) => {},
            }
        }
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl Task for ThreadTask {
    fn get_name(&self) -> String {
        self.name.clone()
    }

    fn start(&self) {
        let (entry, signals, acks): Parked = match self.entry.lock().unwrap_or_else(PoisonError::into_inner).take() {
            Some(entry) => entry,
            None => {
                warn!("start(): task {} was already started", self.name);
                return;
            },
        };

        let guard: ExitGuard = ExitGuard(self.exited.clone());
        let spawned = thread::Builder::new().name(self.name.clone()).spawn(move || {
            let _guard: ExitGuard = guard;
            let yielder: Yielder = Yielder::new(signals, acks);
            if yielder.wait_for_turn().is_ok() {
                entry(yielder);
            }
        });

        match spawned {
            Ok(handle) => {
                let _ = self.thread_id.set(handle.thread().id());
                *self.join_handle.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
                self.signal(Signal::Resume);
            },
            Err(e) => {
                error!("start(): failed to spawn task {} (error={:?})", self.name, e);
                self.exited.store(true, Ordering::Release);
            },
        }
    }

    fn resume(&self) {
        self.signal(Signal::Resume);
    }

    fn pause(&self) {
        if !self.is_alive() {
            return;
        }
        self.signal(Signal::Pause);
        self.wait_for_ack();
    }

    fn is_alive(&self) -> bool {
        self.thread_id.get().is_some() && !self.has_exited()
    }

    fn is_current(&self) -> bool {
        self.thread_id.get() == Some(&thread::current().id())
    }
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
