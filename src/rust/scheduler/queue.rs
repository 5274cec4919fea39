// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::{
    runtime::limits::NUM_LEVELS,
    scheduler::{
        tcb::ControlBlock,
        tid::Tid,
    },
};
use ::std::{
    collections::VecDeque,
    fmt,
    sync::{
        Arc,
        Mutex,
        MutexGuard,
        PoisonError,
    },
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// Priority level. `Q0` is the highest.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Level {
    Q0,
    Q1,
    Q2,
}

/// The three run queues of the multi-level feedback scheduler.
///
/// Each level has its own lock and no method ever holds two of them at once, so callers on different threads
/// (admission, termination requests and the dispatch loop) never have to agree on a lock order.
pub struct FeedbackQueues {
    levels: [Mutex<VecDeque<Arc<ControlBlock>>>; NUM_LEVELS],
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl Level {
    /// All levels, highest priority first.
    pub const ALL: [Level; NUM_LEVELS] = [Level::Q0, Level::Q1, Level::Q2];

    pub fn index(self) -> usize {
        match self {
            Level::Q0 => 0,
            Level::Q1 => 1,
            Level::Q2 => 2,
        }
    }

    /// Level a task lands in after using up a slice here. The lowest level wraps to itself.
    pub fn demoted(self) -> Level {
        match self {
            Level::Q0 => Level::Q1,
            Level::Q1 | Level::Q2 => Level::Q2,
        }
    }

    /// Levels whose arrivals may interrupt a task running at this level.
    pub fn higher(self) -> &'static [Level] {
        &Self::ALL[..self.index()]
    }
}

impl FeedbackQueues {
    /// Appends a control block to the tail of a level.
    pub fn push_back(&self, level: Level, cb: Arc<ControlBlock>) {
        let mut queue: MutexGuard<VecDeque<Arc<ControlBlock>>> = self.lock(level);
        debug_assert!(
            !queue.iter().any(|other| other.get_tid() == cb.get_tid()),
            "tid {} is already queued in {}",
            cb.get_tid(),
            level
        );
        queue.push_back(cb);
    }

    /// Returns the head of a level without removing it.
    pub fn front(&self, level: Level) -> Option<Arc<ControlBlock>> {
        self.lock(level).front().cloned()
    }

    /// Removes a specific control block from a level. Returns `false` if it is not there.
    pub fn remove(&self, level: Level, cb: &Arc<ControlBlock>) -> bool {
        let mut queue: MutexGuard<VecDeque<Arc<ControlBlock>>> = self.lock(level);
        match queue.iter().position(|other| Arc::ptr_eq(other, cb)) {
            Some(index) => {
                queue.remove(index);
                true
            },
            None => false,
        }
    }

    /// Moves a control block to the tail of `to`. Returns `false` if it was not in `from`.
    pub fn move_to_back(&self, from: Level, to: Level, cb: &Arc<ControlBlock>) -> bool {
        if from == to {
            let mut queue: MutexGuard<VecDeque<Arc<ControlBlock>>> = self.lock(from);
            return match queue.iter().position(|other| Arc::ptr_eq(other, cb)) {
                Some(index) => {
                    if let Some(cb) = queue.remove(index) {
                        queue.push_back(cb);
                    }
                    true
                },
                None => false,
            };
        }

        // Insert before removing, so a concurrent lookup always finds the block in some queue.
        if !self.contains(from, cb) {
            return false;
        }
        self.push_back(to, cb.clone());
        self.remove(from, cb)
    }

    /// Asserts whether a control block sits in a level.
    pub fn contains(&self, level: Level, cb: &Arc<ControlBlock>) -> bool {
        self.lock(level).iter().any(|other| Arc::ptr_eq(other, cb))
    }

    /// Scans the levels, highest first, for the first control block matching `predicate`.
    ///
    /// The predicate runs on a snapshot taken with the level unlocked, so it may call back into the scheduler. Blocks
    /// only ever move to the same or a lower level and are inserted there before being removed, so a block that moves
    /// during the scan is still seen.
    pub fn find<P>(&self, predicate: P) -> Option<(Level, Arc<ControlBlock>)>
    where
        P: Fn(&ControlBlock) -> bool,
    {
        for level in Level::ALL {
            let snapshot: Vec<Arc<ControlBlock>> = self.lock(level).iter().cloned().collect();
            if let Some(cb) = snapshot.into_iter().find(|cb| predicate(cb)) {
                return Some((level, cb));
            }
        }
        None
    }

    /// Highest level with queued work.
    pub fn first_non_empty(&self) -> Option<Level> {
        Level::ALL.into_iter().find(|level| !self.is_empty(*level))
    }

    /// Asserts whether any of `levels` has queued work.
    pub fn any_non_empty(&self, levels: &[Level]) -> bool {
        levels.iter().any(|level| !self.is_empty(*level))
    }

    pub fn len(&self, level: Level) -> usize {
        self.lock(level).len()
    }

    pub fn is_empty(&self, level: Level) -> bool {
        self.lock(level).is_empty()
    }

    /// Identifiers queued in a level, head first.
    pub fn tids(&self, level: Level) -> Vec<Tid> {
        self.lock(level).iter().map(|cb| cb.get_tid()).collect()
    }

    /// A task that panicked while holding a queue lock cannot leave the queue half-modified, so poisoning is ignored.
    fn lock(&self, level: Level) -> MutexGuard<VecDeque<Arc<ControlBlock>>> {
        self.levels[level.index()]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl Default for FeedbackQueues {
    fn default() -> Self {
        Self {
            levels: [
                Mutex::new(VecDeque::new()),
                Mutex::new(VecDeque::new()),
                Mutex::new(VecDeque::new()),
            ],
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Q{}", self.index())
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
