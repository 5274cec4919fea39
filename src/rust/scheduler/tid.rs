// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::fail::Fail;
use ::std::fmt;

//======================================================================================================================
// Structures
//======================================================================================================================

/// Task Identifier
#[derive(Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Copy, Clone)]
pub struct Tid(usize);

/// Fixed-capacity pool of task identifiers.
///
/// Identifiers are handed out first-fit, scanning circularly from the slot after the last allocation, so that a
/// reclaimed identifier is reused before the scan reaches the end of the pool again.
pub struct TidPool {
    /// Slot `i` is set while identifier `i` is in use.
    used: Vec<bool>,
    /// Where the next scan starts.
    next: usize,
    /// Number of set slots.
    num_used: usize,
}

//======================================================================================================================
// Associated Functions
//======================================================================================================================

impl TidPool {
    /// Creates an empty pool holding `capacity` identifiers.
    pub fn new(capacity: usize) -> Self {
        Self {
            used: vec![false; capacity],
            next: 0,
            num_used: 0,
        }
    }

    /// Allocates the first free identifier at or after the scan cursor.
    pub fn alloc(&mut self) -> Result<Tid, Fail> {
        let capacity: usize = self.used.len();
        for i in 0..capacity {
            let tentative: usize = (self.next + i) % capacity;
            if !self.used[tentative] {
                self.used[tentative] = true;
                self.num_used += 1;
                self.next = (tentative + 1) % capacity;
                trace!("alloc(): tid={:?}", tentative);
                return Ok(Tid(tentative));
            }
        }
        Err(Fail::new(
            libc::EAGAIN,
            "all task identifiers are currently in use",
        ))
    }

    /// Releases an identifier back to the pool.
    pub fn free(&mut self, tid: Tid) -> Result<(), Fail> {
        match self.used.get_mut(tid.0) {
            Some(slot) if *slot => {
                *slot = false;
                self.num_used -= 1;
                trace!("free(): tid={:?}", tid.0);
                Ok(())
            },
            Some(_) => {
                let cause: String = format!("task identifier {} is not in use", tid.0);
                warn!("free(): {}", &cause);
                Err(Fail::new(libc::ENOENT, &cause))
            },
            None => {
                let cause: String = format!("task identifier {} is out of range", tid.0);
                warn!("free(): {}", &cause);
                Err(Fail::new(libc::ENOENT, &cause))
            },
        }
    }

    /// Asserts whether an identifier is currently in use.
    pub fn is_used(&self, tid: Tid) -> bool {
        self.used.get(tid.0).copied().unwrap_or(false)
    }

    /// Total number of identifiers.
    pub fn capacity(&self) -> usize {
        self.used.len()
    }

    /// Number of identifiers in use.
    pub fn len(&self) -> usize {
        self.num_used
    }

    pub fn is_empty(&self) -> bool {
        self.num_used == 0
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl From<Tid> for usize {
    /// Converts a [Tid] to a [usize].
    fn from(val: Tid) -> Self {
        val.0
    }
}

impl From<usize> for Tid {
    /// Converts a [usize] to a [Tid].
    fn from(val: usize) -> Self {
        Tid(val)
    }
}

impl fmt::Display for Tid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
