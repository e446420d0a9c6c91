// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Handle newtypes for the thread/queue graph
//! INVARIANTS: Handles are lookup-only; the Scheduler arena owns every record
//!
//! Threads and queues reference each other in both directions (owner, owned
//! queues, waited-on queues). All of those edges are stored as these handles
//! rather than pointers, so the graph has no ownership cycles.

use core::fmt;

/// Identity of a thread as known to the execution engine.
///
/// **Ownership**: minted by the caller; the scheduler creates the matching
/// scheduling state lazily the first time it sees the id.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ThreadId(u32);

impl ThreadId {
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn as_raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// Handle to a wait queue created by [`crate::Scheduler::new_queue`].
///
/// **Ownership**: only the scheduler mints queue ids.
/// **Invariant**: a `QueueId` indexes the arena of the scheduler that issued it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct QueueId(u32);

impl QueueId {
    #[inline]
    pub(crate) const fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    #[inline]
    pub const fn as_raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn as_index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for QueueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "q{}", self.0)
    }
}
