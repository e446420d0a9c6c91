// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Lazily recomputed priority cache shared by threads and queues.

use crate::priority::Priority;

/// Cached priority slot.
///
/// A `Valid` value is always exact. Anything that might lower the true value
/// must turn the slot `Stale`; raises may be written in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Cached {
    Valid(Priority),
    Stale,
    /// Recomputation in progress. Re-entering a pending slot means the
    /// donation graph has a cycle.
    Pending,
}

impl Cached {
    #[inline]
    pub(crate) fn valid(self) -> Option<Priority> {
        match self {
            Cached::Valid(p) => Some(p),
            Cached::Stale | Cached::Pending => None,
        }
    }

    #[cfg(test)]
    pub(crate) fn is_stale(self) -> bool {
        matches!(self, Cached::Stale)
    }

    /// True when `candidate` would raise this slot. An unknown value counts as
    /// lower than any candidate.
    #[inline]
    pub(crate) fn is_exceeded_by(self, candidate: Priority) -> bool {
        self.valid().map_or(true, |current| candidate > current)
    }
}
