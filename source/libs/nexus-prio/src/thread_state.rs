// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Per-thread scheduling state and thread-side donation propagation
//! OWNERS: @kernel-sched-team
//! INVARIANTS:
//!   - Valid(effective) == max(base, max waiter priority of owned transfer queues)
//!   - A stale thread makes every queue it waits on stale (and, through transfer
//!     queues, their owners), so a valid value is never derived from a stale one
//!
//! Effective priorities are computed lazily. Raises are pushed eagerly along
//! "waits on" edges (`donate`); anything that can lower a value only marks it
//! stale (`invalidate_effective`) and the next read recomputes it.

use alloc::collections::BTreeSet;
use alloc::vec::Vec;

use log::{debug, trace};

use crate::cache::Cached;
use crate::priority::Priority;
use crate::scheduler::Scheduler;
use crate::types::{QueueId, ThreadId};

/// Scheduling record of one thread.
pub(crate) struct ThreadState {
    pub(crate) priority: Priority,
    pub(crate) effective: Cached,
    /// Queues this thread currently holds.
    pub(crate) owned: BTreeSet<QueueId>,
    /// Queues this thread is currently enqueued on.
    pub(crate) waiting: BTreeSet<QueueId>,
}

impl ThreadState {
    pub(crate) fn new() -> Self {
        Self {
            priority: Priority::DEFAULT,
            effective: Cached::Stale,
            owned: BTreeSet::new(),
            waiting: BTreeSet::new(),
        }
    }
}

impl Scheduler {
    /// Returns the effective priority of `thread`, recomputing it if stale.
    pub(crate) fn compute_effective(&mut self, thread: ThreadId) -> Priority {
        let state = self.state_mut(thread);
        match state.effective {
            Cached::Valid(effective) => return effective,
            Cached::Pending => panic!("priority donation cycle through {thread}"),
            Cached::Stale => {}
        }
        state.effective = Cached::Pending;
        let mut effective = state.priority;
        let owned: Vec<QueueId> = state.owned.iter().copied().collect();

        for queue in owned {
            if self.queue_ref(queue).transfer {
                effective = effective.max(self.compute_max_waiter(queue));
            }
        }

        self.state_mut(thread).effective = Cached::Valid(effective);
        trace!(target: "nexus_prio::thread", "{thread}: effective priority recomputed as {effective}");
        effective
    }

    /// Base priority update. `priority` is already range checked.
    pub(crate) fn update_priority(&mut self, thread: ThreadId, priority: Priority) {
        let state = self.state_mut(thread);
        let old = state.priority;
        if old == priority {
            return;
        }
        state.priority = priority;
        trace!(target: "nexus_prio::thread", "{thread}: base priority {old} -> {priority}");

        if priority < old {
            // The old base may have been what held the effective value up.
            self.invalidate_effective(thread);
        } else {
            self.donate(thread, priority);
        }

        self.restamp(thread);
    }

    /// Gives `thread` a fresh stamp in every queue it waits on, filed under its
    /// current effective priority. It lines up behind peers of its new level.
    fn restamp(&mut self, thread: ThreadId) {
        let waiting: Vec<QueueId> = self.state_mut(thread).waiting.iter().copied().collect();
        if waiting.is_empty() {
            return;
        }
        let effective = self.compute_effective(thread);
        for queue in waiting {
            let seq = self.next_sequence();
            let restamped = self.queue_mut(queue).waiters.restamp(thread, seq, effective);
            debug_assert!(restamped, "{thread} lists {queue} as waited on but is not filed there");
            trace!(
                target: "nexus_prio::queue",
                "{queue}: {thread} restamped as seq {} at {effective}",
                seq.value()
            );
        }
    }

    /// Raise path. If `thread` has a valid effective priority below
    /// `candidate`, lift it and push the new value into every queue the thread
    /// waits on, which may in turn reach those queues' owners.
    ///
    /// A stale thread is left alone: its next read recomputes the full value,
    /// and everything downstream of it is already stale.
    pub(crate) fn donate(&mut self, thread: ThreadId, candidate: Priority) {
        let state = self.state_mut(thread);
        let Some(current) = state.effective.valid() else {
            return;
        };
        if candidate <= current {
            return;
        }
        state.effective = Cached::Valid(candidate);
        let waiting: Vec<QueueId> = state.waiting.iter().copied().collect();
        debug!(target: "nexus_prio::donate", "{thread}: effective priority raised {current} -> {candidate}");

        for queue in waiting {
            self.raise_waiter(queue, thread, candidate);
        }
    }

    /// Marks `thread` stale and pushes staleness downstream along "waits on"
    /// edges. Stops at threads that are already stale.
    pub(crate) fn invalidate_effective(&mut self, thread: ThreadId) {
        let state = self.state_mut(thread);
        if state.effective.valid().is_none() {
            return;
        }
        state.effective = Cached::Stale;
        let waiting: Vec<QueueId> = state.waiting.iter().copied().collect();
        trace!(target: "nexus_prio::thread", "{thread}: effective priority invalidated");

        for queue in waiting {
            self.invalidate_waiter_max(queue);
        }
    }

    pub(crate) fn on_enqueued(&mut self, thread: ThreadId, queue: QueueId) {
        self.state_mut(thread).waiting.insert(queue);
    }

    /// `thread` now holds `queue`. An owner must reflect what it is newly
    /// entitled to right away.
    pub(crate) fn on_acquired(&mut self, thread: ThreadId, queue: QueueId) {
        let state = self.state_mut(thread);
        state.waiting.remove(&queue);
        state.owned.insert(queue);
        let Some(current) = state.effective.valid() else {
            return;
        };
        if !self.queue_ref(queue).transfer {
            return;
        }
        let max = self.compute_max_waiter(queue);
        if max > current {
            self.donate(thread, max);
        }
    }

    /// `thread` lost `queue`. Whatever the queue donated can only be undone by
    /// a full recomputation.
    pub(crate) fn on_released(&mut self, thread: ThreadId, queue: QueueId) {
        self.state_mut(thread).owned.remove(&queue);
        self.invalidate_effective(thread);
        debug!(target: "nexus_prio::donate", "{thread}: released {queue}");
    }
}
