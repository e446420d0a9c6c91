// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Resource wait queues and queue-side donation propagation
//! OWNERS: @kernel-sched-team
//! PUBLIC API: QueueMut (wait_for_access/acquire/next_thread/contains/is_empty/...)
//! INVARIANTS:
//!   - The owner is never a waiter of its own queue
//!   - Valid(cached_max) == highest waiter effective priority (MIN when empty),
//!     and every waiter is filed under its true effective priority
//!   - A stale transfer queue has a stale (or absent) owner
//!
//! Queue lifecycle: Empty (no owner, no waiters) -> Owned (owner, 0..n waiters).
//! `acquire` installs an owner, `wait_for_access` adds waiters and `next_thread`
//! hands the queue to the best waiter.

use alloc::vec::Vec;
use core::fmt;

use log::{debug, trace};

use crate::cache::Cached;
use crate::priority::Priority;
use crate::scheduler::Scheduler;
use crate::types::{QueueId, ThreadId};
use crate::waiters::{Waiter, WaiterBuckets};

/// Wait queue guarding one resource (lock, join target, ...).
pub(crate) struct WaitQueue {
    /// When false this queue never donates to its owner.
    pub(crate) transfer: bool,
    pub(crate) waiters: WaiterBuckets,
    pub(crate) owner: Option<ThreadId>,
    pub(crate) cached_max: Cached,
}

impl WaitQueue {
    pub(crate) fn new(transfer: bool) -> Self {
        Self {
            transfer,
            waiters: WaiterBuckets::new(),
            owner: None,
            cached_max: Cached::Valid(Priority::MIN),
        }
    }
}

impl Scheduler {
    pub(crate) fn enqueue_waiter(&mut self, queue: QueueId, thread: ThreadId) {
        let q = self.queue_ref(queue);
        assert!(!q.waiters.contains(thread), "{thread} already waits on {queue}");
        assert!(q.owner != Some(thread), "{thread} owns {queue} and cannot wait on it");

        let effective = self.compute_effective(thread);
        self.on_enqueued(thread, queue);
        let seq = self.next_sequence();
        self.queue_mut(queue).waiters.insert(Waiter { thread, seq }, effective);
        trace!(
            target: "nexus_prio::queue",
            "{queue}: {thread} waits at {effective} (seq {})",
            seq.value()
        );
        self.fold_waiter_max(queue, effective);
    }

    pub(crate) fn install_owner(&mut self, queue: QueueId, thread: ThreadId) {
        let previous = self.queue_ref(queue).owner;
        if let Some(previous) = previous {
            if previous != thread {
                self.on_released(previous, queue);
            }
        }

        let q = self.queue_mut(queue);
        if let Some((filed, _)) = q.waiters.remove(thread) {
            drop_cached_max_if_top(q, filed);
        }
        q.owner = Some(thread);
        debug!(target: "nexus_prio::queue", "{queue}: owned by {thread}");
        self.on_acquired(thread, queue);
    }

    pub(crate) fn select_next(&mut self, queue: QueueId) -> Option<ThreadId> {
        // Stale buckets may misplace waiters; settle them before choosing.
        self.compute_max_waiter(queue);
        let q = self.queue_mut(queue);
        let (filed, waiter) = q.waiters.pop()?;
        drop_cached_max_if_top(q, filed);
        trace!(target: "nexus_prio::queue", "{queue}: selected {} at {filed}", waiter.thread);
        self.install_owner(queue, waiter.thread);
        Some(waiter.thread)
    }

    pub(crate) fn peek_waiter(&mut self, queue: QueueId) -> Option<ThreadId> {
        self.compute_max_waiter(queue);
        self.queue_ref(queue).waiters.peek().map(|waiter| waiter.thread)
    }

    /// Waiters in the order `next_thread` would return them.
    pub(crate) fn waiter_order(&mut self, queue: QueueId) -> Vec<ThreadId> {
        self.compute_max_waiter(queue);
        self.queue_ref(queue).waiters.iter().map(|(_, waiter)| waiter.thread).collect()
    }

    /// Highest effective priority among the waiters of `queue` (`MIN` if none).
    /// A stale queue recomputes every waiter and re-files the ones that moved.
    pub(crate) fn compute_max_waiter(&mut self, queue: QueueId) -> Priority {
        let q = self.queue_mut(queue);
        match q.cached_max {
            Cached::Valid(max) => return max,
            Cached::Pending => panic!("priority donation cycle through {queue}"),
            Cached::Stale => {}
        }
        q.cached_max = Cached::Pending;
        let threads = q.waiters.threads();

        let mut max = Priority::MIN;
        for thread in threads {
            let effective = self.compute_effective(thread);
            self.queue_mut(queue).waiters.refile(thread, effective);
            max = max.max(effective);
        }

        self.queue_mut(queue).cached_max = Cached::Valid(max);
        trace!(target: "nexus_prio::queue", "{queue}: max waiter priority recomputed as {max}");
        max
    }

    /// A waiter of `queue` now has effective priority `candidate`.
    pub(crate) fn raise_waiter(&mut self, queue: QueueId, thread: ThreadId, candidate: Priority) {
        self.queue_mut(queue).waiters.refile(thread, candidate);
        self.fold_waiter_max(queue, candidate);
    }

    /// Folds a waiter priority into the cached max and tells the owner when it
    /// exceeds what the queue reported before.
    fn fold_waiter_max(&mut self, queue: QueueId, candidate: Priority) {
        let q = self.queue_mut(queue);
        let previous = q.cached_max;
        if let Cached::Valid(max) = previous {
            q.cached_max = Cached::Valid(max.max(candidate));
        }
        self.notify_owner_of_new_max(queue, previous, candidate);
    }

    fn notify_owner_of_new_max(&mut self, queue: QueueId, previous: Cached, candidate: Priority) {
        let q = self.queue_ref(queue);
        if !q.transfer || !previous.is_exceeded_by(candidate) {
            return;
        }
        let owner = q.owner;
        if let Some(owner) = owner {
            trace!(target: "nexus_prio::donate", "{queue}: offering {candidate} to owner {owner}");
            self.donate(owner, candidate);
        }
    }

    /// A waiter's effective priority may have dropped: the cached max and the
    /// owner's value built on it can no longer be trusted.
    pub(crate) fn invalidate_waiter_max(&mut self, queue: QueueId) {
        let q = self.queue_mut(queue);
        if q.cached_max.valid().is_none() {
            return;
        }
        q.cached_max = Cached::Stale;
        let owner = if q.transfer { q.owner } else { None };
        if let Some(owner) = owner {
            self.invalidate_effective(owner);
        }
    }
}

/// Removing a waiter filed at or above the cached max may lower the max.
/// Only called while the owner is being replaced, so the owner needs no
/// separate invalidation.
fn drop_cached_max_if_top(queue: &mut WaitQueue, filed: Priority) {
    if let Cached::Valid(max) = queue.cached_max {
        if filed >= max {
            queue.cached_max = Cached::Stale;
        }
    }
}

/// Queue-bound view over a [`Scheduler`], exposing the wait queue operations
/// under one handle.
pub struct QueueMut<'a> {
    pub(crate) sched: &'a mut Scheduler,
    pub(crate) id: QueueId,
}

impl QueueMut<'_> {
    pub fn id(&self) -> QueueId {
        self.id
    }

    /// Records that `thread` is blocked on this queue. See [`Scheduler::wait_for_access`].
    pub fn wait_for_access(&mut self, thread: ThreadId) {
        self.sched.wait_for_access(self.id, thread);
    }

    /// Makes `thread` the owner. See [`Scheduler::acquire`].
    pub fn acquire(&mut self, thread: ThreadId) {
        self.sched.acquire(self.id, thread);
    }

    /// Hands the queue to the best waiter. See [`Scheduler::next_thread`].
    pub fn next_thread(&mut self) -> Option<ThreadId> {
        self.sched.next_thread(self.id)
    }

    pub fn peek_next(&mut self) -> Option<ThreadId> {
        self.sched.peek_next(self.id)
    }

    pub fn max_waiter_priority(&mut self) -> Priority {
        self.sched.max_waiter_priority(self.id)
    }

    pub fn contains(&self, thread: ThreadId) -> bool {
        self.sched.contains(self.id, thread)
    }

    pub fn is_empty(&self) -> bool {
        self.sched.is_empty(self.id)
    }

    pub fn len(&self) -> usize {
        self.sched.len(self.id)
    }

    pub fn owner(&self) -> Option<ThreadId> {
        self.sched.owner(self.id)
    }

    pub fn transfers_priority(&self) -> bool {
        self.sched.transfers_priority(self.id)
    }

    pub fn waiters(&mut self) -> Vec<ThreadId> {
        self.sched.waiters(self.id)
    }
}

impl fmt::Debug for QueueMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let q = self.sched.queue_ref(self.id);
        write!(
            f,
            "{} owner={:?} transfer={} max={:?} ",
            self.id,
            q.owner.map(ThreadId::as_raw),
            q.transfer,
            q.cached_max.valid().map(Priority::as_raw)
        )?;
        let mut waiters = f.debug_list();
        for (filed, waiter) in q.waiters.iter() {
            waiters.entry(&format_args!("{}@{}#{}", waiter.thread, filed, waiter.seq.value()));
        }
        waiters.finish()
    }
}
