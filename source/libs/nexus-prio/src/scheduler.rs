// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Scheduler facade owning the thread/queue graph
//! OWNERS: @kernel-sched-team
//! PUBLIC API: Scheduler (new_queue/priority/effective_priority/set_priority/try_set_priority/
//!             increase_priority/decrease_priority/wait_for_access/acquire/next_thread/...)
//! DEPENDS_ON: thread_state, wait_queue, sequence
//! INVARIANTS: All graph edges are ThreadId/QueueId handles into the two arenas below
//!
//! ## Exclusivity contract
//!
//! Every operation mutates a shared graph of threads and queues and must run
//! without interleaving (the kernel disables interrupts around each call). The
//! scheduler owns no lock. Instead every entry point takes `&mut self` and the
//! type is `!Send` and `!Sync`, so the borrow checker enforces what the kernel
//! guarantees at runtime.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use core::marker::PhantomData;

use log::debug;

use crate::priority::{Priority, PriorityError};
use crate::sequence::{Sequence, SequenceGenerator};
use crate::thread_state::ThreadState;
use crate::types::{QueueId, ThreadId};
use crate::wait_queue::{QueueMut, WaitQueue};

/// Priority scheduler with transitive priority donation.
pub struct Scheduler {
    threads: BTreeMap<ThreadId, ThreadState>,
    queues: Vec<WaitQueue>,
    sequence: SequenceGenerator,
    current: Option<ThreadId>,
    // Pre-SMP contract: the graph is CPU-local and must not cross thread boundaries.
    _not_send_sync: PhantomData<*mut ()>,
}
static_assertions::assert_not_impl_any!(Scheduler: Send, Sync);

impl Scheduler {
    /// Creates a scheduler with no threads and no queues.
    pub fn new() -> Self {
        Self {
            threads: BTreeMap::new(),
            queues: Vec::new(),
            sequence: SequenceGenerator::new(),
            current: None,
            _not_send_sync: PhantomData,
        }
    }

    /// Creates an empty wait queue. With `transfer_priority` set, waiters
    /// donate their effective priority to the queue's owner.
    pub fn new_queue(&mut self, transfer_priority: bool) -> QueueId {
        let id = QueueId::from_index(self.queues.len());
        self.queues.push(WaitQueue::new(transfer_priority));
        debug!(target: "nexus_prio::queue", "{id}: created (transfer={transfer_priority})");
        id
    }

    /// Borrowed view bound to one queue.
    pub fn queue(&mut self, queue: QueueId) -> QueueMut<'_> {
        self.queue_ref(queue);
        QueueMut { sched: self, id: queue }
    }

    pub fn priority(&mut self, thread: ThreadId) -> Priority {
        self.state_mut(thread).priority
    }

    /// Priority used for scheduling decisions: the base priority, possibly
    /// raised by donation.
    pub fn effective_priority(&mut self, thread: ThreadId) -> Priority {
        self.compute_effective(thread)
    }

    /// Sets the base priority of `thread`.
    ///
    /// # Panics
    /// If `priority` is outside `[PRIORITY_MIN, PRIORITY_MAX]`.
    pub fn set_priority(&mut self, thread: ThreadId, priority: u8) {
        if let Err(err) = self.try_set_priority(thread, priority) {
            panic!("set_priority({thread}): {err}");
        }
    }

    /// Range-checked variant of [`Scheduler::set_priority`] for callers that
    /// forward untrusted values.
    pub fn try_set_priority(&mut self, thread: ThreadId, priority: u8) -> Result<Priority, PriorityError> {
        let priority = Priority::try_from(priority)?;
        self.update_priority(thread, priority);
        self.after_mutation();
        Ok(priority)
    }

    /// Records which thread is running; used by the increase/decrease helpers.
    pub fn set_current_thread(&mut self, thread: ThreadId) {
        self.current = Some(thread);
    }

    pub fn current_thread(&self) -> Option<ThreadId> {
        self.current
    }

    /// Raises the current thread's base priority by one level. Returns false
    /// at `PRIORITY_MAX`.
    ///
    /// # Panics
    /// If no current thread was recorded.
    pub fn increase_priority(&mut self) -> bool {
        let thread = self.expect_current("increase_priority");
        match self.priority(thread).raised() {
            Some(next) => {
                self.update_priority(thread, next);
                self.after_mutation();
                true
            }
            None => false,
        }
    }

    /// Lowers the current thread's base priority by one level. Returns false
    /// at `PRIORITY_MIN`.
    ///
    /// # Panics
    /// If no current thread was recorded.
    pub fn decrease_priority(&mut self) -> bool {
        let thread = self.expect_current("decrease_priority");
        match self.priority(thread).lowered() {
            Some(next) => {
                self.update_priority(thread, next);
                self.after_mutation();
                true
            }
            None => false,
        }
    }

    /// Records that `thread` is blocked waiting for `queue`. The caller
    /// suspends the thread afterwards; this only does the bookkeeping and
    /// donates to the owner when the queue transfers priority.
    ///
    /// # Panics
    /// If `thread` already waits on `queue` or owns it.
    pub fn wait_for_access(&mut self, queue: QueueId, thread: ThreadId) {
        self.enqueue_waiter(queue, thread);
        self.after_mutation();
    }

    /// Makes `thread` the owner of `queue` without consulting the waiters.
    /// A previous owner loses whatever the queue donated to it; if `thread`
    /// was waiting it leaves the waiter set.
    pub fn acquire(&mut self, queue: QueueId, thread: ThreadId) {
        self.queue_ref(queue);
        self.install_owner(queue, thread);
        self.after_mutation();
    }

    /// Removes the highest-priority, longest-waiting thread and makes it the
    /// owner. Returns `None`, leaving the owner untouched, if nobody waits.
    pub fn next_thread(&mut self, queue: QueueId) -> Option<ThreadId> {
        self.queue_ref(queue);
        let next = self.select_next(queue);
        self.after_mutation();
        next
    }

    /// The thread `next_thread` would return, without changing anything
    /// observable.
    pub fn peek_next(&mut self, queue: QueueId) -> Option<ThreadId> {
        self.peek_waiter(queue)
    }

    /// Highest effective priority among the waiters (`PRIORITY_MIN` if none).
    pub fn max_waiter_priority(&mut self, queue: QueueId) -> Priority {
        self.compute_max_waiter(queue)
    }

    pub fn contains(&self, queue: QueueId, thread: ThreadId) -> bool {
        self.queue_ref(queue).waiters.contains(thread)
    }

    pub fn is_empty(&self, queue: QueueId) -> bool {
        self.queue_ref(queue).waiters.is_empty()
    }

    pub fn len(&self, queue: QueueId) -> usize {
        self.queue_ref(queue).waiters.len()
    }

    pub fn owner(&self, queue: QueueId) -> Option<ThreadId> {
        self.queue_ref(queue).owner
    }

    pub fn transfers_priority(&self, queue: QueueId) -> bool {
        self.queue_ref(queue).transfer
    }

    /// Waiting threads in dequeue order.
    pub fn waiters(&mut self, queue: QueueId) -> Vec<ThreadId> {
        self.waiter_order(queue)
    }

    /// Number of threads the scheduler has seen.
    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }

    pub fn queue_count(&self) -> usize {
        self.queues.len()
    }

    // Arena access

    /// Scheduling state of `thread`, created on first use.
    pub(crate) fn state_mut(&mut self, thread: ThreadId) -> &mut ThreadState {
        self.threads.entry(thread).or_insert_with(ThreadState::new)
    }

    pub(crate) fn threads(&self) -> impl Iterator<Item = (ThreadId, &ThreadState)> + '_ {
        self.threads.iter().map(|(id, state)| (*id, state))
    }

    pub(crate) fn thread_ref(&self, thread: ThreadId) -> Option<&ThreadState> {
        self.threads.get(&thread)
    }

    pub(crate) fn queues(&self) -> impl Iterator<Item = (QueueId, &WaitQueue)> + '_ {
        self.queues.iter().enumerate().map(|(index, queue)| (QueueId::from_index(index), queue))
    }

    pub(crate) fn queue_ref(&self, queue: QueueId) -> &WaitQueue {
        match self.queues.get(queue.as_index()) {
            Some(q) => q,
            None => panic!("unknown wait queue {queue}"),
        }
    }

    pub(crate) fn queue_mut(&mut self, queue: QueueId) -> &mut WaitQueue {
        match self.queues.get_mut(queue.as_index()) {
            Some(q) => q,
            None => panic!("unknown wait queue {queue}"),
        }
    }

    pub(crate) fn next_sequence(&mut self) -> Sequence {
        self.sequence.next()
    }

    fn expect_current(&self, op: &str) -> ThreadId {
        match self.current {
            Some(thread) => thread,
            None => panic!("{op} called without a current thread"),
        }
    }

    #[inline]
    fn after_mutation(&self) {
        #[cfg(feature = "audit")]
        {
            if let Err(violation) = self.audit() {
                panic!("scheduler invariant violated: {violation}");
            }
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
