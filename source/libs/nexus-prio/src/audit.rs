// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Whole-graph invariant audit for the scheduler
//! OWNERS: @kernel-sched-team
//! STATUS: Functional (debug aid; enabled per operation with the `audit` feature)
//!
//! The audit recomputes every effective priority and every queue maximum from
//! scratch, without reading or writing any cache, and compares the result with
//! what the caches claim. It is O(threads + queues + waiters) and never used on
//! the scheduling path itself.

use alloc::collections::{BTreeMap, BTreeSet};
use core::fmt;

use crate::cache::Cached;
use crate::priority::Priority;
use crate::scheduler::Scheduler;
use crate::types::{QueueId, ThreadId};

/// Direction of a thread/queue back-reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphEdge {
    Owns,
    WaitsOn,
}

impl fmt::Display for GraphEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphEdge::Owns => f.write_str("owns"),
            GraphEdge::WaitsOn => f.write_str("waits on"),
        }
    }
}

/// First inconsistency found by [`Scheduler::audit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("{thread}: cached effective priority {cached} below base {base}")]
    BelowBase { thread: ThreadId, cached: Priority, base: Priority },
    #[error("{thread}: cached effective priority {cached}, actual {actual}")]
    EffectiveMismatch { thread: ThreadId, cached: Priority, actual: Priority },
    #[error("{queue}: cached max waiter priority {cached}, actual {actual}")]
    QueueMaxMismatch { queue: QueueId, cached: Priority, actual: Priority },
    #[error("{queue}: {thread} filed under {filed}, effective priority is {actual}")]
    MisfiledWaiter { queue: QueueId, thread: ThreadId, filed: Priority, actual: Priority },
    #[error("{queue}: owner {thread} is also a waiter")]
    OwnerIsWaiter { queue: QueueId, thread: ThreadId },
    #[error("{thread} {edge} {queue} on one side of the graph only")]
    EdgeMismatch { thread: ThreadId, queue: QueueId, edge: GraphEdge },
    #[error("priority donation cycle through {thread}")]
    DonationCycle { thread: ThreadId },
}

/// Cache-free recomputation of effective priorities and queue maxima.
struct Recompute<'a> {
    sched: &'a Scheduler,
    threads: BTreeMap<ThreadId, Priority>,
    queues: BTreeMap<QueueId, Priority>,
    visiting: BTreeSet<ThreadId>,
}

impl<'a> Recompute<'a> {
    fn new(sched: &'a Scheduler) -> Self {
        Self { sched, threads: BTreeMap::new(), queues: BTreeMap::new(), visiting: BTreeSet::new() }
    }

    fn thread(&mut self, thread: ThreadId) -> Result<Priority, InvariantViolation> {
        if let Some(known) = self.threads.get(&thread) {
            return Ok(*known);
        }
        if !self.visiting.insert(thread) {
            return Err(InvariantViolation::DonationCycle { thread });
        }
        let sched = self.sched;
        let mut effective = Priority::DEFAULT;
        if let Some(state) = sched.thread_ref(thread) {
            effective = state.priority;
            for queue in &state.owned {
                if sched.queue_ref(*queue).transfer {
                    effective = effective.max(self.queue(*queue)?);
                }
            }
        }
        self.visiting.remove(&thread);
        self.threads.insert(thread, effective);
        Ok(effective)
    }

    fn queue(&mut self, queue: QueueId) -> Result<Priority, InvariantViolation> {
        if let Some(known) = self.queues.get(&queue) {
            return Ok(*known);
        }
        let waiters = self.sched.queue_ref(queue).waiters.threads();
        let mut max = Priority::MIN;
        for waiter in waiters {
            max = max.max(self.thread(waiter)?);
        }
        self.queues.insert(queue, max);
        Ok(max)
    }
}

impl Scheduler {
    /// Checks every cached value and back-reference against a from-scratch
    /// recomputation. Returns the first violation found.
    pub fn audit(&self) -> Result<(), InvariantViolation> {
        self.audit_edges()?;

        let mut truth = Recompute::new(self);
        for (thread, state) in self.threads() {
            let actual = truth.thread(thread)?;
            if let Cached::Valid(cached) = state.effective {
                if cached < state.priority {
                    return Err(InvariantViolation::BelowBase { thread, cached, base: state.priority });
                }
                if cached != actual {
                    return Err(InvariantViolation::EffectiveMismatch { thread, cached, actual });
                }
            }
        }

        for (queue, q) in self.queues() {
            let actual = truth.queue(queue)?;
            let Cached::Valid(cached) = q.cached_max else {
                continue;
            };
            if cached != actual {
                return Err(InvariantViolation::QueueMaxMismatch { queue, cached, actual });
            }
            for (filed, waiter) in q.waiters.iter() {
                let actual = truth.thread(waiter.thread)?;
                if filed != actual {
                    return Err(InvariantViolation::MisfiledWaiter {
                        queue,
                        thread: waiter.thread,
                        filed,
                        actual,
                    });
                }
            }
        }
        Ok(())
    }

    fn audit_edges(&self) -> Result<(), InvariantViolation> {
        for (queue, q) in self.queues() {
            if let Some(owner) = q.owner {
                if q.waiters.contains(owner) {
                    return Err(InvariantViolation::OwnerIsWaiter { queue, thread: owner });
                }
                if !self.thread_ref(owner).is_some_and(|state| state.owned.contains(&queue)) {
                    return Err(InvariantViolation::EdgeMismatch {
                        thread: owner,
                        queue,
                        edge: GraphEdge::Owns,
                    });
                }
            }
            for thread in q.waiters.threads() {
                if !self.thread_ref(thread).is_some_and(|state| state.waiting.contains(&queue)) {
                    return Err(InvariantViolation::EdgeMismatch { thread, queue, edge: GraphEdge::WaitsOn });
                }
            }
        }

        for (thread, state) in self.threads() {
            for queue in &state.owned {
                if self.queue_ref(*queue).owner != Some(thread) {
                    return Err(InvariantViolation::EdgeMismatch {
                        thread,
                        queue: *queue,
                        edge: GraphEdge::Owns,
                    });
                }
            }
            for queue in &state.waiting {
                if !self.queue_ref(*queue).waiters.contains(thread) {
                    return Err(InvariantViolation::EdgeMismatch {
                        thread,
                        queue: *queue,
                        edge: GraphEdge::WaitsOn,
                    });
                }
            }
        }
        Ok(())
    }
}
