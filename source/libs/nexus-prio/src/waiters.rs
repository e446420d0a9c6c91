// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Ordered waiter set of a wait queue
//! INVARIANTS: One FIFO per priority level, each sorted by stamp; a thread is filed at most once
//!
//! Selection takes the front of the highest non-empty bucket, which yields
//! (effective priority descending, stamp ascending). A waiter whose effective
//! priority changes after insertion is moved between buckets with `refile`
//! (stamp kept) or `restamp` (stamp replaced); no heap re-keying is needed.

use alloc::collections::{BTreeMap, VecDeque};
use alloc::vec::Vec;
use core::array;

use crate::priority::{Priority, PRIORITY_LEVELS};
use crate::sequence::Sequence;
use crate::types::ThreadId;

/// Waiter key: a thread and the stamp it was (re)inserted with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Waiter {
    pub(crate) thread: ThreadId,
    pub(crate) seq: Sequence,
}

pub(crate) struct WaiterBuckets {
    buckets: [VecDeque<Waiter>; PRIORITY_LEVELS],
    // Bucket each waiter is currently filed under.
    filed: BTreeMap<ThreadId, Priority>,
}

impl WaiterBuckets {
    pub(crate) fn new() -> Self {
        Self { buckets: array::from_fn(|_| VecDeque::new()), filed: BTreeMap::new() }
    }

    pub(crate) fn len(&self) -> usize {
        self.filed.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.filed.is_empty()
    }

    pub(crate) fn contains(&self, thread: ThreadId) -> bool {
        self.filed.contains_key(&thread)
    }

    /// Priority level `thread` is filed under, if it waits here.
    #[cfg(test)]
    pub(crate) fn filed_under(&self, thread: ThreadId) -> Option<Priority> {
        self.filed.get(&thread).copied()
    }

    pub(crate) fn insert(&mut self, waiter: Waiter, priority: Priority) {
        let previous = self.filed.insert(waiter.thread, priority);
        assert!(previous.is_none(), "waiter {} filed twice", waiter.thread);
        let bucket = &mut self.buckets[priority.as_index()];
        // Fresh stamps are the largest so far; only refiles land mid-bucket.
        if bucket.back().map_or(true, |last| last.seq < waiter.seq) {
            bucket.push_back(waiter);
        } else {
            let at = bucket.partition_point(|w| w.seq < waiter.seq);
            bucket.insert(at, waiter);
        }
    }

    pub(crate) fn remove(&mut self, thread: ThreadId) -> Option<(Priority, Waiter)> {
        let priority = self.filed.remove(&thread)?;
        let bucket = &mut self.buckets[priority.as_index()];
        let at = bucket.iter().position(|w| w.thread == thread)?;
        bucket.remove(at).map(|waiter| (priority, waiter))
    }

    /// Moves `thread` to the bucket for `priority`, keeping its stamp.
    /// Returns false if the thread is not a waiter.
    pub(crate) fn refile(&mut self, thread: ThreadId, priority: Priority) -> bool {
        match self.filed.get(&thread) {
            None => false,
            Some(current) if *current == priority => true,
            Some(_) => {
                if let Some((_, waiter)) = self.remove(thread) {
                    self.insert(waiter, priority);
                }
                true
            }
        }
    }

    /// Replaces the stamp of `thread` and files it under `priority`.
    pub(crate) fn restamp(&mut self, thread: ThreadId, seq: Sequence, priority: Priority) -> bool {
        if self.remove(thread).is_none() {
            return false;
        }
        self.insert(Waiter { thread, seq }, priority);
        true
    }

    /// Highest non-empty level.
    pub(crate) fn top(&self) -> Option<Priority> {
        self.buckets
            .iter()
            .rposition(|bucket| !bucket.is_empty())
            .and_then(|index| Priority::new(index as u8))
    }

    pub(crate) fn peek(&self) -> Option<Waiter> {
        self.buckets.iter().rev().find_map(|bucket| bucket.front().copied())
    }

    pub(crate) fn pop(&mut self) -> Option<(Priority, Waiter)> {
        let priority = self.top()?;
        let waiter = self.buckets[priority.as_index()].pop_front()?;
        self.filed.remove(&waiter.thread);
        Some((priority, waiter))
    }

    /// Waiters in dequeue order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (Priority, &Waiter)> + '_ {
        self.buckets.iter().enumerate().rev().flat_map(|(index, bucket)| {
            let priority = Priority::new(index as u8).unwrap_or(Priority::MAX);
            bucket.iter().map(move |w| (priority, w))
        })
    }

    /// Snapshot of the waiting threads, in no particular order.
    pub(crate) fn threads(&self) -> Vec<ThreadId> {
        self.filed.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::SequenceGenerator;

    fn prio(raw: u8) -> Priority {
        Priority::new(raw).unwrap()
    }

    fn waiter(gen: &mut SequenceGenerator, raw: u32) -> Waiter {
        Waiter { thread: ThreadId::from_raw(raw), seq: gen.next() }
    }

    #[test]
    fn pops_highest_then_oldest() {
        let mut gen = SequenceGenerator::new();
        let mut set = WaiterBuckets::new();
        set.insert(waiter(&mut gen, 1), prio(2));
        set.insert(waiter(&mut gen, 2), prio(5));
        set.insert(waiter(&mut gen, 3), prio(2));
        set.insert(waiter(&mut gen, 4), prio(5));

        let order: Vec<u32> =
            core::iter::from_fn(|| set.pop()).map(|(_, w)| w.thread.as_raw()).collect();
        assert_eq!(order, [2, 4, 1, 3]);
        assert!(set.is_empty());
    }

    #[test]
    fn refile_keeps_arrival_order() {
        let mut gen = SequenceGenerator::new();
        let mut set = WaiterBuckets::new();
        set.insert(waiter(&mut gen, 1), prio(1));
        set.insert(waiter(&mut gen, 2), prio(3));
        set.insert(waiter(&mut gen, 3), prio(3));

        // Thread 1 arrived first, so it overtakes its new peers after a raise.
        assert!(set.refile(ThreadId::from_raw(1), prio(3)));
        assert_eq!(set.peek().map(|w| w.thread), Some(ThreadId::from_raw(1)));
        assert_eq!(set.filed_under(ThreadId::from_raw(1)), Some(prio(3)));
        assert_eq!(set.top(), Some(prio(3)));
    }

    #[test]
    fn restamp_moves_behind_peers() {
        let mut gen = SequenceGenerator::new();
        let mut set = WaiterBuckets::new();
        set.insert(waiter(&mut gen, 1), prio(3));
        set.insert(waiter(&mut gen, 2), prio(3));

        assert!(set.restamp(ThreadId::from_raw(1), gen.next(), prio(3)));
        let order: Vec<u32> = set.iter().map(|(_, w)| w.thread.as_raw()).collect();
        assert_eq!(order, [2, 1]);
    }

    #[test]
    fn remove_unknown_is_none() {
        let mut set = WaiterBuckets::new();
        assert!(set.remove(ThreadId::from_raw(9)).is_none());
        assert!(!set.refile(ThreadId::from_raw(9), prio(1)));
        assert_eq!(set.top(), None);
        assert_eq!(set.len(), 0);
    }
}
