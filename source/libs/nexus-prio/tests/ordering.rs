// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Waiter selection order of priority wait queues
//! OWNERS: @kernel-sched-team
//! STATUS: Functional
//! TEST_COVERAGE: 8 tests
//!
//! TEST_SCOPE:
//!   - Highest effective priority first, FIFO among equals
//!   - Re-stamping on base priority changes
//!   - Direct acquire by a waiting thread
//!   - Queue-bound view (QueueMut)
//!
//! TEST_SCENARIOS:
//!   - equal_priorities_are_fifo(): A, B, C at the same priority leave in arrival order
//!   - higher_priority_jumps_ahead(): late high-priority waiter is selected first
//!   - setting_same_priority_keeps_place(): A=3 re-set to 3 stays ahead of B
//!   - priority_round_trip_requeues_behind(): A 3 -> 4 -> 3 ends up behind B
//!   - donated_boost_keeps_arrival_stamp(): donation re-files without re-stamping
//!   - acquire_removes_waiter_only_there(): acquire by a waiter leaves other queues alone
//!   - queue_view_mirrors_scheduler(): QueueMut forwards to the same state
//!   - drain_visits_every_waiter_once(): repeated next_thread empties the queue

use nexus_prio::{Priority, Scheduler, ThreadId};

fn t(raw: u32) -> ThreadId {
    ThreadId::from_raw(raw)
}

fn drain(sched: &mut Scheduler, queue: nexus_prio::QueueId) -> Vec<u32> {
    let mut order = Vec::new();
    while let Some(thread) = sched.next_thread(queue) {
        order.push(thread.as_raw());
    }
    order
}

#[test]
fn equal_priorities_are_fifo() {
    let mut sched = Scheduler::new();
    let q = sched.new_queue(true);
    for raw in [1, 2, 3] {
        sched.wait_for_access(q, t(raw));
    }
    assert_eq!(sched.waiters(q), vec![t(1), t(2), t(3)]);
    assert_eq!(drain(&mut sched, q), vec![1, 2, 3]);
    assert_eq!(sched.owner(q), Some(t(3)));
}

#[test]
fn higher_priority_jumps_ahead() {
    let mut sched = Scheduler::new();
    let q = sched.new_queue(false);
    sched.set_priority(t(1), 2);
    sched.set_priority(t(2), 2);
    sched.set_priority(t(3), 6);
    sched.set_priority(t(4), 0);
    for raw in [4, 1, 2, 3] {
        sched.wait_for_access(q, t(raw));
    }
    assert_eq!(sched.max_waiter_priority(q).as_raw(), 6);
    assert_eq!(drain(&mut sched, q), vec![3, 1, 2, 4]);
}

#[test]
fn setting_same_priority_keeps_place() {
    let mut sched = Scheduler::new();
    let q = sched.new_queue(true);
    let (a, b) = (t(1), t(2));
    sched.set_priority(a, 3);
    sched.set_priority(b, 3);
    sched.wait_for_access(q, a);
    sched.wait_for_access(q, b);

    sched.set_priority(a, 3);
    assert_eq!(sched.peek_next(q), Some(a));
    assert_eq!(sched.next_thread(q), Some(a));
}

#[test]
fn priority_round_trip_requeues_behind() {
    let mut sched = Scheduler::new();
    let q = sched.new_queue(true);
    let (a, b) = (t(1), t(2));
    sched.set_priority(a, 3);
    sched.set_priority(b, 3);
    sched.wait_for_access(q, a);
    sched.wait_for_access(q, b);

    sched.set_priority(a, 4);
    assert_eq!(sched.peek_next(q), Some(a));
    sched.set_priority(a, 3);
    assert_eq!(sched.next_thread(q), Some(b));
    assert_eq!(sched.next_thread(q), Some(a));
}

#[test]
fn donated_boost_keeps_arrival_stamp() {
    let mut sched = Scheduler::new();
    let lock = sched.new_queue(true);
    let run = sched.new_queue(false);
    let (a, b, donor) = (t(1), t(2), t(3));
    sched.set_priority(b, 4);

    // a waits first at 1, b second at 4.
    sched.acquire(lock, a);
    sched.wait_for_access(run, a);
    sched.wait_for_access(run, b);
    assert_eq!(sched.peek_next(run), Some(b));

    // A donation lifts a to 4: same level as b, earlier arrival.
    sched.set_priority(donor, 4);
    sched.wait_for_access(lock, donor);
    assert_eq!(sched.effective_priority(a).as_raw(), 4);
    assert_eq!(sched.waiters(run), vec![a, b]);
}

#[test]
fn acquire_removes_waiter_only_there() {
    let mut sched = Scheduler::new();
    let q1 = sched.new_queue(true);
    let q2 = sched.new_queue(true);
    sched.acquire(q1, t(9));
    sched.acquire(q2, t(8));
    sched.set_priority(t(1), 5);
    sched.wait_for_access(q1, t(1));
    sched.wait_for_access(q1, t(2));
    sched.wait_for_access(q2, t(3));

    sched.acquire(q1, t(1));
    assert_eq!(sched.owner(q1), Some(t(1)));
    assert!(!sched.contains(q1, t(1)));
    assert_eq!(sched.waiters(q1), vec![t(2)]);
    assert_eq!(sched.waiters(q2), vec![t(3)]);
    assert_eq!(sched.owner(q2), Some(t(8)));

    // The previous owner lost its donation, the new owner keeps its own.
    assert_eq!(sched.effective_priority(t(9)), Priority::DEFAULT);
    assert_eq!(sched.effective_priority(t(1)).as_raw(), 5);
    assert_eq!(sched.audit(), Ok(()));
}

#[test]
fn queue_view_mirrors_scheduler() {
    let mut sched = Scheduler::new();
    let id = sched.new_queue(true);
    {
        let mut q = sched.queue(id);
        assert_eq!(q.id(), id);
        assert!(q.is_empty());
        assert!(q.transfers_priority());
        q.acquire(t(1));
        q.wait_for_access(t(2));
        q.wait_for_access(t(3));
        assert_eq!(q.len(), 2);
        assert!(q.contains(t(3)));
        assert_eq!(q.owner(), Some(t(1)));
        assert_eq!(q.peek_next(), Some(t(2)));
        assert_eq!(q.max_waiter_priority(), Priority::DEFAULT);
        assert_eq!(q.next_thread(), Some(t(2)));
        assert_eq!(q.waiters(), vec![t(3)]);
    }
    assert_eq!(sched.owner(id), Some(t(2)));
    assert_eq!(sched.len(id), 1);
}

#[test]
fn drain_visits_every_waiter_once() {
    let mut sched = Scheduler::new();
    let q = sched.new_queue(true);
    let priorities = [3u8, 0, 7, 3, 5, 0, 7, 1];
    for (raw, priority) in priorities.iter().enumerate() {
        sched.set_priority(t(raw as u32), *priority);
        sched.wait_for_access(q, t(raw as u32));
    }
    assert_eq!(sched.len(q), priorities.len());
    assert_eq!(drain(&mut sched, q), vec![2, 6, 4, 0, 3, 7, 1, 5]);
    assert!(sched.is_empty(q));
    assert_eq!(sched.audit(), Ok(()));
}
