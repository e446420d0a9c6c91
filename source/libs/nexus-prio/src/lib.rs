// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Priority scheduler for resource wait queues with transitive priority donation
//! OWNERS: @kernel-sched-team
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Unit tests per module + tests/{donation,ordering,contract,prop_invariants}.rs
//!
//! PUBLIC API: Scheduler (new_queue/set_priority/wait_for_access/acquire/next_thread/audit),
//!             QueueMut, Priority, ThreadId, QueueId, PriorityError, InvariantViolation
//! DEPENDS_ON: alloc (BTreeMap/BTreeSet/VecDeque), log, thiserror
//! INVARIANTS:
//!   - effective priority >= base priority for every thread
//!   - a valid cached effective priority equals max(base, max waiter of owned transfer queues)
//!   - a queue owner is never a waiter of the same queue
//!   - equal effective priority dequeues in stamp order (FIFO)
//!
//! The crate decides *which* waiting thread receives a resource next. It never
//! blocks or switches threads itself: callers (lock, condvar and join
//! primitives) run each operation with interrupts disabled and act on the
//! result. In Rust that exclusivity is expressed as `&mut Scheduler` on every
//! operation; `Scheduler` is `!Send` and `!Sync`.
//!
//! ## Example
//! ```
//! use nexus_prio::{Scheduler, ThreadId};
//!
//! let mut sched = Scheduler::new();
//! let lock = sched.new_queue(true);
//! let (low, high) = (ThreadId::from_raw(1), ThreadId::from_raw(2));
//!
//! sched.acquire(lock, low);
//! sched.set_priority(high, 7);
//! sched.wait_for_access(lock, high);
//! assert_eq!(sched.effective_priority(low).as_raw(), 7);
//!
//! assert_eq!(sched.next_thread(lock), Some(high));
//! assert_eq!(sched.effective_priority(low).as_raw(), 1);
//! ```

#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_code)]
#![cfg_attr(not(test), forbid(clippy::unwrap_used))]

extern crate alloc;

mod audit;
mod cache;
mod priority;
mod scheduler;
mod sequence;
mod thread_state;
mod types;
mod wait_queue;
mod waiters;

pub use audit::{GraphEdge, InvariantViolation};
pub use priority::{Priority, PriorityError, PRIORITY_DEFAULT, PRIORITY_LEVELS, PRIORITY_MAX, PRIORITY_MIN};
pub use scheduler::Scheduler;
pub use sequence::Sequence;
pub use types::{QueueId, ThreadId};
pub use wait_queue::QueueMut;
