// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Insertion stamps used to break ties between waiters of equal priority.

/// Monotonic stamp; a smaller value means "waiting longer".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Sequence(u64);

impl Sequence {
    /// Exposes the raw numeric value primarily for testing.
    pub fn value(self) -> u64 {
        self.0
    }
}

/// Issues strictly increasing [`Sequence`] stamps. Never reuses a value.
///
/// One generator is shared by all queues of a scheduler so stamps are
/// comparable across queues.
#[derive(Debug, Default)]
pub(crate) struct SequenceGenerator {
    next: u64,
}

impl SequenceGenerator {
    pub(crate) const fn new() -> Self {
        Self { next: 0 }
    }

    pub(crate) fn next(&mut self) -> Sequence {
        let seq = Sequence(self.next);
        self.next += 1;
        seq
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamps_strictly_increase() {
        let mut gen = SequenceGenerator::new();
        let a = gen.next();
        let b = gen.next();
        let c = gen.next();
        assert!(a < b && b < c);
        assert_eq!(a.value(), 0);
        assert_eq!(c.value(), 2);
    }
}
