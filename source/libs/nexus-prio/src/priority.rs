// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Priority values and their fixed bounds.
//!
//! The range is part of the scheduling contract shared with the lock and join
//! primitives; it is not configurable.

use core::fmt;

/// Lowest priority a thread can hold.
pub const PRIORITY_MIN: u8 = 0;
/// Highest priority a thread can hold.
pub const PRIORITY_MAX: u8 = 7;
/// Priority assigned to a thread the first time the scheduler sees it.
pub const PRIORITY_DEFAULT: u8 = 1;
/// Number of distinct priority levels (one waiter bucket per level).
pub const PRIORITY_LEVELS: usize = (PRIORITY_MAX - PRIORITY_MIN) as usize + 1;

/// Rejection reasons for priority values crossing a validation boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PriorityError {
    /// The raw value lies outside `[PRIORITY_MIN, PRIORITY_MAX]`.
    #[error("priority {raw} outside [{min}, {max}]", min = PRIORITY_MIN, max = PRIORITY_MAX)]
    OutOfRange { raw: u8 },
}

/// A scheduling priority within `[PRIORITY_MIN, PRIORITY_MAX]`.
///
/// **Invariant**: the wrapped value is always in range; the only constructors
/// are the checked ones below and the associated constants.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Priority(u8);

impl Priority {
    pub const MIN: Self = Self(PRIORITY_MIN);
    pub const MAX: Self = Self(PRIORITY_MAX);
    pub const DEFAULT: Self = Self(PRIORITY_DEFAULT);

    /// Returns `Some` when `raw` is a valid priority.
    #[inline]
    pub const fn new(raw: u8) -> Option<Self> {
        if raw <= PRIORITY_MAX {
            Some(Self(raw))
        } else {
            None
        }
    }

    #[inline]
    pub const fn as_raw(self) -> u8 {
        self.0
    }

    /// Bucket index for this priority.
    #[inline]
    pub const fn as_index(self) -> usize {
        (self.0 - PRIORITY_MIN) as usize
    }

    /// One level up, or `None` at `MAX`.
    #[inline]
    pub const fn raised(self) -> Option<Self> {
        if self.0 < PRIORITY_MAX {
            Some(Self(self.0 + 1))
        } else {
            None
        }
    }

    /// One level down, or `None` at `MIN`.
    #[inline]
    pub const fn lowered(self) -> Option<Self> {
        if self.0 > PRIORITY_MIN {
            Some(Self(self.0 - 1))
        } else {
            None
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<u8> for Priority {
    type Error = PriorityError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        Self::new(raw).ok_or(PriorityError::OutOfRange { raw })
    }
}

impl From<Priority> for u8 {
    fn from(value: Priority) -> Self {
        value.as_raw()
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
