//! Per-faculty capacity ceiling.

use std::num::NonZeroU32;

/// Decides whether a faculty member can take another student.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityPolicy {
    limit: NonZeroU32,
}

impl CapacityPolicy {
    pub const DEFAULT_LIMIT: NonZeroU32 = match NonZeroU32::new(10) {
        Some(limit) => limit,
        None => unreachable!(),
    };

    pub const fn new(limit: NonZeroU32) -> Self {
        Self { limit }
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.limit.get())
    }

    pub fn has_room(&self, active: i64) -> bool {
        active < self.limit()
    }

    /// Free slots left, never negative.
    pub fn remaining(&self, active: i64) -> i64 {
        (self.limit() - active).max(0)
    }

    /// Share of the ceiling in use, clamped to `0..=100`.
    pub fn utilization_percent(&self, active: i64) -> u8 {
        let used = active.clamp(0, self.limit());
        // used <= limit, so the quotient is at most 100
        u8::try_from(used * 100 / self.limit()).unwrap_or(100)
    }
}

impl Default for CapacityPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LIMIT)
    }
}
