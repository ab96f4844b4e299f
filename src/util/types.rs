//! Small value types shared across the scheduler.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Scheduler-assigned task identifier, unique per scheduler instance.
pub type TaskId = u64;

/// Dispatch priority. Higher values dispatch earlier.
///
/// Any `i32` is valid; equal priorities dispatch in submission order.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Priority(pub i32);

impl Priority {
    /// Priority used when a caller does not pick one.
    pub const NORMAL: Self = Self(0);

    /// Raw numeric value.
    #[must_use]
    pub const fn value(self) -> i32 {
        self.0
    }
}

impl From<i32> for Priority {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
