//! Saturating counter that caps the number of elements a single walk may visit

use thiserror::Error;

/// Counter configuration or usage error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CounterError {
    #[error("Upper bound must be between 1 and {max} (exclusive), got {0}", max = i32::MAX)]
    InvalidUpperBound(i32),

    #[error("Cannot add a negative count: {0}")]
    NegativeCount(i32),
}

/// Counts visited elements against a fixed upper bound
///
/// `count` never exceeds `upper_bound`; `attempts` records every request,
/// including the refused ones. Both saturate at `i32::MAX`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundedCounter {
    upper_bound: i32,
    attempts: i32,
    count: i32,
}

impl BoundedCounter {
    pub fn new(upper_bound: i32) -> Result<Self, CounterError> {
        if upper_bound < 1 || upper_bound == i32::MAX {
            return Err(CounterError::InvalidUpperBound(upper_bound));
        }
        Ok(Self {
            upper_bound,
            attempts: 0,
            count: 0,
        })
    }

    pub fn upper_bound(&self) -> i32 {
        self.upper_bound
    }

    pub fn attempts(&self) -> i32 {
        self.attempts
    }

    pub fn count(&self) -> i32 {
        self.count
    }

    /// True once more work was requested than the bound allows
    pub fn upper_bound_exceeded(&self) -> bool {
        self.attempts > self.upper_bound
    }

    /// Count one more element; false if the bound was already reached
    pub fn try_increment(&mut self) -> bool {
        self.attempts = self.attempts.saturating_add(1);
        if self.count >= self.upper_bound {
            return false;
        }
        self.count += 1;
        true
    }

    /// Count `n` more elements; false if the bound was already reached
    pub fn try_add(&mut self, n: i32) -> Result<bool, CounterError> {
        if n < 0 {
            return Err(CounterError::NegativeCount(n));
        }
        self.attempts = self.attempts.saturating_add(n);
        if self.count >= self.upper_bound {
            return Ok(false);
        }
        self.count = self.count.saturating_add(n).min(self.upper_bound);
        Ok(true)
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
        self.count = 0;
    }
}
