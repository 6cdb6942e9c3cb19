//! Retry budget: decides what a failed attempt means.

/// Maximum number of attempts a task gets before it is dropped.
///
/// There is no backoff: a task that failed stays eligible and is retried on
/// the next pass of whoever drives `run()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    max_attempts: u32,
}

/// Result of recording one failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptVerdict {
    /// Budget left; persist the new count and keep the task.
    Retry(u32),
    /// Budget spent; drop the task (dead-letter).
    Exhausted(u32),
}

impl AttemptVerdict {
    pub fn attempts(self) -> u32 {
        match self {
            Self::Retry(n) | Self::Exhausted(n) => n,
        }
    }
}

impl RetryBudget {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

    /// `max_attempts` below 1 is raised to 1.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Clamp `attempts` into range, then count one more failure.
    ///
    /// A stored count that is already at (or past) the limit is treated as
    /// one short of it, so the outcome is always `Exhausted(max)`.
    pub fn record_failure(&self, attempts: u32) -> AttemptVerdict {
        let next = attempts.min(self.max_attempts - 1) + 1;
        if next >= self.max_attempts {
            AttemptVerdict::Exhausted(next)
        } else {
            AttemptVerdict::Retry(next)
        }
    }
}

impl Default for RetryBudget {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_ATTEMPTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_raised_to_one() {
        assert_eq!(RetryBudget::new(0).max_attempts(), 1);
    }

    #[test]
    fn counts_up_to_exhaustion() {
        let budget = RetryBudget::new(3);
        assert_eq!(budget.record_failure(0), AttemptVerdict::Retry(1));
        assert_eq!(budget.record_failure(1), AttemptVerdict::Retry(2));
        assert_eq!(budget.record_failure(2), AttemptVerdict::Exhausted(3));
    }

    #[test]
    fn out_of_range_count_is_clamped() {
        let budget = RetryBudget::new(3);
        assert_eq!(budget.record_failure(3), AttemptVerdict::Exhausted(3));
        assert_eq!(budget.record_failure(250), AttemptVerdict::Exhausted(3));
    }

    #[test]
    fn single_attempt_budget_exhausts_immediately() {
        let budget = RetryBudget::new(1);
        assert_eq!(budget.record_failure(0), AttemptVerdict::Exhausted(1));
    }
}
