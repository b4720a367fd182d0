use crate::state::TurnState;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Bounds the execution ⇄ repair cycle.
///
/// `attempt_count` counts failed executions: it is bumped on every failure
/// and the cycle exits to the exhausted terminal once it reaches the bound,
/// so `max_attempts = 3` allows executions on attempts 0, 1 and 2 and at
/// most two repairs. The bound is the pipeline's liveness guarantee.
#[derive(Debug, Clone)]
pub struct RetryController {
    max_attempts: u32,
}

/// Outcome of one failed execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryVerdict {
    Repair,
    Exhausted,
}

impl Default for RetryController {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

impl RetryController {
    pub fn new(max_attempts: u32) -> Self {
        // A zero bound would let attempt_count overshoot it.
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn on_failed_attempt(&self, state: &mut TurnState) -> RetryVerdict {
        state.attempt_count += 1;
        if state.attempt_count >= self.max_attempts {
            RetryVerdict::Exhausted
        } else {
            RetryVerdict::Repair
        }
    }
}
