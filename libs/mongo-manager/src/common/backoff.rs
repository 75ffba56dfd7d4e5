use std::time::Duration;

/// Shortest delay the schedule ever produces
pub const MIN_DELAY: Duration = Duration::from_millis(1);

/// Smallest growth factor the schedule applies
pub const MIN_MULTIPLIER: u32 = 2;

/// Exponential backoff between connection attempts
///
/// There is no attempt limit: the schedule grows from `initial` by
/// `multiplier` on every failure and stays at `max` once it gets there.
/// Delays below [`MIN_DELAY`] and multipliers below [`MIN_MULTIPLIER`] are
/// raised to those bounds, so the schedule always grows and never spins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay after the first failed attempt
    pub initial: Duration,

    /// Upper bound of the delay
    pub max: Duration,

    /// Growth factor applied after every failed attempt (typically 2)
    pub multiplier: u32,
}

impl BackoffPolicy {
    /// Create a new policy with defaults
    ///
    /// Defaults:
    /// - initial: 3s
    /// - max: 5min
    /// - multiplier: 2
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_initial(mut self, initial: Duration) -> Self {
        self.initial = initial;
        self
    }

    pub fn with_max(mut self, max: Duration) -> Self {
        self.max = max;
        self
    }

    pub fn with_multiplier(mut self, multiplier: u32) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Start a fresh schedule
    pub fn start(&self) -> Backoff {
        let policy = Self {
            initial: self.initial.max(MIN_DELAY),
            max: self.max.max(MIN_DELAY),
            multiplier: self.multiplier.max(MIN_MULTIPLIER),
        };

        Backoff {
            current: policy.initial.min(policy.max),
            policy,
        }
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(3),
            max: Duration::from_secs(5 * 60),
            multiplier: 2,
        }
    }
}

/// Position in a [`BackoffPolicy`] schedule
///
/// Iterating yields the successive delays forever.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    current: Duration,
}

impl Backoff {
    /// Delay to wait after the most recent failure
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Move to the next delay, capped at the policy maximum
    pub fn advance(&mut self) -> Duration {
        self.current = self
            .current
            .saturating_mul(self.policy.multiplier)
            .min(self.policy.max);
        self.current
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let delay = self.current;
        self.advance();
        Some(delay)
    }
}
