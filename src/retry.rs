//! Pacing for the "Updating Token" retry loop.
//!
//! While Ubersmith rotates its internal token it answers with an HTML page
//! instead of JSON. That page is the only condition the handler retries; a
//! [`RetryStrategy`] decides how many times and how long to wait in between.

use std::time::Duration;

/// Delay before re-sending a request that hit the token-update page.
pub const TOKEN_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Total attempts made before giving up on the token-update page.
pub const TOKEN_ATTEMPTS: usize = 3;

/// Defines how many times, and after what delay, a request is re-sent.
///
/// The default is Ubersmith's documented behaviour: three attempts in total,
/// two seconds apart.
///
/// # Examples
///
/// ```
/// use ubersmith::RetryStrategy;
/// use std::time::Duration;
///
/// let default = RetryStrategy::default();
/// assert_eq!(default.max_attempts(), 3);
/// assert_eq!(default.delay_for_attempt(1), Some(Duration::from_secs(2)));
/// assert_eq!(default.delay_for_attempt(3), None);
///
/// let quick = RetryStrategy::Linear {
///     delay: Duration::from_millis(100),
///     max_retries: 1,
/// };
/// assert_eq!(quick.max_attempts(), 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryStrategy {
    /// Send each request once.
    None,

    /// The same delay before every re-send.
    Linear {
        delay: Duration,
        /// Re-sends after the first attempt.
        max_retries: usize,
    },
}

impl RetryStrategy {
    /// Returns the delay after the given attempt, or `None` if retries are exhausted.
    ///
    /// # Arguments
    ///
    /// * `attempt` - The attempt that just hit the token page (1-indexed)
    pub fn delay_for_attempt(&self, attempt: usize) -> Option<Duration> {
        match self {
            RetryStrategy::None => None,
            RetryStrategy::Linear { delay, max_retries } => {
                (attempt >= 1 && attempt <= *max_retries).then_some(*delay)
            }
        }
    }

    /// Returns how many re-sends follow the first attempt.
    pub fn max_retries(&self) -> usize {
        match self {
            RetryStrategy::None => 0,
            RetryStrategy::Linear { max_retries, .. } => *max_retries,
        }
    }

    /// Returns the total number of attempts, counting the first.
    pub fn max_attempts(&self) -> usize {
        self.max_retries() + 1
    }
}

impl Default for RetryStrategy {
    fn default() -> Self {
        RetryStrategy::Linear {
            delay: TOKEN_RETRY_DELAY,
            max_retries: TOKEN_ATTEMPTS - 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_budget() {
        let strategy = RetryStrategy::Linear {
            delay: Duration::from_millis(50),
            max_retries: 1,
        };
        assert_eq!(strategy.delay_for_attempt(1), Some(Duration::from_millis(50)));
        assert_eq!(strategy.delay_for_attempt(2), None);
        assert_eq!(strategy.max_attempts(), 2);
    }

    #[test]
    fn test_no_retry() {
        let strategy = RetryStrategy::None;
        assert_eq!(strategy.delay_for_attempt(1), None);
        assert_eq!(strategy.max_attempts(), 1);
    }

    #[test]
    fn test_default_pauses_twice() {
        let strategy = RetryStrategy::default();
        let pauses: Vec<_> = (1..=TOKEN_ATTEMPTS)
            .map_while(|attempt| strategy.delay_for_attempt(attempt))
            .collect();
        assert_eq!(pauses, vec![Duration::from_secs(2), Duration::from_secs(2)]);
        assert_eq!(strategy.max_attempts(), TOKEN_ATTEMPTS);
    }
}
