//! Polling knobs: attempt budget, poll interval, per-attempt ceiling, backoff.

use std::time::Duration;

/// What a per-attempt poll timeout does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeoutPolicy {
    /// Count the timeout against the attempt budget and start a new attempt.
    #[default]
    Retry,
    /// End the request as timed out on the first timeout.
    Terminate,
}

impl std::str::FromStr for TimeoutPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "retry" => Ok(TimeoutPolicy::Retry),
            "terminate" => Ok(TimeoutPolicy::Terminate),
            other => Err(format!("unknown timeout policy: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub max_attempts: u32,
    pub poll_interval: Duration,
    /// Wall-clock ceiling of one attempt, measured from just before submit.
    pub attempt_timeout: Duration,
    pub retry_backoff: Duration,
    pub timeout_policy: TimeoutPolicy,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            poll_interval: Duration::from_secs(1),
            attempt_timeout: Duration::from_secs(60),
            retry_backoff: Duration::from_millis(500),
            timeout_policy: TimeoutPolicy::Retry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_policy_parses() {
        assert_eq!("retry".parse::<TimeoutPolicy>(), Ok(TimeoutPolicy::Retry));
        assert_eq!("Terminate".parse::<TimeoutPolicy>(), Ok(TimeoutPolicy::Terminate));
        assert!("later".parse::<TimeoutPolicy>().is_err());
    }

    #[test]
    fn defaults() {
        let c = PollerConfig::default();
        assert_eq!(c.max_attempts, 3);
        assert_eq!(c.poll_interval, Duration::from_secs(1));
        assert_eq!(c.attempt_timeout, Duration::from_secs(60));
        assert_eq!(c.retry_backoff, Duration::from_millis(500));
        assert_eq!(c.timeout_policy, TimeoutPolicy::Retry);
    }
}
