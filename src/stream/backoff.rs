use std::time::Duration;

/// Linear, capped reconnect backoff: `delay(n) = min(n * base, max)`.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    attempt: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl ReconnectPolicy {
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            attempt: 0,
            base_delay,
            max_delay: max_delay.max(base_delay),
        }
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt).min(self.max_delay)
    }

    pub fn current_delay(&self) -> Duration {
        self.delay_for(self.attempt)
    }

    pub fn record_failure(&mut self) -> Duration {
        self.attempt = self.attempt.saturating_add(1);
        self.current_delay()
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> ReconnectPolicy {
        ReconnectPolicy::new(Duration::from_millis(1_000), Duration::from_millis(10_000))
    }

    #[test]
    fn delays_grow_linearly_then_cap() {
        let mut policy = policy();
        let delays: Vec<u128> = (0..12)
            .map(|_| policy.record_failure().as_millis())
            .collect();

        assert_eq!(
            delays,
            vec![
                1_000, 2_000, 3_000, 4_000, 5_000, 6_000, 7_000, 8_000, 9_000, 10_000, 10_000,
                10_000
            ]
        );
    }

    #[test]
    fn delays_are_non_decreasing() {
        let policy = policy();
        let mut previous = Duration::ZERO;
        for attempt in 1..200 {
            let delay = policy.delay_for(attempt);
            assert!(delay >= previous);
            assert!(delay <= Duration::from_millis(10_000));
            previous = delay;
        }
    }

    #[test]
    fn reset_restarts_at_base_delay() {
        let mut policy = policy();
        policy.record_failure();
        policy.record_failure();
        policy.record_failure();
        assert_eq!(policy.attempt(), 3);

        policy.reset();
        assert_eq!(policy.attempt(), 0);
        assert_eq!(policy.current_delay(), Duration::ZERO);
        assert_eq!(policy.record_failure(), Duration::from_millis(1_000));
    }

    #[test]
    fn saturates_instead_of_overflowing() {
        let policy = policy();
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_millis(10_000));
    }
}
