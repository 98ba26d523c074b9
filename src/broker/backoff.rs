use super::config::ReconnectConfig;
use rand::Rng;
use std::time::Duration;

/// Capped exponential backoff for broker reconnects.
///
/// Each call to `next_delay` returns the current delay (jittered into
/// `[delay/2, delay]` when enabled) and grows the base delay by the
/// multiplier up to the cap.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    multiplier: f64,
    jitter: bool,
    current: Duration,
    attempts: u32,
}

impl Backoff {
    /// Out-of-range values are clamped so a delay is always computable:
    /// multiplier at least 1.0, cap never below the initial delay.
    pub fn new(config: &ReconnectConfig) -> Self {
        let initial = Duration::from_millis(config.initial_delay_ms.max(1));
        let multiplier = if config.multiplier.is_finite() {
            config.multiplier.max(1.0)
        } else {
            1.0
        };
        Self {
            initial,
            max: Duration::from_millis(config.max_delay_ms).max(initial),
            multiplier,
            jitter: config.jitter,
            current: initial,
            attempts: 0,
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        let base = self.current;
        self.attempts = self.attempts.saturating_add(1);

        let grown = base.as_secs_f64() * self.multiplier;
        self.current = Duration::from_secs_f64(grown.min(self.max.as_secs_f64()));

        if self.jitter && !base.is_zero() {
            let half = base / 2;
            let spread = rand::thread_rng().gen_range(0..=half.as_millis() as u64);
            half + Duration::from_millis(spread)
        } else {
            base
        }
    }

    /// Back to the initial delay after a healthy session
    pub fn reset(&mut self) {
        self.current = self.initial;
        self.attempts = 0;
    }

    /// Consecutive failed attempts since the last reset
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(jitter: bool) -> ReconnectConfig {
        ReconnectConfig {
            initial_delay_ms: 100,
            max_delay_ms: 1_000,
            multiplier: 2.0,
            jitter,
        }
    }

    #[test]
    fn test_delay_doubles_and_caps() {
        let mut backoff = Backoff::new(&config(false));
        let delays: Vec<u64> = (0..7)
            .map(|_| backoff.next_delay().as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![100, 200, 400, 800, 1000, 1000, 1000]);
        assert_eq!(backoff.attempts(), 7);
    }

    #[test]
    fn test_reset_returns_to_initial() {
        let mut backoff = Backoff::new(&config(false));
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.attempts(), 0);
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let mut backoff = Backoff::new(&config(true));
        for expected in [100u64, 200, 400, 800, 1000, 1000] {
            let delay = backoff.next_delay().as_millis() as u64;
            assert!(
                delay >= expected / 2 && delay <= expected,
                "delay {} outside [{}, {}]",
                delay,
                expected / 2,
                expected
            );
        }
    }

    #[test]
    fn test_out_of_range_config_is_clamped() {
        let mut backoff = Backoff::new(&ReconnectConfig {
            initial_delay_ms: 100,
            max_delay_ms: 10,
            multiplier: -1.0,
            jitter: false,
        });
        for _ in 0..3 {
            assert_eq!(backoff.next_delay(), Duration::from_millis(100));
        }

        let mut backoff = Backoff::new(&ReconnectConfig {
            multiplier: f64::NAN,
            ..config(false)
        });
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
    }
}
