//! Shared cancellation signal for all pipeline tasks
//!
//! One flag is created per pipeline run and cloned into every collector
//! thread. Collectors observe it at their sleep/read suspension points;
//! the signal handler triggers it.

use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Cooperative shutdown flag shared by all collector tasks
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag {
    triggered: Arc<Mutex<bool>>,
}

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown of every task observing this flag
    pub fn trigger(&self) {
        *self.triggered.lock().unwrap() = true;
    }

    /// Check whether shutdown has been requested
    pub fn is_triggered(&self) -> bool {
        *self.triggered.lock().unwrap()
    }

    /// Sleep for up to `duration`, re-checking the flag in short slices so
    /// long poll intervals stay responsive to shutdown
    ///
    /// Returns `false` if shutdown was requested before or during the sleep,
    /// `true` if the full duration elapsed.
    pub fn sleep_while_active(&self, duration: Duration) -> bool {
        let slice = Duration::from_millis(100);
        let mut remaining = duration;

        while remaining > Duration::ZERO {
            if self.is_triggered() {
                return false;
            }
            let nap = std::cmp::min(remaining, slice);
            std::thread::sleep(nap);
            remaining = remaining.saturating_sub(nap);
        }

        !self.is_triggered()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_flag_starts_untriggered() {
        let flag = ShutdownFlag::new();
        assert!(!flag.is_triggered());
    }

    #[test]
    fn test_trigger_is_visible_to_clones() {
        let flag = ShutdownFlag::new();
        let clone = flag.clone();

        flag.trigger();
        assert!(clone.is_triggered());
    }

    #[test]
    fn test_sleep_completes_when_active() {
        let flag = ShutdownFlag::new();
        let start = Instant::now();
        assert!(flag.sleep_while_active(Duration::from_millis(50)));
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_sleep_returns_immediately_when_triggered() {
        let flag = ShutdownFlag::new();
        flag.trigger();

        let start = Instant::now();
        assert!(!flag.sleep_while_active(Duration::from_secs(60)));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_sleep_is_interrupted_by_concurrent_trigger() {
        let flag = ShutdownFlag::new();
        let trigger_flag = flag.clone();

        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(150));
            trigger_flag.trigger();
        });

        let start = Instant::now();
        assert!(!flag.sleep_while_active(Duration::from_secs(60)));
        // Interrupted well before the full minute
        assert!(start.elapsed() < Duration::from_secs(5));

        handle.join().unwrap();
    }
}
