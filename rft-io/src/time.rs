//! Time utilities for RFT
//!
//! Every wait in the protocol is a short poll slice bounded by an absolute
//! [`Deadline`]; cancellation is a [`StopSignal`] checked between slices.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Absolute deadline measured from a start instant
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    start: Instant,
    duration: Duration,
}

impl Deadline {
    /// Start a deadline `duration` from now
    pub fn new(duration: Duration) -> Self {
        Deadline {
            start: Instant::now(),
            duration,
        }
    }

    /// Check if the deadline has passed
    pub fn expired(&self) -> bool {
        self.start.elapsed() >= self.duration
    }

    /// Time left before expiry, zero once expired
    pub fn remaining(&self) -> Duration {
        self.duration.saturating_sub(self.start.elapsed())
    }

    /// Length of the next poll: `slice`, shortened to what is left
    pub fn slice(&self, slice: Duration) -> Duration {
        slice.min(self.remaining())
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Restart the deadline from now
    pub fn reset(&mut self) {
        self.start = Instant::now();
    }
}

/// Cooperative cancellation flag
///
/// Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every holder to stop at its next poll boundary
    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_deadline_expiry() {
        let deadline = Deadline::new(Duration::from_millis(10));
        assert!(!deadline.expired());
        assert!(deadline.remaining() <= Duration::from_millis(10));

        thread::sleep(Duration::from_millis(11));
        assert!(deadline.expired());
        assert_eq!(deadline.remaining(), Duration::ZERO);
        assert_eq!(deadline.slice(Duration::from_millis(500)), Duration::ZERO);
    }

    #[test]
    fn test_deadline_slice() {
        let deadline = Deadline::new(Duration::from_secs(10));
        assert_eq!(
            deadline.slice(Duration::from_millis(500)),
            Duration::from_millis(500)
        );

        let short = Deadline::new(Duration::from_millis(100));
        assert!(short.slice(Duration::from_millis(500)) <= Duration::from_millis(100));
    }

    #[test]
    fn test_deadline_reset() {
        let mut deadline = Deadline::new(Duration::from_millis(10));
        thread::sleep(Duration::from_millis(11));
        assert!(deadline.expired());

        deadline.reset();
        assert!(!deadline.expired());
    }

    #[test]
    fn test_stop_signal_shared() {
        let signal = StopSignal::new();
        let other = signal.clone();
        assert!(!other.is_raised());

        thread::spawn(move || signal.raise()).join().unwrap();
        assert!(other.is_raised());
    }
}
