//! Congestion Control for RFT
//!
//! Byte-counted Reno-style window management: exponential growth in slow
//! start, roughly one data unit per round trip in congestion avoidance, and
//! a collapse back to one data unit on retransmission timeout. There is no
//! fast retransmit or fast recovery; duplicate ACKs never shrink the window.

use crate::packet::MAX_PAYLOAD_SIZE;

/// Smallest congestion window, one data unit
pub const MIN_CWND: u32 = MAX_PAYLOAD_SIZE as u32;

/// Largest congestion window
pub const MAX_CWND: u32 = 51_200;

/// Initial slow-start threshold
pub const INITIAL_SSTHRESH: u32 = 10_000;

/// Congestion control state
#[derive(Debug, Clone)]
pub struct CongestionController {
    /// Congestion window (bytes)
    cwnd: u32,
    /// Slow start threshold (bytes)
    ssthresh: u32,
    /// Successful ACKs processed
    acks: u64,
    /// Timeout collapses
    timeouts: u64,
}

impl CongestionController {
    /// Create a controller starting in slow start
    pub fn new() -> Self {
        CongestionController {
            cwnd: MIN_CWND,
            ssthresh: INITIAL_SSTHRESH,
            acks: 0,
            timeouts: 0,
        }
    }

    /// Create a controller from explicit window values
    ///
    /// `cwnd` is clamped into `[MIN_CWND, MAX_CWND]`.
    pub fn with_window(cwnd: u32, ssthresh: u32) -> Self {
        CongestionController {
            cwnd: cwnd.clamp(MIN_CWND, MAX_CWND),
            ssthresh,
            acks: 0,
            timeouts: 0,
        }
    }

    /// Get current congestion window size in bytes
    pub fn congestion_window(&self) -> u32 {
        self.cwnd
    }

    /// Get the slow start threshold in bytes
    pub fn ssthresh(&self) -> u32 {
        self.ssthresh
    }

    /// Whether the window still grows exponentially
    pub fn in_slow_start(&self) -> bool {
        self.cwnd < self.ssthresh
    }

    /// Check whether `bytes` more can be put in flight
    pub fn allows(&self, in_flight: u64, bytes: u64) -> bool {
        in_flight + bytes <= u64::from(self.cwnd)
    }

    /// Record a successful cumulative acknowledgement
    pub fn on_successful_ack(&mut self) {
        let grown = if self.in_slow_start() {
            self.cwnd + MIN_CWND
        } else {
            // One data unit per window's worth of ACKs
            self.cwnd + (MIN_CWND * MIN_CWND) / self.cwnd
        };

        self.cwnd = grown.clamp(MIN_CWND, MAX_CWND);
        self.acks += 1;
    }

    /// Record a retransmission timeout
    pub fn on_timeout(&mut self) {
        self.ssthresh = self.cwnd / 2;
        self.cwnd = MIN_CWND;
        self.timeouts += 1;
    }

    /// Get statistics
    pub fn stats(&self) -> CongestionStats {
        CongestionStats {
            congestion_window: self.cwnd,
            ssthresh: self.ssthresh,
            slow_start: self.in_slow_start(),
            acks: self.acks,
            timeouts: self.timeouts,
        }
    }
}

impl Default for CongestionController {
    fn default() -> Self {
        Self::new()
    }
}

/// Congestion control statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CongestionStats {
    /// Current congestion window (bytes)
    pub congestion_window: u32,
    /// Slow start threshold (bytes)
    pub ssthresh: u32,
    /// Whether in slow start phase
    pub slow_start: bool,
    /// Successful ACKs processed
    pub acks: u64,
    /// Timeout collapses
    pub timeouts: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_congestion_controller_creation() {
        let cc = CongestionController::new();

        assert_eq!(cc.congestion_window(), 512);
        assert_eq!(cc.ssthresh(), 10_000);
        assert!(cc.in_slow_start());
    }

    #[test]
    fn test_slow_start_then_avoidance() {
        let mut cc = CongestionController::new();

        // 512 -> 10240 takes 19 ACKs, all in slow start
        for i in 1..=19 {
            assert!(cc.in_slow_start());
            cc.on_successful_ack();
            assert_eq!(cc.congestion_window(), 512 * (i + 1));
        }
        assert!(!cc.in_slow_start());

        let before = cc.congestion_window();
        cc.on_successful_ack();
        let step = cc.congestion_window() - before;
        assert_eq!(step, 512 * 512 / before);
        assert!(step < 512);
    }

    #[test]
    fn test_avoidance_growth_shrinks() {
        let mut cc = CongestionController::with_window(20_000, 10_000);
        let mut last_step = u32::MAX;

        for _ in 0..50 {
            let before = cc.congestion_window();
            cc.on_successful_ack();
            let step = cc.congestion_window() - before;
            assert!(step <= last_step);
            last_step = step;
        }
    }

    #[test]
    fn test_window_capped() {
        let mut cc = CongestionController::with_window(MAX_CWND - 1, u32::MAX);

        cc.on_successful_ack();
        assert_eq!(cc.congestion_window(), MAX_CWND);

        cc.on_successful_ack();
        assert_eq!(cc.congestion_window(), MAX_CWND);
    }

    #[test]
    fn test_timeout_collapse() {
        let mut cc = CongestionController::with_window(20_000, 10_000);

        cc.on_timeout();

        assert_eq!(cc.ssthresh(), 10_000);
        assert_eq!(cc.congestion_window(), 512);
        assert_eq!(cc.stats().timeouts, 1);
    }

    #[test]
    fn test_timeout_at_minimum() {
        let mut cc = CongestionController::new();

        cc.on_timeout();

        assert_eq!(cc.ssthresh(), 256);
        assert_eq!(cc.congestion_window(), MIN_CWND);

        // Below ssthresh never holds again, so growth is additive
        cc.on_successful_ack();
        assert_eq!(cc.congestion_window(), 1024);
        assert!(!cc.in_slow_start());
    }

    #[test]
    fn test_allows() {
        let cc = CongestionController::with_window(1024, 10_000);

        assert!(cc.allows(512, 512));
        assert!(!cc.allows(513, 512));
        assert!(cc.allows(0, 1024));
    }
}
