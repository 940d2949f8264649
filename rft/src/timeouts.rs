use std::time::Duration;

/// Timing of every bounded wait in the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Length of one receive poll
    pub poll_interval: Duration,
    /// Absolute limit for the handshake, from the first SYN
    pub handshake_timeout: Duration,
    /// Limit on waiting for ACK progress
    pub ack_timeout: Duration,
    /// Teardown window after the sender's FIN
    pub drain_timeout: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Timeouts {
            poll_interval: Duration::from_millis(500),
            handshake_timeout: Duration::from_secs(10),
            ack_timeout: Duration::from_secs(10),
            drain_timeout: Duration::from_secs(2),
        }
    }
}

impl Timeouts {
    /// Divide every duration by `divisor`, keeping their ratios
    pub fn scaled_down(self, divisor: u32) -> Self {
        let divisor = divisor.max(1);
        Timeouts {
            poll_interval: self.poll_interval / divisor,
            handshake_timeout: self.handshake_timeout / divisor,
            ack_timeout: self.ack_timeout / divisor,
            drain_timeout: self.drain_timeout / divisor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let t = Timeouts::default();
        assert_eq!(t.poll_interval, Duration::from_millis(500));
        assert_eq!(t.handshake_timeout, Duration::from_secs(10));
        assert_eq!(t.ack_timeout, Duration::from_secs(10));
        assert_eq!(t.drain_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_scaled_down() {
        let t = Timeouts::default().scaled_down(50);
        assert_eq!(t.poll_interval, Duration::from_millis(10));
        assert_eq!(t.handshake_timeout, Duration::from_millis(200));
        assert_eq!(t.drain_timeout, Duration::from_millis(40));
        assert_eq!(Timeouts::default().scaled_down(0), Timeouts::default());
    }
}
