//! Forward throttling on observation time

use crate::types::Timestamp;

/// Default minimum spacing between aggregator pushes (seconds)
pub const DEFAULT_FORWARD_WINDOW: i64 = 300;

/// Decides whether an observation is due for forwarding.
///
/// Spacing is measured on observation timestamps, not wall-clock time, and
/// only from the last *successful* forward.
#[derive(Debug, Clone)]
pub struct Throttle {
    window: i64,
    last_forwarded: Option<Timestamp>,
}

impl Throttle {
    pub fn new(window: i64) -> Self {
        Self {
            window,
            last_forwarded: None,
        }
    }

    /// Seconds since the last forward, or `None` if nothing was forwarded yet
    pub fn elapsed(&self, timestamp: Timestamp) -> Option<i64> {
        self.last_forwarded.map(|last| timestamp - last)
    }

    pub fn is_due(&self, timestamp: Timestamp) -> bool {
        match self.elapsed(timestamp) {
            Some(delta) => delta >= self.window,
            None => true,
        }
    }

    pub fn record(&mut self, timestamp: Timestamp) {
        self.last_forwarded = Some(timestamp);
    }

    pub fn last_forwarded(&self) -> Option<Timestamp> {
        self.last_forwarded
    }

    pub fn window(&self) -> i64 {
        self.window
    }
}

impl Default for Throttle {
    fn default() -> Self {
        Self::new(DEFAULT_FORWARD_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forwarded(timestamps: &[i64]) -> Vec<i64> {
        let mut throttle = Throttle::default();
        let mut out = Vec::new();
        for &ts in timestamps {
            if throttle.is_due(ts) {
                throttle.record(ts);
                out.push(ts);
            }
        }
        out
    }

    #[test]
    fn test_first_observation_is_due() {
        assert!(Throttle::default().is_due(0));
    }

    #[test]
    fn test_window_measured_from_last_forward() {
        assert_eq!(forwarded(&[0, 100, 250, 301, 600, 601]), vec![0, 301, 601]);
    }

    #[test]
    fn test_boundary_is_inclusive() {
        assert_eq!(forwarded(&[1000, 1299, 1300]), vec![1000, 1300]);
    }

    #[test]
    fn test_unrecorded_attempt_keeps_window_open() {
        let mut throttle = Throttle::new(300);
        throttle.record(0);
        assert!(throttle.is_due(300));
        // a rejected push is not recorded, so the next sample is due too
        assert!(throttle.is_due(301));
        assert_eq!(throttle.elapsed(301), Some(301));
    }
}
