use std::time::Duration;

pub const RATE_WINDOW_PERIOD: Duration = Duration::from_secs(60);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateState {
    Open,
    Closed,
}

/// Process-wide fixed-bucket counter of outbound messages. The bucket is
/// reset by the maintenance timer, independent of traffic.
#[derive(Clone, Debug)]
pub struct RateWindow {
    sent: u32,
    max: u32,
}

impl RateWindow {
    pub fn new(max_per_window: u32) -> Self {
        Self { sent: 0, max: max_per_window }
    }

    pub fn state(&self) -> RateState {
        if self.sent < self.max {
            RateState::Open
        } else {
            RateState::Closed
        }
    }

    pub fn is_open(&self) -> bool {
        self.state() == RateState::Open
    }

    /// Counts one send if the window is open.
    pub fn try_record(&mut self) -> bool {
        if !self.is_open() {
            return false;
        }
        self.sent += 1;
        true
    }

    pub fn reset(&mut self) -> u32 {
        std::mem::take(&mut self.sent)
    }

    pub fn sent(&self) -> u32 {
        self.sent
    }

    pub fn max(&self) -> u32 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::{RateState, RateWindow};

    #[test]
    fn closes_after_max_sends_and_reopens_on_reset() {
        let mut window = RateWindow::new(2);

        assert!(window.try_record());
        assert!(window.try_record());
        assert_eq!(window.state(), RateState::Closed);
        assert!(!window.try_record());
        assert_eq!(window.sent(), 2);

        assert_eq!(window.reset(), 2);
        assert_eq!(window.state(), RateState::Open);
    }
}
