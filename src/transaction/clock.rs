//! Clock-set exchange, triggered by a power-fail poll.
//!
//! The interface has lost its real-time clock and asserts `0xA5` until
//! the host writes the 7-byte clock frame. One frame, one handshake.

use super::{FrameExchange, Outbox, Progress, Step};
use crate::codes::marker;
use crate::error::PowerwireError;
use crate::protocol::CLOCK_FRAME_LEN;

pub(crate) struct SetClock {
    frame: [u8; CLOCK_FRAME_LEN],
    exchange: Option<FrameExchange>,
    limit: u8,
}

impl SetClock {
    /// The frame is built by the engine at spawn time so the clock value
    /// reflects the moment the poll was serviced.
    pub(crate) fn new(frame: [u8; CLOCK_FRAME_LEN], limit: u8) -> Self {
        Self {
            frame,
            exchange: None,
            limit,
        }
    }

    pub(crate) fn begin(&mut self, out: &mut Outbox) {
        self.exchange = Some(FrameExchange::begin(self.frame.to_vec(), self.limit, out));
    }

    pub(crate) fn handle(&mut self, bytes: &[u8], out: &mut Outbox) -> Step {
        let Some(exchange) = self.exchange.as_mut() else {
            return Step::Failed(PowerwireError::Protocol("clock set not started".into()));
        };
        match exchange.handle(bytes, Some(marker::POWER_FAIL), out) {
            Progress::Pending => Step::Pending,
            Progress::Declined => Step::Declined,
            Progress::Complete => Step::Done,
            Progress::Exhausted => Step::Failed(PowerwireError::RetriesExhausted(self.limit)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes::{House, ACK_OK, READY};
    use crate::protocol::{checksum, clock_frame};
    use chrono::NaiveDate;

    fn frame() -> [u8; CLOCK_FRAME_LEN] {
        let now = NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(13, 42, 7)
            .unwrap();
        clock_frame(&now, House::A)
    }

    #[test]
    fn test_set_clock_single_round_trip() {
        let mut out = Outbox::new();
        let mut txn = SetClock::new(frame(), 3);
        txn.begin(&mut out);
        assert_eq!(out.take_writes(), frame().to_vec());

        let step = txn.handle(&[checksum(&frame())], &mut out);
        assert!(matches!(step, Step::Pending));
        assert_eq!(out.take_writes(), vec![ACK_OK]);

        assert!(matches!(txn.handle(&[READY], &mut out), Step::Done));
    }

    #[test]
    fn test_set_clock_consumes_repeated_power_fail() {
        let mut out = Outbox::new();
        let mut txn = SetClock::new(frame(), 3);
        txn.begin(&mut out);
        out.take_writes();

        // The interface keeps asserting the poll until our frame lands.
        assert!(matches!(
            txn.handle(&[marker::POWER_FAIL], &mut out),
            Step::Pending
        ));
        assert!(!out.wrote());
    }

    #[test]
    fn test_set_clock_declines_data_ready() {
        let mut out = Outbox::new();
        let mut txn = SetClock::new(frame(), 3);
        txn.begin(&mut out);
        out.take_writes();

        assert!(matches!(
            txn.handle(&[marker::DATA_READY], &mut out),
            Step::Declined
        ));
    }
}
