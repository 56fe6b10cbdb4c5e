//! Host-initiated command exchange.
//!
//! A command addresses its target units one frame at a time, then issues
//! the function frame. Every frame is individually handshaked; a command
//! with no units (all-lights-on and friends) goes straight to the
//! function frame.

use super::{FrameExchange, Outbox, Progress, Step};
use crate::codes::{Function, House, Unit};
use crate::error::PowerwireError;
use crate::protocol::{address_frame, function_frame};

pub(crate) struct Command {
    house: House,
    function: Function,
    dims: u8,
    units: Vec<Unit>,
    /// Index of the frame currently being exchanged; `units.len()` is the
    /// function frame.
    current_frame: usize,
    exchange: Option<FrameExchange>,
    limit: u8,
}

impl Command {
    pub(crate) fn new(
        house: House,
        function: Function,
        dims: u8,
        units: Vec<Unit>,
        limit: u8,
    ) -> Self {
        Self {
            house,
            function,
            dims,
            units,
            current_frame: 0,
            exchange: None,
            limit,
        }
    }

    fn frame_at(&self, index: usize) -> Vec<u8> {
        if index < self.units.len() {
            address_frame(self.house, self.units[index]).to_vec()
        } else {
            function_frame(self.house, self.function, self.dims).to_vec()
        }
    }

    pub(crate) fn begin(&mut self, out: &mut Outbox) {
        let frame = self.frame_at(0);
        self.exchange = Some(FrameExchange::begin(frame, self.limit, out));
    }

    pub(crate) fn handle(&mut self, bytes: &[u8], out: &mut Outbox) -> Step {
        let Some(exchange) = self.exchange.as_mut() else {
            return Step::Failed(PowerwireError::Protocol("command not started".into()));
        };
        let progress = exchange.handle(bytes, None, out);

        match progress {
            Progress::Pending => Step::Pending,
            Progress::Declined => Step::Declined,
            Progress::Exhausted => Step::Failed(PowerwireError::RetriesExhausted(self.limit)),
            Progress::Complete => {
                self.current_frame += 1;
                if self.current_frame <= self.units.len() {
                    let frame = self.frame_at(self.current_frame);
                    if let Some(exchange) = self.exchange.as_mut() {
                        exchange.next_frame(frame, out);
                    }
                    Step::Pending
                } else {
                    Step::Done
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes::{marker, ACK_OK, READY};
    use crate::protocol::checksum;

    fn unit(n: u8) -> Unit {
        Unit::new(n).unwrap()
    }

    /// Walk one frame's handshake to completion.
    fn shake(cmd: &mut Command, frame: &[u8], out: &mut Outbox) -> Step {
        let step = cmd.handle(&[checksum(frame)], out);
        assert!(matches!(step, Step::Pending));
        assert_eq!(out.take_writes(), vec![ACK_OK]);
        cmd.handle(&[READY], out)
    }

    #[test]
    fn test_command_two_frames_for_one_unit() {
        let mut out = Outbox::new();
        let mut cmd = Command::new(House::A, Function::On, 0, vec![unit(1)], 3);

        cmd.begin(&mut out);
        let addr = address_frame(House::A, unit(1)).to_vec();
        assert_eq!(out.take_writes(), addr);

        // Address frame acknowledged: function frame goes out.
        let step = shake(&mut cmd, &addr, &mut out);
        assert!(matches!(step, Step::Pending));
        let func = function_frame(House::A, Function::On, 0).to_vec();
        assert_eq!(out.take_writes(), func);

        // Function frame acknowledged: done.
        let step = shake(&mut cmd, &func, &mut out);
        assert!(matches!(step, Step::Done));
    }

    #[test]
    fn test_command_addresses_every_unit() {
        let mut out = Outbox::new();
        let units = vec![unit(1), unit(2), unit(3)];
        let mut cmd = Command::new(House::C, Function::Off, 0, units.clone(), 3);

        cmd.begin(&mut out);
        for &u in &units {
            let addr = address_frame(House::C, u).to_vec();
            assert_eq!(out.take_writes(), addr);
            let step = shake(&mut cmd, &addr, &mut out);
            assert!(matches!(step, Step::Pending));
        }
        let func = function_frame(House::C, Function::Off, 0).to_vec();
        assert_eq!(out.take_writes(), func);
        assert!(matches!(shake(&mut cmd, &func, &mut out), Step::Done));
    }

    #[test]
    fn test_command_without_units_sends_function_only() {
        let mut out = Outbox::new();
        let mut cmd = Command::new(House::A, Function::AllLightsOn, 0, vec![], 3);

        cmd.begin(&mut out);
        let func = function_frame(House::A, Function::AllLightsOn, 0).to_vec();
        assert_eq!(out.take_writes(), func);
        assert!(matches!(shake(&mut cmd, &func, &mut out), Step::Done));
    }

    #[test]
    fn test_command_fails_after_retry_bound() {
        let mut out = Outbox::new();
        let mut cmd = Command::new(House::A, Function::On, 0, vec![unit(1)], 2);
        cmd.begin(&mut out);
        out.take_writes();

        // Two timeouts resend, the third exhausts the bound.
        assert!(matches!(cmd.handle(&[], &mut out), Step::Pending));
        assert!(matches!(cmd.handle(&[], &mut out), Step::Pending));
        let step = cmd.handle(&[], &mut out);
        assert!(matches!(
            step,
            Step::Failed(PowerwireError::RetriesExhausted(2))
        ));
    }

    #[test]
    fn test_command_declines_poll_marker() {
        let mut out = Outbox::new();
        let mut cmd = Command::new(House::A, Function::On, 0, vec![unit(1)], 3);
        cmd.begin(&mut out);
        out.take_writes();

        let step = cmd.handle(&[marker::POWER_FAIL], &mut out);
        assert!(matches!(step, Step::Declined));
    }

    #[test]
    fn test_command_dim_carries_amount() {
        let mut out = Outbox::new();
        let mut cmd = Command::new(House::A, Function::Dim, 11, vec![unit(4)], 3);
        cmd.begin(&mut out);

        let addr = address_frame(House::A, unit(4)).to_vec();
        assert_eq!(out.take_writes(), addr);
        shake(&mut cmd, &addr, &mut out);
        assert_eq!(
            out.take_writes(),
            function_frame(House::A, Function::Dim, 11).to_vec()
        );
    }
}
