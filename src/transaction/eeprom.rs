//! Programming-address exchange, triggered by an eeprom-address poll.

use super::{FrameExchange, Outbox, Progress, Step};
use crate::codes::marker;
use crate::error::PowerwireError;
use crate::protocol::eeprom_address_frame;

pub(crate) struct EepromAddress {
    address: u16,
    exchange: Option<FrameExchange>,
    limit: u8,
}

impl EepromAddress {
    pub(crate) fn new(address: u16, limit: u8) -> Self {
        Self {
            address,
            exchange: None,
            limit,
        }
    }

    pub(crate) fn begin(&mut self, out: &mut Outbox) {
        let frame = eeprom_address_frame(self.address).to_vec();
        self.exchange = Some(FrameExchange::begin(frame, self.limit, out));
    }

    pub(crate) fn handle(&mut self, bytes: &[u8], out: &mut Outbox) -> Step {
        let Some(exchange) = self.exchange.as_mut() else {
            return Step::Failed(PowerwireError::Protocol("address write not started".into()));
        };
        match exchange.handle(bytes, Some(marker::EEPROM_ADDRESS), out) {
            Progress::Pending => Step::Pending,
            Progress::Declined => Step::Declined,
            Progress::Complete => Step::Done,
            Progress::Exhausted => Step::Failed(PowerwireError::RetriesExhausted(self.limit)),
        }
    }
}
