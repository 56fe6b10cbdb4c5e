//! Status-request exchange.
//!
//! One opcode out, fourteen bytes back. The reply arrives fragmented at
//! 4800 baud, so bytes accumulate until the buffer is complete. Once the
//! opcode has been written, everything inbound is reply data; a timeout
//! with a partial buffer is an unrecoverable short reply.

use bytes::BytesMut;

use super::{Outbox, Step};
use crate::codes::{STATUS_REPLY_LEN, STATUS_REQUEST};
use crate::error::PowerwireError;
use crate::event::Notification;
use crate::protocol::decode_status_reply;

pub(crate) struct StatusRequest {
    buf: BytesMut,
    retries: u8,
    limit: u8,
}

impl StatusRequest {
    pub(crate) fn new(limit: u8) -> Self {
        Self {
            buf: BytesMut::with_capacity(STATUS_REPLY_LEN),
            retries: 0,
            limit,
        }
    }

    pub(crate) fn begin(&mut self, out: &mut Outbox) {
        out.send(&[STATUS_REQUEST]);
    }

    pub(crate) fn handle(&mut self, bytes: &[u8], out: &mut Outbox) -> Step {
        if bytes.is_empty() {
            if !self.buf.is_empty() {
                return Step::Failed(PowerwireError::Protocol(format!(
                    "status reply truncated at {} bytes",
                    self.buf.len()
                )));
            }
            if self.retries < self.limit {
                self.retries += 1;
                out.send(&[STATUS_REQUEST]);
                return Step::Pending;
            }
            return Step::Failed(PowerwireError::RetriesExhausted(self.limit));
        }

        self.buf.extend_from_slice(bytes);
        if self.buf.len() < STATUS_REPLY_LEN {
            return Step::Pending;
        }

        match decode_status_reply(&self.buf[..STATUS_REPLY_LEN]) {
            Ok(status) => {
                out.notify(Notification::Controller(status));
                Step::Done
            }
            Err(err) => Step::Failed(err),
        }
    }
}
