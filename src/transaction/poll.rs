//! Data-ready poll response.
//!
//! The interface asserts `0x5A` until the host answers `0xC3`, then sends
//! its event buffer: a length byte (1..=9) followed by that many bytes,
//! the first of which is the function/address mask. Repeats of the poll
//! marker racing our answer are consumed; once buffer bytes start
//! arriving, everything is data.

use bytes::BytesMut;

use super::{Outbox, Step};
use crate::codes::{marker, MAX_POLL_BUFFER, POLL_ACK};
use crate::error::PowerwireError;
use crate::event::Notification;
use crate::protocol::decode_poll_buffer;

pub(crate) struct PollResponse {
    buf: BytesMut,
    retries: u8,
    limit: u8,
}

impl PollResponse {
    pub(crate) fn new(limit: u8) -> Self {
        Self {
            buf: BytesMut::new(),
            retries: 0,
            limit,
        }
    }

    pub(crate) fn begin(&mut self, out: &mut Outbox) {
        out.send(&[POLL_ACK]);
    }

    pub(crate) fn handle(&mut self, bytes: &[u8], out: &mut Outbox) -> Step {
        if bytes.is_empty() {
            if !self.buf.is_empty() {
                return Step::Failed(PowerwireError::Protocol(format!(
                    "event buffer truncated at {} bytes",
                    self.buf.len()
                )));
            }
            if self.retries < self.limit {
                self.retries += 1;
                out.send(&[POLL_ACK]);
                return Step::Pending;
            }
            return Step::Failed(PowerwireError::RetriesExhausted(self.limit));
        }

        let mut bytes = bytes;
        if self.buf.is_empty() {
            // The interface keeps polling until it sees our answer. The
            // length byte is at most 9, so it can never be mistaken for
            // the marker.
            while bytes.first() == Some(&marker::DATA_READY) {
                bytes = &bytes[1..];
            }
            if bytes.is_empty() {
                return Step::Pending;
            }
        }
        self.buf.extend_from_slice(bytes);

        let len = self.buf[0];
        if len == 0 || len > MAX_POLL_BUFFER {
            return Step::Failed(PowerwireError::Protocol(format!(
                "bad event buffer length {len:#04x}"
            )));
        }
        if self.buf.len() < 1 + len as usize {
            return Step::Pending;
        }

        match decode_poll_buffer(&self.buf[1..1 + len as usize]) {
            Ok(events) => {
                for event in events {
                    out.notify(Notification::Unit(event));
                }
                Step::Done
            }
            Err(err) => Step::Failed(err),
        }
    }
}
