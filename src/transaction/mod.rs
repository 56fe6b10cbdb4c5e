//! Transaction state machines.
//!
//! A transaction is one complete protocol exchange: a host command, or the
//! host's response to one of the interface's unsolicited polls. All five
//! kinds sit behind the same closed interface:
//!
//! - `begin` writes the first frame of the exchange,
//! - `handle` advances the state machine on inbound bytes, or on an empty
//!   byte slice when the response timer fires.
//!
//! Transactions never touch the channel directly. They stage writes and
//! notifications into an [`Outbox`] which the engine flushes after every
//! event, preserving the single-writer discipline on the wire. Staging a
//! write re-arms the engine's one timer slot; completing the transaction
//! cancels it.

mod clock;
mod command;
mod eeprom;
mod poll;
mod status;

pub(crate) use clock::SetClock;
pub(crate) use command::Command;
pub(crate) use eeprom::EepromAddress;
pub(crate) use poll::PollResponse;
pub(crate) use status::StatusRequest;

use crate::codes::{is_poll_marker, ACK_OK, READY};
use crate::error::PowerwireError;
use crate::event::Notification;
use crate::protocol::checksum;

/// Outcome of offering an event to a transaction.
#[derive(Debug)]
pub(crate) enum Step {
    /// Input consumed; the exchange continues.
    Pending,
    /// Input not recognized; the engine may classify it as a poll.
    Declined,
    /// The exchange reached its logical outcome.
    Done,
    /// The exchange failed. Scheduling treats this the same as `Done`.
    Failed(PowerwireError),
}

/// Discriminant used for poll deduplication and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Kind {
    Command,
    StatusRequest,
    PollResponse,
    SetClock,
    EepromAddress,
}

/// Bytes and notifications staged by a transaction during one event.
///
/// The engine drains the outbox after each `begin`/`handle` call: staged
/// bytes go to the channel in one write, staged notifications go to the
/// listener slots, and any write re-arms the response timer.
#[derive(Debug, Default)]
pub(crate) struct Outbox {
    writes: Vec<u8>,
    notifications: Vec<Notification>,
}

impl Outbox {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Stage a frame for the wire.
    pub(crate) fn send(&mut self, frame: &[u8]) {
        self.writes.extend_from_slice(frame);
    }

    /// Stage a notification for the listener slots.
    pub(crate) fn notify(&mut self, notification: Notification) {
        self.notifications.push(notification);
    }

    /// Whether any frame was staged during this event.
    pub(crate) fn wrote(&self) -> bool {
        !self.writes.is_empty()
    }

    pub(crate) fn take_writes(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.writes)
    }

    pub(crate) fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }
}

/// Progress of a [`FrameExchange`] handshake.
#[derive(Debug, PartialEq, Eq)]
pub(super) enum Progress {
    Pending,
    Declined,
    Complete,
    Exhausted,
}

/// The uniform write-and-acknowledge handshake.
///
/// Every host-written frame follows the same discipline: write the frame,
/// expect the interface to echo its checksum, answer `0x00`, expect the
/// interface-ready byte. A wrong checksum or a timeout resends the frame;
/// the retry counter spans the whole transaction, so a multi-frame command
/// cannot loop forever by failing on a later frame.
pub(super) struct FrameExchange {
    frame: Vec<u8>,
    awaiting_ready: bool,
    retries: u8,
    limit: u8,
}

impl FrameExchange {
    /// Stage the first frame and start awaiting its checksum echo.
    pub(super) fn begin(frame: Vec<u8>, limit: u8, out: &mut Outbox) -> Self {
        out.send(&frame);
        Self {
            frame,
            awaiting_ready: false,
            retries: 0,
            limit,
        }
    }

    /// Move on to the next frame of a multi-frame exchange. Retries carry
    /// over.
    pub(super) fn next_frame(&mut self, frame: Vec<u8>, out: &mut Outbox) {
        self.frame = frame;
        self.awaiting_ready = false;
        out.send(&self.frame);
    }

    /// Number of retries consumed so far.
    pub(super) fn retries(&self) -> u8 {
        self.retries
    }

    /// Advance the handshake.
    ///
    /// `own_marker` is the poll marker that triggered this exchange, if
    /// any; the interface repeats it until serviced, so it is consumed
    /// rather than declined. An empty `bytes` slice means the response
    /// timer fired.
    pub(super) fn handle(
        &mut self,
        bytes: &[u8],
        own_marker: Option<u8>,
        out: &mut Outbox,
    ) -> Progress {
        let Some(&first) = bytes.first() else {
            return self.resend_or_exhaust(out);
        };

        if self.awaiting_ready {
            if bytes.contains(&READY) {
                return Progress::Complete;
            }
            if own_marker == Some(first) {
                return Progress::Pending;
            }
            if is_poll_marker(first) {
                return Progress::Declined;
            }
            // Line noise between ack and ready; the timer is still armed.
            Progress::Pending
        } else {
            if first == checksum(&self.frame) {
                out.send(&[ACK_OK]);
                self.awaiting_ready = true;
                return Progress::Pending;
            }
            if own_marker == Some(first) {
                return Progress::Pending;
            }
            if is_poll_marker(first) {
                return Progress::Declined;
            }
            tracing::debug!(
                expected = checksum(&self.frame),
                got = first,
                "checksum mismatch"
            );
            self.resend_or_exhaust(out)
        }
    }

    fn resend_or_exhaust(&mut self, out: &mut Outbox) -> Progress {
        if self.retries < self.limit {
            self.retries += 1;
            self.awaiting_ready = false;
            out.send(&self.frame);
            Progress::Pending
        } else {
            Progress::Exhausted
        }
    }
}

/// One complete protocol exchange. The closed set of five kinds.
pub(crate) enum Transaction {
    Command(Command),
    StatusRequest(StatusRequest),
    PollResponse(PollResponse),
    SetClock(SetClock),
    EepromAddress(EepromAddress),
}

impl Transaction {
    pub(crate) fn kind(&self) -> Kind {
        match self {
            Transaction::Command(_) => Kind::Command,
            Transaction::StatusRequest(_) => Kind::StatusRequest,
            Transaction::PollResponse(_) => Kind::PollResponse,
            Transaction::SetClock(_) => Kind::SetClock,
            Transaction::EepromAddress(_) => Kind::EepromAddress,
        }
    }

    /// Write the first frame of the exchange.
    pub(crate) fn begin(&mut self, out: &mut Outbox) {
        match self {
            Transaction::Command(t) => t.begin(out),
            Transaction::StatusRequest(t) => t.begin(out),
            Transaction::PollResponse(t) => t.begin(out),
            Transaction::SetClock(t) => t.begin(out),
            Transaction::EepromAddress(t) => t.begin(out),
        }
    }

    /// Offer inbound bytes (or a timeout, as an empty slice) to the
    /// exchange.
    pub(crate) fn handle(&mut self, bytes: &[u8], out: &mut Outbox) -> Step {
        match self {
            Transaction::Command(t) => t.handle(bytes, out),
            Transaction::StatusRequest(t) => t.handle(bytes, out),
            Transaction::PollResponse(t) => t.handle(bytes, out),
            Transaction::SetClock(t) => t.handle(bytes, out),
            Transaction::EepromAddress(t) => t.handle(bytes, out),
        }
    }
}
