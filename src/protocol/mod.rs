//! Protocol module - outbound frame construction and inbound payload decoding.
//!
//! A frame here is one logical byte sequence on the wire: header/opcode
//! byte(s) plus payload, with the interface echoing a checksum for the
//! host-written ones. Frames are ephemeral; they are built and consumed
//! within a single transaction step.

mod frame;
mod status;

pub use frame::{
    address_frame, checksum, clock_frame, eeprom_address_frame, function_frame, CLOCK_FRAME_LEN,
};
pub use status::{decode_poll_buffer, decode_status_reply};
