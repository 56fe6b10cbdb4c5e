//! Serial device opening.
//!
//! The interface family speaks 4800 8N1 over a plain serial line; the
//! baud rate is not negotiable. Everything past `open` is ordinary
//! `AsyncRead + AsyncWrite`, which is all the engine asks of a channel.

use tokio_serial::{DataBits, Parity, SerialPortBuilderExt, SerialStream, StopBits};

use crate::codes::BAUD_RATE;
use crate::error::Result;

/// Open the serial device behind `path` at the fixed baud rate.
///
/// Must be called from within a tokio runtime; the stream registers with
/// the reactor on creation.
pub fn open(path: &str) -> Result<SerialStream> {
    let port = tokio_serial::new(path, BAUD_RATE)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .open_native_async()?;
    Ok(port)
}
