//! # powerwire
//!
//! Driver for serial-attached power-line home-automation bridges of the
//! CM11A family.
//!
//! The interface is half duplex and opinionated: it interrupts the host
//! with unsolicited polls (buffered events, a lost clock, a request for a
//! programming address) that must be serviced before anything else moves,
//! and every host-written frame is handshaked with a checksum echo. This
//! crate centers on the transaction engine that serializes the wire: one
//! exchange in flight at a time, a FIFO queue behind it, response
//! timeouts with bounded retries, and byte routing that turns poll
//! markers into the right responder.
//!
//! ## Architecture
//!
//! - **Engine task** (owns the channel): routes inbound bytes, arms the
//!   single response timer, drains the queue, raises notifications.
//! - **Transactions**: five exchange kinds behind one closed interface -
//!   commands, status requests, and the three poll responders.
//! - **Bridge**: the caller handle with on/off/dim/bright/status entry
//!   points and the three listener slots.
//!
//! ## Example
//!
//! ```ignore
//! use powerwire::{Bridge, House, Unit};
//!
//! #[tokio::main]
//! async fn main() -> powerwire::Result<()> {
//!     let bridge = Bridge::builder()
//!         .on_unit_status(|status| println!("line activity: {status:?}"))
//!         .on_closed(|| println!("interface gone"))
//!         .open("/dev/ttyUSB0")?;
//!
//!     bridge.turn_on(House::A, &[Unit::new(1).unwrap()]).await;
//!     bridge.status().await;
//!     bridge.stop().await;
//!     bridge.closed().await;
//!     Ok(())
//! }
//! ```

pub mod codes;
pub mod error;
pub mod event;
pub mod protocol;
pub mod transport;

mod bridge;
mod engine;
mod transaction;

pub use bridge::{Bridge, BridgeBuilder};
pub use codes::{Function, House, Unit};
pub use error::{PowerwireError, Result};
pub use event::{ControllerStatus, UnitStatus};
