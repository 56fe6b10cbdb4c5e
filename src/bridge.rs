//! Bridge builder and caller handle.
//!
//! The [`BridgeBuilder`] provides a fluent API for binding listeners and
//! tuning the engine, then hands the channel to the engine task. The
//! [`Bridge`] is a cheap handle: unit-function entry points construct the
//! matching transaction and submit it over the command channel.
//!
//! # Example
//!
//! ```ignore
//! use powerwire::{Bridge, House, Unit};
//!
//! #[tokio::main]
//! async fn main() -> powerwire::Result<()> {
//!     let bridge = Bridge::builder()
//!         .on_unit_status(|status| println!("{status:?}"))
//!         .open("/dev/ttyS0")?;
//!
//!     let lamp = [Unit::new(3).unwrap()];
//!     bridge.turn_on(House::A, &lamp).await;
//!     bridge.dim(House::A, &lamp, 6).await;
//!     bridge.stop().await;
//!     bridge.closed().await;
//!     Ok(())
//! }
//! ```

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::codes::{Function, House, Unit};
use crate::engine::{Engine, EngineCommand, EngineConfig};
use crate::error::Result;
use crate::event::{ControllerStatus, Listeners, UnitStatus};
use crate::transaction::{Command, StatusRequest, Transaction};
use crate::transport;

/// Capacity of the caller-to-engine command channel.
const COMMAND_CHANNEL_CAPACITY: usize = 32;

/// Builder for configuring and starting a bridge.
pub struct BridgeBuilder {
    listeners: Listeners,
    config: EngineConfig,
}

impl BridgeBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            listeners: Listeners::default(),
            config: EngineConfig::default(),
        }
    }

    /// Bind the unit-status listener, replacing any previous one.
    ///
    /// Fires once per unit-function event decoded from the interface's
    /// event buffer.
    pub fn on_unit_status<F>(mut self, callback: F) -> Self
    where
        F: Fn(UnitStatus) + Send + 'static,
    {
        self.listeners.unit = Some(Box::new(callback));
        self
    }

    /// Bind the controller-status listener, replacing any previous one.
    pub fn on_controller_status<F>(mut self, callback: F) -> Self
    where
        F: Fn(ControllerStatus) + Send + 'static,
    {
        self.listeners.controller = Some(Box::new(callback));
        self
    }

    /// Bind the closed listener, replacing any previous one. Fires
    /// exactly once, whether the close was requested or the channel went
    /// away.
    pub fn on_closed<F>(mut self, callback: F) -> Self
    where
        F: Fn() + Send + 'static,
    {
        self.listeners.closed = Some(Box::new(callback));
        self
    }

    /// Window for the interface to answer a frame. Default: 2 seconds.
    pub fn response_timeout(mut self, timeout: Duration) -> Self {
        self.config.response_timeout = timeout;
        self
    }

    /// Retries per transaction before it resolves failed. Default: 3.
    pub fn retry_limit(mut self, limit: u8) -> Self {
        self.config.retry_limit = limit;
        self
    }

    /// House code written into clock-set frames. Default: house A.
    pub fn monitored_house(mut self, house: House) -> Self {
        self.config.monitored_house = house;
        self
    }

    /// Programming address handed out on an eeprom-address poll.
    /// Default: 0x0000.
    pub fn eeprom_address(mut self, address: u16) -> Self {
        self.config.eeprom_address = address;
        self
    }

    /// Open the serial device at the family's fixed baud rate and start
    /// the engine. Must be called from within a tokio runtime.
    pub fn open(self, path: &str) -> Result<Bridge> {
        let port = transport::open(path)?;
        Ok(self.attach(port))
    }

    /// Start the engine over an already-open byte channel.
    ///
    /// This is the seam the tests use with in-memory duplex channels; any
    /// host environment that owns its own channel type plugs in here.
    pub fn attach<C>(self, channel: C) -> Bridge
    where
        C: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let engine = Engine::new(channel, cmd_rx, self.listeners, self.config.clone());
        let task = tokio::spawn(engine.run());
        Bridge {
            cmd_tx,
            task,
            config: self.config,
        }
    }
}

impl Default for BridgeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to a running bridge engine.
///
/// Commands are fire-and-forget: they enqueue a transaction and return.
/// The engine serializes all exchanges on the wire and reports protocol
/// failures through the log and the listener callbacks. Once [`stop`]
/// has taken effect, submissions are silently dropped.
///
/// [`stop`]: Bridge::stop
pub struct Bridge {
    cmd_tx: mpsc::Sender<EngineCommand>,
    task: JoinHandle<()>,
    config: EngineConfig,
}

impl Bridge {
    /// Create a new bridge builder.
    pub fn builder() -> BridgeBuilder {
        BridgeBuilder::new()
    }

    /// Turn the given units on.
    pub async fn turn_on(&self, house: House, units: &[Unit]) {
        self.command(house, Function::On, 0, units).await;
    }

    /// Turn the given units off.
    pub async fn turn_off(&self, house: House, units: &[Unit]) {
        self.command(house, Function::Off, 0, units).await;
    }

    /// Dim the given units by `amount` (clamped to the device maximum).
    pub async fn dim(&self, house: House, units: &[Unit], amount: u8) {
        self.command(house, Function::Dim, amount, units).await;
    }

    /// Brighten the given units by `amount` (clamped to the device
    /// maximum).
    pub async fn bright(&self, house: House, units: &[Unit], amount: u8) {
        self.command(house, Function::Bright, amount, units).await;
    }

    /// Turn every unit on the house off.
    pub async fn all_units_off(&self, house: House) {
        self.command(house, Function::AllUnitsOff, 0, &[]).await;
    }

    /// Turn every lamp module on the house on.
    pub async fn all_lights_on(&self, house: House) {
        self.command(house, Function::AllLightsOn, 0, &[]).await;
    }

    /// Turn every lamp module on the house off.
    pub async fn all_lights_off(&self, house: House) {
        self.command(house, Function::AllLightsOff, 0, &[]).await;
    }

    /// Request the interface's status buffer. The decoded result arrives
    /// through the controller-status listener.
    pub async fn status(&self) {
        self.submit(Transaction::StatusRequest(StatusRequest::new(
            self.config.retry_limit,
        )))
        .await;
    }

    /// Request a graceful stop: the in-flight exchange (if any) runs to
    /// completion, queued work is discarded, then the channel closes.
    pub async fn stop(&self) {
        let _ = self.cmd_tx.send(EngineCommand::Stop).await;
    }

    /// Wait until the engine has shut down and the closed notification
    /// has fired. Consumes the handle.
    pub async fn closed(self) {
        let _ = self.task.await;
    }

    async fn command(&self, house: House, function: Function, dims: u8, units: &[Unit]) {
        self.submit(Transaction::Command(Command::new(
            house,
            function,
            dims,
            units.to_vec(),
            self.config.retry_limit,
        )))
        .await;
    }

    async fn submit(&self, txn: Transaction) {
        // A closed command channel means the engine is gone; work is
        // silently dropped, matching the only-accept-while-running policy.
        let _ = self.cmd_tx.send(EngineCommand::Submit(txn)).await;
    }
}
