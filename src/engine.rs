//! Transaction engine.
//!
//! The engine owns the byte channel and runs as a dedicated task. All
//! state transitions happen on one of three events: a command from the
//! caller handle, inbound bytes, or the response timer firing. Each event
//! is processed to completion before the next is accepted, so the "single
//! current transaction" slot replaces locks as the concurrency control on
//! the wire.
//!
//! ```text
//! Bridge ──mpsc──► Engine task ◄──read── serial
//!                     │  current: at most one transaction
//!                     │  pending: FIFO queue
//!                     └──write──► serial
//! ```
//!
//! Inbound bytes go to the current transaction first. If it declines them
//! (or none is running), the leading byte is checked against the poll
//! markers and the matching responder is spawned; anything else is line
//! noise and is dropped.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::Local;
use tokio::io::{split, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::codes::{marker, House};
use crate::error::PowerwireError;
use crate::event::Listeners;
use crate::protocol::clock_frame;
use crate::transaction::{
    EepromAddress, Outbox, PollResponse, SetClock, Step, Transaction,
};

/// Default window for the interface to answer a frame.
pub(crate) const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Default retry bound per transaction.
pub(crate) const DEFAULT_RETRY_LIMIT: u8 = 3;

/// Commands the caller handle sends to the engine task.
pub(crate) enum EngineCommand {
    Submit(Transaction),
    Stop,
}

/// Engine-wide settings, fixed at build time.
#[derive(Debug, Clone)]
pub(crate) struct EngineConfig {
    pub(crate) response_timeout: Duration,
    pub(crate) retry_limit: u8,
    pub(crate) monitored_house: House,
    pub(crate) eeprom_address: u16,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            retry_limit: DEFAULT_RETRY_LIMIT,
            monitored_house: House::A,
            eeprom_address: 0,
        }
    }
}

pub(crate) struct Engine<C> {
    reader: ReadHalf<C>,
    writer: WriteHalf<C>,
    cmd_rx: mpsc::Receiver<EngineCommand>,
    listeners: Listeners,
    config: EngineConfig,
    running: bool,
    current: Option<Transaction>,
    pending: VecDeque<Transaction>,
    /// The one armed response timer. Re-armed on every frame write,
    /// cancelled on every transaction completion.
    deadline: Option<Instant>,
    shutdown: bool,
}

impl<C> Engine<C>
where
    C: AsyncRead + AsyncWrite + Send + 'static,
{
    pub(crate) fn new(
        channel: C,
        cmd_rx: mpsc::Receiver<EngineCommand>,
        listeners: Listeners,
        config: EngineConfig,
    ) -> Self {
        let (reader, writer) = split(channel);
        Self {
            reader,
            writer,
            cmd_rx,
            listeners,
            config,
            running: true,
            current: None,
            pending: VecDeque::new(),
            deadline: None,
            shutdown: false,
        }
    }

    /// Event loop. Runs until a graceful stop completes or the channel
    /// closes under us.
    pub(crate) async fn run(mut self) {
        let mut buf = [0u8; 256];
        while !self.shutdown {
            let deadline = self.deadline;
            tokio::select! {
                biased;
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(EngineCommand::Submit(txn)) => self.submit(txn).await,
                    Some(EngineCommand::Stop) | None => self.stop().await,
                },
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)),
                    if deadline.is_some() => self.on_timer().await,
                read = self.reader.read(&mut buf) => match read {
                    Ok(0) => self.close(),
                    Ok(n) => self.on_bytes(&buf[..n]).await,
                    // A read error is operational: reported, but it does
                    // not change the running state.
                    Err(err) => tracing::error!(%err, "channel read error"),
                },
            }
        }
    }

    /// Enqueue a transaction. Work is only accepted while running; a
    /// stopped engine drops it silently.
    async fn submit(&mut self, txn: Transaction) {
        if !self.running {
            tracing::debug!(kind = ?txn.kind(), "engine stopped, dropping transaction");
            return;
        }
        self.pending.push_back(txn);
        if self.current.is_none() {
            self.advance_queue().await;
        }
    }

    /// Start queued transactions until one survives its first write.
    async fn advance_queue(&mut self) {
        while let Some(mut txn) = self.pending.pop_front() {
            tracing::debug!(kind = ?txn.kind(), "starting transaction");
            let mut out = Outbox::new();
            txn.begin(&mut out);
            self.current = Some(txn);
            match self.flush(out).await {
                Ok(()) => return,
                Err(err) => {
                    tracing::warn!(%err, "transaction failed");
                    self.current = None;
                    self.deadline = None;
                }
            }
        }
    }

    /// Route an inbound chunk: current transaction first, then poll
    /// classification.
    async fn on_bytes(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        if let Some(current) = self.current.as_mut() {
            let mut out = Outbox::new();
            let step = current.handle(bytes, &mut out);
            if matches!(step, Step::Declined) {
                self.classify(bytes[0]).await;
                return;
            }
            self.apply_step(step, out).await;
        } else {
            self.classify(bytes[0]).await;
        }
    }

    /// The response timer fired: the current transaction sees an empty
    /// message and decides between retry and failure.
    async fn on_timer(&mut self) {
        self.deadline = None;
        let Some(current) = self.current.as_mut() else {
            return;
        };
        let mut out = Outbox::new();
        let step = current.handle(&[], &mut out);
        self.apply_step(step, out).await;
    }

    async fn apply_step(&mut self, step: Step, out: Outbox) {
        match step {
            Step::Pending => {
                if let Err(err) = self.flush(out).await {
                    tracing::error!(%err, "channel write error");
                    self.complete(Some(err)).await;
                }
            }
            Step::Done => match self.flush(out).await {
                Ok(()) => self.complete(None).await,
                Err(err) => {
                    tracing::error!(%err, "channel write error");
                    self.complete(Some(err)).await;
                }
            },
            Step::Failed(err) => {
                if let Err(write_err) = self.flush(out).await {
                    tracing::error!(%write_err, "channel write error");
                }
                self.complete(Some(err)).await;
            }
            // Classification is the caller's business.
            Step::Declined => {}
        }
    }

    /// Spawn the responder for an unsolicited poll marker. Anything else
    /// with no transaction expecting it is line noise.
    async fn classify(&mut self, lead: u8) {
        let txn = match lead {
            marker::DATA_READY => {
                Transaction::PollResponse(PollResponse::new(self.config.retry_limit))
            }
            marker::POWER_FAIL => {
                let frame = clock_frame(&Local::now().naive_local(), self.config.monitored_house);
                Transaction::SetClock(SetClock::new(frame, self.config.retry_limit))
            }
            marker::EEPROM_ADDRESS => Transaction::EepromAddress(EepromAddress::new(
                self.config.eeprom_address,
                self.config.retry_limit,
            )),
            _ => {
                tracing::debug!(byte = lead, "unsolicited byte ignored");
                return;
            }
        };

        // The interface repeats a poll until serviced; one responder per
        // marker kind is enough.
        let kind = txn.kind();
        let already = self.current.as_ref().map(Transaction::kind) == Some(kind)
            || self.pending.iter().any(|t| t.kind() == kind);
        if already {
            tracing::debug!(?kind, "poll already being serviced");
            return;
        }
        tracing::debug!(?kind, "device poll");
        self.submit(txn).await;
    }

    /// Completion protocol: success and failure schedule identically.
    async fn complete(&mut self, failure: Option<PowerwireError>) {
        if let Some(err) = failure {
            tracing::warn!(%err, "transaction failed");
        }
        self.current = None;
        self.deadline = None;
        if self.running {
            self.advance_queue().await;
        } else {
            // The deferred close requested by stop().
            let _ = self.writer.shutdown().await;
            self.close();
        }
    }

    /// Drain staged writes and notifications; arm the response timer if a
    /// frame went out and the transaction is still in flight.
    async fn flush(&mut self, mut out: Outbox) -> Result<(), PowerwireError> {
        let wrote = out.wrote();
        let bytes = out.take_writes();
        let result = if bytes.is_empty() {
            Ok(())
        } else {
            tracing::trace!(?bytes, "write");
            match self.writer.write_all(&bytes).await {
                Ok(()) => self.writer.flush().await.map_err(PowerwireError::Io),
                Err(err) => Err(PowerwireError::Io(err)),
            }
        };
        for notification in out.take_notifications() {
            self.listeners.dispatch(notification);
        }
        if result.is_ok() && wrote && self.current.is_some() {
            self.deadline = Some(Instant::now() + self.config.response_timeout);
        }
        result
    }

    /// Graceful stop: the in-flight transaction runs to completion, the
    /// rest of the queue is discarded.
    async fn stop(&mut self) {
        self.running = false;
        self.pending.clear();
        if self.current.is_none() {
            let _ = self.writer.shutdown().await;
            self.close();
        }
    }

    /// Mark the channel closed and fire the closed listener exactly once.
    fn close(&mut self) {
        if self.shutdown {
            return;
        }
        self.shutdown = true;
        self.running = false;
        self.current = None;
        self.deadline = None;
        tracing::info!("channel closed");
        self.listeners.closed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes::{Function, Unit, ACK_OK, POLL_ACK, READY, STATUS_REQUEST};
    use crate::protocol::{address_frame, checksum, function_frame};
    use crate::transaction::{Command, Kind, StatusRequest};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::DuplexStream;

    fn unit(n: u8) -> Unit {
        Unit::new(n).unwrap()
    }

    fn command(function: Function) -> Transaction {
        Transaction::Command(Command::new(House::A, function, 0, vec![unit(1)], 3))
    }

    fn engine() -> (
        Engine<DuplexStream>,
        mpsc::Sender<EngineCommand>,
        DuplexStream,
    ) {
        engine_with(Listeners::default())
    }

    fn engine_with(
        listeners: Listeners,
    ) -> (
        Engine<DuplexStream>,
        mpsc::Sender<EngineCommand>,
        DuplexStream,
    ) {
        let (host, device) = tokio::io::duplex(1024);
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let engine = Engine::new(host, cmd_rx, listeners, EngineConfig::default());
        (engine, cmd_tx, device)
    }

    /// Drive the current command's handshake for one frame.
    async fn ack_frame(engine: &mut Engine<DuplexStream>, frame: &[u8]) {
        engine.on_bytes(&[checksum(frame)]).await;
        engine.on_bytes(&[READY]).await;
    }

    #[tokio::test]
    async fn test_submit_starts_when_idle() {
        let (mut engine, _tx, _device) = engine();
        engine.submit(command(Function::On)).await;
        assert_eq!(engine.current.as_ref().map(Transaction::kind), Some(Kind::Command));
        assert!(engine.pending.is_empty());
        assert!(engine.deadline.is_some());
    }

    #[tokio::test]
    async fn test_submit_queues_fifo_behind_current() {
        let (mut engine, _tx, _device) = engine();
        engine.submit(command(Function::On)).await;
        engine
            .submit(Transaction::StatusRequest(StatusRequest::new(3)))
            .await;
        engine.submit(command(Function::Off)).await;

        assert_eq!(engine.pending.len(), 2);
        assert_eq!(engine.pending[0].kind(), Kind::StatusRequest);
        assert_eq!(engine.pending[1].kind(), Kind::Command);
    }

    #[tokio::test]
    async fn test_completion_dequeues_next() {
        let (mut engine, _tx, _device) = engine();
        engine.submit(command(Function::On)).await;
        engine
            .submit(Transaction::StatusRequest(StatusRequest::new(3)))
            .await;

        let addr = address_frame(House::A, unit(1));
        ack_frame(&mut engine, &addr).await;
        let func = function_frame(House::A, Function::On, 0);
        ack_frame(&mut engine, &func).await;

        // Command finished; the status request is now current.
        assert_eq!(
            engine.current.as_ref().map(Transaction::kind),
            Some(Kind::StatusRequest)
        );
        assert!(engine.pending.is_empty());
    }

    #[tokio::test]
    async fn test_single_transaction_in_flight() {
        let (mut engine, _tx, _device) = engine();
        for _ in 0..5 {
            engine.submit(command(Function::On)).await;
        }
        assert_eq!(engine.pending.len(), 4);
        assert!(engine.current.is_some());
    }

    #[tokio::test]
    async fn test_poll_marker_spawns_responder() {
        let (mut engine, _tx, _device) = engine();
        engine.on_bytes(&[marker::DATA_READY]).await;
        assert_eq!(
            engine.current.as_ref().map(Transaction::kind),
            Some(Kind::PollResponse)
        );
    }

    #[tokio::test]
    async fn test_power_fail_spawns_clock_set() {
        let (mut engine, _tx, _device) = engine();
        engine.on_bytes(&[marker::POWER_FAIL]).await;
        assert_eq!(
            engine.current.as_ref().map(Transaction::kind),
            Some(Kind::SetClock)
        );
    }

    #[tokio::test]
    async fn test_eeprom_marker_spawns_address_write() {
        let (mut engine, _tx, _device) = engine();
        engine.on_bytes(&[marker::EEPROM_ADDRESS]).await;
        assert_eq!(
            engine.current.as_ref().map(Transaction::kind),
            Some(Kind::EepromAddress)
        );
    }

    #[tokio::test]
    async fn test_noise_without_transaction_is_dropped() {
        let (mut engine, _tx, _device) = engine();
        engine.on_bytes(&[0x42, 0x13]).await;
        assert!(engine.current.is_none());
        assert!(engine.pending.is_empty());
    }

    #[tokio::test]
    async fn test_declined_marker_classified_once() {
        let (mut engine, _tx, _device) = engine();
        engine.submit(command(Function::On)).await;

        // The command declines the power-fail marker; one clock set is
        // queued, repeats do not add another.
        engine.on_bytes(&[marker::POWER_FAIL]).await;
        engine.on_bytes(&[marker::POWER_FAIL]).await;
        assert_eq!(engine.pending.len(), 1);
        assert_eq!(engine.pending[0].kind(), Kind::SetClock);
    }

    #[tokio::test]
    async fn test_timer_retry_then_failure_advances_queue() {
        let (mut engine, _tx, _device) = engine();
        engine.submit(Transaction::Command(Command::new(
            House::A,
            Function::On,
            0,
            vec![unit(1)],
            1,
        ))).await;
        engine
            .submit(Transaction::StatusRequest(StatusRequest::new(1)))
            .await;

        engine.on_timer().await; // retry
        assert_eq!(engine.current.as_ref().map(Transaction::kind), Some(Kind::Command));
        engine.on_timer().await; // exhausted: fails, queue advances
        assert_eq!(
            engine.current.as_ref().map(Transaction::kind),
            Some(Kind::StatusRequest)
        );
    }

    #[tokio::test]
    async fn test_stop_idle_closes_immediately() {
        let counter = Arc::new(AtomicUsize::new(0));
        let seen = counter.clone();
        let mut listeners = Listeners::default();
        listeners.closed = Some(Box::new(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        }));
        let (mut engine, _tx, _device) = engine_with(listeners);

        engine.stop().await;
        assert!(engine.shutdown);
        assert!(!engine.running);
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        // Close is idempotent.
        engine.close();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stop_drains_in_flight_then_closes() {
        let (mut engine, _tx, _device) = engine();
        engine.submit(command(Function::On)).await;
        engine
            .submit(Transaction::StatusRequest(StatusRequest::new(3)))
            .await;

        engine.stop().await;
        // Pending work is discarded, the in-flight command survives.
        assert!(engine.pending.is_empty());
        assert!(engine.current.is_some());
        assert!(!engine.shutdown);

        let addr = address_frame(House::A, unit(1));
        ack_frame(&mut engine, &addr).await;
        let func = function_frame(House::A, Function::On, 0);
        ack_frame(&mut engine, &func).await;
        assert!(engine.shutdown);
    }

    #[tokio::test]
    async fn test_submit_after_stop_is_dropped() {
        let (mut engine, _tx, _device) = engine();
        engine.stop().await;
        engine.submit(command(Function::On)).await;
        assert!(engine.current.is_none());
        assert!(engine.pending.is_empty());
    }

    #[tokio::test]
    async fn test_poll_while_stopping_is_dropped() {
        let (mut engine, _tx, _device) = engine();
        engine.submit(command(Function::On)).await;
        engine.stop().await;
        engine.on_bytes(&[marker::DATA_READY]).await;
        assert!(engine.pending.is_empty());
    }

    #[tokio::test]
    async fn test_completion_cancels_timer() {
        let (mut engine, _tx, mut device) = engine();
        engine.submit(command(Function::On)).await;
        assert!(engine.deadline.is_some());

        let addr = address_frame(House::A, unit(1));
        ack_frame(&mut engine, &addr).await;
        let func = function_frame(House::A, Function::On, 0);
        ack_frame(&mut engine, &func).await;

        assert!(engine.current.is_none());
        assert!(engine.deadline.is_none());

        // The device side saw both frames and both acks.
        let mut seen = vec![0u8; 6];
        device.read_exact(&mut seen).await.unwrap();
        assert_eq!(seen, vec![addr[0], addr[1], ACK_OK, func[0], func[1], ACK_OK]);
    }

    #[tokio::test]
    async fn test_status_request_write_goes_out() {
        let (mut engine, _tx, mut device) = engine();
        engine
            .submit(Transaction::StatusRequest(StatusRequest::new(3)))
            .await;

        let mut seen = [0u8; 1];
        device.read_exact(&mut seen).await.unwrap();
        assert_eq!(seen[0], STATUS_REQUEST);
    }

    #[tokio::test]
    async fn test_poll_ack_goes_out() {
        let (mut engine, _tx, mut device) = engine();
        engine.on_bytes(&[marker::DATA_READY]).await;

        let mut seen = [0u8; 1];
        device.read_exact(&mut seen).await.unwrap();
        assert_eq!(seen[0], POLL_ACK);
    }
}
