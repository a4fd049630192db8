//! Turnstile driver: reconnecting controller connection with decoded events.
//!
//! Wraps a [`TcpTransport`] and its event channel. Inbound chunks are decoded
//! into [`Frame`]s before they reach the consumer, and decode failures are
//! delivered as events instead of being dropped here, so the consumer decides
//! what a malformed frame means.
//!
//! After every `Closed` the driver waits [`RECONNECT_PAUSE`] and reconnects
//! on the next [`next_event`](TurnstileDriver::next_event) call. A failed
//! attempt closes again, so the driver keeps retrying at a fixed pace until
//! the controller answers.
//!
//! Commands are fire-and-forget: [`TurnstileCommands`] methods log send
//! failures and return nothing; the teardown shows up in the event stream.

#![allow(async_fn_in_trait)]

use catraca_core::constants::RECONNECT_PAUSE;
use catraca_core::{MessageIndex, Result};
use catraca_network::{TcpTransport, TransportConfig, TransportEvent};
use catraca_protocol::{Frame, ReleaseCommand};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error, info, trace, warn};

use crate::messages::DisplayMessages;

/// High-level commands the access engine issues to the turnstile.
pub trait TurnstileCommands {
    /// Release the turnstile for an entry.
    async fn allow_entry(&self, index: MessageIndex, message: &str);

    /// Release the turnstile for an exit.
    async fn allow_exit(&self, index: MessageIndex, message: &str);

    /// Keep the turnstile locked. `None` shows the controller default.
    async fn deny_access(&self, index: MessageIndex, message: Option<&str>);
}

/// Event delivered by [`TurnstileDriver::next_event`].
#[derive(Debug)]
pub enum DriverEvent {
    Connected,
    /// One inbound chunk, decoded.
    Frame(Result<Frame>),
    Timeout,
    Error(String),
    Closed { had_error: bool },
}

/// Controller connection with reconnect policy and release commands.
pub struct TurnstileDriver {
    transport: TcpTransport,
    events: UnboundedReceiver<TransportEvent>,
    release_seconds: u8,
    reconnect_pause: Duration,
    reconnect_pending: bool,
    closed: bool,
}

impl TurnstileDriver {
    /// Build the driver and start connecting right away.
    ///
    /// A failed first attempt is not an error: it surfaces as `Error` and
    /// `Closed` events and the driver retries from there.
    pub async fn start(config: TransportConfig, release_seconds: u8) -> Self {
        let (transport, events) = TcpTransport::new(config);
        let driver = Self {
            transport,
            events,
            release_seconds,
            reconnect_pause: RECONNECT_PAUSE,
            reconnect_pending: false,
            closed: false,
        };

        if let Err(e) = driver.transport.connect().await {
            warn!(error = %e, "Initial connection to turnstile failed");
        }
        driver
    }

    /// Override the pause between reconnect attempts.
    pub fn with_reconnect_pause(mut self, pause: Duration) -> Self {
        self.reconnect_pause = pause;
        self
    }

    pub fn release_seconds(&self) -> u8 {
        self.release_seconds
    }

    pub async fn is_connected(&self) -> bool {
        self.transport.is_connected().await
    }

    /// Wait for the next event, reconnecting first if the socket closed.
    ///
    /// Cancel-safe: if dropped mid-reconnect the attempt is repeated on the
    /// next call. Returns `None` once the transport is gone.
    pub async fn next_event(&mut self) -> Option<DriverEvent> {
        if self.reconnect_pending && !self.closed {
            tokio::time::sleep(self.reconnect_pause).await;
            debug!("Reconnecting to turnstile");
            if let Err(e) = self.transport.connect().await {
                debug!(error = %e, "Reconnect attempt failed");
            }
            self.reconnect_pending = false;
        }

        let event = self.events.recv().await?;
        Some(match event {
            TransportEvent::Connected => DriverEvent::Connected,
            TransportEvent::Data(chunk) => DriverEvent::Frame(decode_chunk(&chunk)),
            TransportEvent::Timeout => DriverEvent::Timeout,
            TransportEvent::Error(message) => DriverEvent::Error(message),
            TransportEvent::Closed { had_error } => {
                self.reconnect_pending = !self.closed;
                DriverEvent::Closed { had_error }
            }
        })
    }

    /// Close the connection and stop reconnecting.
    pub async fn close(&mut self) {
        self.closed = true;
        self.reconnect_pending = false;
        self.transport.close().await;
    }

    async fn dispatch(&self, index: MessageIndex, command: ReleaseCommand) {
        let frame = match command.encode(index) {
            Ok(frame) => frame,
            Err(e) => {
                error!(%index, kind = %command.kind(), error = %e, "Failed to encode release command");
                return;
            }
        };

        match self.transport.send(frame).await {
            Ok(()) => info!(
                %index,
                kind = %command.kind(),
                message = command.message(),
                "Release command sent"
            ),
            Err(e) => warn!(%index, kind = %command.kind(), error = %e, "Release command not delivered"),
        }
    }
}

impl TurnstileCommands for TurnstileDriver {
    async fn allow_entry(&self, index: MessageIndex, message: &str) {
        self.dispatch(index, ReleaseCommand::allow_entry(self.release_seconds, message))
            .await;
    }

    async fn allow_exit(&self, index: MessageIndex, message: &str) {
        self.dispatch(index, ReleaseCommand::allow_exit(self.release_seconds, message))
            .await;
    }

    async fn deny_access(&self, index: MessageIndex, message: Option<&str>) {
        let message = message.unwrap_or(DisplayMessages::ACCESS_DENIED);
        self.dispatch(index, ReleaseCommand::deny(self.release_seconds, message))
            .await;
    }
}

fn decode_chunk(chunk: &[u8]) -> Result<Frame> {
    let frame = Frame::decode(chunk)?;
    trace!(index = %frame.index(), data = frame.data(), "Frame received");

    // Logged, not rejected.
    if let Err(e) = frame.verify_checksum() {
        warn!(index = %frame.index(), error = %e, "Checksum mismatch on inbound frame");
    }
    Ok(frame)
}
