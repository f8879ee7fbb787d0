//! Connection lifecycle for the live event client
//!
//! This module owns the open/close transitions, the reader task that feeds
//! frames into the dispatch table, and the reconnect task that retries a
//! dropped connection with a fixed delay and a bounded number of attempts.
//!
//! Every open connection and every pending retry belongs to a generation.
//! `connect`, `disconnect` and each successful open start a new one, and a
//! close or retry from an older generation is ignored.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, watch, Mutex, Notify, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::ReconnectConfig;
use crate::dispatch::{dispatch_message, DispatchOutcome};
use crate::error::LiveClientError;
use crate::events::LiveEvent;
use crate::io::{ConnectionFactory, ConnectionPair, FrameCloser, FrameReader};
use crate::store::ReviewState;

/// Retry bookkeeping
#[derive(Debug, Clone, Default)]
pub(crate) struct ConnectionState {
    pub retry_count: u32,
    pub reconnecting: bool,
    pub generation: u64,
}

/// Shared state for connection management
///
/// Cloned into the reader and reconnect tasks; every field is behind an Arc.
/// Lock order is `state` before `closer` and `reader_handle`.
#[derive(Clone)]
pub(crate) struct SharedConnectionState {
    pub state: Arc<RwLock<ConnectionState>>,
    pub review: Arc<RwLock<ReviewState>>,
    pub connected: Arc<watch::Sender<bool>>,
    pub closer: Arc<Mutex<Option<Box<dyn FrameCloser>>>>,
    pub reader_handle: Arc<Mutex<Option<JoinHandle<()>>>>,
    pub reconnect_handle: Arc<Mutex<Option<JoinHandle<()>>>>,
    pub event_sender: broadcast::Sender<LiveEvent>,
    pub auto_reconnect_enabled: Arc<AtomicBool>,
    pub stop_reconnect: Arc<Notify>,
    pub connection_factory: Arc<dyn ConnectionFactory>,
}

impl SharedConnectionState {
    pub fn new(
        auto_reconnect_enabled: bool,
        review: ReviewState,
        connection_factory: Arc<dyn ConnectionFactory>,
    ) -> Self {
        let (event_sender, _) = broadcast::channel(100);
        let (connected, _) = watch::channel(false);
        Self {
            state: Arc::new(RwLock::new(ConnectionState::default())),
            review: Arc::new(RwLock::new(review)),
            connected: Arc::new(connected),
            closer: Arc::new(Mutex::new(None)),
            reader_handle: Arc::new(Mutex::new(None)),
            reconnect_handle: Arc::new(Mutex::new(None)),
            event_sender,
            auto_reconnect_enabled: Arc::new(AtomicBool::new(auto_reconnect_enabled)),
            stop_reconnect: Arc::new(Notify::new()),
            connection_factory,
        }
    }

    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    pub fn is_auto_reconnect_enabled(&self) -> bool {
        self.auto_reconnect_enabled.load(Ordering::SeqCst)
    }

    pub fn set_auto_reconnect_enabled(&self, enabled: bool) {
        debug!("Setting auto-reconnect enabled: {}", enabled);
        self.auto_reconnect_enabled.store(enabled, Ordering::SeqCst);
        if !enabled {
            self.stop_reconnect.notify_waiters();
        }
    }

    /// Start a new generation, orphaning closes and retries of older ones
    pub async fn next_generation(&self) -> u64 {
        let mut state = self.state.write().await;
        state.generation += 1;
        state.reconnecting = false;
        state.generation
    }

    /// Stop a scheduled reconnect, if any
    pub async fn cancel_reconnect(&self) {
        self.stop_reconnect.notify_waiters();
        if let Some(handle) = self.reconnect_handle.lock().await.take() {
            debug!("Cancelling scheduled reconnect");
            handle.abort();
        }
        self.state.write().await.reconnecting = false;
    }

    /// Force-close the active connection without triggering a reconnect.
    ///
    /// Returns true when there was a connection to close.
    pub async fn close_active(&self) -> bool {
        let reader = self.reader_handle.lock().await.take();
        let closer = self.closer.lock().await.take();
        let had_connection = reader.is_some() || closer.is_some();

        if let Some(handle) = reader {
            handle.abort();
        }
        if let Some(closer) = closer {
            close_transport(closer).await;
        }

        self.connected.send_replace(false);
        had_connection
    }
}

/// What a reconnect attempt needs to repeat the initial connect
#[derive(Clone)]
pub(crate) struct ConnectionConfig {
    pub url: String,
    pub origin: String,
    pub token: String,
    pub reconnect: ReconnectConfig,
}

async fn close_transport(mut closer: Box<dyn FrameCloser>) {
    if let Err(e) = closer.close().await {
        debug!("Error while closing connection: {}", e);
    }
}

/// Install a freshly opened connection and start reading from it.
///
/// `generation` is the generation the attempt was started under. If a
/// connect or disconnect has moved on since, the new connection is closed.
pub(crate) async fn open_connection(
    pair: ConnectionPair,
    config: ConnectionConfig,
    shared: SharedConnectionState,
    generation: u64,
) {
    let ConnectionPair { reader, closer } = pair;

    let mut state = shared.state.write().await;
    if state.generation != generation {
        drop(state);
        debug!("Connection to {} opened after it was cancelled", config.url);
        close_transport(closer).await;
        return;
    }

    state.generation += 1;
    state.retry_count = 0;
    state.reconnecting = false;
    let generation = state.generation;

    let previous = shared.closer.lock().await.replace(closer);
    shared.connected.send_replace(true);
    info!("Connected to {}", config.url);
    let _ = shared.event_sender.send(LiveEvent::Connected);

    {
        let mut reader_handle = shared.reader_handle.lock().await;
        if let Some(previous) = reader_handle.take() {
            previous.abort();
        }
        *reader_handle = Some(spawn_reader_task(
            reader,
            config,
            shared.clone(),
            generation,
        ));
    }
    drop(state);

    if let Some(previous) = previous {
        warn!("Replacing a connection that was still open");
        close_transport(previous).await;
    }
}

enum Retry {
    Disabled,
    Attempt(u32),
    Exhausted,
}

/// Connection closed or failed to open: clear it and maybe schedule a retry
pub(crate) async fn handle_close(
    reason: String,
    config: ConnectionConfig,
    shared: SharedConnectionState,
    generation: u64,
) {
    let max_retries = config.reconnect.max_retries;
    let (closer, retry) = {
        let mut state = shared.state.write().await;
        if state.generation != generation {
            debug!("Ignoring close of a replaced connection: {}", reason);
            return;
        }

        shared.reader_handle.lock().await.take();
        let closer = shared.closer.lock().await.take();
        shared.connected.send_replace(false);

        let retry = if !shared.is_auto_reconnect_enabled() {
            Retry::Disabled
        } else if state.retry_count >= max_retries {
            state.reconnecting = false;
            Retry::Exhausted
        } else {
            state.retry_count += 1;
            state.reconnecting = true;
            Retry::Attempt(state.retry_count)
        };
        (closer, retry)
    };

    info!("Disconnected: {}", reason);
    if let Some(closer) = closer {
        close_transport(closer).await;
    }
    let _ = shared
        .event_sender
        .send(LiveEvent::ConnectionLost { reason });

    match retry {
        Retry::Disabled => {
            debug!("Auto-reconnect disabled, not scheduling a reconnect");
        }
        Retry::Exhausted => {
            error!("Max reconnect attempts reached. Connection failed.");
            let _ = shared.event_sender.send(LiveEvent::ReconnectFailed {
                reason: LiveClientError::RetriesExhausted(max_retries).to_string(),
            });
        }
        Retry::Attempt(attempt) => {
            // A connect or disconnect may have landed while the transport was closing
            if shared.state.read().await.generation != generation {
                debug!("Connection replaced while closing, not reconnecting");
                return;
            }

            info!("Attempting reconnect ({}/{})...", attempt, max_retries);
            let _ = shared.event_sender.send(LiveEvent::Reconnecting {
                attempt,
                max_attempts: max_retries,
            });
            let handle = spawn_reconnect_task(config, shared.clone(), generation);
            *shared.reconnect_handle.lock().await = Some(handle);
        }
    }
}

/// Wait the retry delay, then try to connect again with the same token
pub(crate) fn spawn_reconnect_task(
    config: ConnectionConfig,
    shared: SharedConnectionState,
    generation: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(config.reconnect.delay) => {}
            _ = shared.stop_reconnect.notified() => {
                debug!("Reconnection stopped");
                shared.state.write().await.reconnecting = false;
                return;
            }
        }

        if !shared.is_auto_reconnect_enabled() {
            debug!("Auto-reconnect disabled while waiting, giving up");
            shared.state.write().await.reconnecting = false;
            return;
        }

        if shared.state.read().await.generation != generation {
            debug!("Reconnect cancelled while waiting");
            return;
        }

        match shared
            .connection_factory
            .connect(&config.url, &config.origin, &config.token)
            .await
        {
            Ok(pair) => {
                open_connection(pair, config, shared.clone(), generation).await;
            }
            Err(e) => {
                warn!("Reconnect attempt failed: {}", e);
                handle_close(e.to_string(), config, shared.clone(), generation).await;
            }
        }
    })
}

/// Read frames until the connection ends, dispatching each one in order
pub(crate) fn spawn_reader_task(
    mut reader: Box<dyn FrameReader>,
    config: ConnectionConfig,
    shared: SharedConnectionState,
    generation: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let reason = loop {
            match reader.read_frame().await {
                Ok(None) => break "Connection closed by server".to_string(),
                Ok(Some(frame)) => {
                    if frame.trim().is_empty() {
                        continue;
                    }
                    debug!("Received: {}", frame);
                    handle_frame(&shared, &frame).await;
                }
                Err(e) => {
                    error!("WebSocket error: {}", e);
                    break format!("Read error: {}", e);
                }
            }
        };

        handle_close(reason, config, shared, generation).await;
    })
}

async fn handle_frame(shared: &SharedConnectionState, frame: &str) {
    let outcome = {
        let mut review = shared.review.write().await;
        dispatch_message(&mut review, frame)
    };

    if let DispatchOutcome::Handled { event } = outcome {
        let _ = shared.event_sender.send(LiveEvent::Dispatched { event });
    }
}
