//! Live event client for the moderation server

use std::sync::Arc;

use tokio::sync::{broadcast, watch, RwLock};
use tracing::{debug, error, info, warn};

use crate::config::LiveConfig;
use crate::connection::{handle_close, open_connection, ConnectionConfig, SharedConnectionState};
use crate::error::{LiveClientError, Result};
use crate::events::LiveEvent;
use crate::io::{ConnectionFactory, WsConnectionFactory};
use crate::store::ReviewState;
use crate::types::ImageRecord;

/// Check that a credential is usable before any connection is attempted.
///
/// Rejects blank tokens and tokens that are really a WebSocket URL, a
/// common mix-up when wiring the client.
pub fn validate_token(token: &str) -> Result<()> {
    if token.trim().is_empty() {
        return Err(LiveClientError::InvalidToken("token is empty".to_string()));
    }

    let lower = token.trim_start().to_ascii_lowercase();
    if lower.starts_with("ws:") || lower.starts_with("wss:") {
        return Err(LiveClientError::InvalidToken(
            "token looks like a WebSocket URL".to_string(),
        ));
    }

    Ok(())
}

/// Maintains one authenticated live connection and the review state it feeds
pub struct LiveClient {
    config: LiveConfig,
    shared: SharedConnectionState,
}

impl LiveClient {
    /// Create a client using the WebSocket transport
    pub fn new(config: LiveConfig) -> Self {
        Self::with_connection_factory(config, Arc::new(WsConnectionFactory::new()))
    }

    /// Create a client with a custom connection factory
    ///
    /// This is useful for testing with mock connections.
    pub fn with_connection_factory(
        config: LiveConfig,
        connection_factory: Arc<dyn ConnectionFactory>,
    ) -> Self {
        let auto_reconnect_enabled = config.reconnect.enabled;
        Self {
            config,
            shared: SharedConnectionState::new(
                auto_reconnect_enabled,
                ReviewState::new(),
                connection_factory,
            ),
        }
    }

    pub fn config(&self) -> &LiveConfig {
        &self.config
    }

    /// Open the live connection, replacing any connection that is already open.
    ///
    /// A failed attempt is handled like a dropped connection: the error is
    /// returned and a reconnect is scheduled if retries remain.
    pub async fn connect(&self, token: &str) -> Result<()> {
        if let Err(e) = validate_token(token) {
            error!("Refusing to connect: {}", e);
            return Err(e);
        }

        let url = self.config.ws_url()?;

        let generation = self.shared.next_generation().await;
        self.shared.cancel_reconnect().await;
        if self.shared.is_connected() {
            warn!("Closing previous WebSocket connection...");
        }
        self.shared.close_active().await;
        // An explicit connect starts with a fresh retry count
        self.shared.state.write().await.retry_count = 0;

        info!("Connecting to: {}", url);
        let connection_config = ConnectionConfig {
            url,
            origin: self.config.origin.trim_end_matches('/').to_string(),
            token: token.to_string(),
            reconnect: self.config.reconnect.clone(),
        };

        match self
            .shared
            .connection_factory
            .connect(&connection_config.url, &connection_config.origin, token)
            .await
        {
            Ok(pair) => {
                open_connection(pair, connection_config, self.shared.clone(), generation).await;
                Ok(())
            }
            Err(e) => {
                warn!("Connection attempt failed: {}", e);
                handle_close(
                    e.to_string(),
                    connection_config,
                    self.shared.clone(),
                    generation,
                )
                .await;
                Err(e)
            }
        }
    }

    /// Close the live connection and cancel any scheduled reconnect.
    ///
    /// Calling this while disconnected is a no-op.
    pub async fn disconnect(&self) -> Result<()> {
        debug!("Disconnecting live client");
        // Orphan a close the server may already have started
        self.shared.next_generation().await;
        self.shared.cancel_reconnect().await;
        if self.shared.close_active().await {
            info!("Connection closed");
        }
        Ok(())
    }

    /// True only while a connection is open
    pub fn is_connected(&self) -> bool {
        self.shared.is_connected()
    }

    /// Observe the connectivity flag
    pub fn watch_connected(&self) -> watch::Receiver<bool> {
        self.shared.connected.subscribe()
    }

    /// Subscribe to lifecycle and dispatch notifications
    pub fn subscribe(&self) -> broadcast::Receiver<LiveEvent> {
        self.shared.event_sender.subscribe()
    }

    /// Consecutive reconnect attempts since the last successful open
    pub async fn retry_count(&self) -> u32 {
        self.shared.state.read().await.retry_count
    }

    pub async fn is_reconnecting(&self) -> bool {
        self.shared.state.read().await.reconnecting
    }

    pub fn is_auto_reconnect_enabled(&self) -> bool {
        self.shared.is_auto_reconnect_enabled()
    }

    /// Enable or disable auto-reconnect
    ///
    /// Disabling stops a reconnect that is waiting out its delay.
    pub fn set_auto_reconnect_enabled(&self, enabled: bool) {
        self.shared.set_auto_reconnect_enabled(enabled);
    }

    /// Shared handle to the review state that live events mutate
    pub fn review_state(&self) -> Arc<RwLock<ReviewState>> {
        self.shared.review.clone()
    }

    /// Copy of the current review state
    pub async fn snapshot(&self) -> ReviewState {
        self.shared.review.read().await.clone()
    }

    /// Merge a page of images fetched elsewhere into the review state
    pub async fn seed_images(&self, images: Vec<ImageRecord>) {
        self.shared.review.write().await.merge_images(images);
    }
}
