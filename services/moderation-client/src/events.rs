//! Lifecycle notifications published by the live event client

/// Notification broadcast to `LiveClient::subscribe` receivers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveEvent {
    /// A connection was opened
    Connected,

    /// The connection closed or failed to open
    ConnectionLost { reason: String },

    /// A reconnection attempt has been scheduled
    Reconnecting { attempt: u32, max_attempts: u32 },

    /// Automatic reconnection stopped; only an explicit connect recovers
    ReconnectFailed { reason: String },

    /// An inbound event was applied to the review state
    Dispatched { event: String },
}

impl std::fmt::Display for LiveEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LiveEvent::Connected => write!(f, "Connected"),
            LiveEvent::ConnectionLost { reason } => write!(f, "Connection lost: {}", reason),
            LiveEvent::Reconnecting {
                attempt,
                max_attempts,
            } => write!(f, "Reconnecting ({}/{})", attempt, max_attempts),
            LiveEvent::ReconnectFailed { reason } => write!(f, "Reconnect failed: {}", reason),
            LiveEvent::Dispatched { event } => write!(f, "Dispatched {}", event),
        }
    }
}
