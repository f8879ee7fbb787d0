//! Moderation Live Event Client
//!
//! Keeps an admin session in sync with the image moderation server. The
//! client holds one authenticated WebSocket connection to `/ws`, reconnects
//! with a fixed delay and a bounded number of attempts when it drops, and
//! applies every server event (ratings in progress, acknowledgements, new
//! uploads, deletions) to a local [`ReviewState`].

pub mod client;
pub mod config;
mod connection;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod io;
pub mod store;
pub mod types;

pub use client::{validate_token, LiveClient};
pub use config::{load_config, Config, LiveConfig, ReconnectConfig};
pub use dispatch::{dispatch_message, DispatchOutcome};
pub use error::{LiveClientError, Result};
pub use events::LiveEvent;
pub use store::ReviewState;
pub use types::ImageRecord;
