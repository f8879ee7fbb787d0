//! Inbound event dispatch
//!
//! Every frame from the server is a JSON object with a string `event` field.
//! The dispatch table maps that name to a handler that validates the payload
//! and then applies one `ReviewState` transition. Handlers validate before
//! mutating, so a rejected payload leaves the state untouched.

use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::error::{LiveClientError, Result};
use crate::store::ReviewState;
use crate::types::ImageRecord;

/// Applies one event payload to the review state
pub type Handler = fn(&mut ReviewState, &Value) -> Result<()>;

/// Event name to handler mapping
pub const HANDLERS: &[(&str, Handler)] = &[
    ("in_progress", handle_in_progress),
    ("ack_rating", handle_ack_rating),
    ("new_upload", handle_new_upload),
    ("ack_delete", handle_ack_delete),
    ("delete", handle_delete),
    ("rate", handle_rate),
    ("update_rate", handle_update_rate),
    ("error", handle_error),
];

/// Result of dispatching a single frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Handler ran and the payload was appended to the message log
    Handled { event: String },
    /// No handler is registered for this event name
    Unknown { event: String },
    /// The frame was not JSON or had no string `event` field
    Malformed { reason: String },
    /// A handler refused the payload; state is unchanged
    Rejected { event: String, reason: String },
}

/// Find the handler registered for an event name
pub fn lookup(event: &str) -> Option<Handler> {
    HANDLERS
        .iter()
        .find(|(name, _)| *name == event)
        .map(|(_, handler)| *handler)
}

/// Parse a raw text frame and apply it to `state`.
///
/// Never fails: every problem is logged and reported through the outcome.
pub fn dispatch_message(state: &mut ReviewState, raw: &str) -> DispatchOutcome {
    let message: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => {
            error!("Failed to parse live event: {}", e);
            return DispatchOutcome::Malformed {
                reason: e.to_string(),
            };
        }
    };

    let Some(event) = message.get("event").and_then(Value::as_str) else {
        error!("Live event without an 'event' field: {}", raw);
        return DispatchOutcome::Malformed {
            reason: "missing 'event' field".to_string(),
        };
    };
    let event = event.to_string();

    let Some(handler) = lookup(&event) else {
        warn!("Unhandled event type: {}", event);
        return DispatchOutcome::Unknown { event };
    };

    debug!("Dispatching '{}' event", event);
    match handler(state, &message) {
        Ok(()) => {
            state.record_message(message);
            DispatchOutcome::Handled { event }
        }
        Err(e) => {
            warn!("Dropping '{}' event: {}", event, e);
            DispatchOutcome::Rejected {
                event,
                reason: e.to_string(),
            }
        }
    }
}

fn required_str<'a>(message: &'a Value, field: &'static str) -> Result<&'a str> {
    message
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| LiveClientError::MissingField {
            event: event_name(message).to_string(),
            field,
        })
}

fn event_name(message: &Value) -> &str {
    message.get("event").and_then(Value::as_str).unwrap_or("")
}

fn is_success(message: &Value) -> bool {
    message.get("status").and_then(Value::as_str) == Some("success")
}

fn handle_in_progress(state: &mut ReviewState, message: &Value) -> Result<()> {
    let hash = required_str(message, "sha256")?;
    info!("Rating in progress: {}", hash);
    state.mark_pending(hash);
    Ok(())
}

fn handle_ack_rating(state: &mut ReviewState, message: &Value) -> Result<()> {
    let hash = required_str(message, "sha256")?;
    if !is_success(message) {
        error!("Rating failed for hash: {}", hash);
        return Ok(());
    }

    info!("Rating acknowledged: {}", hash);
    state.mark_completed(hash);
    if let Some(rating) = message.get("rating").and_then(Value::as_str) {
        state.update_label(hash, rating);
    }
    Ok(())
}

fn handle_new_upload(state: &mut ReviewState, message: &Value) -> Result<()> {
    let data = message
        .get("data")
        .ok_or_else(|| LiveClientError::MissingField {
            event: "new_upload".to_string(),
            field: "data",
        })?;
    let record: ImageRecord = serde_json::from_value(data.clone())?;
    debug!("New upload {} (id {})", record.filehash, record.id);
    state.merge_images([record]);
    Ok(())
}

fn handle_ack_delete(state: &mut ReviewState, message: &Value) -> Result<()> {
    let hash = required_str(message, "sha256")?;
    if !is_success(message) {
        error!("Delete failed for hash: {}", hash);
        return Ok(());
    }

    state.remove_image(hash);
    Ok(())
}

fn handle_delete(state: &mut ReviewState, message: &Value) -> Result<()> {
    let hash = required_str(message, "sha256")?;
    state.remove_image(hash);
    Ok(())
}

fn handle_rate(state: &mut ReviewState, message: &Value) -> Result<()> {
    let hash = required_str(message, "sha256")?;
    let rating = required_str(message, "rating")?;
    state.update_label(hash, rating);
    Ok(())
}

fn handle_update_rate(state: &mut ReviewState, message: &Value) -> Result<()> {
    let hash = required_str(message, "sha256")?;
    let rating = required_str(message, "rating")?;
    state.update_label(hash, rating);
    state.mark_completed(hash);
    Ok(())
}

fn handle_error(_state: &mut ReviewState, message: &Value) -> Result<()> {
    error!("Server reported an error: {}", message);
    Ok(())
}
