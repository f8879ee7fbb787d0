//! Record types shared with the moderation server

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An uploaded image as reported by the moderation server
///
/// `filehash` is the content hash and the primary key across the image
/// collection, the rating sets and every protocol message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub filepath: String,
    pub filehash: String,
    #[serde(default)]
    pub label: String,
    /// Proposed label awaiting confirmation, empty when none
    #[serde(default)]
    pub new_label: String,
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub reviewed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ImageRecord {
    /// Minimal record with the given id and content hash
    pub fn new(id: i64, filehash: impl Into<String>) -> Self {
        Self {
            id,
            filepath: String::new(),
            filehash: filehash.into(),
            label: String::new(),
            new_label: String::new(),
            confidence: 0.0,
            reviewed: false,
            created_at: None,
            updated_at: None,
        }
    }

    /// Fold `incoming` into this record.
    ///
    /// Incoming fields win, except `reviewed` (sticky once true) and
    /// `new_label` (an existing non-empty proposal is kept).
    pub fn merge_from(&mut self, incoming: ImageRecord) {
        let reviewed = self.reviewed || incoming.reviewed;
        let new_label = if self.new_label.is_empty() {
            incoming.new_label.clone()
        } else {
            std::mem::take(&mut self.new_label)
        };

        *self = incoming;
        self.reviewed = reviewed;
        self.new_label = new_label;
    }
}
