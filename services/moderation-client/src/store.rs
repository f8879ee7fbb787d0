//! Local review state mutated by live events
//!
//! `ReviewState` owns everything the admin views read: the image collection,
//! the pending and completed rating sets, and the message log. Each method is
//! one complete state transition; the dispatch table calls them and nothing
//! else writes this state.

use std::collections::HashSet;

use serde_json::Value;
use tracing::debug;

use crate::types::ImageRecord;

#[derive(Debug, Clone, Default)]
pub struct ReviewState {
    images: Vec<ImageRecord>,
    pending: HashSet<String>,
    completed: HashSet<String>,
    messages: Vec<Value>,
}

impl ReviewState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed state from an already-fetched page of images
    pub fn with_images(images: Vec<ImageRecord>) -> Self {
        let mut state = Self::default();
        state.merge_images(images);
        state
    }

    /// Images ordered descending by id
    pub fn images(&self) -> &[ImageRecord] {
        &self.images
    }

    pub fn image(&self, hash: &str) -> Option<&ImageRecord> {
        self.images.iter().find(|img| img.filehash == hash)
    }

    pub fn pending(&self) -> &HashSet<String> {
        &self.pending
    }

    pub fn completed(&self) -> &HashSet<String> {
        &self.completed
    }

    pub fn is_pending(&self, hash: &str) -> bool {
        self.pending.contains(hash)
    }

    pub fn is_completed(&self, hash: &str) -> bool {
        self.completed.contains(hash)
    }

    /// Every dispatched event payload, oldest first
    pub fn messages(&self) -> &[Value] {
        &self.messages
    }

    /// Upsert records keyed by content hash, then restore id-descending order.
    pub fn merge_images(&mut self, incoming: impl IntoIterator<Item = ImageRecord>) {
        for record in incoming {
            match self
                .images
                .iter_mut()
                .find(|img| img.filehash == record.filehash)
            {
                Some(existing) => existing.merge_from(record),
                None => self.images.push(record),
            }
        }

        self.images.sort_by(|a, b| b.id.cmp(&a.id));
    }

    /// Set both label fields of the matching image and mark it reviewed.
    ///
    /// Returns false when no image has this hash.
    pub fn update_label(&mut self, hash: &str, label: &str) -> bool {
        let Some(image) = self.images.iter_mut().find(|img| img.filehash == hash) else {
            debug!("No image with hash {} to relabel", hash);
            return false;
        };

        image.label = label.to_string();
        image.new_label = label.to_string();
        image.reviewed = true;
        true
    }

    /// Remove the image with this hash, returning it if present
    pub fn remove_image(&mut self, hash: &str) -> Option<ImageRecord> {
        let index = self.images.iter().position(|img| img.filehash == hash)?;
        Some(self.images.remove(index))
    }

    /// Move a hash into the pending set
    pub fn mark_pending(&mut self, hash: &str) {
        self.completed.remove(hash);
        self.pending.insert(hash.to_string());
    }

    /// Move a hash into the completed set
    pub fn mark_completed(&mut self, hash: &str) {
        self.pending.remove(hash);
        self.completed.insert(hash.to_string());
    }

    pub fn record_message(&mut self, message: Value) {
        self.messages.push(message);
    }
}
