//! Tests for the review state transitions

use moderation_client::{ImageRecord, ReviewState};

fn record(id: i64, hash: &str) -> ImageRecord {
    ImageRecord::new(id, hash)
}

fn hashes(state: &ReviewState) -> Vec<&str> {
    state
        .images()
        .iter()
        .map(|img| img.filehash.as_str())
        .collect()
}

// ============================================================================
// Merge tests
// ============================================================================

#[test]
fn test_merge_inserts_new_records_in_descending_id_order() {
    let mut state = ReviewState::new();
    state.merge_images(vec![record(2, "b"), record(5, "e"), record(1, "a")]);
    assert_eq!(hashes(&state), vec!["e", "b", "a"]);
}

#[test]
fn test_merge_overwrites_plain_fields() {
    let mut state = ReviewState::with_images(vec![ImageRecord {
        label: "SFW".to_string(),
        confidence: 0.4,
        filepath: "/static/uploads/a.png".to_string(),
        ..record(1, "a")
    }]);

    state.merge_images(vec![ImageRecord {
        label: "NSFW".to_string(),
        confidence: 0.9,
        ..record(1, "a")
    }]);

    let image = state.image("a").unwrap();
    assert_eq!(image.label, "NSFW");
    assert_eq!(image.confidence, 0.9);
    assert_eq!(image.filepath, "");
    assert_eq!(state.images().len(), 1);
}

#[test]
fn test_merge_keeps_reviewed_once_true() {
    let mut state = ReviewState::with_images(vec![ImageRecord {
        reviewed: true,
        ..record(1, "a")
    }]);

    state.merge_images(vec![record(1, "a")]);
    assert!(state.image("a").unwrap().reviewed);
}

#[test]
fn test_merge_takes_incoming_reviewed_when_existing_false() {
    let mut state = ReviewState::with_images(vec![record(1, "a")]);
    state.merge_images(vec![ImageRecord {
        reviewed: true,
        ..record(1, "a")
    }]);
    assert!(state.image("a").unwrap().reviewed);
}

#[test]
fn test_merge_keeps_existing_new_label() {
    let mut state = ReviewState::with_images(vec![ImageRecord {
        new_label: "NSFW".to_string(),
        ..record(1, "a")
    }]);

    state.merge_images(vec![ImageRecord {
        new_label: "SFW".to_string(),
        ..record(1, "a")
    }]);
    assert_eq!(state.image("a").unwrap().new_label, "NSFW");
}

#[test]
fn test_merge_fills_empty_new_label() {
    let mut state = ReviewState::with_images(vec![record(1, "a")]);
    state.merge_images(vec![ImageRecord {
        new_label: "SFW".to_string(),
        ..record(1, "a")
    }]);
    assert_eq!(state.image("a").unwrap().new_label, "SFW");
}

#[test]
fn test_merge_duplicate_hashes_in_one_batch() {
    let mut state = ReviewState::new();
    state.merge_images(vec![
        ImageRecord {
            reviewed: true,
            ..record(1, "a")
        },
        ImageRecord {
            label: "NSFW".to_string(),
            ..record(1, "a")
        },
    ]);

    assert_eq!(state.images().len(), 1);
    let image = state.image("a").unwrap();
    assert!(image.reviewed);
    assert_eq!(image.label, "NSFW");
}

#[test]
fn test_merge_reorders_when_id_changes() {
    let mut state = ReviewState::with_images(vec![record(1, "a"), record(2, "b")]);
    state.merge_images(vec![record(3, "a")]);
    assert_eq!(hashes(&state), vec!["a", "b"]);
}

// ============================================================================
// Label and delete tests
// ============================================================================

#[test]
fn test_update_label_sets_both_labels_and_reviewed() {
    let mut state = ReviewState::with_images(vec![ImageRecord {
        label: "SFW".to_string(),
        new_label: "SFW".to_string(),
        ..record(1, "a")
    }]);

    assert!(state.update_label("a", "NSFW"));

    let image = state.image("a").unwrap();
    assert_eq!(image.label, "NSFW");
    assert_eq!(image.new_label, "NSFW");
    assert!(image.reviewed);
}

#[test]
fn test_update_label_leaves_other_images_alone() {
    let mut state = ReviewState::with_images(vec![record(1, "a"), record(2, "b")]);
    state.update_label("a", "NSFW");
    assert_eq!(state.image("b").unwrap(), &record(2, "b"));
}

#[test]
fn test_remove_image_by_hash() {
    let mut state = ReviewState::with_images(vec![record(1, "a"), record(2, "b")]);
    let removed = state.remove_image("a").unwrap();
    assert_eq!(removed.id, 1);
    assert_eq!(state.images(), &[record(2, "b")]);
}

// ============================================================================
// Rating set tests
// ============================================================================

#[test]
fn test_mark_completed_without_pending() {
    let mut state = ReviewState::new();
    state.mark_completed("a");
    assert!(state.is_completed("a"));
    assert!(state.pending().is_empty());
}

#[test]
fn test_rating_sets_are_independent_per_hash() {
    let mut state = ReviewState::new();
    state.mark_pending("a");
    state.mark_pending("b");
    state.mark_completed("a");

    assert!(state.is_completed("a"));
    assert!(state.is_pending("b"));
    assert!(!state.is_pending("a"));
    assert!(!state.is_completed("b"));
}

#[test]
fn test_record_message_appends_in_order() {
    let mut state = ReviewState::new();
    state.record_message(serde_json::json!({"event": "rate"}));
    state.record_message(serde_json::json!({"event": "delete"}));
    assert_eq!(state.messages()[0]["event"], "rate");
    assert_eq!(state.messages()[1]["event"], "delete");
}

// ============================================================================
// Property tests
// ============================================================================

#[cfg(not(miri))]
mod properties {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn arb_record() -> impl Strategy<Value = ImageRecord> {
        (0i64..20, "[a-e]", any::<bool>(), prop_oneof![Just(""), Just("SFW"), Just("NSFW")])
            .prop_map(|(id, hash, reviewed, new_label)| ImageRecord {
                reviewed,
                new_label: new_label.to_string(),
                ..ImageRecord::new(id, hash)
            })
    }

    proptest! {
        #[test]
        fn test_merge_keeps_one_record_per_hash_sorted(
            batches in prop::collection::vec(prop::collection::vec(arb_record(), 0..6), 0..8)
        ) {
            let mut state = ReviewState::new();
            let mut seen = HashSet::new();
            for batch in batches {
                for img in &batch {
                    seen.insert(img.filehash.clone());
                }
                state.merge_images(batch);
            }

            let hashes: HashSet<_> = state.images().iter().map(|i| i.filehash.clone()).collect();
            prop_assert_eq!(hashes.len(), state.images().len());
            prop_assert_eq!(hashes, seen);
            prop_assert!(state.images().windows(2).all(|w| w[0].id >= w[1].id));
        }

        #[test]
        fn test_reviewed_is_sticky_across_merges(
            first in arb_record(),
            later in prop::collection::vec(arb_record(), 0..6)
        ) {
            let hash = first.filehash.clone();
            let mut reviewed = first.reviewed;
            let mut new_label = first.new_label.clone();
            let mut state = ReviewState::with_images(vec![first]);

            for img in later.into_iter().filter(|i| i.filehash == hash) {
                reviewed |= img.reviewed;
                if new_label.is_empty() {
                    new_label = img.new_label.clone();
                }
                state.merge_images(vec![img]);
            }

            let merged = state.image(&hash).unwrap();
            prop_assert_eq!(merged.reviewed, reviewed);
            prop_assert_eq!(&merged.new_label, &new_label);
        }
    }
}
