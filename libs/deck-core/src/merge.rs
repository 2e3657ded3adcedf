//! Replica merge rules for multi-device reconciliation.
//!
//! The deck is single-user and only occasionally edited from more than one
//! device, so conflicts are resolved with a deterministic "most progressed
//! wins" order rather than a replication protocol. Loss is bounded to a few
//! review grades, never deletion of unrelated items.

use crate::types::{Deck, DeckItem};
use std::cmp::Ordering;

/// Deterministic total order over two candidates for the same identity:
/// higher `review_count` first, then later `next_review`, then later
/// `added_at`.
pub fn compare_progress(a: &DeckItem, b: &DeckItem) -> Ordering {
    a.review_count
        .cmp(&b.review_count)
        .then(a.next_review.cmp(&b.next_review))
        .then(a.added_at.cmp(&b.added_at))
}

/// Merge a local deck with a server snapshot.
///
/// Seeds the result with the server deck, then folds in every local item:
/// absent identities are inserted, conflicts keep the more progressed
/// candidate, and remaining ties resolve toward the local item.
pub fn merge_decks(local: &Deck, server: &Deck) -> Deck {
    let mut merged = server.clone();
    for item in local.iter() {
        match merged.get(&item.key()) {
            None => {
                merged.insert(item.clone());
            }
            Some(existing) => {
                if compare_progress(item, existing) != Ordering::Less {
                    merged.upsert(item.clone());
                }
            }
        }
    }
    merged
}
