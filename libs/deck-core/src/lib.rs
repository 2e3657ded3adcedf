//! Core review-deck library shared by the client engine.
//!
//! Provides:
//! - Deck and item types with identity-keyed set semantics
//! - Ease-factor scheduling for review intervals
//! - Replica merge rules for multi-device reconciliation
//! - Batch session result accounting

pub mod merge;
pub mod scheduler;
pub mod summary;
pub mod types;

pub use merge::{compare_progress, merge_decks};
pub use scheduler::{due_items, earliest_next_review, is_due, Scheduler};
pub use summary::{BatchSummary, CardResult, GradeBand};
pub use types::{Deck, DeckItem, ItemKey};
