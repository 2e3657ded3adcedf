//! Ease-factor interval scheduling.

use crate::types::{Deck, DeckItem};
use chrono::{DateTime, Duration, Utc};

/// Scheduling parameters.
///
/// Defaults are the calibrated production values: two fixed early intervals
/// (next day, then three days) before ease-driven growth takes over, a 1.3
/// ease floor, and a full progress reset on any miss.
#[derive(Debug, Clone)]
pub struct Scheduler {
    pub initial_ease: f64,
    pub minimum_ease: f64,
    pub ease_bonus: f64,
    pub ease_penalty: f64,
    pub first_interval: Duration,
    pub second_interval: Duration,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self {
            initial_ease: 2.5,
            minimum_ease: 1.3,
            ease_bonus: 0.1,
            ease_penalty: 0.2,
            first_interval: Duration::days(1),
            second_interval: Duration::days(3),
        }
    }
}

impl Scheduler {
    /// Initial state for a newly learned sentence.
    pub fn initial_item(
        &self,
        sentence: impl Into<String>,
        translation: impl Into<String>,
        lang: impl Into<String>,
        pronunciation: Option<String>,
        added_at: DateTime<Utc>,
    ) -> DeckItem {
        DeckItem {
            sentence: sentence.into(),
            translation: translation.into(),
            lang: lang.into(),
            pronunciation,
            added_at,
            next_review: added_at + self.first_interval,
            interval_ms: self.first_interval.num_milliseconds(),
            ease_factor: self.initial_ease,
            review_count: 0,
        }
    }

    /// Apply one grading outcome in place.
    pub fn grade(&self, item: &mut DeckItem, correct: bool, now: DateTime<Utc>) {
        if correct {
            item.interval_ms = match item.review_count {
                0 => self.first_interval.num_milliseconds(),
                1 => self.second_interval.num_milliseconds(),
                _ => (item.interval_ms as f64 * item.ease_factor).round() as i64,
            };
            item.ease_factor += self.ease_bonus;
            item.review_count += 1;
        } else {
            item.interval_ms = self.first_interval.num_milliseconds();
            item.review_count = 0;
            item.ease_factor = (item.ease_factor - self.ease_penalty).max(self.minimum_ease);
        }
        item.next_review = now + Duration::milliseconds(item.interval_ms);
    }
}

/// Whether an item is due for review.
pub fn is_due(item: &DeckItem, now: DateTime<Utc>) -> bool {
    now >= item.next_review
}

/// All items due at `now`. Pure query, no mutation.
pub fn due_items(deck: &Deck, now: DateTime<Utc>) -> Vec<&DeckItem> {
    deck.iter().filter(|item| is_due(item, now)).collect()
}

/// Earliest `next_review` across the whole deck.
pub fn earliest_next_review(deck: &Deck) -> Option<DateTime<Utc>> {
    deck.iter().map(|item| item.next_review).min()
}
