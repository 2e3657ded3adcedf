//! Deck and item types.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// One learned sentence tracked for review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeckItem {
    /// Source-language text. Non-empty.
    pub sentence: String,
    /// Target-language text. Non-empty.
    pub translation: String,
    /// Target language code.
    pub lang: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pronunciation: Option<String>,
    pub added_at: DateTime<Utc>,
    /// The item is due when `now >= next_review`.
    pub next_review: DateTime<Utc>,
    /// Current review interval in milliseconds. Always positive.
    pub interval_ms: i64,
    /// Per-item retention difficulty multiplier. Never below 1.3.
    pub ease_factor: f64,
    /// Consecutive-correct counter. Reset to zero on any miss.
    pub review_count: u32,
}

impl DeckItem {
    /// Identity key for this item.
    pub fn key(&self) -> ItemKey {
        ItemKey {
            sentence: self.sentence.clone(),
            lang: self.lang.clone(),
        }
    }

    /// Current review interval.
    pub fn interval(&self) -> Duration {
        Duration::milliseconds(self.interval_ms)
    }

    /// Shape constraints checked when loading persisted or remote entries.
    pub fn is_well_formed(&self) -> bool {
        !self.sentence.is_empty()
            && !self.translation.is_empty()
            && !self.lang.is_empty()
            && self.interval_ms > 0
    }
}

/// Identity of a deck entry: the `(sentence, lang)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemKey {
    pub sentence: String,
    pub lang: String,
}

impl ItemKey {
    pub fn new(sentence: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            sentence: sentence.into(),
            lang: lang.into(),
        }
    }
}

/// A user's deck: a set of items unique by identity, kept as an ordered
/// sequence.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Deck {
    items: Vec<DeckItem>,
}

impl Deck {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a deck from a sequence, keeping the first item per identity.
    pub fn from_items(items: impl IntoIterator<Item = DeckItem>) -> Self {
        let mut deck = Self::new();
        for item in items {
            deck.insert(item);
        }
        deck
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeckItem> {
        self.items.iter()
    }

    pub fn items(&self) -> &[DeckItem] {
        &self.items
    }

    pub fn contains(&self, key: &ItemKey) -> bool {
        self.get(key).is_some()
    }

    pub fn get(&self, key: &ItemKey) -> Option<&DeckItem> {
        self.items
            .iter()
            .find(|i| i.sentence == key.sentence && i.lang == key.lang)
    }

    pub fn get_mut(&mut self, key: &ItemKey) -> Option<&mut DeckItem> {
        self.items
            .iter_mut()
            .find(|i| i.sentence == key.sentence && i.lang == key.lang)
    }

    /// Insert if no item with the same identity exists. Returns whether the
    /// deck changed.
    pub fn insert(&mut self, item: DeckItem) -> bool {
        if self.contains(&item.key()) {
            return false;
        }
        self.items.push(item);
        true
    }

    /// Insert or replace by identity.
    pub fn upsert(&mut self, item: DeckItem) {
        match self.get_mut(&item.key()) {
            Some(existing) => *existing = item,
            None => self.items.push(item),
        }
    }

    /// Remove the item with this identity, if present.
    pub fn remove(&mut self, key: &ItemKey) -> Option<DeckItem> {
        let index = self
            .items
            .iter()
            .position(|i| i.sentence == key.sentence && i.lang == key.lang)?;
        Some(self.items.remove(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn item(sentence: &str, lang: &str) -> DeckItem {
        let added_at = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        DeckItem {
            sentence: sentence.to_string(),
            translation: "translation".to_string(),
            lang: lang.to_string(),
            pronunciation: None,
            added_at,
            next_review: added_at + Duration::days(1),
            interval_ms: Duration::days(1).num_milliseconds(),
            ease_factor: 2.5,
            review_count: 0,
        }
    }

    #[test]
    fn duplicate_insert_is_a_noop() {
        let mut deck = Deck::new();
        assert!(deck.insert(item("el gato", "es")));
        assert!(!deck.insert(item("el gato", "es")));
        assert_eq!(deck.len(), 1);
    }

    #[test]
    fn same_sentence_different_lang_is_distinct() {
        let mut deck = Deck::new();
        assert!(deck.insert(item("chat", "fr")));
        assert!(deck.insert(item("chat", "en")));
        assert_eq!(deck.len(), 2);
    }

    #[test]
    fn upsert_replaces_by_identity() {
        let mut deck = Deck::new();
        deck.insert(item("el gato", "es"));
        let mut updated = item("el gato", "es");
        updated.review_count = 4;
        deck.upsert(updated);
        assert_eq!(deck.len(), 1);
        let key = ItemKey::new("el gato", "es");
        assert_eq!(deck.get(&key).map(|i| i.review_count), Some(4));
    }

    #[test]
    fn remove_returns_the_item() {
        let mut deck = Deck::new();
        deck.insert(item("el gato", "es"));
        let key = ItemKey::new("el gato", "es");
        assert!(deck.remove(&key).is_some());
        assert!(deck.remove(&key).is_none());
        assert!(deck.is_empty());
    }

    #[test]
    fn from_items_dedupes() {
        let deck = Deck::from_items(vec![item("a", "es"), item("b", "es"), item("a", "es")]);
        assert_eq!(deck.len(), 2);
    }

    #[test]
    fn well_formed_rejects_empty_fields() {
        assert!(item("el gato", "es").is_well_formed());
        assert!(!item("", "es").is_well_formed());
        let mut bad = item("el gato", "es");
        bad.interval_ms = 0;
        assert!(!bad.is_well_formed());
    }
}
