//! Local deck persistence and change notification.

use chrono::{DateTime, Utc};
use deck_core::{due_items, Deck, DeckItem, ItemKey};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Persistence failure. Logged by the store, never surfaced to callers:
/// the in-memory deck stays authoritative.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialize error: {0}")]
    Serialize(#[from] serde_json::Error),
}

type Subscriber = Box<dyn Fn(&Deck) + Send>;

/// Single source of truth for the deck.
///
/// Consumers that need to react to changes (due-count badges, statistics)
/// register subscribers instead of coupling to the mutation sites. Every
/// mutation persists the full deck and then notifies subscribers
/// synchronously, in registration order.
pub struct DeckStore {
    path: Option<PathBuf>,
    deck: Deck,
    subscribers: Vec<Subscriber>,
}

impl DeckStore {
    /// Open the store backed by a file, loading whatever is persisted there.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let deck = load_deck(&path);
        Self {
            path: Some(path),
            deck,
            subscribers: Vec::new(),
        }
    }

    /// Open an unpersisted store.
    pub fn open_in_memory() -> Self {
        Self {
            path: None,
            deck: Deck::new(),
            subscribers: Vec::new(),
        }
    }

    /// Default storage location under the platform data directory.
    pub fn default_storage_path() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join("linguadeck").join("deck.json"))
    }

    pub fn deck(&self) -> &Deck {
        &self.deck
    }

    /// Number of items due at `now`, for badge rendering.
    pub fn due_count(&self, now: DateTime<Utc>) -> usize {
        due_items(&self.deck, now).len()
    }

    /// Register a change callback.
    pub fn subscribe(&mut self, subscriber: impl Fn(&Deck) + Send + 'static) {
        self.subscribers.push(Box::new(subscriber));
    }

    /// Replace the whole deck, persist, and notify.
    pub fn save(&mut self, deck: Deck) {
        self.deck = deck;
        self.persist();
        self.notify();
    }

    /// Insert a newly learned item. A duplicate identity is a no-op.
    pub fn add(&mut self, item: DeckItem) -> bool {
        if !self.deck.insert(item) {
            return false;
        }
        self.persist();
        self.notify();
        true
    }

    /// Remove by identity. Persists and notifies only when something was
    /// actually removed.
    pub fn remove(&mut self, key: &ItemKey) -> bool {
        if self.deck.remove(key).is_none() {
            return false;
        }
        self.persist();
        self.notify();
        true
    }

    /// Insert or replace one item. Used by grading and merge application.
    pub fn put(&mut self, item: DeckItem) {
        self.deck.upsert(item);
        self.persist();
        self.notify();
    }

    fn notify(&self) {
        for subscriber in &self.subscribers {
            subscriber(&self.deck);
        }
    }

    fn persist(&self) {
        let Some(path) = &self.path else { return };
        if let Err(e) = write_deck(path, &self.deck) {
            tracing::warn!(error = %e, "failed to persist deck");
        }
    }
}

/// Read the persisted deck, dropping any entry that does not decode into a
/// well-formed item. A missing or corrupt payload yields an empty deck.
fn load_deck(path: &Path) -> Deck {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(_) => return Deck::new(),
    };
    let entries: Vec<serde_json::Value> = match serde_json::from_str(&raw) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(error = %e, "discarding corrupt deck payload");
            return Deck::new();
        }
    };
    let total = entries.len();
    let mut deck = Deck::new();
    for entry in entries {
        match serde_json::from_value::<DeckItem>(entry) {
            Ok(item) if item.is_well_formed() => {
                deck.insert(item);
            }
            _ => {}
        }
    }
    if deck.len() < total {
        tracing::warn!(dropped = total - deck.len(), "dropped malformed deck entries");
    }
    deck
}

fn write_deck(path: &Path, deck: &Deck) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let payload = serde_json::to_string(deck)?;
    fs::write(path, payload)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use deck_core::Scheduler;
    use std::sync::{Arc, Mutex};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn item(sentence: &str) -> DeckItem {
        Scheduler::default().initial_item(sentence, "translation", "es", None, now())
    }

    #[test]
    fn duplicate_add_is_a_noop() {
        let mut store = DeckStore::open_in_memory();
        assert!(store.add(item("el gato")));
        assert!(!store.add(item("el gato")));
        assert_eq!(store.deck().len(), 1);
    }

    #[test]
    fn remove_reports_whether_anything_happened() {
        let mut store = DeckStore::open_in_memory();
        store.add(item("el gato"));
        assert!(store.remove(&ItemKey::new("el gato", "es")));
        assert!(!store.remove(&ItemKey::new("el gato", "es")));
    }

    #[test]
    fn subscribers_run_in_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut store = DeckStore::open_in_memory();
        for id in [1, 2, 3] {
            let seen = Arc::clone(&seen);
            store.subscribe(move |_| seen.lock().unwrap().push(id));
        }
        store.add(item("el gato"));
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn failed_remove_does_not_notify() {
        let seen = Arc::new(Mutex::new(0));
        let mut store = DeckStore::open_in_memory();
        {
            let seen = Arc::clone(&seen);
            store.subscribe(move |_| *seen.lock().unwrap() += 1);
        }
        store.remove(&ItemKey::new("missing", "es"));
        assert_eq!(*seen.lock().unwrap(), 0);
        store.add(item("el gato"));
        store.add(item("el gato"));
        assert_eq!(*seen.lock().unwrap(), 1);
    }

    #[test]
    fn missing_file_yields_empty_deck() {
        let dir = tempfile::tempdir().unwrap();
        let store = DeckStore::open(dir.path().join("deck.json"));
        assert!(store.deck().is_empty());
    }

    #[test]
    fn corrupt_payload_yields_empty_deck() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deck.json");
        fs::write(&path, "not json at all").unwrap();
        let store = DeckStore::open(&path);
        assert!(store.deck().is_empty());
    }

    #[test]
    fn malformed_entries_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deck.json");
        let good = serde_json::to_value(item("el gato")).unwrap();
        let payload = serde_json::json!([good, {"sentence": 5}, "nonsense", 42]);
        fs::write(&path, serde_json::to_string(&payload).unwrap()).unwrap();

        let store = DeckStore::open(&path);
        assert_eq!(store.deck().len(), 1);
        assert!(store.deck().contains(&ItemKey::new("el gato", "es")));
    }

    #[test]
    fn save_roundtrips_through_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deck.json");
        {
            let mut store = DeckStore::open(&path);
            store.add(item("el gato"));
            store.add(item("la luna"));
        }
        let store = DeckStore::open(&path);
        assert_eq!(store.deck().len(), 2);
        assert!(store.deck().contains(&ItemKey::new("la luna", "es")));
    }

    #[test]
    fn due_count_tracks_next_review() {
        let mut store = DeckStore::open_in_memory();
        let mut due = item("el gato");
        due.next_review = now() - Duration::hours(1);
        store.add(due);
        store.add(item("la luna"));
        assert_eq!(store.due_count(now()), 1);
        assert_eq!(store.due_count(now() + Duration::days(2)), 2);
    }
}
