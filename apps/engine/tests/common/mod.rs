//! Shared test doubles.

use async_trait::async_trait;
use linguadeck_engine::{DeckItem, ItemKey, RemoteDeck, ReviewEvent, SyncError};
use std::sync::{Arc, Mutex};

/// In-memory stand-in for the backend deck mirror.
///
/// Clones share state, so a copy handed to the engine can still be
/// inspected from the test.
#[derive(Clone, Default)]
pub struct FakeRemote {
    pub fail_item_writes: bool,
    pub reject_auth: bool,
    calls: Arc<Mutex<Vec<String>>>,
    server: Arc<Mutex<Vec<DeckItem>>>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_server_deck(items: Vec<DeckItem>) -> Self {
        let remote = Self::default();
        *remote.server.lock().unwrap() = items;
        remote
    }

    pub fn call_log(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn server_deck(&self) -> Vec<DeckItem> {
        self.server.lock().unwrap().clone()
    }

    fn record(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
    }

    fn gate(&self) -> Result<(), SyncError> {
        if self.reject_auth {
            return Err(SyncError::Backend {
                status: 401,
                message: "unauthorized".to_string(),
            });
        }
        Ok(())
    }

    fn item_write(&self) -> Result<(), SyncError> {
        self.gate()?;
        if self.fail_item_writes {
            return Err(SyncError::Backend {
                status: 500,
                message: "internal error".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteDeck for FakeRemote {
    async fn fetch_deck(&self, _token: &str) -> Result<Vec<serde_json::Value>, SyncError> {
        self.record("fetch");
        self.gate()?;
        let items = self.server.lock().unwrap().clone();
        items
            .iter()
            .map(|item| serde_json::to_value(item).map_err(|e| SyncError::Parse(e.to_string())))
            .collect()
    }

    async fn replace_deck(&self, _token: &str, items: &[DeckItem]) -> Result<(), SyncError> {
        self.record("replace");
        self.gate()?;
        *self.server.lock().unwrap() = items.to_vec();
        Ok(())
    }

    async fn create_item(&self, _token: &str, item: &DeckItem) -> Result<(), SyncError> {
        self.record("create");
        self.item_write()?;
        self.server.lock().unwrap().push(item.clone());
        Ok(())
    }

    async fn delete_item(&self, _token: &str, key: &ItemKey) -> Result<(), SyncError> {
        self.record("delete");
        self.item_write()?;
        self.server
            .lock()
            .unwrap()
            .retain(|item| !(item.sentence == key.sentence && item.lang == key.lang));
        Ok(())
    }

    async fn push_review(&self, _token: &str, _review: &ReviewEvent) -> Result<(), SyncError> {
        self.record("review");
        self.item_write()?;
        Ok(())
    }
}
