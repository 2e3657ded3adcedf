//! Remote deck mirroring and sign-in reconciliation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deck_core::{merge_decks, Deck, DeckItem, ItemKey};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

/// Remote call failure.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("network error: {0}")]
    Network(String),

    #[error("backend error: {status} - {message}")]
    Backend { status: u16, message: String },

    #[error("parse error: {0}")]
    Parse(String),
}

impl SyncError {
    fn is_auth_rejection(&self) -> bool {
        matches!(self, Self::Backend { status: 401 | 403, .. })
    }
}

/// One grading event pushed to the server mirror.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewEvent {
    pub sentence: String,
    pub lang: String,
    pub interval_ms: i64,
    pub ease_factor: f64,
    pub next_review: DateTime<Utc>,
    pub review_count: u32,
}

impl From<&DeckItem> for ReviewEvent {
    fn from(item: &DeckItem) -> Self {
        Self {
            sentence: item.sentence.clone(),
            lang: item.lang.clone(),
            interval_ms: item.interval_ms,
            ease_factor: item.ease_factor,
            next_review: item.next_review,
            review_count: item.review_count,
        }
    }
}

/// Transport to the server-held deck copy. The wire format is owned by the
/// backend; [`HttpRemote`] is the production implementation.
#[async_trait]
pub trait RemoteDeck: Send + Sync {
    /// Fetch the full server deck as raw entries.
    async fn fetch_deck(&self, token: &str) -> Result<Vec<serde_json::Value>, SyncError>;

    /// Replace the full server deck.
    async fn replace_deck(&self, token: &str, items: &[DeckItem]) -> Result<(), SyncError>;

    /// Create one item.
    async fn create_item(&self, token: &str, item: &DeckItem) -> Result<(), SyncError>;

    /// Delete one item by identity.
    async fn delete_item(&self, token: &str, key: &ItemKey) -> Result<(), SyncError>;

    /// Submit one grading event.
    async fn push_review(&self, token: &str, review: &ReviewEvent) -> Result<(), SyncError>;
}

struct SyncEngineInner {
    remote: Box<dyn RemoteDeck>,
    credential: Mutex<Option<String>>,
}

/// Keeps the server-side deck copy eventually consistent with local truth.
///
/// Clone-able: all state lives behind an Arc so clones can be handed to
/// spawned mirror tasks. Without a cached credential every remote
/// operation is a silent no-op. Local state is authoritative; a failed
/// mirror only defers sync until the next trigger.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<SyncEngineInner>,
}

impl SyncEngine {
    pub fn new(remote: impl RemoteDeck + 'static) -> Self {
        Self {
            inner: Arc::new(SyncEngineInner {
                remote: Box::new(remote),
                credential: Mutex::new(None),
            }),
        }
    }

    pub fn set_credential(&self, token: impl Into<String>) {
        *self.inner.credential.lock().expect("credential lock") = Some(token.into());
    }

    /// Drop the cached credential. Deck data is untouched.
    pub fn clear_credential(&self) {
        *self.inner.credential.lock().expect("credential lock") = None;
    }

    pub fn has_credential(&self) -> bool {
        self.credential().is_some()
    }

    fn credential(&self) -> Option<String> {
        self.inner.credential.lock().expect("credential lock").clone()
    }

    /// An authentication rejection clears the cached credential. Returns
    /// whether the failure was one.
    fn note_failure(&self, error: &SyncError) -> bool {
        if error.is_auth_rejection() {
            tracing::warn!("remote rejected credential, clearing it");
            self.clear_credential();
            true
        } else {
            false
        }
    }

    /// Fetch the server deck. `Ok(None)` means no usable server data:
    /// unauthenticated, or the credential was just rejected. Failed reads
    /// never touch local state.
    pub async fn pull(&self) -> Result<Option<Deck>, SyncError> {
        let Some(token) = self.credential() else {
            tracing::debug!("no credential, skipping deck pull");
            return Ok(None);
        };
        let entries = match self.inner.remote.fetch_deck(&token).await {
            Ok(entries) => entries,
            Err(e) => {
                if self.note_failure(&e) {
                    return Ok(None);
                }
                return Err(e);
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
            tracing::warn!(
                dropped = total - deck.len(),
                "dropped malformed server deck entries"
            );
        }
        Ok(Some(deck))
    }

    /// Push the full deck as a replacement (read-repair).
    pub async fn push_replace(&self, deck: &Deck) -> Result<(), SyncError> {
        let Some(token) = self.credential() else {
            tracing::debug!("no credential, skipping deck push");
            return Ok(());
        };
        match self.inner.remote.replace_deck(&token, deck.items()).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.note_failure(&e);
                Err(e)
            }
        }
    }

    /// Mirror a local add. Failures degrade to a full-deck push; nothing
    /// is surfaced.
    pub async fn mirror_add(&self, item: &DeckItem, deck: &Deck) {
        let Some(token) = self.credential() else { return };
        if let Err(e) = self.inner.remote.create_item(&token, item).await {
            self.degrade(e, "create", deck).await;
        }
    }

    /// Mirror a local removal.
    pub async fn mirror_remove(&self, key: &ItemKey, deck: &Deck) {
        let Some(token) = self.credential() else { return };
        if let Err(e) = self.inner.remote.delete_item(&token, key).await {
            self.degrade(e, "delete", deck).await;
        }
    }

    /// Mirror a grading event.
    pub async fn mirror_grade(&self, item: &DeckItem, deck: &Deck) {
        let Some(token) = self.credential() else { return };
        let review = ReviewEvent::from(item);
        if let Err(e) = self.inner.remote.push_review(&token, &review).await {
            self.degrade(e, "review", deck).await;
        }
    }

    /// A fine-grained write failed: fall back to replacing the whole
    /// server deck so it still converges to local truth.
    async fn degrade(&self, error: SyncError, operation: &str, deck: &Deck) {
        if self.note_failure(&error) {
            return;
        }
        tracing::warn!(error = %error, operation, "remote write failed, falling back to full push");
        if let Err(e) = self.push_replace(deck).await {
            tracing::warn!(error = %e, "fallback full push failed, deferring to next sync");
        }
    }

    /// Sign-in reconciliation: pull the server deck, merge it with
    /// `local`, and push the merge result back as a full replacement.
    /// Returns the merged deck for the caller to republish, or `None`
    /// when no server data was usable.
    pub async fn reconcile(&self, local: &Deck) -> Option<Deck> {
        let server = match self.pull().await {
            Ok(Some(server)) => server,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(error = %e, "deck pull failed, staying local-only");
                return None;
            }
        };
        let merged = merge_decks(local, &server);
        if let Err(e) = self.push_replace(&merged).await {
            tracing::warn!(error = %e, "post-merge push failed, deferring to next sync");
        }
        Some(merged)
    }
}

/// Default request timeout. The transport owns timeouts; nothing above it
/// waits on a sync call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// reqwest-backed transport.
pub struct HttpRemote {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRemote {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("http client");
        let base_url: String = base_url.into();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, SyncError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let message = resp.text().await.unwrap_or_default();
        Err(SyncError::Backend {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl RemoteDeck for HttpRemote {
    async fn fetch_deck(&self, token: &str) -> Result<Vec<serde_json::Value>, SyncError> {
        let resp = self
            .client
            .get(self.url("/api/deck"))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| SyncError::Network(e.to_string()))?;
        let resp = Self::check(resp).await?;
        resp.json()
            .await
            .map_err(|e| SyncError::Parse(e.to_string()))
    }

    async fn replace_deck(&self, token: &str, items: &[DeckItem]) -> Result<(), SyncError> {
        let resp = self
            .client
            .put(self.url("/api/deck"))
            .bearer_auth(token)
            .json(&items)
            .send()
            .await
            .map_err(|e| SyncError::Network(e.to_string()))?;
        Self::check(resp).await.map(|_| ())
    }

    async fn create_item(&self, token: &str, item: &DeckItem) -> Result<(), SyncError> {
        let resp = self
            .client
            .post(self.url("/api/deck/items"))
            .bearer_auth(token)
            .json(item)
            .send()
            .await
            .map_err(|e| SyncError::Network(e.to_string()))?;
        Self::check(resp).await.map(|_| ())
    }

    async fn delete_item(&self, token: &str, key: &ItemKey) -> Result<(), SyncError> {
        let resp = self
            .client
            .post(self.url("/api/deck/items/delete"))
            .bearer_auth(token)
            .json(key)
            .send()
            .await
            .map_err(|e| SyncError::Network(e.to_string()))?;
        Self::check(resp).await.map(|_| ())
    }

    async fn push_review(&self, token: &str, review: &ReviewEvent) -> Result<(), SyncError> {
        let resp = self
            .client
            .post(self.url("/api/deck/reviews"))
            .bearer_auth(token)
            .json(review)
            .send()
            .await
            .map_err(|e| SyncError::Network(e.to_string()))?;
        Self::check(resp).await.map(|_| ())
    }
}
