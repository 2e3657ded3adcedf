//! High-level deck operations: wires the store, review session, and sync
//! engine together.
//!
//! Every mutation follows one flow: commit to the local store (which
//! persists and notifies subscribers), then opportunistically mirror the
//! change to the server. Local state is authoritative; a failed mirror
//! only defers sync until the next trigger.

use crate::session::{ReviewSession, SessionState};
use crate::store::DeckStore;
use crate::sync::{HttpRemote, SyncEngine};
use chrono::{DateTime, Utc};
use deck_core::{Deck, ItemKey, Scheduler};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Gate consulted before a review session may start. Satisfying it (a
/// daily goal, a subscription check) is the embedding client's
/// responsibility.
pub trait AccessGate: Send + Sync {
    fn can_review(&self) -> bool;
}

/// Gate that always allows review.
pub struct OpenGate;

impl AccessGate for OpenGate {
    fn can_review(&self) -> bool {
        true
    }
}

/// Engine construction settings.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub backend_url: String,
    /// `None` keeps the deck in memory only.
    pub storage_path: Option<PathBuf>,
    pub scheduler: Scheduler,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend_url: "https://api.linguadeck.app".to_string(),
            storage_path: DeckStore::default_storage_path(),
            scheduler: Scheduler::default(),
        }
    }
}

/// Facade exposed to the embedding client.
pub struct DeckService {
    store: Arc<Mutex<DeckStore>>,
    session: ReviewSession,
    sync: SyncEngine,
    scheduler: Scheduler,
    gate: Box<dyn AccessGate>,
}

impl DeckService {
    pub fn new(store: DeckStore, sync: SyncEngine) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            session: ReviewSession::new(),
            sync,
            scheduler: Scheduler::default(),
            gate: Box::new(OpenGate),
        }
    }

    /// Build from config with the HTTP transport.
    pub fn from_config(config: EngineConfig) -> Self {
        let store = match &config.storage_path {
            Some(path) => DeckStore::open(path.clone()),
            None => DeckStore::open_in_memory(),
        };
        let sync = SyncEngine::new(HttpRemote::new(config.backend_url));
        let mut service = Self::new(store, sync);
        service.session = ReviewSession::new().with_scheduler(config.scheduler.clone());
        service.scheduler = config.scheduler;
        service
    }

    pub fn with_gate(mut self, gate: impl AccessGate + 'static) -> Self {
        self.gate = Box::new(gate);
        self
    }

    /// Swap the session's random source, for deterministic tests.
    pub fn with_rng(mut self, rng: Box<dyn rand::RngCore + Send>) -> Self {
        self.session = ReviewSession::with_rng(rng).with_scheduler(self.scheduler.clone());
        self
    }

    fn store(&self) -> std::sync::MutexGuard<'_, DeckStore> {
        self.store.lock().expect("store lock")
    }

    /// Register a deck change callback (badges, statistics).
    pub fn subscribe(&self, subscriber: impl Fn(&Deck) + Send + 'static) {
        self.store().subscribe(subscriber);
    }

    /// Number of items due now, for badge rendering.
    pub fn due_count(&self, now: DateTime<Utc>) -> usize {
        self.store().due_count(now)
    }

    /// Snapshot of the current deck.
    pub fn deck(&self) -> Deck {
        self.store().deck().clone()
    }

    /// Record a newly learned sentence. A duplicate identity is a no-op.
    pub fn add_learned(
        &self,
        sentence: impl Into<String>,
        translation: impl Into<String>,
        lang: impl Into<String>,
        pronunciation: Option<String>,
        now: DateTime<Utc>,
    ) -> bool {
        let item = self
            .scheduler
            .initial_item(sentence, translation, lang, pronunciation, now);
        let (inserted, snapshot) = {
            let mut store = self.store();
            let inserted = store.add(item.clone());
            (inserted, store.deck().clone())
        };
        if inserted {
            let sync = self.sync.clone();
            spawn_mirror(async move { sync.mirror_add(&item, &snapshot).await });
        }
        inserted
    }

    /// Remove an item by identity.
    pub fn remove(&self, sentence: impl Into<String>, lang: impl Into<String>) -> bool {
        let key = ItemKey::new(sentence, lang);
        let (removed, snapshot) = {
            let mut store = self.store();
            let removed = store.remove(&key);
            (removed, store.deck().clone())
        };
        if removed {
            let sync = self.sync.clone();
            spawn_mirror(async move { sync.mirror_remove(&key, &snapshot).await });
        }
        removed
    }

    /// Sign in: cache the credential and reconcile the local deck with the
    /// server copy. Also the startup path when a token is already present.
    pub async fn sign_in(&self, token: impl Into<String>) {
        self.sync.set_credential(token);
        let local = self.deck();
        if let Some(merged) = self.sync.reconcile(&local).await {
            self.store().save(merged);
        }
    }

    /// Drop the cached credential. Deck data is untouched.
    pub fn sign_out(&self) {
        self.sync.clear_credential();
    }

    pub fn is_signed_in(&self) -> bool {
        self.sync.has_credential()
    }

    pub fn session_state(&self) -> SessionState {
        self.session.state().clone()
    }

    /// Start a single-item session, if the access gate allows it.
    pub fn start_single(&mut self, now: DateTime<Utc>) -> SessionState {
        if !self.gate.can_review() {
            tracing::debug!("review gate closed, not starting a session");
            return self.session.state().clone();
        }
        let store = self.store.lock().expect("store lock");
        self.session.start_single(&store, now).clone()
    }

    /// Start a batch session, if the access gate allows it.
    pub fn start_batch(&mut self, now: DateTime<Utc>) -> SessionState {
        if !self.gate.can_review() {
            tracing::debug!("review gate closed, not starting a session");
            return self.session.state().clone();
        }
        let store = self.store.lock().expect("store lock");
        self.session.start_batch(&store, now).clone()
    }

    /// Submit the user's choice for the presented question. A grading is
    /// mirrored to the server after the store commit.
    pub fn answer(&mut self, choice: usize, now: DateTime<Utc>) -> SessionState {
        let state = {
            let mut store = self.store.lock().expect("store lock");
            self.session.answer(&mut store, choice, now).clone()
        };
        if let SessionState::Answered(answer) = &state {
            let item = answer.graded.clone();
            let snapshot = self.deck();
            let sync = self.sync.clone();
            spawn_mirror(async move { sync.mirror_grade(&item, &snapshot).await });
        }
        state
    }

    /// Move past an answered question.
    pub fn advance(&mut self, now: DateTime<Utc>) -> SessionState {
        let store = self.store.lock().expect("store lock");
        self.session.advance(&store, now).clone()
    }

    /// Leave the session from any state. The in-flight question is
    /// discarded without grading; dispatched mirror calls complete
    /// independently.
    pub fn exit_session(&mut self) {
        self.session.exit();
    }
}

/// Run a mirror call without blocking the caller. Outside an async runtime
/// the call is skipped; the next sync trigger covers it.
fn spawn_mirror<F>(fut: F)
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(fut);
        }
        Err(_) => tracing::debug!("no async runtime, deferring remote mirror"),
    }
}
