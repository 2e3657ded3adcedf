//! Client-side review engine for a language-learning deck.
//!
//! Provides:
//! - `DeckStore`: persisted deck with change notification
//! - `ReviewSession`: single-item and batch review state machine
//! - `SyncEngine`: server reconciliation and fire-and-forget mirroring
//! - `DeckService`: facade wiring the pieces together

pub mod service;
pub mod session;
pub mod store;
pub mod sync;

pub use deck_core::{Deck, DeckItem, ItemKey, Scheduler};
pub use service::{AccessGate, DeckService, EngineConfig, OpenGate};
pub use session::{Answer, Completion, Direction, Question, ReviewSession, SessionState};
pub use store::{DeckStore, StoreError};
pub use sync::{HttpRemote, RemoteDeck, ReviewEvent, SyncEngine, SyncError};
