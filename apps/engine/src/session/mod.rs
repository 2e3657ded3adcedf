//! Interactive review session state machine.

use crate::store::DeckStore;
use chrono::{DateTime, Duration, Utc};
use deck_core::{
    due_items, earliest_next_review, BatchSummary, CardResult, Deck, DeckItem, ItemKey, Scheduler,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, RngCore, SeedableRng};
use std::collections::{HashSet, VecDeque};

/// Maximum cards drawn into a batch queue.
pub const BATCH_LIMIT: usize = 10;

/// Maximum distractors per question.
pub const MAX_DISTRACTORS: usize = 3;

/// Which side of the pair is shown as the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Show the sentence, ask for the translation.
    SourceToTranslation,
    /// Show the translation, ask for the sentence.
    TranslationToSource,
}

/// One multiple-choice question.
#[derive(Debug, Clone)]
pub struct Question {
    pub key: ItemKey,
    pub direction: Direction,
    pub prompt: String,
    /// Shuffled choices, the correct answer among them.
    pub choices: Vec<String>,
    pub correct_index: usize,
    pub presented_at: DateTime<Utc>,
}

/// Outcome of an answered question.
#[derive(Debug, Clone)]
pub struct Answer {
    pub question: Question,
    pub chosen_index: usize,
    pub correct: bool,
    /// Post-grading snapshot, for remote mirroring.
    pub graded: DeckItem,
}

/// Why a session ended without a question.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    /// The deck has no items at all.
    EmptyDeck,
    /// Nothing is due; the next item comes due after this long.
    NothingDue { next_due_in: Duration },
}

/// Session state. Transitions run
/// `Idle -> Presenting -> Answered -> (Presenting | Complete)`, with
/// `Summary` taking the place of `Complete` when a batch queue is
/// exhausted. Exiting from any state returns to `Idle`.
#[derive(Debug, Clone)]
pub enum SessionState {
    Idle,
    Presenting(Question),
    Answered(Answer),
    Complete(Completion),
    Summary(BatchSummary),
}

enum Mode {
    Single,
    Batch {
        queue: VecDeque<ItemKey>,
        results: Vec<CardResult>,
    },
}

/// Drives single-item and batch review interactions.
///
/// All randomness (item pick, question direction, distractor sampling,
/// shuffles) flows through the injected source, so sessions are
/// reproducible under test. At most one question is ever in flight:
/// starting a session replaces whatever came before it.
pub struct ReviewSession {
    scheduler: Scheduler,
    rng: Box<dyn RngCore + Send>,
    mode: Mode,
    state: SessionState,
}

impl Default for ReviewSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ReviewSession {
    pub fn new() -> Self {
        Self::with_rng(Box::new(StdRng::from_entropy()))
    }

    pub fn with_rng(rng: Box<dyn RngCore + Send>) -> Self {
        Self {
            scheduler: Scheduler::default(),
            rng,
            mode: Mode::Single,
            state: SessionState::Idle,
        }
    }

    pub fn with_scheduler(mut self, scheduler: Scheduler) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        !matches!(self.state, SessionState::Idle)
    }

    /// Start a single-item session. Replaces any session in flight.
    pub fn start_single(&mut self, store: &DeckStore, now: DateTime<Utc>) -> &SessionState {
        self.mode = Mode::Single;
        self.state = self.next_question(store.deck(), now);
        &self.state
    }

    /// Start a timed batch session over a shuffled queue of due items,
    /// capped at [`BATCH_LIMIT`]. Replaces any session in flight.
    pub fn start_batch(&mut self, store: &DeckStore, now: DateTime<Utc>) -> &SessionState {
        let mut keys: Vec<ItemKey> = due_items(store.deck(), now)
            .into_iter()
            .map(DeckItem::key)
            .collect();
        if keys.is_empty() {
            self.mode = Mode::Single;
            self.state = SessionState::Complete(completion(store.deck(), now));
            return &self.state;
        }
        keys.shuffle(&mut self.rng);
        keys.truncate(BATCH_LIMIT);
        self.mode = Mode::Batch {
            queue: keys.into(),
            results: Vec::new(),
        };
        self.state = self.next_batch_state(store.deck(), now);
        &self.state
    }

    /// Grade the user's single choice. Valid only while a question is
    /// presented; any other call, or an out-of-range index, leaves the
    /// state untouched. Exactly one grading happens per presented question.
    pub fn answer(
        &mut self,
        store: &mut DeckStore,
        choice: usize,
        now: DateTime<Utc>,
    ) -> &SessionState {
        let question = match &self.state {
            SessionState::Presenting(question) => question.clone(),
            _ => {
                tracing::debug!("answer ignored outside of a presented question");
                return &self.state;
            }
        };
        if choice >= question.choices.len() {
            tracing::warn!(choice, "answer index out of range");
            return &self.state;
        }
        let Some(mut item) = store.deck().get(&question.key).cloned() else {
            self.state = SessionState::Complete(completion(store.deck(), now));
            return &self.state;
        };

        let correct = choice == question.correct_index;
        self.scheduler.grade(&mut item, correct, now);
        store.put(item.clone());

        if let Mode::Batch { results, .. } = &mut self.mode {
            let time_ms = (now - question.presented_at).num_milliseconds().max(0);
            results.push(CardResult { correct, time_ms });
        }

        self.state = SessionState::Answered(Answer {
            question,
            chosen_index: choice,
            correct,
            graded: item,
        });
        &self.state
    }

    /// Move past an answered question: the next due card, the batch
    /// summary, or completion.
    pub fn advance(&mut self, store: &DeckStore, now: DateTime<Utc>) -> &SessionState {
        if !matches!(self.state, SessionState::Answered(_)) {
            tracing::debug!("advance ignored outside of an answered question");
            return &self.state;
        }
        let batch = matches!(self.mode, Mode::Batch { .. });
        self.state = if batch {
            self.next_batch_state(store.deck(), now)
        } else {
            self.next_question(store.deck(), now)
        };
        &self.state
    }

    /// Leave the session from any state, discarding session-local progress.
    /// Grades already committed to the store are unaffected.
    pub fn exit(&mut self) {
        self.mode = Mode::Single;
        self.state = SessionState::Idle;
    }

    fn next_question(&mut self, deck: &Deck, now: DateTime<Utc>) -> SessionState {
        let due = due_items(deck, now);
        if due.is_empty() {
            return SessionState::Complete(completion(deck, now));
        }
        let index = self.rng.gen_range(0..due.len());
        SessionState::Presenting(self.build_question(deck, due[index], now))
    }

    fn next_batch_state(&mut self, deck: &Deck, now: DateTime<Utc>) -> SessionState {
        loop {
            let popped = match &mut self.mode {
                Mode::Batch { queue, .. } => queue.pop_front(),
                Mode::Single => return SessionState::Idle,
            };
            match popped {
                Some(key) => {
                    // Items removed mid-session are skipped.
                    if let Some(item) = deck.get(&key) {
                        return SessionState::Presenting(self.build_question(deck, item, now));
                    }
                }
                None => {
                    let results = match &self.mode {
                        Mode::Batch { results, .. } => results.as_slice(),
                        Mode::Single => &[],
                    };
                    return SessionState::Summary(BatchSummary::from_results(results));
                }
            }
        }
    }

    /// Build a question for `item`: random direction, up to
    /// [`MAX_DISTRACTORS`] distractors sampled without replacement from
    /// other same-language items, everything shuffled together.
    fn build_question(&mut self, deck: &Deck, item: &DeckItem, now: DateTime<Utc>) -> Question {
        let direction = if self.rng.gen_bool(0.5) {
            Direction::SourceToTranslation
        } else {
            Direction::TranslationToSource
        };
        let (prompt, answer) = match direction {
            Direction::SourceToTranslation => (item.sentence.clone(), item.translation.clone()),
            Direction::TranslationToSource => (item.translation.clone(), item.sentence.clone()),
        };

        let key = item.key();
        let mut seen: HashSet<&str> = HashSet::new();
        seen.insert(answer.as_str());
        let mut candidates: Vec<&str> = Vec::new();
        for other in deck.iter() {
            if other.lang != item.lang || other.key() == key {
                continue;
            }
            let text = match direction {
                Direction::SourceToTranslation => other.translation.as_str(),
                Direction::TranslationToSource => other.sentence.as_str(),
            };
            if seen.insert(text) {
                candidates.push(text);
            }
        }

        let mut choices: Vec<String> = candidates
            .choose_multiple(&mut self.rng, MAX_DISTRACTORS)
            .map(|text| text.to_string())
            .collect();
        choices.push(answer.clone());
        choices.shuffle(&mut self.rng);
        let correct_index = choices.iter().position(|c| *c == answer).unwrap_or(0);

        Question {
            key,
            direction,
            prompt,
            choices,
            correct_index,
            presented_at: now,
        }
    }
}

fn completion(deck: &Deck, now: DateTime<Utc>) -> Completion {
    match earliest_next_review(deck) {
        None => Completion::EmptyDeck,
        Some(at) => Completion::NothingDue {
            next_due_in: (at - now).max(Duration::zero()),
        },
    }
}
