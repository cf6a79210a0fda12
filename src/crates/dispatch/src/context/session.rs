//! Per-session conversation history
//!
//! Each caller-supplied session id maps to its own [`ConversationState`].
//! Sessions that stay idle longer than the configured timeout are evicted.

use dashmap::DashMap;
use llm::{Message, MessageRole};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Ordered turns sent to the model.
///
/// Holds at most one system turn, always first. When the turn count goes
/// over `max_turns`, the oldest user turns are dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationState {
    turns: Vec<Message>,
    max_turns: usize,
}

impl ConversationState {
    /// `max_turns` counts the system turn; values below 2 are raised to 2.
    pub fn new(max_turns: usize) -> Self {
        Self {
            turns: Vec::new(),
            max_turns: max_turns.max(2),
        }
    }

    /// Insert the system turn at the head unless one is already there.
    pub fn ensure_system(&mut self, prompt: &str) {
        if !self.has_system() {
            self.turns.insert(0, Message::system(prompt));
        }
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.turns.push(Message::user(text));
        self.trim();
    }

    pub fn turns(&self) -> &[Message] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    fn has_system(&self) -> bool {
        self.turns
            .first()
            .is_some_and(|turn| turn.role == MessageRole::System)
    }

    fn trim(&mut self) {
        if self.turns.len() <= self.max_turns {
            return;
        }
        let keep_from = usize::from(self.has_system());
        let excess = self.turns.len() - self.max_turns;
        self.turns.drain(keep_from..keep_from + excess);
    }
}

#[derive(Debug)]
struct Session {
    state: Arc<Mutex<ConversationState>>,
    last_seen: Instant,
}

/// Conversation states keyed by session id
#[derive(Debug)]
pub struct SessionStore {
    sessions: DashMap<String, Session>,
    idle_timeout: Duration,
    max_turns: usize,
}

impl SessionStore {
    pub fn new(idle_timeout: Duration, max_turns: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            idle_timeout,
            max_turns,
        }
    }

    /// State for `session_id`, created empty on first use. Marks it active.
    pub fn checkout(&self, session_id: &str) -> Arc<Mutex<ConversationState>> {
        let now = Instant::now();
        let mut entry = self
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                tracing::debug!(session_id, "Opening session");
                Session {
                    state: Arc::new(Mutex::new(ConversationState::new(self.max_turns))),
                    last_seen: now,
                }
            });
        entry.last_seen = now;
        Arc::clone(&entry.state)
    }

    /// Copy of the turns recorded for `session_id`
    pub async fn snapshot(&self, session_id: &str) -> Option<Vec<Message>> {
        let state = self
            .sessions
            .get(session_id)
            .map(|entry| Arc::clone(&entry.state))?;
        let guard = state.lock().await;
        Some(guard.turns().to_vec())
    }

    pub fn remove(&self, session_id: &str) -> bool {
        self.sessions.remove(session_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drop sessions idle for longer than the timeout; returns how many.
    pub fn evict_idle(&self) -> usize {
        let before = self.sessions.len();
        let timeout = self.idle_timeout;
        self.sessions
            .retain(|_, session| session.last_seen.elapsed() <= timeout);
        let evicted = before.saturating_sub(self.sessions.len());
        if evicted > 0 {
            tracing::info!(evicted, remaining = self.sessions.len(), "Evicted idle sessions");
        }
        evicted
    }

    /// Run [`evict_idle`](Self::evict_idle) every `period` until the task is aborted.
    pub fn spawn_eviction(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                self.evict_idle();
            }
        })
    }
}
