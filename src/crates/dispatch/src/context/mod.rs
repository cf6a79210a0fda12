//! Conversation context kept between requests of one session.

pub mod session;

pub use session::{ConversationState, SessionStore};
