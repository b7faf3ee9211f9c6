//! Conversation state machine: stages, persisted state, menu parsing, and
//! the per-turn engine.

pub mod machine;
pub mod menu;
pub mod stage;
pub mod state;

pub use machine::{Classification, Engine, Outcome, is_greeting};
pub use stage::Stage;
pub use state::{ConversationState, MessageRecord};
