//! Bot module for handling Telegram interactions.
//!
//! Split into submodules:
//! - `commands`: slash-command definitions and their handler
//! - `message_handler`: routes plain text messages by dialogue state
//! - `flows`: the guided dialog steps and their terminal effects
//! - `ui`: reply keyboards and the main menu

pub mod commands;
pub mod flows;
pub mod message_handler;
pub mod ui;

pub use message_handler::message_handler;

use std::sync::Arc;

use crate::llm::GeminiClient;
use crate::reminders::ReminderManager;
use crate::store::Store;

/// Explicitly constructed collaborators, handed to every handler through
/// the dispatcher's dependency map. No singletons. The job registry stays
/// behind `ReminderManager`; no handler drives it directly.
#[derive(Clone)]
pub struct AppContext {
    pub store: Arc<Store>,
    pub reminders: Arc<ReminderManager>,
    /// Absent when no Gemini API key is configured.
    pub llm: Option<Arc<GeminiClient>>,
}
