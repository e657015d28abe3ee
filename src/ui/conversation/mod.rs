//! Conversation UI components for the chat screen

pub mod commands;
pub mod composer;
pub mod history_panel;
pub mod transcript;

pub use commands::{get_help_text, SlashCommand};
pub use composer::{ComposerResult, ComposerView, ConversationComposer};
pub use history_panel::HistoryPanelView;
pub use transcript::TranscriptView;
