use std::str::FromStr;

use strum::{AsRefStr, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// Commands that can be invoked by starting a message with a leading slash.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, AsRefStr, IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum SlashCommand {
    /// Drop the current case and start a new one
    New,
    /// Show or hide past sessions
    History,
    /// Start or stop voice input
    Mic,
    /// Sign out
    Logout,
    /// Show help
    Help,
    /// Exit the application
    Quit,
}

pub fn command_entries(speech_available: bool) -> Vec<CommandEntry> {
    SlashCommand::iter()
        .filter(|command| speech_available || *command != SlashCommand::Mic)
        .map(|command| CommandEntry {
            command,
            keyword: command.command(),
            description: command.description(),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandEntry {
    pub command: SlashCommand,
    pub keyword: &'static str,
    pub description: &'static str,
}

impl SlashCommand {
    /// User-visible description shown in help.
    pub fn description(self) -> &'static str {
        match self {
            SlashCommand::New => "start a new patient case",
            SlashCommand::History => "show or hide your past sessions",
            SlashCommand::Mic => "start or stop voice input",
            SlashCommand::Logout => "sign out",
            SlashCommand::Help => "show available commands",
            SlashCommand::Quit => "exit the application",
        }
    }

    /// Command string without the leading '/'.
    pub fn command(self) -> &'static str {
        self.into()
    }
}

/// Parse a slash command from user input. Words after the command are ignored.
pub fn parse_slash_command(input: &str) -> Option<SlashCommand> {
    let input = input.trim_start();
    if !input.starts_with('/') {
        return None;
    }

    let head = input[1..].split_whitespace().next()?;

    SlashCommand::from_str(head).ok().or_else(|| match head.to_lowercase().as_str() {
        "q" | "exit" | "bye" => Some(SlashCommand::Quit),
        "reset" | "restart" => Some(SlashCommand::New),
        "sessions" => Some(SlashCommand::History),
        "voice" => Some(SlashCommand::Mic),
        "signout" => Some(SlashCommand::Logout),
        "?" => Some(SlashCommand::Help),
        _ => None,
    })
}

/// Get help text for all available commands
pub fn get_help_text(speech_available: bool) -> String {
    let mut help = String::from("Available commands:\n\n");
    for entry in command_entries(speech_available) {
        help.push_str(&format!("/{} - {}\n", entry.keyword, entry.description));
    }

    help.push_str("\nAliases: /q for /quit, /reset for /new, /sessions for /history, /? for /help");
    help.push_str("\nPageUp/PageDown scroll the conversation; F2 toggles history.");
    if speech_available {
        help.push_str(" F3 toggles voice input.");
    }

    help
}
