use crate::conversation::InputBuffer;
use crate::ui::conversation::commands::{command_entries, parse_slash_command, CommandEntry, SlashCommand};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Widget},
};

/// Result returned when the user interacts with the composer
#[derive(Debug, PartialEq)]
pub enum ComposerResult {
    /// Enter on non-command text; the caller sends the input buffer
    Submit,
    Command(SlashCommand),
    None,
}

/// Key handling and slash-command palette for the conversation input.
///
/// The text itself lives in the conversation's [`InputBuffer`] so that typed and
/// spoken input share one buffer.
pub struct ConversationComposer {
    command_entries: Vec<CommandEntry>,
    filtered_commands: Vec<CommandEntry>,
    show_command_palette: bool,
    selected_command: Option<usize>,
}

impl ConversationComposer {
    pub fn new(speech_available: bool) -> Self {
        Self {
            command_entries: command_entries(speech_available),
            filtered_commands: Vec::new(),
            show_command_palette: false,
            selected_command: None,
        }
    }

    pub fn palette_open(&self) -> bool {
        self.show_command_palette
    }

    /// Handle key input
    pub fn handle_key(&mut self, key: KeyEvent, input: &mut InputBuffer) -> ComposerResult {
        if key.kind != KeyEventKind::Press {
            return ComposerResult::None;
        }

        match key.code {
            KeyCode::Enter => {
                if key.modifiers.contains(KeyModifiers::SHIFT) {
                    input.insert_char('\n');
                } else if self.show_command_palette {
                    self.apply_selected_command(input);
                } else if !input.content().trim().is_empty() {
                    self.close_command_palette();
                    if let Some(command) = parse_slash_command(input.content()) {
                        input.clear();
                        return ComposerResult::Command(command);
                    }
                    return ComposerResult::Submit;
                }
            }
            KeyCode::Up if self.show_command_palette => self.move_command_selection(-1),
            KeyCode::Down if self.show_command_palette => self.move_command_selection(1),
            KeyCode::Esc if self.show_command_palette => self.close_command_palette(),
            KeyCode::Tab if self.show_command_palette => {
                self.apply_selected_command(input);
            }
            KeyCode::Char(c) => {
                input.insert_char(c);
                self.sync_palette(input);
            }
            KeyCode::Backspace => {
                if input.backspace() {
                    self.sync_palette(input);
                }
            }
            KeyCode::Delete => {
                if input.delete() {
                    self.sync_palette(input);
                }
            }
            KeyCode::Left => input.move_left(),
            KeyCode::Right => input.move_right(),
            KeyCode::Home => input.move_home(),
            KeyCode::End => input.move_end(),
            _ => {}
        }

        ComposerResult::None
    }

    fn sync_palette(&mut self, input: &InputBuffer) {
        let content = input.content();
        let typing_command = content.starts_with('/') && !content.contains(char::is_whitespace);
        if typing_command {
            if !self.show_command_palette {
                self.show_command_palette = true;
                self.selected_command = Some(0);
            }
            self.refresh_command_palette(content);
        } else {
            self.close_command_palette();
        }
    }

    fn close_command_palette(&mut self) {
        self.show_command_palette = false;
        self.filtered_commands.clear();
        self.selected_command = None;
    }

    fn refresh_command_palette(&mut self, content: &str) {
        let query = content.trim_start_matches('/').to_lowercase();
        self.filtered_commands = self
            .command_entries
            .iter()
            .filter(|entry| query.is_empty() || entry.keyword.starts_with(&query))
            .copied()
            .collect();

        if self.filtered_commands.is_empty() {
            self.selected_command = None;
        } else {
            let index = self.selected_command.unwrap_or(0);
            self.selected_command = Some(index.min(self.filtered_commands.len() - 1));
        }
    }

    fn move_command_selection(&mut self, delta: isize) {
        if self.filtered_commands.is_empty() {
            self.selected_command = None;
            return;
        }

        let current = self.selected_command.unwrap_or(0) as isize;
        let len = self.filtered_commands.len() as isize;
        let next = (current + delta).rem_euclid(len);
        self.selected_command = Some(next as usize);
    }

    fn apply_selected_command(&mut self, input: &mut InputBuffer) -> bool {
        let Some(entry) = self
            .selected_command
            .and_then(|index| self.filtered_commands.get(index))
            .copied()
        else {
            self.close_command_palette();
            return false;
        };

        input.set(format!("/{}", entry.keyword));
        self.close_command_palette();
        true
    }
}

/// Borrowed view of the composer for one frame
pub struct ComposerView<'a> {
    pub composer: &'a ConversationComposer,
    pub input: &'a InputBuffer,
    pub placeholder: &'a str,
    pub recording: bool,
    pub has_focus: bool,
}

impl Widget for ComposerView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let title = if self.recording {
            Line::from(vec![
                Span::styled("● REC ", Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)),
                Span::raw("Ask the patient"),
            ])
        } else {
            Line::from("Ask the patient")
        };

        let block = Block::default()
            .borders(Borders::ALL)
            .title(title)
            .style(if self.has_focus {
                Style::default().fg(Color::Green)
            } else {
                Style::default().fg(Color::Gray)
            });

        let inner_area = block.inner(area);
        block.render(area, buf);

        if self.input.is_empty() {
            let placeholder_line = Line::from(vec![Span::styled(
                self.placeholder,
                Style::default().fg(Color::DarkGray),
            )]);
            buf.set_line(inner_area.x, inner_area.y, &placeholder_line, inner_area.width);
        } else {
            let mut content = self.input.content().to_string();
            if self.has_focus {
                let at = content
                    .char_indices()
                    .nth(self.input.cursor())
                    .map(|(i, _)| i)
                    .unwrap_or(content.len());
                content.insert(at, '▌');
            }

            for (i, line_text) in content.split('\n').enumerate() {
                if i < inner_area.height as usize {
                    let line = Line::from(vec![Span::raw(line_text)]);
                    buf.set_line(inner_area.x, inner_area.y + i as u16, &line, inner_area.width);
                }
            }
        }

        if self.composer.show_command_palette {
            let filtered = &self.composer.filtered_commands;
            let palette_height = (filtered.len().min(6) + 2) as u16;
            let palette_area = Rect {
                x: area.x,
                y: area.y.saturating_sub(palette_height),
                width: area.width,
                height: palette_height.min(area.y),
            };
            if palette_area.height < 3 {
                return;
            }

            Clear.render(palette_area, buf);
            let block = Block::default()
                .borders(Borders::ALL)
                .title("Commands")
                .style(Style::default().fg(Color::Blue));
            let inner = block.inner(palette_area);
            block.render(palette_area, buf);

            for (index, entry) in filtered.iter().enumerate() {
                if index >= inner.height as usize {
                    break;
                }

                let style = if self.composer.selected_command == Some(index) {
                    Style::default().fg(Color::Black).bg(Color::Cyan).add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::White)
                };

                let line = Line::from(vec![
                    Span::styled(format!("/{}", entry.keyword), style),
                    Span::styled("  ", Style::default()),
                    Span::styled(entry.description, Style::default().fg(Color::Gray)),
                ]);

                buf.set_line(inner.x, inner.y + index as u16, &line, inner.width);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text(composer: &mut ConversationComposer, input: &mut InputBuffer, text: &str) {
        for c in text.chars() {
            composer.handle_key(press(KeyCode::Char(c)), input);
        }
    }

    #[test]
    fn enter_on_text_requests_submit_without_clearing() {
        let mut composer = ConversationComposer::new(false);
        let mut input = InputBuffer::default();
        type_text(&mut composer, &mut input, "any allergies?");

        assert_eq!(composer.handle_key(press(KeyCode::Enter), &mut input), ComposerResult::Submit);
        assert_eq!(input.content(), "any allergies?");
    }

    #[test]
    fn enter_on_blank_does_nothing() {
        let mut composer = ConversationComposer::new(false);
        let mut input = InputBuffer::default();
        type_text(&mut composer, &mut input, "   ");

        assert_eq!(composer.handle_key(press(KeyCode::Enter), &mut input), ComposerResult::None);
    }

    #[test]
    fn palette_completes_and_runs_command() {
        let mut composer = ConversationComposer::new(true);
        let mut input = InputBuffer::default();
        type_text(&mut composer, &mut input, "/hi");
        assert!(composer.palette_open());

        composer.handle_key(press(KeyCode::Tab), &mut input);
        assert_eq!(input.content(), "/history");
        assert!(!composer.palette_open());

        let result = composer.handle_key(press(KeyCode::Enter), &mut input);
        assert_eq!(
            result,
            ComposerResult::Command(SlashCommand::History)
        );
        assert!(input.is_empty());
    }

    #[test]
    fn palette_closes_once_text_stops_being_a_command() {
        let mut composer = ConversationComposer::new(false);
        let mut input = InputBuffer::default();
        type_text(&mut composer, &mut input, "/ne");
        assert!(composer.palette_open());

        type_text(&mut composer, &mut input, "w case");
        assert!(!composer.palette_open());
    }
}
