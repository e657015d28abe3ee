//! Conversation transcript display component

use crate::api::PatientInfo;
use crate::conversation::{Message, Role, Transcript};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};

/// Borrowed transcript view for one frame
pub struct TranscriptView<'a> {
    pub transcript: &'a Transcript,
    pub patient: Option<&'a PatientInfo>,
    pub pending: usize,
}

impl Widget for TranscriptView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let title = match self.patient {
            Some(patient) => format!(" Patient: {} ", patient.summary()),
            None => " New patient ".to_string(),
        };
        let block = Block::default().borders(Borders::ALL).title(title);

        let inner_area = block.inner(area);
        block.render(area, buf);

        if self.transcript.is_empty() && self.pending == 0 {
            let welcome_lines = vec![
                Line::from(vec![Span::styled("A patient is waiting.", Style::default().fg(Color::Green))]),
                Line::from(vec![Span::raw("")]),
                Line::from(vec![Span::styled(
                    "Greet them and take a history to reach a diagnosis.",
                    Style::default().fg(Color::Gray),
                )]),
                Line::from(vec![Span::raw("")]),
                Line::from(vec![Span::styled(
                    "Enter sends, Shift+Enter adds a line, / opens commands.",
                    Style::default().fg(Color::DarkGray),
                )]),
            ];

            for (i, line) in welcome_lines.iter().enumerate() {
                if i < inner_area.height as usize {
                    buf.set_line(inner_area.x, inner_area.y + i as u16, line, inner_area.width);
                }
            }
            return;
        }

        let mut all_lines: Vec<Line> = Vec::new();
        for message in self.transcript.messages() {
            all_lines.extend(render_message(message, inner_area.width));
            all_lines.push(Line::from(""));
        }
        if self.pending > 0 {
            all_lines.push(Line::from(Span::styled(
                "  the patient is answering…",
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        }

        let height = inner_area.height as usize;
        self.transcript.record_viewport(all_lines.len(), height);
        let (start, end) = visible_window(all_lines.len(), height, self.transcript.scroll_offset());

        for (i, line) in all_lines[start..end].iter().enumerate() {
            buf.set_line(inner_area.x, inner_area.y + i as u16, line, inner_area.width);
        }
    }
}

/// Line range to show, counting `offset` lines up from the bottom
pub fn visible_window(total: usize, height: usize, offset: usize) -> (usize, usize) {
    let max_offset = total.saturating_sub(height);
    let offset = offset.min(max_offset);
    let end = total - offset;
    let start = end.saturating_sub(height);
    (start, end)
}

fn render_message(message: &Message, width: u16) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    let (label, style) = match message.role {
        Role::User => ("You", Style::default().fg(Color::Blue)),
        Role::Bot => ("Patient", Style::default().fg(Color::Green)),
    };
    let timestamp = message.timestamp.format("%H:%M:%S").to_string();
    lines.push(Line::from(vec![
        Span::styled(label, style.add_modifier(Modifier::BOLD)),
        Span::styled(format!(" {}", timestamp), Style::default().fg(Color::DarkGray)),
    ]));

    for content_line in wrap_text(&message.text, width.saturating_sub(2) as usize) {
        lines.push(Line::from(vec![Span::raw("  "), Span::styled(content_line, style)]));
    }

    lines
}

/// Wrap text to fit within the given width, keeping explicit newlines
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut current_line = String::new();
        for word in paragraph.split_whitespace() {
            let needed = current_line.chars().count() + word.chars().count() + 1;
            if current_line.is_empty() || needed <= width {
                if !current_line.is_empty() {
                    current_line.push(' ');
                }
                current_line.push_str(word);
            } else {
                lines.push(std::mem::take(&mut current_line));
                current_line.push_str(word);
            }
        }
        lines.push(current_line);
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn wraps_on_word_boundaries() {
        assert_eq!(
            wrap_text("sharp pain in the lower back", 12),
            vec!["sharp pain", "in the lower", "back"]
        );
        assert_eq!(wrap_text("a\nb", 10), vec!["a", "b"]);
    }

    #[test]
    fn window_pins_to_bottom_by_default() {
        assert_eq!(visible_window(30, 10, 0), (20, 30));
        assert_eq!(visible_window(5, 10, 0), (0, 5));
    }

    #[test]
    fn window_clamps_scroll_at_top() {
        assert_eq!(visible_window(30, 10, 5), (15, 25));
        assert_eq!(visible_window(30, 10, 100), (0, 10));
    }
}
