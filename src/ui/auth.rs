use crate::auth::{AuthAction, AuthField, AuthForm};
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};

/// Login / register form
pub struct AuthView<'a> {
    pub form: &'a AuthForm,
}

impl Widget for AuthView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let form = self.form;
        let card = centered(area, 52, 13);

        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!(" Wardroom · {} ", form.action.display_name()))
            .style(Style::default().fg(Color::Cyan));
        let inner = block.inner(card);
        block.render(card, buf);

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Length(2),
                Constraint::Min(1),
            ])
            .split(inner);

        field(buf, rows[0], "Username", &form.username, form.focus == AuthField::Username);
        let masked = "•".repeat(form.password.chars().count());
        field(buf, rows[1], "Password", &masked, form.focus == AuthField::Password);

        let status = if form.submitting {
            Line::from(Span::styled("Contacting server…", Style::default().fg(Color::Yellow)))
        } else if let Some(error) = &form.error {
            Line::from(Span::styled(error.as_str(), Style::default().fg(Color::Red)))
        } else {
            Line::from("")
        };
        buf.set_line(rows[2].x, rows[2].y, &status, rows[2].width);

        let switch_hint = match form.action {
            AuthAction::Login => "Ctrl+R: create an account instead",
            AuthAction::Register => "Ctrl+R: sign in instead",
        };
        let hints = [
            Line::from(Span::styled("Enter: submit · Tab: next field · Esc: quit", Style::default().fg(Color::DarkGray))),
            Line::from(Span::styled(switch_hint, Style::default().fg(Color::DarkGray))),
        ];
        for (i, line) in hints.iter().enumerate() {
            if (i as u16) < rows[3].height {
                buf.set_line(rows[3].x, rows[3].y + i as u16, line, rows[3].width);
            }
        }
    }
}

fn field(buf: &mut Buffer, area: Rect, label: &str, value: &str, focused: bool) {
    let style = if focused {
        Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Gray)
    };
    let block = Block::default().borders(Borders::ALL).title(label).style(style);
    let inner = block.inner(area);
    block.render(area, buf);

    let cursor = if focused { "▌" } else { "" };
    let line = Line::from(vec![Span::raw(value), Span::raw(cursor)]);
    buf.set_line(inner.x, inner.y, &line, inner.width);
}

/// A `width` x `height` rectangle centred in `area`, clamped to it
pub fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}
