//! Terminal rendering of the application state

pub mod auth;
pub mod conversation;

use crate::app::{App, Screen};
use crate::speech::LISTENING_HINT;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

const COMPOSER_PLACEHOLDER: &str = "Ask the patient a question…";
const COMPOSER_PLACEHOLDER_WITH_MIC: &str = "Ask the patient a question… (F3 to speak)";

pub fn draw(frame: &mut Frame, app: &App) {
    let area = frame.size();

    match app.screen() {
        Screen::Auth(form) => frame.render_widget(auth::AuthView { form }, area),
        Screen::Conversation(screen) => {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Min(5),
                    Constraint::Length(5),
                    Constraint::Length(1),
                ])
                .split(area);

            let conversation = &screen.conversation;
            frame.render_widget(
                conversation::TranscriptView {
                    transcript: conversation.transcript(),
                    patient: conversation.patient(),
                    pending: conversation.pending_requests(),
                },
                chunks[0],
            );

            let speech = screen.speech.controller();
            let recording = speech.is_some_and(|speech| speech.is_listening());
            let placeholder = match speech {
                Some(speech) => speech.placeholder().unwrap_or(COMPOSER_PLACEHOLDER_WITH_MIC),
                None => COMPOSER_PLACEHOLDER,
            };
            frame.render_widget(
                conversation::ComposerView {
                    composer: &screen.composer,
                    input: conversation.input(),
                    placeholder,
                    recording,
                    has_focus: !screen.history.is_open(),
                },
                chunks[1],
            );

            let user = conversation.user().map(|u| u.name.as_str()).unwrap_or("?");
            let mut status = vec![
                Span::styled(format!(" {} ", user), Style::default().fg(Color::Black).bg(Color::Cyan)),
                Span::styled(format!(" case {} ", conversation.thread()), Style::default().fg(Color::DarkGray)),
                Span::styled(" F2 history · /help ", Style::default().fg(Color::DarkGray)),
            ];
            if recording {
                status.push(Span::styled(format!(" {} ", LISTENING_HINT), Style::default().fg(Color::Red)));
            }
            frame.render_widget(Paragraph::new(Line::from(status)), chunks[2]);

            if screen.history.is_open() {
                let overlay = inset(chunks[0], 4, 2);
                frame.render_widget(conversation::HistoryPanelView { panel: &screen.history }, overlay);
            }
        }
    }

    if let Some(notice) = app.notice() {
        let popup = auth::centered(area, 72, 16);
        frame.render_widget(Clear, popup);
        frame.render_widget(
            Paragraph::new(notice)
                .wrap(Wrap { trim: false })
                .block(Block::default().borders(Borders::ALL).title(" Press any key ")),
            popup,
        );
    }
}

fn inset(area: Rect, horizontal: u16, vertical: u16) -> Rect {
    Rect {
        x: area.x + horizontal.min(area.width / 2),
        y: area.y + vertical.min(area.height / 2),
        width: area.width.saturating_sub(horizontal * 2),
        height: area.height.saturating_sub(vertical * 2),
    }
}
