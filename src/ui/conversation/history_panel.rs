use crate::history::{HistoryPanel, HistoryView};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Widget},
};

/// Overlay listing past sessions
pub struct HistoryPanelView<'a> {
    pub panel: &'a HistoryPanel,
}

impl Widget for HistoryPanelView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        Clear.render(area, buf);
        let block = Block::default()
            .borders(Borders::ALL)
            .title(" Past sessions (F2 to close) ")
            .style(Style::default().fg(Color::Cyan));
        let inner = block.inner(area);
        block.render(area, buf);

        let placeholder = |text: &'static str| vec![Line::from(Span::styled(text, Style::default().fg(Color::DarkGray)))];

        let lines: Vec<Line> = match self.panel.view() {
            HistoryView::Blank => Vec::new(),
            HistoryView::Loading => placeholder("Loading…"),
            HistoryView::NoRecords => placeholder("No past sessions yet."),
            HistoryView::Failed => placeholder("Could not load past sessions."),
            HistoryView::Loaded(sessions) => sessions
                .iter()
                .flat_map(|session| {
                    [
                        Line::from(vec![
                            Span::styled(
                                session.patient.clone(),
                                Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
                            ),
                            Span::raw("  "),
                            Span::styled(session.disease.clone(), Style::default().fg(Color::Yellow)),
                        ]),
                        Line::from(Span::styled(
                            format!("  {}", session.thread_id),
                            Style::default().fg(Color::DarkGray),
                        )),
                    ]
                })
                .collect(),
        };

        for (i, line) in lines.iter().take(inner.height as usize).enumerate() {
            buf.set_line(inner.x, inner.y + i as u16, line, inner.width);
        }
    }
}
