//! Confirmation modal for destructive or costly item actions.

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use crate::theme::{C_ACCENT, C_MUTED, C_PRIMARY, C_SECONDARY};

#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmAction {
    Reprocess { filename: String, has_transcript: bool },
    Delete { filename: String },
}

pub struct ConfirmPrompt {
    pub action: ConfirmAction,
}

impl ConfirmPrompt {
    pub fn new(action: ConfirmAction) -> Self {
        Self { action }
    }

    fn message(&self) -> &'static str {
        match &self.action {
            ConfirmAction::Reprocess {
                has_transcript: true,
                ..
            } => "Re-transcribe this recording? This will replace the existing transcript.",
            ConfirmAction::Reprocess {
                has_transcript: false,
                ..
            } => "Transcribe this recording?",
            ConfirmAction::Delete { .. } => "Delete this recording?",
        }
    }

    fn filename(&self) -> &str {
        match &self.action {
            ConfirmAction::Reprocess { filename, .. } | ConfirmAction::Delete { filename } => {
                filename
            }
        }
    }

    fn title(&self) -> &'static str {
        match &self.action {
            ConfirmAction::Reprocess { .. } => "reprocess",
            ConfirmAction::Delete { .. } => "delete",
        }
    }

    pub fn draw(&self, frame: &mut Frame, area: Rect) {
        let msg = self.message();
        let w = (msg.chars().count() as u16 + 6)
            .max(self.filename().chars().count() as u16 + 6)
            .min(area.width.saturating_sub(4))
            .max(30);
        let h = 6u16;
        let x = area.x + area.width.saturating_sub(w) / 2;
        let y = area.y + area.height.saturating_sub(h) / 2;
        let modal = Rect {
            x,
            y,
            width: w,
            height: h.min(area.height),
        };

        frame.render_widget(Clear, modal);
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(C_ACCENT))
            .title(Span::styled(
                format!(" {} ", self.title()),
                Style::default().fg(C_PRIMARY).add_modifier(Modifier::BOLD),
            ));
        let inner = block.inner(modal);
        frame.render_widget(block, modal);

        let lines = vec![
            Line::from(Span::styled(msg, Style::default().fg(C_PRIMARY))),
            Line::from(Span::styled(
                self.filename(),
                Style::default().fg(C_SECONDARY),
            )),
            Line::from(""),
            Line::from(vec![
                Span::styled("[y]", Style::default().fg(C_ACCENT)),
                Span::styled(" confirm   ", Style::default().fg(C_MUTED)),
                Span::styled("[n/esc]", Style::default().fg(C_ACCENT)),
                Span::styled(" cancel", Style::default().fg(C_MUTED)),
            ]),
        ];
        frame.render_widget(Paragraph::new(lines), inner);
    }
}
