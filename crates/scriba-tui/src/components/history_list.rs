//! HistoryList component — the recording history pane.
//!
//! Rendering is a pure function of the snapshot, the session phase, and the
//! per-row effects; `row_view` computes what a row shows so the mapping can
//! be tested without a terminal.

use ratatui::crossterm::event::{
    KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{List, ListItem, ListState, Paragraph},
    Frame,
};
use unicode_width::UnicodeWidthChar;

use scriba_proto::history::RecordingRecord;

use crate::{
    action::Action,
    controller::{FetchState, HistoryController, RowEffects},
    session::SessionPhase,
    theme::{
        C_ACCENT, C_BADGE_ERR, C_BADGE_PENDING, C_MUTED, C_PENDING, C_PLAYING, C_PRIMARY,
        C_SECONDARY, C_SELECTION_BG, C_TIMESTAMP, C_TOAST_SUCCESS,
    },
    widgets::pane_chrome::{pane_chrome, Badge},
};

/// What one row shows, derived from shared state.  Mutually exclusive icons:
/// playing beats pending beats failed beats busy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowView {
    /// The confirmed-playing item; its toggle acts as a stop control.
    pub playing: bool,
    /// Play sent, acknowledgment not yet received.  No stop control yet.
    pub pending: bool,
    /// A recent action on this row failed; the control is restored when the
    /// flash expires.
    pub failed: bool,
    /// A reprocess/delete call is in flight for this row.
    pub busy: bool,
    /// Copy succeeded recently; show the confirmation instead of the hint.
    pub copied: bool,
    /// Copy is offered only when a non-blank transcript exists.
    pub copy_enabled: bool,
}

pub fn row_view(record: &RecordingRecord, phase: &SessionPhase, effects: &RowEffects) -> RowView {
    let (playing, pending) = match phase {
        SessionPhase::Active { filename, .. } => (filename == &record.filename, false),
        SessionPhase::Starting { filename, .. } => (false, filename == &record.filename),
        _ => (false, false),
    };
    RowView {
        playing,
        pending,
        failed: effects.is_failed(&record.filename),
        busy: effects.is_busy(&record.filename),
        copied: effects.is_copied(&record.filename),
        copy_enabled: record.has_transcript(),
    }
}

pub struct HistoryList {
    selected: usize,
    list_state: ListState,
}

impl HistoryList {
    pub fn new() -> Self {
        Self {
            selected: 0,
            list_state: ListState::default(),
        }
    }

    fn clamp(&mut self, len: usize) {
        if len == 0 {
            self.selected = 0;
        } else if self.selected >= len {
            self.selected = len - 1;
        }
    }

    fn select_up(&mut self, step: usize) {
        self.selected = self.selected.saturating_sub(step);
    }

    fn select_down(&mut self, step: usize, len: usize) {
        if len > 0 {
            self.selected = (self.selected + step).min(len - 1);
        }
    }

    fn selected_record<'a>(&self, controller: &'a HistoryController) -> Option<&'a RecordingRecord> {
        controller.store().records().get(self.selected)
    }

    pub fn handle_key(&mut self, key: KeyEvent, controller: &HistoryController) -> Vec<Action> {
        if key.kind == KeyEventKind::Release {
            return vec![];
        }
        let len = controller.store().records().len();
        self.clamp(len);

        let step = if key.modifiers.contains(KeyModifiers::SHIFT) {
            5
        } else {
            1
        };
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => self.select_up(step),
            KeyCode::Down | KeyCode::Char('j') => self.select_down(step, len),
            KeyCode::PageUp => self.select_up(10),
            KeyCode::PageDown => self.select_down(10, len),
            KeyCode::Home | KeyCode::Char('g') => self.selected = 0,
            KeyCode::End | KeyCode::Char('G') => self.selected = len.saturating_sub(1),

            KeyCode::Enter | KeyCode::Char(' ') => {
                if let Some(r) = self.selected_record(controller) {
                    return vec![Action::ToggleItem(r.filename.clone())];
                }
            }
            KeyCode::Char('s') => return vec![Action::Stop],

            KeyCode::Char('y') => {
                if let Some(r) = self.selected_record(controller) {
                    if r.has_transcript() {
                        if let Some(text) = &r.transcript {
                            return vec![Action::CopyTranscript {
                                filename: r.filename.clone(),
                                text: text.clone(),
                            }];
                        }
                    }
                }
            }
            KeyCode::Char('r') => {
                if let Some(r) = self.selected_record(controller) {
                    return vec![Action::RequestReprocess(r.filename.clone())];
                }
            }
            KeyCode::Char('d') => {
                if let Some(r) = self.selected_record(controller) {
                    return vec![Action::RequestDelete(r.filename.clone())];
                }
            }
            KeyCode::Char('R') | KeyCode::F(5) => return vec![Action::Refresh],

            _ => {}
        }
        vec![]
    }

    pub fn handle_mouse(
        &mut self,
        event: MouseEvent,
        area: Rect,
        controller: &HistoryController,
    ) -> Vec<Action> {
        let len = controller.store().records().len();
        match event.kind {
            MouseEventKind::ScrollUp => self.select_up(1),
            MouseEventKind::ScrollDown => self.select_down(1, len),
            MouseEventKind::Down(MouseButton::Left) => {
                let rel_row = event.row.saturating_sub(area.y + 1) as usize;
                let top = self.list_state.offset();
                if top + rel_row < len {
                    self.selected = top + rel_row;
                }
            }
            _ => {}
        }
        vec![]
    }

    pub fn draw(&mut self, frame: &mut Frame, area: Rect, focused: bool, controller: &HistoryController) {
        let store = controller.store();
        let records = store.records();
        self.clamp(records.len());

        let badge = match store.fetch_state() {
            FetchState::Loading => Some(Badge {
                text: "…",
                color: C_BADGE_PENDING,
            }),
            FetchState::Failed(_) if records.is_empty() => Some(Badge {
                text: "ERR",
                color: C_BADGE_ERR,
            }),
            FetchState::Failed(_) => Some(Badge {
                text: "STALE",
                color: C_BADGE_PENDING,
            }),
            FetchState::Loaded => None,
        };

        let block = pane_chrome("history", focused, badge);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        if records.is_empty() {
            let msg = match store.fetch_state() {
                FetchState::Loading => "  loading history…",
                FetchState::Failed(_) => "  history unavailable",
                FetchState::Loaded => "  no recordings yet",
            };
            frame.render_widget(
                Paragraph::new(Span::styled(msg, Style::default().fg(C_MUTED))),
                inner,
            );
            return;
        }

        let name_width = (inner.width as usize).saturating_sub(34).max(12);
        let items: Vec<ListItem> = records
            .iter()
            .enumerate()
            .map(|(idx, record)| {
                let view = row_view(record, controller.session_phase(), controller.effects());
                let is_selected = idx == self.selected;

                let (icon, icon_color) = if view.playing {
                    ("▶", C_PLAYING)
                } else if view.pending {
                    ("⋯", C_PENDING)
                } else if view.failed {
                    ("✗", C_ACCENT)
                } else if view.busy {
                    ("⟳", C_PENDING)
                } else {
                    (" ", C_MUTED)
                };

                let name_color = if view.playing {
                    C_PLAYING
                } else if is_selected {
                    C_PRIMARY
                } else {
                    C_SECONDARY
                };
                let name_style = if view.playing || is_selected {
                    Style::default().fg(name_color).add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(name_color)
                };

                let stamp = record
                    .timestamp
                    .with_timezone(&chrono::Local)
                    .format("%Y-%m-%d %H:%M")
                    .to_string();
                let duration = record
                    .duration_secs
                    .map(fmt_clock)
                    .unwrap_or_else(|| "--:--".to_string());

                let marker = if view.copied {
                    Span::styled("  ✓ copied", Style::default().fg(C_TOAST_SUCCESS))
                } else if view.failed {
                    Span::styled("  ✗ failed", Style::default().fg(C_ACCENT))
                } else if view.busy {
                    Span::styled("  ⟳ working", Style::default().fg(C_PENDING))
                } else if !view.copy_enabled {
                    Span::styled("  no transcript", Style::default().fg(C_MUTED))
                } else {
                    Span::raw("")
                };

                let line = Line::from(vec![
                    Span::styled(format!(" {} ", icon), Style::default().fg(icon_color)),
                    Span::styled(stamp, Style::default().fg(C_TIMESTAMP)),
                    Span::raw("  "),
                    Span::styled(fit_width(&record.filename, name_width), name_style),
                    Span::styled(format!("  {}", duration), Style::default().fg(C_SECONDARY)),
                    marker,
                ]);

                let item_bg = if is_selected {
                    Style::default().bg(C_SELECTION_BG)
                } else {
                    Style::default()
                };
                ListItem::new(line).style(item_bg)
            })
            .collect();

        let list = List::new(items)
            .highlight_style(Style::default())
            .highlight_symbol("");
        self.list_state.select(Some(self.selected));
        frame.render_stateful_widget(list, inner, &mut self.list_state);
    }
}

fn fmt_clock(v: f64) -> String {
    let total = v.max(0.0).round() as u64;
    let h = total / 3600;
    let m = (total % 3600) / 60;
    let s = total % 60;
    if h > 0 {
        format!("{:02}:{:02}:{:02}", h, m, s)
    } else {
        format!("{:02}:{:02}", m, s)
    }
}

/// Truncate to a display width, appending an ellipsis when cut.
fn fit_width(s: &str, max: usize) -> String {
    let mut width = 0usize;
    let mut out = String::new();
    for ch in s.chars() {
        let w = ch.width().unwrap_or(0);
        if width + w > max.saturating_sub(1) {
            out.push('…');
            return out;
        }
        width += w;
        out.push(ch);
    }
    s.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionId;
    use chrono::{TimeZone, Utc};
    use tokio::time::Instant;

    fn record(filename: &str, transcript: Option<&str>) -> RecordingRecord {
        RecordingRecord {
            filename: filename.to_string(),
            timestamp: Utc.with_ymd_and_hms(2026, 8, 1, 10, 0, 0).unwrap(),
            transcript: transcript.map(|t| t.to_string()),
            duration_secs: Some(61.0),
        }
    }

    fn far() -> Instant {
        Instant::now() + std::time::Duration::from_secs(60)
    }

    #[tokio::test]
    async fn test_row_view_flip_waits_for_ack() {
        let r = record("a.wav", Some("hi"));
        let effects = RowEffects::new();

        let starting = SessionPhase::Starting {
            filename: "a.wav".to_string(),
            session: SessionId::first(),
        };
        let v = row_view(&r, &starting, &effects);
        assert!(v.pending);
        assert!(!v.playing, "no stop control before the backend ack");

        let active = SessionPhase::Active {
            filename: "a.wav".to_string(),
            session: SessionId::first(),
        };
        let v = row_view(&r, &active, &effects);
        assert!(v.playing);
        assert!(!v.pending);
    }

    #[tokio::test]
    async fn test_row_view_only_the_session_target_is_marked() {
        let other = record("b.wav", None);
        let active = SessionPhase::Active {
            filename: "a.wav".to_string(),
            session: SessionId::first(),
        };
        let v = row_view(&other, &active, &RowEffects::new());
        assert!(!v.playing);
        assert!(!v.pending);
    }

    #[tokio::test]
    async fn test_row_view_copy_gated_on_transcript() {
        let effects = RowEffects::new();
        let idle = SessionPhase::Idle;
        assert!(row_view(&record("a.wav", Some("hi")), &idle, &effects).copy_enabled);
        assert!(!row_view(&record("b.wav", None), &idle, &effects).copy_enabled);
        assert!(!row_view(&record("c.wav", Some("   ")), &idle, &effects).copy_enabled);
    }

    #[tokio::test]
    async fn test_row_view_effects_are_per_row() {
        let mut effects = RowEffects::new();
        effects.flash_copied("a.wav", far());
        effects.flash_error("b.wav", far());
        effects.set_busy("c.wav");
        let idle = SessionPhase::Idle;

        assert!(row_view(&record("a.wav", Some("x")), &idle, &effects).copied);
        assert!(row_view(&record("b.wav", Some("x")), &idle, &effects).failed);
        assert!(row_view(&record("c.wav", Some("x")), &idle, &effects).busy);

        let clean = row_view(&record("d.wav", Some("x")), &idle, &effects);
        assert!(!clean.copied && !clean.failed && !clean.busy);
    }

    #[test]
    fn test_fmt_clock() {
        assert_eq!(fmt_clock(0.0), "00:00");
        assert_eq!(fmt_clock(61.4), "01:01");
        assert_eq!(fmt_clock(3661.0), "01:01:01");
    }

    #[test]
    fn test_fit_width_truncates_on_display_width() {
        assert_eq!(fit_width("short.wav", 20), "short.wav");
        let cut = fit_width("a-rather-long-recording-name.wav", 10);
        assert!(cut.ends_with('…'));
        assert!(cut.chars().count() <= 10);
    }
}
