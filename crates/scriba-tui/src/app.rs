//! Application shell: terminal lifecycle, the event loop, and action dispatch.

use std::io;
use std::time::Duration;

use ratatui::crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame, Terminal,
};
use scriba_proto::config::Config;
use scriba_proto::gateway::Gateway;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::{
    action::Action,
    components::history_list::HistoryList,
    controller::{ControllerEvent, FetchState, HistoryController},
    theme::{C_ACCENT, C_MUTED, C_PLAYING, C_PRIMARY, C_SECONDARY},
    widgets::{
        confirm::{ConfirmAction, ConfirmPrompt},
        toast::ToastManager,
    },
};

pub struct App {
    controller: HistoryController,
    events_rx: mpsc::Receiver<ControllerEvent>,
    history: HistoryList,
    toast: ToastManager,
    confirm: Option<ConfirmPrompt>,
    backend_url: String,
    should_quit: bool,
    list_area: Rect,
}

impl App {
    pub fn new(config: &Config, gateway: Gateway) -> Self {
        let (events_tx, events_rx) = mpsc::channel(256);
        let controller = HistoryController::new(
            gateway,
            events_tx,
            &config.playback,
            config.ui.clone(),
        );
        Self {
            controller,
            events_rx,
            history: HistoryList::new(),
            toast: ToastManager::new(),
            confirm: None,
            backend_url: config.backend.base_url(),
            should_quit: false,
            list_area: Rect::default(),
        }
    }

    pub async fn run(mut self) -> anyhow::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        // ── Background task: keyboard/mouse events ────────────────────────────
        let (input_tx, mut input_rx) = mpsc::channel::<Event>(256);
        tokio::task::spawn_blocking(move || loop {
            match event::read() {
                Ok(ev) => {
                    if input_tx.blocking_send(ev).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        });

        // Initial snapshot.
        self.controller.refresh();

        let mut ui_tick = tokio::time::interval(Duration::from_millis(100));
        ui_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal.draw(|f| self.draw(f))?;
            }
            needs_redraw = false;

            if self.should_quit {
                break;
            }

            tokio::select! {
                Some(ev) = input_rx.recv() => {
                    self.handle_input(ev);
                    needs_redraw = true;
                }
                Some(ev) = self.events_rx.recv() => {
                    self.controller.apply(ev);
                    // Drain whatever else already arrived.
                    while let Ok(next) = self.events_rx.try_recv() {
                        self.controller.apply(next);
                    }
                    needs_redraw = true;
                }
                _ = ui_tick.tick() => {
                    self.controller.tick();
                    self.toast.tick();
                    needs_redraw = true;
                }
            }

            if self.should_quit {
                break;
            }
        }

        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;

        Ok(())
    }

    // ── Input ────────────────────────────────────────────────────────────────

    fn handle_input(&mut self, ev: Event) {
        match ev {
            Event::Key(key) => {
                if self.confirm.is_some() {
                    self.handle_confirm_key(key);
                    return;
                }
                if key.kind != KeyEventKind::Release {
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Esc => {
                            self.should_quit = true;
                            return;
                        }
                        KeyCode::Char('c')
                            if key
                                .modifiers
                                .contains(ratatui::crossterm::event::KeyModifiers::CONTROL) =>
                        {
                            self.should_quit = true;
                            return;
                        }
                        _ => {}
                    }
                }
                let actions = self.history.handle_key(key, &self.controller);
                for action in actions {
                    self.dispatch(action);
                }
            }
            Event::Mouse(mouse) => {
                let area = self.list_area;
                let actions = self.history.handle_mouse(mouse, area, &self.controller);
                for action in actions {
                    self.dispatch(action);
                }
            }
            _ => {}
        }
    }

    fn handle_confirm_key(&mut self, key: KeyEvent) {
        if key.kind == KeyEventKind::Release {
            return;
        }
        match key.code {
            KeyCode::Char('y') | KeyCode::Enter => {
                if let Some(prompt) = self.confirm.take() {
                    match prompt.action {
                        ConfirmAction::Reprocess { filename, .. } => {
                            debug!("reprocess confirmed: {}", filename);
                            self.controller.reprocess(&filename);
                        }
                        ConfirmAction::Delete { filename } => {
                            debug!("delete confirmed: {}", filename);
                            self.controller.delete(&filename);
                        }
                    }
                }
            }
            KeyCode::Char('n') | KeyCode::Esc => {
                self.confirm = None;
            }
            _ => {}
        }
    }

    // ── Action dispatch ──────────────────────────────────────────────────────

    fn dispatch(&mut self, action: Action) {
        match action {
            Action::ToggleItem(filename) => self.controller.toggle_playback(&filename),
            Action::Stop => self.controller.stop_playback(),
            Action::CopyTranscript { filename, text } => self.copy_to_clipboard(&filename, &text),
            Action::RequestReprocess(filename) => {
                let has_transcript = self
                    .controller
                    .store()
                    .find(&filename)
                    .map(|r| r.has_transcript())
                    .unwrap_or(false);
                self.confirm = Some(ConfirmPrompt::new(ConfirmAction::Reprocess {
                    filename,
                    has_transcript,
                }));
            }
            Action::RequestDelete(filename) => {
                self.confirm = Some(ConfirmPrompt::new(ConfirmAction::Delete { filename }));
            }
            Action::Refresh => {
                self.toast.info("refreshing history");
                self.controller.refresh();
            }
        }
    }

    fn copy_to_clipboard(&mut self, filename: &str, text: &str) {
        match arboard::Clipboard::new().and_then(|mut cb| cb.set_text(text.to_string())) {
            Ok(()) => {
                self.controller.note_copied(filename);
                self.toast.success("transcript copied");
            }
            Err(e) => {
                warn!("clipboard error: {}", e);
                self.toast.error(format!("clipboard error: {}", e));
            }
        }
    }

    // ── Drawing ──────────────────────────────────────────────────────────────

    fn draw(&mut self, frame: &mut Frame) {
        let full = frame.area();
        let [header_area, list_area, footer_area] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .areas(full);
        self.list_area = list_area;

        self.draw_header(frame, header_area);
        self.history.draw(frame, list_area, true, &self.controller);
        self.draw_footer(frame, footer_area);

        if let Some(prompt) = &self.confirm {
            prompt.draw(frame, full);
        }
        self.toast.draw(frame, full);
    }

    fn draw_header(&self, frame: &mut Frame, area: Rect) {
        let mut spans = vec![
            Span::styled(
                " scriba ",
                Style::default().fg(C_ACCENT).add_modifier(Modifier::BOLD),
            ),
            Span::styled(&self.backend_url, Style::default().fg(C_MUTED)),
        ];
        if let Some(filename) = self.controller.active_filename() {
            spans.push(Span::styled("   ▶ ", Style::default().fg(C_PLAYING)));
            spans.push(Span::styled(
                filename.to_string(),
                Style::default().fg(C_PLAYING),
            ));
        }
        if let FetchState::Failed(err) = self.controller.store().fetch_state() {
            spans.push(Span::styled("   backend: ", Style::default().fg(C_MUTED)));
            spans.push(Span::styled(err.clone(), Style::default().fg(C_ACCENT)));
        }
        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    fn draw_footer(&self, frame: &mut Frame, area: Rect) {
        let hint = |k: &'static str, label: &'static str| {
            [
                Span::styled(k, Style::default().fg(C_PRIMARY)),
                Span::styled(format!(" {}  ", label), Style::default().fg(C_SECONDARY)),
            ]
        };
        let mut spans = vec![Span::raw(" ")];
        spans.extend(hint("↵", "play/stop"));
        spans.extend(hint("s", "stop"));
        spans.extend(hint("y", "copy"));
        spans.extend(hint("r", "reprocess"));
        spans.extend(hint("d", "delete"));
        spans.extend(hint("R", "refresh"));
        spans.extend(hint("q", "quit"));
        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }
}
