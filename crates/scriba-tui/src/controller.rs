//! History controller — snapshot store plus item action coordination.
//!
//! Owns the one shared mutable resource (the cached history snapshot) and the
//! session tracker.  Gateway calls run in spawned tasks and report back as
//! [`ControllerEvent`]s on the app's message bus; `apply` is the single place
//! state changes land, so the UI can never observe a half-applied mutation.
//! The snapshot is only ever replaced wholesale — mutating operations install
//! the full list the backend returns, never a locally patched row.

use std::collections::{HashMap, HashSet};

use scriba_proto::config::{PlaybackConfig, UiConfig};
use scriba_proto::gateway::{Gateway, GatewayError};
use scriba_proto::history::{HistorySnapshot, RecordingRecord};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::session::{SessionEndReason, SessionId, SessionPhase, SessionTracker};

// ── Events ────────────────────────────────────────────────────────────────────

/// Results of gateway calls, delivered to the app event loop.
#[derive(Debug)]
pub enum ControllerEvent {
    HistoryFetched(Result<HistorySnapshot, GatewayError>),
    PlayResolved {
        session: SessionId,
        started: Result<bool, GatewayError>,
    },
    StopAcked {
        session: SessionId,
    },
    SessionEnded {
        session: SessionId,
        reason: SessionEndReason,
    },
    ReprocessResolved {
        filename: String,
        outcome: Result<Option<HistorySnapshot>, GatewayError>,
    },
    DeleteResolved {
        filename: String,
        outcome: Result<HistorySnapshot, GatewayError>,
    },
}

// ── Snapshot store ────────────────────────────────────────────────────────────

/// Outcome of the most recent fetch.  A failed refresh keeps the previous
/// records (stale but available); an empty successful fetch is a valid
/// terminal state, distinguished from failure by the gateway's Result, never
/// by emptiness.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchState {
    Loading,
    Loaded,
    Failed(String),
}

#[derive(Debug)]
pub struct HistoryStore {
    records: HistorySnapshot,
    fetch: FetchState,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            fetch: FetchState::Loading,
        }
    }

    pub fn records(&self) -> &[RecordingRecord] {
        &self.records
    }

    pub fn fetch_state(&self) -> &FetchState {
        &self.fetch
    }

    pub fn find(&self, filename: &str) -> Option<&RecordingRecord> {
        self.records.iter().find(|r| r.filename == filename)
    }

    fn begin_refresh(&mut self) {
        self.fetch = FetchState::Loading;
    }

    /// Replace the snapshot wholesale, preserving backend order verbatim.
    fn install(&mut self, snapshot: HistorySnapshot) {
        self.records = snapshot;
        self.fetch = FetchState::Loaded;
    }

    fn fail(&mut self, message: String) {
        self.fetch = FetchState::Failed(message);
    }
}

// ── Per-row transient affordances ─────────────────────────────────────────────

/// Ephemeral row states: "copied" confirmations, busy guards, error flashes.
/// Keyed by filename so a repeated action restarts its own window without
/// touching any other row.  Pruned by deadline on the UI tick.
#[derive(Debug, Default)]
pub struct RowEffects {
    copy_flash: HashMap<String, Instant>,
    error_flash: HashMap<String, Instant>,
    busy: HashSet<String>,
}

impl RowEffects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_copied(&self, filename: &str) -> bool {
        self.copy_flash.contains_key(filename)
    }

    pub fn is_failed(&self, filename: &str) -> bool {
        self.error_flash.contains_key(filename)
    }

    pub fn is_busy(&self, filename: &str) -> bool {
        self.busy.contains(filename)
    }

    pub fn flash_copied(&mut self, filename: &str, until: Instant) {
        self.copy_flash.insert(filename.to_string(), until);
    }

    pub fn flash_error(&mut self, filename: &str, until: Instant) {
        self.error_flash.insert(filename.to_string(), until);
    }

    pub fn set_busy(&mut self, filename: &str) {
        self.busy.insert(filename.to_string());
    }

    pub fn clear_busy(&mut self, filename: &str) {
        self.busy.remove(filename);
    }

    /// Drop expired flashes.  Call each tick.
    pub fn prune(&mut self, now: Instant) {
        self.copy_flash.retain(|_, until| *until > now);
        self.error_flash.retain(|_, until| *until > now);
    }
}

// ── Controller ────────────────────────────────────────────────────────────────

pub struct HistoryController {
    gateway: Gateway,
    events: mpsc::Sender<ControllerEvent>,
    store: HistoryStore,
    session: SessionTracker,
    effects: RowEffects,
    ui: UiConfig,
}

impl HistoryController {
    pub fn new(
        gateway: Gateway,
        events: mpsc::Sender<ControllerEvent>,
        playback: &PlaybackConfig,
        ui: UiConfig,
    ) -> Self {
        Self {
            gateway,
            events,
            store: HistoryStore::new(),
            session: SessionTracker::new(playback.poll_interval(), playback.safety_timeout()),
            effects: RowEffects::new(),
            ui,
        }
    }

    pub fn store(&self) -> &HistoryStore {
        &self.store
    }

    pub fn session_phase(&self) -> &SessionPhase {
        self.session.phase()
    }

    pub fn active_filename(&self) -> Option<&str> {
        self.session.active_filename()
    }

    pub fn effects(&self) -> &RowEffects {
        &self.effects
    }

    // ── Operations ───────────────────────────────────────────────────────────

    /// Fetch a fresh snapshot.  The previous one stays visible until the
    /// response lands.
    pub fn refresh(&mut self) {
        self.store.begin_refresh();
        let gateway = self.gateway.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = gateway.list_history().await;
            let _ = events.send(ControllerEvent::HistoryFetched(result)).await;
        });
    }

    /// Play/stop toggle for one row.  Playing the active item stops it;
    /// playing a different item stops the current session first, then starts
    /// the new one — sequentially, never concurrently.
    pub fn toggle_playback(&mut self, filename: &str) {
        if self.session.active_filename() == Some(filename) {
            self.stop_playback();
            return;
        }
        if self.session.is_starting() {
            // A start is already awaiting its ack; ignore until it resolves.
            debug!("play request for {} ignored while starting", filename);
            return;
        }

        let stop_first = self.session.active_filename().is_some();
        let session = self.session.begin_start(filename);
        let gateway = self.gateway.clone();
        let events = self.events.clone();
        let filename = filename.to_string();
        tokio::spawn(async move {
            if stop_first {
                // Exclusivity: the stop must complete before the start goes out.
                if let Err(e) = gateway.stop_playback().await {
                    let _ = events
                        .send(ControllerEvent::PlayResolved {
                            session,
                            started: Err(e),
                        })
                        .await;
                    return;
                }
            }
            let started = gateway.play_item(&filename).await;
            let _ = events
                .send(ControllerEvent::PlayResolved { session, started })
                .await;
        });
    }

    /// Explicit stop.  The visual state clears immediately (stop is
    /// idempotent on the backend); with no session in flight this still sends
    /// the stop call and is otherwise a no-op.
    pub fn stop_playback(&mut self) {
        let superseded = self.session.begin_stop();
        let gateway = self.gateway.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            if let Err(e) = gateway.stop_playback().await {
                warn!("stop failed: {}", e);
            }
            if let Some(session) = superseded {
                let _ = events.send(ControllerEvent::StopAcked { session }).await;
            }
        });
    }

    /// Record a successful clipboard copy: per-row confirmation that reverts
    /// after the configured window.  Re-copying restarts only this row's
    /// window.
    pub fn note_copied(&mut self, filename: &str) {
        self.effects
            .flash_copied(filename, Instant::now() + self.ui.copy_flash());
    }

    /// Re-transcribe one recording.  Guarded per row against duplicate
    /// submission; the call is not cancellable once issued.
    pub fn reprocess(&mut self, filename: &str) {
        if self.effects.is_busy(filename) {
            return;
        }
        self.effects.set_busy(filename);
        let gateway = self.gateway.clone();
        let events = self.events.clone();
        let filename = filename.to_string();
        tokio::spawn(async move {
            let outcome = gateway.reprocess_item(&filename).await;
            let _ = events
                .send(ControllerEvent::ReprocessResolved { filename, outcome })
                .await;
        });
    }

    /// Delete one recording.  Deleting the current playback target
    /// invalidates the session explicitly (idempotent stop) rather than
    /// leaving a stop control pointing at a nonexistent file.
    pub fn delete(&mut self, filename: &str) {
        if self.effects.is_busy(filename) {
            return;
        }
        if self.session.target_filename() == Some(filename) {
            self.stop_playback();
        }
        self.effects.set_busy(filename);
        let gateway = self.gateway.clone();
        let events = self.events.clone();
        let filename = filename.to_string();
        tokio::spawn(async move {
            let outcome = gateway.delete_item(&filename).await;
            let _ = events
                .send(ControllerEvent::DeleteResolved { filename, outcome })
                .await;
        });
    }

    /// Expire per-row flashes.  Call from the UI tick.
    pub fn tick(&mut self) {
        self.effects.prune(Instant::now());
    }

    // ── Event application ────────────────────────────────────────────────────

    pub fn apply(&mut self, event: ControllerEvent) {
        match event {
            ControllerEvent::HistoryFetched(Ok(snapshot)) => {
                self.store.install(snapshot);
            }
            ControllerEvent::HistoryFetched(Err(e)) => {
                warn!("history fetch failed: {}", e);
                self.store.fail(e.to_string());
            }

            ControllerEvent::PlayResolved {
                session,
                started: Ok(true),
            } => {
                self.session.activate(session, &self.gateway, &self.events);
            }
            ControllerEvent::PlayResolved { session, started } => {
                if let Err(e) = &started {
                    warn!("play failed: {}", e);
                }
                if let Some(filename) = self.session.starting_filename(session) {
                    self.effects
                        .flash_error(&filename, Instant::now() + self.ui.error_flash());
                }
                self.session.cancel_start(session);
            }

            ControllerEvent::StopAcked { session } => {
                self.session.on_stop_acked(session);
            }

            ControllerEvent::SessionEnded { session, reason } => {
                self.session.on_session_ended(session, reason);
            }

            ControllerEvent::ReprocessResolved { filename, outcome } => {
                self.effects.clear_busy(&filename);
                match outcome {
                    Ok(Some(snapshot)) => self.store.install(snapshot),
                    Ok(None) => {
                        warn!("reprocess of {} returned no result", filename);
                        self.effects
                            .flash_error(&filename, Instant::now() + self.ui.error_flash());
                    }
                    Err(e) => {
                        warn!("reprocess of {} failed: {}", filename, e);
                        self.effects
                            .flash_error(&filename, Instant::now() + self.ui.error_flash());
                    }
                }
            }

            ControllerEvent::DeleteResolved { filename, outcome } => {
                self.effects.clear_busy(&filename);
                match outcome {
                    Ok(snapshot) => self.store.install(snapshot),
                    Err(e) => {
                        warn!("delete of {} failed: {}", filename, e);
                        self.effects
                            .flash_error(&filename, Instant::now() + self.ui.error_flash());
                    }
                }
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use scriba_proto::gateway::GatewayRequest;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        List,
        Play(String),
        Stop,
        IsPlaying,
        Reprocess(String),
        Delete(String),
    }

    /// Scripted backend replies, consumed front-to-back.
    #[derive(Default)]
    struct Script {
        list: VecDeque<Result<HistorySnapshot, GatewayError>>,
        play_started: bool,
        playing: VecDeque<bool>,
        /// Reply when `playing` runs dry.
        playing_default: bool,
        reprocess: VecDeque<Result<Option<HistorySnapshot>, GatewayError>>,
        delete: VecDeque<Result<HistorySnapshot, GatewayError>>,
    }

    fn spawn_backend(
        mut rx: mpsc::Receiver<GatewayRequest>,
        script: Script,
        calls: Arc<Mutex<Vec<Call>>>,
    ) {
        let script = Mutex::new(script);
        tokio::spawn(async move {
            while let Some(req) = rx.recv().await {
                let mut s = script.lock().unwrap();
                let mut log = calls.lock().unwrap();
                match req {
                    GatewayRequest::ListHistory { reply } => {
                        log.push(Call::List);
                        let _ = reply.send(s.list.pop_front().unwrap_or(Ok(Vec::new())));
                    }
                    GatewayRequest::PlayItem { filename, reply } => {
                        log.push(Call::Play(filename));
                        let _ = reply.send(Ok(s.play_started));
                    }
                    GatewayRequest::StopPlayback { reply } => {
                        log.push(Call::Stop);
                        let _ = reply.send(Ok(()));
                    }
                    GatewayRequest::IsPlaying { reply } => {
                        log.push(Call::IsPlaying);
                        let v = s.playing.pop_front().unwrap_or(s.playing_default);
                        let _ = reply.send(Ok(v));
                    }
                    GatewayRequest::ReprocessItem { filename, reply } => {
                        log.push(Call::Reprocess(filename));
                        let _ = reply.send(
                            s.reprocess
                                .pop_front()
                                .unwrap_or(Err(GatewayError::Backend("unscripted".into()))),
                        );
                    }
                    GatewayRequest::DeleteItem { filename, reply } => {
                        log.push(Call::Delete(filename));
                        let _ = reply.send(
                            s.delete
                                .pop_front()
                                .unwrap_or(Err(GatewayError::Backend("unscripted".into()))),
                        );
                    }
                }
            }
        });
    }

    fn harness(
        script: Script,
    ) -> (
        HistoryController,
        mpsc::Receiver<ControllerEvent>,
        Arc<Mutex<Vec<Call>>>,
    ) {
        let (gateway, gw_rx) = Gateway::channel(64);
        let calls = Arc::new(Mutex::new(Vec::new()));
        spawn_backend(gw_rx, script, calls.clone());
        let (tx, rx) = mpsc::channel(64);
        let controller =
            HistoryController::new(gateway, tx, &PlaybackConfig::default(), UiConfig::default());
        (controller, rx, calls)
    }

    fn record(filename: &str, transcript: Option<&str>) -> RecordingRecord {
        RecordingRecord {
            filename: filename.to_string(),
            timestamp: Utc.with_ymd_and_hms(2026, 8, 1, 10, 0, 0).unwrap(),
            transcript: transcript.map(|t| t.to_string()),
            duration_secs: None,
        }
    }

    async fn step(controller: &mut HistoryController, rx: &mut mpsc::Receiver<ControllerEvent>) {
        let ev = rx.recv().await.expect("event");
        controller.apply(ev);
    }

    /// Assert no further events arrive (all timers cleaned up).
    async fn assert_quiet(rx: &mut mpsc::Receiver<ControllerEvent>) {
        let outcome = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await;
        assert!(outcome.is_err(), "unexpected event: {:?}", outcome);
    }

    fn calls_of(calls: &Arc<Mutex<Vec<Call>>>) -> Vec<Call> {
        calls.lock().unwrap().clone()
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_polls_until_backend_reports_stopped() {
        let (mut c, mut rx, calls) = harness(Script {
            play_started: true,
            playing: VecDeque::from([true, true, true, false]),
            ..Script::default()
        });

        c.toggle_playback("a.wav");
        assert!(c.active_filename().is_none(), "no flip before the ack");

        step(&mut c, &mut rx).await; // PlayResolved
        assert_eq!(c.active_filename(), Some("a.wav"));

        step(&mut c, &mut rx).await; // SessionEnded(Finished)
        assert!(c.active_filename().is_none());
        assert!(matches!(c.session_phase(), SessionPhase::Idle));

        let log = calls_of(&calls);
        assert_eq!(log[0], Call::Play("a.wav".into()));
        assert_eq!(
            log.iter().filter(|c| **c == Call::IsPlaying).count(),
            4,
            "three playing polls then the stopped one"
        );

        // Poll task exited; nothing else fires.
        assert_quiet(&mut rx).await;
        assert_eq!(calls_of(&calls).len(), log.len());
    }

    #[tokio::test(start_paused = true)]
    async fn test_safety_timeout_clears_session_and_cancels_poll() {
        let (mut c, mut rx, calls) = harness(Script {
            play_started: true,
            playing_default: true, // backend never reports completion
            ..Script::default()
        });

        c.toggle_playback("a.wav");
        step(&mut c, &mut rx).await; // PlayResolved
        assert_eq!(c.active_filename(), Some("a.wav"));

        // Next event can only be the safety timeout.
        let ev = rx.recv().await.unwrap();
        assert!(matches!(
            ev,
            ControllerEvent::SessionEnded {
                reason: SessionEndReason::SafetyTimeout,
                ..
            }
        ));
        c.apply(ev);
        assert!(matches!(c.session_phase(), SessionPhase::Idle));

        // Poll cancelled with the timeout: the call log stops growing.
        let polls = calls_of(&calls).len();
        assert_quiet(&mut rx).await;
        assert_eq!(calls_of(&calls).len(), polls);
    }

    #[tokio::test(start_paused = true)]
    async fn test_switching_items_stops_before_starting() {
        let (mut c, mut rx, calls) = harness(Script {
            play_started: true,
            playing_default: true,
            ..Script::default()
        });

        c.toggle_playback("a.wav");
        step(&mut c, &mut rx).await;
        assert_eq!(c.active_filename(), Some("a.wav"));

        c.toggle_playback("b.wav");
        // Exclusivity holds at every observed instant: a is no longer
        // marked active while b's start is in flight.
        assert!(c.active_filename().is_none());

        step(&mut c, &mut rx).await; // PlayResolved for b
        assert_eq!(c.active_filename(), Some("b.wav"));

        let log = calls_of(&calls);
        let play_a = log.iter().position(|c| *c == Call::Play("a.wav".into()));
        let play_b = log.iter().position(|c| *c == Call::Play("b.wav".into()));
        let stop = log.iter().position(|c| *c == Call::Stop);
        assert!(play_a.unwrap() < stop.unwrap());
        assert!(stop.unwrap() < play_b.unwrap(), "stop must precede the new start");
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_active_item_stops_it() {
        let (mut c, mut rx, calls) = harness(Script {
            play_started: true,
            playing_default: true,
            ..Script::default()
        });

        c.toggle_playback("a.wav");
        step(&mut c, &mut rx).await;
        assert_eq!(c.active_filename(), Some("a.wav"));

        c.toggle_playback("a.wav");
        // Stop is optimistic: cleared before the ack lands.
        assert!(c.active_filename().is_none());
        assert!(matches!(c.session_phase(), SessionPhase::Stopping { .. }));

        step(&mut c, &mut rx).await; // StopAcked
        assert!(matches!(c.session_phase(), SessionPhase::Idle));
        assert!(calls_of(&calls).contains(&Call::Stop));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_with_no_session_is_silent() {
        let (mut c, mut rx, calls) = harness(Script::default());

        c.stop_playback();
        assert!(matches!(c.session_phase(), SessionPhase::Idle));

        // The idempotent stop still goes out, but produces no event.
        assert_quiet(&mut rx).await;
        assert_eq!(calls_of(&calls), vec![Call::Stop]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_requests_ignored_while_starting() {
        let (mut c, mut rx, calls) = harness(Script {
            play_started: true,
            playing_default: true,
            ..Script::default()
        });

        c.toggle_playback("a.wav");
        c.toggle_playback("a.wav"); // still starting — ignored
        c.toggle_playback("b.wav"); // also ignored until the ack resolves
        step(&mut c, &mut rx).await;
        assert_eq!(c.active_filename(), Some("a.wav"));

        let plays: Vec<_> = calls_of(&calls)
            .into_iter()
            .filter(|c| matches!(c, Call::Play(_)))
            .collect();
        assert_eq!(plays, vec![Call::Play("a.wav".into())]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refused_start_flags_row_and_stays_idle() {
        let (mut c, mut rx, calls) = harness(Script {
            play_started: false,
            ..Script::default()
        });

        c.toggle_playback("a.wav");
        step(&mut c, &mut rx).await; // PlayResolved(Ok(false))
        assert!(matches!(c.session_phase(), SessionPhase::Idle));
        assert!(c.effects().is_failed("a.wav"));

        // No session, so no polling ever starts.
        assert_quiet(&mut rx).await;
        assert!(!calls_of(&calls).contains(&Call::IsPlaying));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_failure_retains_stale_snapshot() {
        let (mut c, mut rx, _calls) = harness(Script {
            list: VecDeque::from([
                Ok(vec![record("a.wav", Some("hi"))]),
                Err(GatewayError::Backend("offline".into())),
            ]),
            ..Script::default()
        });

        c.refresh();
        step(&mut c, &mut rx).await;
        assert_eq!(c.store().fetch_state(), &FetchState::Loaded);
        assert_eq!(c.store().records().len(), 1);

        c.refresh();
        step(&mut c, &mut rx).await;
        assert!(matches!(c.store().fetch_state(), FetchState::Failed(_)));
        // Stale-but-available: the list is not cleared by a transient failure.
        assert_eq!(c.store().records().len(), 1);
        assert_eq!(c.store().records()[0].filename, "a.wav");
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_fetch_is_loaded_not_failed() {
        let (mut c, mut rx, _calls) = harness(Script {
            list: VecDeque::from([Ok(Vec::new())]),
            ..Script::default()
        });

        c.refresh();
        step(&mut c, &mut rx).await;
        assert_eq!(c.store().fetch_state(), &FetchState::Loaded);
        assert!(c.store().records().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reprocess_success_installs_returned_snapshot() {
        let replacement = vec![
            record("a.wav", Some("hi")),
            record("b.wav", Some("transcribed")),
        ];
        let (mut c, mut rx, _calls) = harness(Script {
            list: VecDeque::from([Ok(vec![record("a.wav", Some("hi")), record("b.wav", Some(""))])]),
            reprocess: VecDeque::from([Ok(Some(replacement.clone()))]),
            ..Script::default()
        });

        c.refresh();
        step(&mut c, &mut rx).await;
        assert!(!c.store().records()[1].has_transcript());

        c.reprocess("b.wav");
        assert!(c.effects().is_busy("b.wav"));

        step(&mut c, &mut rx).await; // ReprocessResolved
        assert!(!c.effects().is_busy("b.wav"));
        // Full replacement, element-for-element and order-preserved.
        assert_eq!(c.store().records(), replacement.as_slice());
        assert_eq!(c.store().records()[0].transcript.as_deref(), Some("hi"));
        assert_eq!(
            c.store().records()[1].transcript.as_deref(),
            Some("transcribed")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_reprocess_failure_leaves_snapshot_untouched() {
        let (mut c, mut rx, _calls) = harness(Script {
            list: VecDeque::from([Ok(vec![record("a.wav", Some("hi")), record("b.wav", None)])]),
            reprocess: VecDeque::from([Ok(None), Err(GatewayError::Backend("boom".into()))]),
            ..Script::default()
        });

        c.refresh();
        step(&mut c, &mut rx).await;
        let before = c.store().records().to_vec();

        // Falsy result: error flash, snapshot untouched.
        c.reprocess("b.wav");
        step(&mut c, &mut rx).await;
        assert_eq!(c.store().records(), before.as_slice());
        assert!(c.effects().is_failed("b.wav"));
        assert!(!c.effects().is_busy("b.wav"));

        // The control is restored within the flash window.
        tokio::time::advance(Duration::from_millis(2001)).await;
        c.tick();
        assert!(!c.effects().is_failed("b.wav"));

        // Hard error: same containment.
        c.reprocess("b.wav");
        step(&mut c, &mut rx).await;
        assert_eq!(c.store().records(), before.as_slice());
        assert!(c.effects().is_failed("b.wav"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_removes_exactly_the_target() {
        let (mut c, mut rx, _calls) = harness(Script {
            list: VecDeque::from([Ok(vec![
                record("a.wav", Some("one")),
                record("b.wav", Some("two")),
                record("c.wav", None),
            ])]),
            delete: VecDeque::from([Ok(vec![
                record("a.wav", Some("one")),
                record("c.wav", None),
            ])]),
            ..Script::default()
        });

        c.refresh();
        step(&mut c, &mut rx).await;

        c.delete("b.wav");
        step(&mut c, &mut rx).await;

        let names: Vec<_> = c.store().records().iter().map(|r| &r.filename).collect();
        assert_eq!(names, ["a.wav", "c.wav"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_active_target_invalidates_session() {
        let (mut c, mut rx, calls) = harness(Script {
            list: VecDeque::from([Ok(vec![record("a.wav", None)])]),
            play_started: true,
            playing_default: true,
            delete: VecDeque::from([Ok(Vec::new())]),
            ..Script::default()
        });

        c.refresh();
        step(&mut c, &mut rx).await;

        c.toggle_playback("a.wav");
        step(&mut c, &mut rx).await;
        assert_eq!(c.active_filename(), Some("a.wav"));

        c.delete("a.wav");
        // Session invalidated right away — no stop control pointing at a
        // file about to disappear.
        assert!(c.active_filename().is_none());

        // Drain the stop ack and the delete result in whichever order.
        step(&mut c, &mut rx).await;
        step(&mut c, &mut rx).await;
        assert!(matches!(c.session_phase(), SessionPhase::Idle));
        assert!(c.store().records().is_empty());
        assert!(calls_of(&calls).contains(&Call::Stop));
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_mutations_guarded_per_row() {
        let (mut c, mut rx, calls) = harness(Script {
            reprocess: VecDeque::from([Ok(None)]),
            ..Script::default()
        });

        c.reprocess("a.wav");
        c.reprocess("a.wav"); // busy — dropped
        step(&mut c, &mut rx).await;

        let count = calls_of(&calls)
            .iter()
            .filter(|call| matches!(call, Call::Reprocess(_)))
            .count();
        assert_eq!(count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_copy_flash_window_restarts_per_row() {
        let (mut c, _rx, _calls) = harness(Script::default());

        c.note_copied("a.wav");
        assert!(c.effects().is_copied("a.wav"));
        assert!(!c.effects().is_copied("b.wav"));

        tokio::time::advance(Duration::from_millis(1500)).await;
        c.note_copied("a.wav"); // restart the window
        tokio::time::advance(Duration::from_millis(1500)).await;
        c.tick();
        assert!(c.effects().is_copied("a.wav"), "window was restarted");

        tokio::time::advance(Duration::from_millis(600)).await;
        c.tick();
        assert!(!c.effects().is_copied("a.wav"));
    }
}
