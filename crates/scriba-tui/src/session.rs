//! Playback session tracker — the only owner of the "currently playing" fact.
//!
//! At most one session exists at a time.  A session is created when the
//! backend acknowledges a play request, and destroyed when the backend
//! reports playback finished, the safety timeout elapses, or a newer request
//! supersedes it.  Every session carries a [`SessionId`]; messages from a
//! superseded session's poll task are ignored by identity check, so a stale
//! timer firing after cancellation is a no-op.
//!
//! # States
//! ```text
//!  Idle ──play──▶ Starting ──ack──▶ Active ──poll stopped / timeout──▶ Idle
//!    ▲                                │
//!    └────────── Stopping ◀──stop─────┘
//! ```

use std::time::Duration;

use scriba_proto::gateway::Gateway;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::controller::ControllerEvent;

/// Monotonic session identity.  Never reused within a process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionId(u64);

#[cfg(test)]
impl SessionId {
    pub fn first() -> Self {
        SessionId(1)
    }
}

/// Why an active session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEndReason {
    /// The backend reported playback is no longer running.
    Finished,
    /// The absolute safety bound elapsed without a completion report.
    /// A normal transition, not an error.
    SafetyTimeout,
}

#[derive(Debug)]
pub enum SessionPhase {
    Idle,
    /// Play request sent, waiting for the backend's started acknowledgment.
    /// No stop affordance is shown yet — the flip waits for the ack.
    Starting { filename: String, session: SessionId },
    /// Backend confirmed playback; the poll/timeout task is running.
    Active { filename: String, session: SessionId },
    /// Stop sent; visual state already cleared (stop is idempotent).
    Stopping { session: SessionId },
}

pub struct SessionTracker {
    phase: SessionPhase,
    next_id: u64,
    poll_task: Option<JoinHandle<()>>,
    poll_interval: Duration,
    safety_timeout: Duration,
}

impl SessionTracker {
    pub fn new(poll_interval: Duration, safety_timeout: Duration) -> Self {
        Self {
            phase: SessionPhase::Idle,
            next_id: 0,
            poll_task: None,
            poll_interval,
            safety_timeout,
        }
    }

    pub fn phase(&self) -> &SessionPhase {
        &self.phase
    }

    /// Filename of the confirmed-playing item, if any.
    pub fn active_filename(&self) -> Option<&str> {
        match &self.phase {
            SessionPhase::Active { filename, .. } => Some(filename),
            _ => None,
        }
    }

    /// Filename targeted by the current session, confirmed or not.
    pub fn target_filename(&self) -> Option<&str> {
        match &self.phase {
            SessionPhase::Starting { filename, .. } | SessionPhase::Active { filename, .. } => {
                Some(filename)
            }
            _ => None,
        }
    }

    /// True while a play request is awaiting its acknowledgment.  Further
    /// play requests are ignored in this window (re-entrancy guard).
    pub fn is_starting(&self) -> bool {
        matches!(self.phase, SessionPhase::Starting { .. })
    }

    /// Register intent to start playback for `filename`.  Supersedes any
    /// existing session and cancels its poll.  Returns the new identity.
    pub fn begin_start(&mut self, filename: &str) -> SessionId {
        self.cancel_poll();
        let session = self.fresh_id();
        debug!("session {:?}: starting {}", session, filename);
        self.phase = SessionPhase::Starting {
            filename: filename.to_string(),
            session,
        };
        session
    }

    /// Register an explicit stop.  Clears the session visually right away and
    /// cancels the poll; returns the superseded identity so the stop ack can
    /// be matched, or `None` when nothing was in flight (no-op, not an error).
    pub fn begin_stop(&mut self) -> Option<SessionId> {
        self.cancel_poll();
        match &self.phase {
            SessionPhase::Idle => None,
            SessionPhase::Stopping { session } => Some(*session),
            SessionPhase::Starting { session, .. } | SessionPhase::Active { session, .. } => {
                let session = *session;
                debug!("session {:?}: stopping", session);
                self.phase = SessionPhase::Stopping { session };
                Some(session)
            }
        }
    }

    /// Filename of the session currently awaiting its start ack, if it is
    /// the given one.  Used to route a failed start back to its row.
    pub fn starting_filename(&self, session: SessionId) -> Option<String> {
        match &self.phase {
            SessionPhase::Starting {
                filename,
                session: current,
            } if *current == session => Some(filename.clone()),
            _ => None,
        }
    }

    /// The backend acknowledged the start: promote to `Active` and begin the
    /// poll/timeout lifecycle.  Ignored if the session was superseded.
    pub fn activate(
        &mut self,
        session: SessionId,
        gateway: &Gateway,
        events: &mpsc::Sender<ControllerEvent>,
    ) {
        let filename = match &self.phase {
            SessionPhase::Starting {
                filename,
                session: current,
            } if *current == session => filename.clone(),
            _ => {
                debug!("session {:?}: stale start ack ignored", session);
                return;
            }
        };

        self.phase = SessionPhase::Active {
            filename,
            session,
        };
        self.poll_task = Some(spawn_poll(
            session,
            gateway.clone(),
            events.clone(),
            self.poll_interval,
            self.safety_timeout,
        ));
    }

    /// The backend refused the start (or the call failed).  Ignored if stale.
    pub fn cancel_start(&mut self, session: SessionId) {
        if let SessionPhase::Starting {
            session: current, ..
        } = &self.phase
        {
            if *current == session {
                self.phase = SessionPhase::Idle;
            }
        }
    }

    /// A stop call for this session completed.
    pub fn on_stop_acked(&mut self, session: SessionId) {
        if let SessionPhase::Stopping { session: current } = &self.phase {
            if *current == session {
                self.phase = SessionPhase::Idle;
            }
        }
    }

    /// The poll task reported the session over.  Ignored unless it matches
    /// the live session — a superseded task cannot clobber its successor.
    pub fn on_session_ended(&mut self, session: SessionId, reason: SessionEndReason) {
        match &self.phase {
            SessionPhase::Active {
                session: current, ..
            } if *current == session => {
                match reason {
                    SessionEndReason::Finished => debug!("session {:?}: finished", session),
                    SessionEndReason::SafetyTimeout => {
                        info!("session {:?}: safety timeout elapsed, clearing", session)
                    }
                }
                self.cancel_poll();
                self.phase = SessionPhase::Idle;
            }
            _ => debug!("session {:?}: stale end ignored", session),
        }
    }

    fn cancel_poll(&mut self) {
        if let Some(task) = self.poll_task.take() {
            task.abort();
        }
    }

    fn fresh_id(&mut self) -> SessionId {
        self.next_id += 1;
        SessionId(self.next_id)
    }
}

/// One task per active session carries both the poll loop and the safety
/// deadline, so cancelling the task cancels both together.
fn spawn_poll(
    session: SessionId,
    gateway: Gateway,
    events: mpsc::Sender<ControllerEvent>,
    poll_interval: Duration,
    safety_timeout: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let deadline = Instant::now() + safety_timeout;
        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {
                    let _ = events
                        .send(ControllerEvent::SessionEnded {
                            session,
                            reason: SessionEndReason::SafetyTimeout,
                        })
                        .await;
                    break;
                }
                _ = ticker.tick() => {
                    match gateway.is_playing().await {
                        Ok(true) => {}
                        Ok(false) => {
                            let _ = events
                                .send(ControllerEvent::SessionEnded {
                                    session,
                                    reason: SessionEndReason::Finished,
                                })
                                .await;
                            break;
                        }
                        Err(e) => {
                            // Transient poll failure: keep the session, the
                            // safety deadline bounds the worst case.
                            warn!("playback poll failed: {}", e);
                        }
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> SessionTracker {
        SessionTracker::new(Duration::from_millis(500), Duration::from_secs(600))
    }

    #[test]
    fn test_stop_with_no_session_is_noop() {
        let mut t = tracker();
        assert!(t.begin_stop().is_none());
        assert!(matches!(t.phase(), SessionPhase::Idle));
    }

    #[test]
    fn test_start_supersedes_previous_identity() {
        let mut t = tracker();
        let first = t.begin_start("a.wav");
        let second = t.begin_start("b.wav");
        assert_ne!(first, second);
        assert_eq!(t.target_filename(), Some("b.wav"));
        // Acks for the superseded session are ignored.
        assert!(t.starting_filename(first).is_none());
        t.cancel_start(first);
        assert!(t.is_starting());
    }

    #[test]
    fn test_cancel_start_clears_only_matching_session() {
        let mut t = tracker();
        let session = t.begin_start("a.wav");
        t.cancel_start(session);
        assert!(matches!(t.phase(), SessionPhase::Idle));
        assert!(t.active_filename().is_none());
    }

    #[test]
    fn test_stop_ack_matches_identity() {
        let mut t = tracker();
        let session = t.begin_start("a.wav");
        let stopped = t.begin_stop().unwrap();
        assert_eq!(stopped, session);
        t.on_stop_acked(session);
        assert!(matches!(t.phase(), SessionPhase::Idle));
    }

    #[tokio::test]
    async fn test_stale_session_end_is_ignored() {
        let (gateway, _rx) = Gateway::channel(4);
        let (tx, _events) = mpsc::channel(4);

        let mut t = tracker();
        let old = t.begin_start("a.wav");
        t.activate(old, &gateway, &tx);
        assert_eq!(t.active_filename(), Some("a.wav"));

        // New session supersedes the old one; the old poll's end message
        // must not clear the new session.
        let new = t.begin_start("b.wav");
        t.activate(new, &gateway, &tx);
        t.on_session_ended(old, SessionEndReason::Finished);
        assert_eq!(t.active_filename(), Some("b.wav"));

        t.on_session_ended(new, SessionEndReason::Finished);
        assert!(t.active_filename().is_none());
    }
}
