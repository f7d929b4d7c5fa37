//! Timer session engine.
//!
//! A second-granular countdown. Like the rest of the core it owns no
//! thread: whoever owns the engine calls `tick()` once per second while
//! `is_running()` is true (see [`crate::app::FocusApp`]).
//!
//! Remote bookkeeping is best effort and never waited on. The start reply
//! is picked up by [`TimerEngine::poll_remote`]; until it lands, or if it
//! fails, the timer runs locally. End requests are fire and forget.
//!
//! ## Usage
//!
//! ```ignore
//! let mut timer = TimerEngine::new(ctx);
//! timer.start();
//! while timer.is_running() {
//!     timer.tick();
//! }
//! ```

use tracing::{debug, info, warn};

use super::session::{format_time, round_minutes, SessionType, TimerSnapshot, TimerState};
use crate::context::Context;
use crate::environment::environment_tag;
use crate::events::Event;
use crate::notify::NoticeLevel;
use crate::remote::{PendingSession, SessionId, SessionOutcome, SessionRef, StartSessionRequest};
use crate::storage::{get_parsed, keys};

#[derive(Debug, Default)]
enum RemoteSession {
    #[default]
    None,
    Opening(PendingSession),
    Open(SessionId),
}

pub struct TimerEngine {
    ctx: Context,
    duration_secs: u64,
    time_left_secs: u64,
    state: TimerState,
    session_type: SessionType,
    session_count: u32,
    remote: RemoteSession,
}

impl TimerEngine {
    /// Create an engine, restoring a recent snapshot if one exists.
    pub fn new(ctx: Context) -> Self {
        let minutes = get_parsed::<u32>(ctx.preferences.as_ref(), keys::TIMER_DURATION)
            .unwrap_or(ctx.config.timer.focus_duration);
        let duration_secs = u64::from(minutes) * 60;
        let mut engine = Self {
            ctx,
            duration_secs,
            time_left_secs: duration_secs,
            state: TimerState::Idle,
            session_type: SessionType::Focus,
            session_count: 1,
            remote: RemoteSession::None,
        };
        engine.restore();
        engine
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == TimerState::Running
    }

    pub fn is_paused(&self) -> bool {
        self.state == TimerState::Paused
    }

    pub fn duration_secs(&self) -> u64 {
        self.duration_secs
    }

    pub fn time_left_secs(&self) -> u64 {
        self.time_left_secs
    }

    pub fn session_type(&self) -> SessionType {
        self.session_type
    }

    pub fn session_count(&self) -> u32 {
        self.session_count
    }

    pub fn remote_session_id(&self) -> Option<&SessionId> {
        match &self.remote {
            RemoteSession::Open(id) => Some(id),
            _ => None,
        }
    }

    /// True while a start request has not answered.
    pub fn is_remote_pending(&self) -> bool {
        matches!(self.remote, RemoteSession::Opening(_))
    }

    /// 0.0 .. 1.0 progress of the current session.
    pub fn progress(&self) -> f64 {
        if self.duration_secs == 0 {
            return 0.0;
        }
        (self.duration_secs - self.time_left_secs) as f64 / self.duration_secs as f64
    }

    /// `MM:SS` remaining.
    pub fn display(&self) -> String {
        format_time(self.time_left_secs)
    }

    /// Title line in the form `25:00 - Focus - FocusFlow`.
    pub fn title(&self) -> String {
        format!("{} - {} - FocusFlow", self.display(), self.session_type.label())
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            duration: self.duration_secs,
            time_left: self.time_left_secs,
            is_running: self.is_running(),
            is_paused: self.is_paused(),
            session_type: self.session_type,
            session_count: self.session_count,
            current_session_id: self.remote_session_id().cloned(),
            timestamp: self.ctx.clock.now().timestamp_millis(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start(&mut self) -> Option<Event> {
        match self.state {
            TimerState::Running => return None,
            TimerState::Completed | TimerState::Skipped => {
                self.state = TimerState::Idle;
                self.time_left_secs = self.duration_secs;
            }
            TimerState::Idle | TimerState::Paused => {}
        }

        if matches!(self.remote, RemoteSession::None) {
            self.open_remote_session();
        }

        self.state = TimerState::Running;
        self.save_state();
        info!(
            session_type = self.session_type.as_str(),
            time_left = self.time_left_secs,
            "timer started"
        );
        self.ctx.notifier.notify(
            &format!("{} session started!", self.session_type.label()),
            NoticeLevel::Info,
        );
        Some(self.state_changed())
    }

    /// Pause a running timer. A no-op in every other state.
    pub fn pause(&mut self) -> Option<Event> {
        if self.state != TimerState::Running {
            return None;
        }
        self.state = TimerState::Paused;
        self.save_state();
        info!(time_left = self.time_left_secs, "timer paused");
        self.ctx.notifier.notify("Timer paused", NoticeLevel::Info);
        Some(self.state_changed())
    }

    pub fn toggle(&mut self) -> Option<Event> {
        if self.is_running() {
            self.pause()
        } else {
            self.start()
        }
    }

    /// Stop and rewind to the full duration. The remote session, if any,
    /// stays open.
    pub fn reset(&mut self) -> Option<Event> {
        self.state = TimerState::Idle;
        self.time_left_secs = self.duration_secs;
        self.save_state();
        debug!("timer reset");
        self.ctx.notifier.notify("Timer reset", NoticeLevel::Info);
        Some(self.state_changed())
    }

    /// End the current session early, without full-duration credit.
    pub fn skip(&mut self) -> Option<Event> {
        match self.state {
            TimerState::Running | TimerState::Paused => Some(self.complete(false)),
            _ => None,
        }
    }

    /// Advance the countdown by one second.
    ///
    /// Returns `SessionEnded` when the countdown reaches zero, otherwise a
    /// `TimerTicked` progress event. Does nothing unless running.
    pub fn tick(&mut self) -> Option<Event> {
        if self.state != TimerState::Running {
            return None;
        }
        self.time_left_secs = self.time_left_secs.saturating_sub(1);

        // The zero boundary is left to complete(), which clears the snapshot.
        let every = self.ctx.config.snapshot.save_every_secs.max(1);
        if self.time_left_secs > 0 && self.time_left_secs % every == 0 {
            self.save_state();
        }

        if self.time_left_secs == 0 {
            return Some(self.complete(true));
        }

        let event = Event::TimerTicked {
            time_left_secs: self.time_left_secs,
            progress: self.progress(),
        };
        self.ctx.events.emit(event.clone());
        Some(event)
    }

    /// Close the session. `completed=false` marks a skip.
    pub fn complete(&mut self, completed: bool) -> Event {
        self.state = if completed {
            TimerState::Completed
        } else {
            TimerState::Skipped
        };

        let actual_duration = round_minutes(self.duration_secs - self.time_left_secs);

        self.poll_remote();
        let outcome = SessionOutcome {
            actual_duration,
            completed,
        };
        match std::mem::take(&mut self.remote) {
            RemoteSession::Open(id) => self.ctx.sessions.end_session(SessionRef::Open(id), outcome),
            RemoteSession::Opening(pending) => {
                self.ctx.sessions.end_session(SessionRef::Opening(pending), outcome)
            }
            RemoteSession::None => {}
        }

        if completed {
            let summary = format!(
                "You completed a {actual_duration}-minute {} session! Great job staying focused.",
                self.session_type.as_str()
            );
            self.ctx.notifier.notify(&summary, NoticeLevel::Success);
            self.ctx.notifications.show(
                "FocusFlow",
                &format!("{} session completed!", self.session_type.label()),
            );
        } else {
            self.ctx.notifier.notify("Session skipped", NoticeLevel::Info);
        }
        info!(
            session_type = self.session_type.as_str(),
            actual_duration, completed, "session ended"
        );

        self.ctx.events.emit(self.state_changed());
        let ended = Event::SessionEnded {
            session_type: self.session_type,
            actual_duration_min: actual_duration,
            completed,
            at: self.ctx.clock.now(),
        };
        self.ctx.events.emit(ended.clone());
        self.clear_saved_state();
        ended
    }

    /// Change the session length. Only rewinds the countdown when the timer
    /// is neither running nor paused.
    pub fn set_duration(&mut self, minutes: u32) {
        self.duration_secs = u64::from(minutes) * 60;
        if !self.is_running() && !self.is_paused() {
            self.time_left_secs = self.duration_secs;
        } else {
            self.time_left_secs = self.time_left_secs.min(self.duration_secs);
        }
    }

    pub fn set_session_type(&mut self, session_type: SessionType) {
        self.session_type = session_type;
    }

    /// Start a break using the stored break length.
    pub fn start_break_session(&mut self) -> Option<Event> {
        let minutes = get_parsed::<u32>(self.ctx.preferences.as_ref(), keys::BREAK_DURATION)
            .unwrap_or(self.ctx.config.timer.break_duration);
        self.set_duration(minutes);
        self.set_session_type(SessionType::Break);
        self.reset();
        self.start()
    }

    /// Start the next focus session using the stored focus length.
    pub fn start_next_session(&mut self) -> Option<Event> {
        self.session_count += 1;
        self.set_session_type(SessionType::Focus);
        let minutes = get_parsed::<u32>(self.ctx.preferences.as_ref(), keys::TIMER_DURATION)
            .unwrap_or(self.ctx.config.timer.focus_duration);
        self.set_duration(minutes);
        self.reset();
        self.start()
    }

    /// Persist the current state to the snapshot store.
    pub fn save_state(&self) {
        let raw = match self.snapshot().encode() {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "failed to encode timer snapshot");
                return;
            }
        };
        if let Err(e) = self.ctx.snapshots.set(keys::TIMER_STATE, &raw) {
            warn!(error = %e, "failed to save timer snapshot");
        } else {
            debug!(time_left = self.time_left_secs, "timer snapshot saved");
        }
    }

    /// Pick up the reply to an outstanding start request, if it arrived.
    /// Returns true when a remote session just opened.
    pub fn poll_remote(&mut self) -> bool {
        let RemoteSession::Opening(pending) = &mut self.remote else {
            return false;
        };
        match pending.try_take() {
            None => false,
            Some(Ok(id)) => {
                debug!(session_id = %id, "remote session opened");
                self.remote = RemoteSession::Open(id);
                if self.is_running() || self.is_paused() {
                    self.save_state();
                }
                true
            }
            Some(Err(e)) => {
                warn!(error = %e, "failed to start remote session, timing locally");
                self.remote = RemoteSession::None;
                false
            }
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn state_changed(&self) -> Event {
        let event = Event::TimerStateChanged {
            is_running: self.is_running(),
            session_type: self.session_type,
            at: self.ctx.clock.now(),
        };
        self.ctx.events.emit(event.clone());
        event
    }

    fn open_remote_session(&mut self) {
        let request = StartSessionRequest {
            duration: round_minutes(self.duration_secs),
            session_type: self.session_type,
            environment: environment_tag(self.ctx.preferences.as_ref()),
        };
        self.remote = RemoteSession::Opening(self.ctx.sessions.start_session(&request));
        self.poll_remote();
    }

    fn clear_saved_state(&self) {
        if let Err(e) = self.ctx.snapshots.remove(keys::TIMER_STATE) {
            warn!(error = %e, "failed to clear timer snapshot");
        }
    }

    /// Restore from a recent snapshot. A snapshot that was running comes back
    /// paused, with the wall-clock time since it was saved deducted.
    fn restore(&mut self) {
        let raw = match self.ctx.snapshots.get(keys::TIMER_STATE) {
            Ok(Some(raw)) => raw,
            Ok(None) => return,
            Err(e) => {
                warn!(error = %e, "failed to read timer snapshot");
                return;
            }
        };
        let snap = match TimerSnapshot::decode(&raw) {
            Ok(snap) => snap,
            Err(e) => {
                warn!(error = %e, "discarding unreadable timer snapshot");
                self.clear_saved_state();
                return;
            }
        };

        let age_ms = (self.ctx.clock.now().timestamp_millis() - snap.timestamp).max(0) as u64;
        let max_age_ms = self.ctx.config.snapshot.max_age_secs.saturating_mul(1000);
        if age_ms >= max_age_ms {
            debug!(age_ms, "timer snapshot too old, starting fresh");
            return;
        }

        self.duration_secs = snap.duration;
        self.time_left_secs = snap.time_left;
        self.session_type = snap.session_type;
        self.session_count = snap.session_count.max(1);
        self.remote = snap
            .current_session_id
            .map_or(RemoteSession::None, RemoteSession::Open);
        self.state = if snap.is_running {
            self.time_left_secs = self.time_left_secs.saturating_sub(age_ms / 1000);
            TimerState::Paused
        } else if snap.is_paused {
            TimerState::Paused
        } else {
            TimerState::Idle
        };
        info!(
            state = ?self.state,
            time_left = self.time_left_secs,
            "timer restored from snapshot"
        );
    }
}
