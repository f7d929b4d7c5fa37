//! Composition root.
//!
//! [`FocusApp`] owns one of each engine plus the job scheduler, and is the
//! only place that turns engine state into scheduled work: the one-second
//! timer tick, fade steps and the preset settle delay. It also rings the
//! bell when a session starts or completes.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::debug;

use crate::audio::{AudioBackend, AudioEngine, FadeId, FadePlan, FadeStep, PendingPreset};
use crate::context::Context;
use crate::error::AudioError;
use crate::events::Event;
use crate::scheduler::{JobHandle, Scheduler};
use crate::timer::{PomodoroScheduler, SessionType, TimerEngine};

const TICK_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq)]
pub enum Job {
    TimerTick,
    FadeStep(FadeId),
    ApplyPreset(PendingPreset),
}

pub struct FocusApp {
    ctx: Context,
    timer: TimerEngine,
    audio: AudioEngine,
    pomodoro: PomodoroScheduler,
    scheduler: Scheduler<Job>,
    tick_job: Option<JobHandle>,
    fade_jobs: HashMap<FadeId, JobHandle>,
    preset_job: Option<JobHandle>,
}

impl FocusApp {
    /// Build the engines. The timer restores any recent snapshot; the audio
    /// catalog is not loaded until [`FocusApp::load_catalog`].
    pub fn new(ctx: Context, audio_backend: Box<dyn AudioBackend>) -> Self {
        let timer = TimerEngine::new(ctx.clone());
        let audio = AudioEngine::new(ctx.clone(), audio_backend);
        let pomodoro = PomodoroScheduler::new(&ctx.config.pomodoro);
        let mut app = Self {
            ctx,
            timer,
            audio,
            pomodoro,
            scheduler: Scheduler::new(),
            tick_job: None,
            fade_jobs: HashMap::new(),
            preset_job: None,
        };
        app.reconcile_tick();
        app
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.ctx.events.subscribe()
    }

    pub fn timer(&self) -> &TimerEngine {
        &self.timer
    }

    pub fn audio(&self) -> &AudioEngine {
        &self.audio
    }

    /// Direct access for operations that schedule nothing (volumes, mute,
    /// play/pause). Fades and presets go through the app.
    pub fn audio_mut(&mut self) -> &mut AudioEngine {
        &mut self.audio
    }

    pub fn pomodoro(&self) -> &PomodoroScheduler {
        &self.pomodoro
    }

    /// Time until the next scheduled job.
    pub fn next_due(&self) -> Option<Duration> {
        self.scheduler.next_due()
    }

    pub fn scheduled_jobs(&self) -> usize {
        self.scheduler.len()
    }

    pub fn has_tick_job(&self) -> bool {
        self.tick_job
            .is_some_and(|handle| self.scheduler.is_scheduled(handle))
    }

    // ── Timer ────────────────────────────────────────────────────────

    pub fn start(&mut self) -> Option<Event> {
        let event = self.timer.start();
        self.reconcile_tick();
        self.ring_for(event.as_ref());
        event
    }

    pub fn pause(&mut self) -> Option<Event> {
        let event = self.timer.pause();
        self.reconcile_tick();
        event
    }

    pub fn toggle(&mut self) -> Option<Event> {
        let event = self.timer.toggle();
        self.reconcile_tick();
        self.ring_for(event.as_ref());
        event
    }

    pub fn reset(&mut self) -> Option<Event> {
        let event = self.timer.reset();
        self.reconcile_tick();
        event
    }

    pub fn skip(&mut self) -> Option<Event> {
        let event = self.timer.skip();
        self.after_session_end(event.as_ref());
        self.reconcile_tick();
        event
    }

    pub fn set_duration(&mut self, minutes: u32) {
        self.timer.set_duration(minutes);
    }

    pub fn set_session_type(&mut self, session_type: SessionType) {
        self.timer.set_session_type(session_type);
    }

    pub fn start_break_session(&mut self) -> Option<Event> {
        let event = self.timer.start_break_session();
        self.reconcile_tick();
        self.ring_for(event.as_ref());
        event
    }

    pub fn start_next_session(&mut self) -> Option<Event> {
        let event = self.timer.start_next_session();
        self.reconcile_tick();
        self.ring_for(event.as_ref());
        event
    }

    /// Save the timer snapshot if a session is in progress.
    pub fn persist(&self) {
        if self.timer.is_running() || self.timer.is_paused() {
            self.timer.save_state();
        }
    }

    /// Give in-flight session requests up to the configured server timeout.
    /// For shutdown only.
    pub fn flush_remote(&self) {
        let timeout = Duration::from_secs(self.ctx.config.server.timeout_secs.max(1));
        self.ctx.sessions.flush(timeout);
    }

    // ── Pomodoro ─────────────────────────────────────────────────────

    pub fn start_pomodoro(&mut self) -> Option<Event> {
        let event = self.pomodoro.start_cycle(&mut self.timer);
        self.reconcile_tick();
        self.ring_for(event.as_ref());
        event
    }

    pub fn next_pomodoro_session(&mut self) -> Option<Event> {
        let event = self.pomodoro.next_session(&mut self.timer);
        self.reconcile_tick();
        self.ring_for(event.as_ref());
        event
    }

    pub fn stop_pomodoro(&mut self) {
        self.pomodoro.stop();
    }

    // ── Audio ────────────────────────────────────────────────────────

    /// Reload the audio catalog. Pending fades die with the old tracks.
    pub fn load_catalog(&mut self) -> usize {
        for (_, handle) in self.fade_jobs.drain() {
            self.scheduler.cancel(handle);
        }
        self.audio.load_catalog()
    }

    /// Returns whether a fade was scheduled.
    pub fn fade_in(&mut self, key: &str, duration: Duration) -> Result<bool, AudioError> {
        let plan = self.audio.fade_in(key, duration)?;
        Ok(self.schedule_fade(plan))
    }

    pub fn fade_out(&mut self, key: &str, duration: Duration) -> Result<bool, AudioError> {
        let plan = self.audio.fade_out(key, duration)?;
        Ok(self.schedule_fade(plan))
    }

    /// Stop all tracks now and apply the preset after the settle delay.
    /// A preset still waiting to settle is replaced.
    pub fn load_environment_preset(&mut self, name: &str) -> bool {
        let Some(preset) = self.audio.load_environment_preset(name) else {
            return false;
        };
        if let Some(handle) = self.preset_job.take() {
            self.scheduler.cancel(handle);
        }
        let delay = self.audio.preset_settle_delay();
        self.preset_job = Some(self.scheduler.after(delay, Job::ApplyPreset(preset)));
        true
    }

    // ── Time ─────────────────────────────────────────────────────────

    /// Advance virtual time, dispatching each job as it falls due. Returns
    /// the timer events produced on the way. Remote replies that arrived in
    /// the meantime are picked up first.
    pub fn advance(&mut self, by: Duration) -> Vec<Event> {
        self.timer.poll_remote();
        let target = self.scheduler.now() + by;
        let mut events = Vec::new();
        while let Some((handle, job)) = self.scheduler.pop_due(target) {
            self.dispatch(handle, job, &mut events);
        }
        self.scheduler.settle(target);
        events
    }

    fn dispatch(&mut self, handle: JobHandle, job: Job, events: &mut Vec<Event>) {
        match job {
            Job::TimerTick => {
                if let Some(event) = self.timer.tick() {
                    self.ring_for(Some(&event));
                    self.after_session_end(Some(&event));
                    events.push(event);
                }
                self.reconcile_tick();
            }
            Job::FadeStep(id) => {
                if self.audio.step_fade(id) == FadeStep::Finished {
                    self.scheduler.cancel(handle);
                    self.fade_jobs.remove(&id);
                }
            }
            Job::ApplyPreset(preset) => {
                self.preset_job = None;
                self.audio.apply_preset(&preset);
            }
        }
    }

    /// An active pomodoro cycle moves on as soon as a session ends.
    fn after_session_end(&mut self, event: Option<&Event>) {
        if !matches!(event, Some(Event::SessionEnded { .. })) || !self.pomodoro.is_active() {
            return;
        }
        // Leave the ended state before loading the next phase.
        self.reconcile_tick();
        let started = self.pomodoro.next_session(&mut self.timer);
        self.ring_for(started.as_ref());
    }

    fn ring_for(&mut self, event: Option<&Event>) {
        let ring = matches!(
            event,
            Some(Event::TimerStateChanged { is_running: true, .. })
                | Some(Event::SessionEnded { completed: true, .. })
        );
        if ring {
            self.audio.ring_bell();
        }
    }

    fn schedule_fade(&mut self, plan: Option<FadePlan>) -> bool {
        let Some(plan) = plan else {
            return false;
        };
        let handle = self.scheduler.every(plan.step_period, Job::FadeStep(plan.id));
        self.fade_jobs.insert(plan.id, handle);
        true
    }

    /// Exactly one tick job while the timer runs, none otherwise.
    fn reconcile_tick(&mut self) {
        match (self.timer.is_running(), self.tick_job) {
            (true, None) => {
                self.tick_job = Some(self.scheduler.every(TICK_PERIOD, Job::TimerTick));
                debug!("tick job scheduled");
            }
            (false, Some(handle)) => {
                self.scheduler.cancel(handle);
                self.tick_job = None;
                debug!("tick job cancelled");
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeAudioBackend, Harness};
    use crate::remote::SessionId;
    use crate::timer::TimerState;

    fn app(h: &Harness) -> FocusApp {
        let mut app = FocusApp::new(h.ctx(), Box::new(FakeAudioBackend::new()));
        app.load_catalog();
        app
    }

    #[test]
    fn one_tick_job_while_running() {
        let h = Harness::new();
        let mut app = app(&h);
        assert!(!app.has_tick_job());

        app.start();
        app.start();
        assert!(app.has_tick_job());
        assert_eq!(app.scheduled_jobs(), 1);

        app.pause();
        assert!(!app.has_tick_job());
        assert_eq!(app.scheduled_jobs(), 0);

        app.toggle();
        assert_eq!(app.scheduled_jobs(), 1);
        app.reset();
        assert_eq!(app.scheduled_jobs(), 0);
    }

    #[test]
    fn pause_when_paused_changes_nothing() {
        let h = Harness::new();
        let mut app = app(&h);
        app.start();
        app.pause();
        let mut rx = app.subscribe();
        assert!(app.pause().is_none());
        assert_eq!(app.scheduled_jobs(), 0);
        assert!(crate::events::drain(&mut rx).is_empty());
    }

    #[test]
    fn focus_session_runs_to_completion_in_virtual_time() {
        let h = Harness::new();
        let mut app = app(&h);
        app.start();

        let events = app.advance(Duration::from_secs(1499));
        assert_eq!(app.timer().time_left_secs(), 1);
        assert_eq!(events.len(), 1499);

        let events = app.advance(Duration::from_secs(5));
        assert!(matches!(
            events.last(),
            Some(Event::SessionEnded { completed: true, actual_duration_min: 25, .. })
        ));
        assert_eq!(app.timer().state(), TimerState::Completed);
        assert_eq!(app.scheduled_jobs(), 0);
        assert_eq!(app.next_due(), None);
    }

    #[test]
    fn skip_cancels_tick_job() {
        let h = Harness::new();
        let mut app = app(&h);
        app.start();
        app.advance(Duration::from_secs(10));
        assert!(matches!(
            app.skip(),
            Some(Event::SessionEnded { completed: false, actual_duration_min: 0, .. })
        ));
        assert!(!app.has_tick_job());
    }

    #[test]
    fn pomodoro_moves_to_short_break_after_focus() {
        let h = Harness::new();
        let mut app = app(&h);
        app.start_pomodoro();
        app.advance(Duration::from_secs(25 * 60));

        assert_eq!(app.pomodoro().cycle_count(), 2);
        assert_eq!(app.timer().session_type(), SessionType::Break);
        assert_eq!(app.timer().duration_secs(), 300);
        assert!(app.timer().is_running());
        assert_eq!(app.scheduled_jobs(), 1);

        app.advance(Duration::from_secs(60));
        assert_eq!(app.timer().time_left_secs(), 240);
    }

    #[test]
    fn preset_applies_after_settle_delay() {
        let h = Harness::new();
        let mut app = app(&h);
        app.audio_mut().set_track_volume("lofi", 50).unwrap();

        assert!(app.load_environment_preset("rain"));
        assert!(!app.audio().track("lofi").unwrap().is_playing());
        assert!(!app.audio().track("rain").unwrap().is_playing());

        app.advance(Duration::from_millis(99));
        assert!(!app.audio().track("rain").unwrap().is_playing());
        app.advance(Duration::from_millis(1));
        assert_eq!(app.audio().track("rain").unwrap().volume(), 60);
        assert!(app.audio().track("rain").unwrap().is_playing());
        assert_eq!(app.scheduled_jobs(), 0);

        assert!(!app.load_environment_preset("jungle"));
        assert_eq!(app.scheduled_jobs(), 0);
    }

    #[test]
    fn second_preset_replaces_pending_one() {
        let h = Harness::new();
        let mut app = app(&h);
        app.load_environment_preset("rain");
        app.load_environment_preset("ocean");
        assert_eq!(app.scheduled_jobs(), 1);
        app.advance(Duration::from_millis(100));
        assert!(!app.audio().track("rain").unwrap().is_playing());
        assert_eq!(app.audio().track("ocean").unwrap().volume(), 70);
    }

    #[test]
    fn fade_job_is_cancelled_when_done() {
        let h = Harness::new();
        let mut app = app(&h);
        app.audio_mut().set_track_volume("forest", 50).unwrap();

        assert!(app.fade_out("forest", Duration::from_secs(2)).unwrap());
        assert_eq!(app.scheduled_jobs(), 1);
        assert_eq!(app.next_due(), Some(Duration::from_millis(100)));

        app.advance(Duration::from_secs(2));
        assert_eq!(app.scheduled_jobs(), 0);
        assert!(!app.audio().track("forest").unwrap().is_playing());

        assert!(!app.fade_in("forest", Duration::from_secs(1)).unwrap());
    }

    #[test]
    fn fades_and_ticks_share_one_timeline() {
        let h = Harness::new();
        let mut app = app(&h);
        app.audio_mut().set_track_volume("rain", 40).unwrap();
        app.start();
        app.fade_in("rain", Duration::from_secs(1)).unwrap();
        assert_eq!(app.scheduled_jobs(), 2);

        app.advance(Duration::from_secs(3));
        assert_eq!(app.timer().time_left_secs(), 1497);
        assert_eq!(app.scheduled_jobs(), 1);
        assert_eq!(app.audio().track("rain").unwrap().output_gain(), app.audio().effective_gain("rain").unwrap());
    }

    #[test]
    fn catalog_reload_drops_fade_jobs() {
        let h = Harness::new();
        let mut app = app(&h);
        app.audio_mut().set_track_volume("rain", 40).unwrap();
        app.fade_in("rain", Duration::from_secs(5)).unwrap();
        app.load_catalog();
        assert_eq!(app.scheduled_jobs(), 0);
    }

    #[test]
    fn start_returns_while_the_session_service_is_still_answering() {
        let h = Harness::new();
        h.backend.defer_starts(true);
        let mut app = app(&h);
        assert!(app.start().is_some());
        assert!(app.has_tick_job());
        assert!(app.timer().remote_session_id().is_none());

        app.advance(Duration::from_secs(2));
        assert_eq!(app.timer().time_left_secs(), 1498);
        assert!(app.timer().remote_session_id().is_none());

        h.backend.release_starts();
        app.advance(Duration::from_secs(1));
        assert_eq!(app.timer().remote_session_id(), Some(&SessionId::new(1)));
        assert_eq!(app.timer().time_left_secs(), 1497);
    }

    #[test]
    fn bell_rings_on_start_and_completion_only() {
        let h = Harness::new();
        let backend = FakeAudioBackend::new();
        let speaker = backend.speaker();
        let mut app = FocusApp::new(h.ctx(), Box::new(backend));
        app.set_duration(1);

        app.start();
        assert_eq!(speaker.one_shots().len(), 1);
        app.pause();
        app.reset();
        assert_eq!(speaker.one_shots().len(), 1);

        app.start();
        app.advance(Duration::from_secs(60));
        assert_eq!(app.timer().state(), TimerState::Completed);
        assert_eq!(speaker.one_shots().len(), 3);

        app.start();
        app.skip();
        assert_eq!(speaker.one_shots().len(), 4);
    }
}
