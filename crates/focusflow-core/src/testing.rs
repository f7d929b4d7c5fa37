//! In-memory doubles for the engine collaborators.
//!
//! Public so integration tests and downstream crates can drive the engines
//! without a network, an audio device or a real clock.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use crate::audio::{AudioBackend, AudioSource};
use crate::context::Context;
use crate::error::{PlaybackError, RemoteError};
use crate::events::EventBus;
use crate::notify::{NoticeLevel, NotificationCenter, Notifier, Permission, PlatformNotifications};
use crate::remote::{
    CatalogEntry, CatalogService, EndSessionRequest, PendingSession, SessionId, SessionOutcome,
    SessionRef, SessionReply, SessionService, StartSessionRequest,
};
use crate::storage::Config;

pub use crate::clock::ManualClock;
pub use crate::storage::MemoryStore;

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ── Notifier ─────────────────────────────────────────────────────────

/// Notifier that keeps every message.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    entries: Mutex<Vec<(String, NoticeLevel)>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        lock(&self.entries).iter().map(|(m, _)| m.clone()).collect()
    }

    pub fn errors(&self) -> Vec<String> {
        lock(&self.entries)
            .iter()
            .filter(|(_, level)| *level == NoticeLevel::Error)
            .map(|(m, _)| m.clone())
            .collect()
    }

    pub fn clear(&self) {
        lock(&self.entries).clear();
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str, level: NoticeLevel) {
        lock(&self.entries).push((message.to_string(), level));
    }
}

// ── Platform notifications ───────────────────────────────────────────

/// Platform with a fixed current permission and a scripted prompt answer.
pub struct ScriptedPlatform {
    current: Mutex<Permission>,
    answer: Permission,
    shown: Arc<Mutex<Vec<String>>>,
    prompts: Arc<Mutex<u32>>,
}

impl ScriptedPlatform {
    pub fn new(current: Permission, answer: Permission) -> Self {
        Self {
            current: Mutex::new(current),
            answer,
            shown: Arc::new(Mutex::new(Vec::new())),
            prompts: Arc::new(Mutex::new(0)),
        }
    }

    /// Bodies of shown notifications.
    pub fn shown_handle(&self) -> Arc<Mutex<Vec<String>>> {
        self.shown.clone()
    }

    /// Number of permission prompts.
    pub fn prompt_handle(&self) -> Arc<Mutex<u32>> {
        self.prompts.clone()
    }
}

impl PlatformNotifications for ScriptedPlatform {
    fn permission(&self) -> Permission {
        *lock(&self.current)
    }

    fn request_permission(&self) -> Permission {
        *lock(&self.prompts) += 1;
        *lock(&self.current) = self.answer;
        self.answer
    }

    fn show(&self, _title: &str, body: &str) {
        lock(&self.shown).push(body.to_string());
    }
}

// ── Remote services ──────────────────────────────────────────────────

/// Session and catalog service with recorded requests.
///
/// Start replies arrive at once unless [`ScriptedBackend::defer_starts`]
/// holds them back until [`ScriptedBackend::release_starts`]. Catalog
/// listings that were never scripted fail with [`RemoteError::Offline`].
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    started: Mutex<Vec<StartSessionRequest>>,
    ended: Mutex<Vec<EndSessionRequest>>,
    fail_sessions: AtomicBool,
    fail_end: AtomicBool,
    fail_catalog: AtomicBool,
    defer_starts: AtomicBool,
    deferred: Mutex<Vec<(SessionReply, SessionId)>>,
    waiting_ends: Mutex<Vec<(PendingSession, SessionOutcome)>>,
    next_id: AtomicU64,
    audio_files: Option<Vec<CatalogEntry>>,
    backgrounds: Option<Vec<CatalogEntry>>,
}

impl ScriptedBackend {
    pub fn with_audio_files(mut self, files: Vec<CatalogEntry>) -> Self {
        self.audio_files = Some(files);
        self
    }

    pub fn with_backgrounds(mut self, images: Vec<CatalogEntry>) -> Self {
        self.backgrounds = Some(images);
        self
    }

    /// Fail both start and end requests.
    pub fn fail_sessions(&self, fail: bool) {
        self.fail_sessions.store(fail, Ordering::SeqCst);
    }

    /// Fail end requests only.
    pub fn fail_end(&self, fail: bool) {
        self.fail_end.store(fail, Ordering::SeqCst);
    }

    pub fn fail_catalog(&self, fail: bool) {
        self.fail_catalog.store(fail, Ordering::SeqCst);
    }

    pub fn defer_starts(&self, defer: bool) {
        self.defer_starts.store(defer, Ordering::SeqCst);
    }

    /// Answer every held start request, then finish end requests that were
    /// waiting on them.
    pub fn release_starts(&self) {
        for (reply, id) in lock(&self.deferred).drain(..) {
            let _ = reply.send(Ok(id));
        }
        let waiting: Vec<_> = lock(&self.waiting_ends).drain(..).collect();
        for (pending, outcome) in waiting {
            self.end_session(SessionRef::Opening(pending), outcome);
        }
    }

    pub fn started(&self) -> Vec<StartSessionRequest> {
        lock(&self.started).clone()
    }

    pub fn ended(&self) -> Vec<EndSessionRequest> {
        lock(&self.ended).clone()
    }

    fn listing(&self, entries: &Option<Vec<CatalogEntry>>) -> Result<Vec<CatalogEntry>, RemoteError> {
        if self.fail_catalog.load(Ordering::SeqCst) {
            return Err(RemoteError::Offline);
        }
        entries.clone().ok_or(RemoteError::Offline)
    }
}

impl SessionService for ScriptedBackend {
    fn start_session(&self, request: &StartSessionRequest) -> PendingSession {
        if self.fail_sessions.load(Ordering::SeqCst) {
            return PendingSession::resolved(Err(RemoteError::Offline));
        }
        lock(&self.started).push(request.clone());
        let id = SessionId::new(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        if self.defer_starts.load(Ordering::SeqCst) {
            let (reply, pending) = PendingSession::channel();
            lock(&self.deferred).push((reply, id));
            pending
        } else {
            PendingSession::resolved(Ok(id))
        }
    }

    fn end_session(&self, session: SessionRef, outcome: SessionOutcome) {
        if self.fail_sessions.load(Ordering::SeqCst) || self.fail_end.load(Ordering::SeqCst) {
            return;
        }
        let id = match session {
            SessionRef::Open(id) => id,
            SessionRef::Opening(mut pending) => match pending.try_take() {
                Some(Ok(id)) => id,
                Some(Err(_)) => return,
                None => {
                    lock(&self.waiting_ends).push((pending, outcome));
                    return;
                }
            },
        };
        lock(&self.ended).push(outcome.request(id));
    }
}

impl CatalogService for ScriptedBackend {
    fn audio_files(&self) -> Result<Vec<CatalogEntry>, RemoteError> {
        self.listing(&self.audio_files)
    }

    fn backgrounds(&self) -> Result<Vec<CatalogEntry>, RemoteError> {
        self.listing(&self.backgrounds)
    }
}

// ── Audio ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
struct FakeSourceState {
    playing: bool,
    gain: f32,
}

/// Read side of a [`FakeAudioBackend`], keyed by file name.
#[derive(Debug, Clone, Default)]
pub struct FakeAudioHandle {
    sources: Arc<Mutex<HashMap<String, FakeSourceState>>>,
    opened: Arc<Mutex<Vec<String>>>,
    one_shots: Arc<Mutex<Vec<(String, f32)>>>,
}

impl FakeAudioHandle {
    pub fn gain(&self, file: &str) -> Option<f32> {
        lock(&self.sources).get(file).map(|s| s.gain)
    }

    pub fn is_playing(&self, file: &str) -> bool {
        lock(&self.sources).get(file).is_some_and(|s| s.playing)
    }

    /// Paths passed to `open`, in order.
    pub fn opened(&self) -> Vec<String> {
        lock(&self.opened).clone()
    }

    /// `(path, gain)` of every one-shot sound, in order.
    pub fn one_shots(&self) -> Vec<(String, f32)> {
        lock(&self.one_shots).clone()
    }
}

/// Audio backend whose sources only record what they were told.
#[derive(Debug, Default)]
pub struct FakeAudioBackend {
    speaker: FakeAudioHandle,
    missing: HashSet<String>,
    rejected: HashSet<String>,
}

impl FakeAudioBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opening this file fails with `SourceNotFound`.
    pub fn with_missing(mut self, file: &str) -> Self {
        self.missing.insert(file.to_string());
        self
    }

    /// Playing this file fails with `Rejected`.
    pub fn with_rejected(mut self, file: &str) -> Self {
        self.rejected.insert(file.to_string());
        self
    }

    pub fn speaker(&self) -> FakeAudioHandle {
        self.speaker.clone()
    }
}

impl AudioBackend for FakeAudioBackend {
    fn open(&mut self, path: &str) -> Result<Box<dyn AudioSource>, PlaybackError> {
        lock(&self.speaker.opened).push(path.to_string());
        let file = path.rsplit('/').next().unwrap_or(path).to_string();
        if self.missing.contains(&file) {
            return Err(PlaybackError::SourceNotFound {
                path: path.to_string(),
            });
        }
        lock(&self.speaker.sources).insert(file.clone(), FakeSourceState::default());
        Ok(Box::new(FakeSource {
            reject: self.rejected.contains(&file),
            file,
            sources: self.speaker.sources.clone(),
        }))
    }

    fn play_once(&mut self, path: &str, gain: f32) -> Result<(), PlaybackError> {
        let file = path.rsplit('/').next().unwrap_or(path);
        if self.missing.contains(file) {
            return Err(PlaybackError::SourceNotFound {
                path: path.to_string(),
            });
        }
        lock(&self.speaker.one_shots).push((path.to_string(), gain));
        Ok(())
    }
}

struct FakeSource {
    file: String,
    reject: bool,
    sources: Arc<Mutex<HashMap<String, FakeSourceState>>>,
}

impl FakeSource {
    fn update(&self, f: impl FnOnce(&mut FakeSourceState)) {
        if let Some(state) = lock(&self.sources).get_mut(&self.file) {
            f(state);
        }
    }
}

impl AudioSource for FakeSource {
    fn play(&mut self) -> Result<(), PlaybackError> {
        if self.reject {
            return Err(PlaybackError::Rejected("autoplay blocked".into()));
        }
        self.update(|s| s.playing = true);
        Ok(())
    }

    fn pause(&mut self) {
        self.update(|s| s.playing = false);
    }

    fn set_gain(&mut self, gain: f32) {
        self.update(|s| s.gain = gain);
    }
}

// ── Harness ──────────────────────────────────────────────────────────

/// 2024-01-01T09:00:00Z, the harness clock's starting point.
pub fn epoch() -> DateTime<Utc> {
    DateTime::from_timestamp(1_704_099_600, 0).unwrap_or_default()
}

/// A fully wired set of doubles. `ctx()` builds contexts that all share
/// them, so state written by one engine is visible to the next.
pub struct Harness {
    pub config: Config,
    pub preferences: Arc<MemoryStore>,
    pub snapshots: Arc<MemoryStore>,
    pub backend: Arc<ScriptedBackend>,
    pub notifier: Arc<RecordingNotifier>,
    pub clock: Arc<ManualClock>,
    pub events: EventBus,
    notifications: Arc<NotificationCenter>,
    shown: Arc<Mutex<Vec<String>>>,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(Config::default(), ScriptedBackend::default())
    }

    pub fn with_backend(backend: ScriptedBackend) -> Self {
        Self::build(Config::default(), backend)
    }

    pub fn with_config(config: Config) -> Self {
        Self::build(config, ScriptedBackend::default())
    }

    fn build(config: Config, backend: ScriptedBackend) -> Self {
        let platform = ScriptedPlatform::new(Permission::Granted, Permission::Granted);
        let shown = platform.shown_handle();
        Self {
            config,
            preferences: Arc::new(MemoryStore::new()),
            snapshots: Arc::new(MemoryStore::new()),
            backend: Arc::new(backend),
            notifier: Arc::new(RecordingNotifier::default()),
            clock: Arc::new(ManualClock::new(epoch())),
            events: EventBus::new(),
            notifications: Arc::new(NotificationCenter::new(Box::new(platform))),
            shown,
        }
    }

    pub fn ctx(&self) -> Context {
        let mut ctx = Context::new(
            self.config.clone(),
            self.preferences.clone(),
            self.snapshots.clone(),
        )
        .with_backend(self.backend.clone())
        .with_notifier(self.notifier.clone())
        .with_clock(self.clock.clone());
        ctx.notifications = self.notifications.clone();
        ctx.events = self.events.clone();
        ctx
    }

    /// Bodies of platform notifications shown so far.
    pub fn platform_shown(&self) -> Vec<String> {
        lock(&self.shown).clone()
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
