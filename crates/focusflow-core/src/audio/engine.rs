//! Audio track engine.
//!
//! One looping source per catalog entry, each with its own volume, behind a
//! master gain stage. Volume and play state are coupled: raising a silent
//! track starts it, dropping a playing track to zero stops it.
//!
//! Fades and the preset settle delay are time-based. The engine only
//! computes them; the owner of the [`crate::scheduler::Scheduler`] drives
//! them through [`AudioEngine::step_fade`] and [`AudioEngine::apply_preset`].

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::mixer::{clamp_volume, effective_gain};
use super::presets::{self, PendingPreset};
use super::source::{AudioBackend, AudioSource};
use crate::context::Context;
use crate::error::AudioError;
use crate::events::Event;
use crate::notify::NoticeLevel;
use crate::remote::CatalogEntry;
use crate::storage::{get_parsed, keys, set_logged};

/// Catalog used when the catalog service cannot be reached.
pub const DEFAULT_CATALOG: [(&str, &str); 5] = [
    ("rain.mp3", "Rain"),
    ("forest.mp3", "Forest"),
    ("ocean.mp3", "Ocean"),
    ("coffee-shop.mp3", "Coffee Shop"),
    ("lofi.mp3", "Lo-Fi Music"),
];

const DEFAULT_MASTER_VOLUME: u8 = 50;
const PLAY_FAILED: &str = "Could not play audio. Check if file exists.";
const BELL_FILE: &str = "bell.mp3";
const BELL_GAIN: f32 = 0.3;

pub struct Track {
    key: String,
    name: String,
    filename: String,
    path: String,
    volume: u8,
    is_playing: bool,
    available: bool,
    output_gain: f32,
    source: Option<Box<dyn AudioSource>>,
}

impl Track {
    fn new(entry: CatalogEntry, audio_root: &str) -> Self {
        Self {
            key: entry.stem(),
            path: format!("{audio_root}/{}", entry.file),
            name: entry.name,
            filename: entry.file,
            volume: 0,
            is_playing: false,
            available: true,
            output_gain: 0.0,
            source: None,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    /// False once the source failed to load.
    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Gain last sent to the source. Differs from the effective gain
    /// mid-fade.
    pub fn output_gain(&self) -> f32 {
        self.output_gain
    }

    pub fn status(&self) -> TrackStatus {
        TrackStatus {
            key: self.key.clone(),
            name: self.name.clone(),
            volume: self.volume,
            is_playing: self.is_playing,
            available: self.available,
            gain: self.output_gain,
        }
    }
}

/// Serializable view of a track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackStatus {
    pub key: String,
    pub name: String,
    pub volume: u8,
    pub is_playing: bool,
    pub available: bool,
    pub gain: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FadeId(u64);

/// A fade the owner must step every `step_period` until it reports
/// [`FadeStep::Finished`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FadePlan {
    pub id: FadeId,
    pub step_period: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeStep {
    Continue,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FadeDirection {
    In,
    Out,
}

#[derive(Debug, Clone)]
struct Fade {
    key: String,
    direction: FadeDirection,
    from: f32,
    to: f32,
    step: u32,
    steps: u32,
}

pub struct AudioEngine {
    ctx: Context,
    backend: Box<dyn AudioBackend>,
    tracks: Vec<Track>,
    master_volume: u8,
    muted: bool,
    fades: HashMap<FadeId, Fade>,
    next_fade: u64,
}

impl AudioEngine {
    /// Create an empty engine. Call [`AudioEngine::load_catalog`] to get
    /// tracks.
    pub fn new(ctx: Context, backend: Box<dyn AudioBackend>) -> Self {
        Self {
            ctx,
            backend,
            tracks: Vec::new(),
            master_volume: DEFAULT_MASTER_VOLUME,
            muted: false,
            fades: HashMap::new(),
            next_fade: 1,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track(&self, key: &str) -> Option<&Track> {
        self.tracks.iter().find(|t| t.key == key)
    }

    pub fn statuses(&self) -> Vec<TrackStatus> {
        self.tracks.iter().map(Track::status).collect()
    }

    pub fn master_volume(&self) -> u8 {
        self.master_volume
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Gain the track settles at outside of fades.
    pub fn effective_gain(&self, key: &str) -> Option<f32> {
        self.track(key)
            .map(|t| effective_gain(t.volume, self.master_volume, self.muted))
    }

    pub fn active_fades(&self) -> usize {
        self.fades.len()
    }

    // ── Catalog ──────────────────────────────────────────────────────

    /// Replace all tracks with the catalog's entries, falling back to the
    /// built-in catalog when the service fails. Persisted volumes are
    /// re-applied afterwards. Returns the number of tracks.
    pub fn load_catalog(&mut self) -> usize {
        self.teardown();

        let (entries, from_fallback) = match self.ctx.catalog.audio_files() {
            Ok(entries) => (entries, false),
            Err(e) => {
                warn!(error = %e, "failed to load audio catalog, using defaults");
                let defaults = DEFAULT_CATALOG
                    .iter()
                    .map(|(file, name)| CatalogEntry::new(*file, *name))
                    .collect();
                (defaults, true)
            }
        };

        let root = self.ctx.config.audio.audio_root.trim_end_matches('/').to_string();
        for entry in entries {
            let track = Track::new(entry, &root);
            if self.track(&track.key).is_some() {
                debug!(track = %track.key, "duplicate catalog entry skipped");
                continue;
            }
            self.tracks.push(track);
        }

        info!(tracks = self.tracks.len(), from_fallback, "audio catalog loaded");
        self.ctx.events.emit(Event::CatalogLoaded {
            track_keys: self.tracks.iter().map(|t| t.key.clone()).collect(),
            from_fallback,
        });

        self.apply_preferences();
        self.tracks.len()
    }

    /// Restore master volume, mute flag and every non-zero track volume
    /// from the preference store.
    pub fn apply_preferences(&mut self) {
        let prefs = self.ctx.preferences.clone();
        if let Some(master) = get_parsed::<i32>(prefs.as_ref(), keys::MASTER_VOLUME) {
            self.master_volume = clamp_volume(master);
        }
        self.muted = matches!(prefs.get(keys::MUTED), Ok(Some(v)) if v == "true");
        for idx in 0..self.tracks.len() {
            self.refresh_gain(idx);
        }
        self.emit_mixer();

        let saved: Vec<(String, u8)> = self
            .tracks
            .iter()
            .filter_map(|t| {
                get_parsed::<i32>(prefs.as_ref(), &keys::track(&t.key))
                    .map(|v| (t.key.clone(), clamp_volume(v)))
            })
            .filter(|(_, volume)| *volume > 0)
            .collect();
        for (key, volume) in saved {
            if let Err(e) = self.set_track_volume(&key, volume) {
                debug!(error = %e, "saved track volume skipped");
            }
        }
    }

    // ── Tracks ───────────────────────────────────────────────────────

    /// Set a track's volume (clamped to 100).
    ///
    /// A non-zero volume on a stopped track starts it; zero on a playing
    /// track stops it.
    pub fn set_track_volume(&mut self, key: &str, volume: u8) -> Result<(), AudioError> {
        let idx = self.index_of(key)?;
        let volume = volume.min(100);
        self.tracks[idx].volume = volume;
        self.refresh_gain(idx);

        let playing = self.tracks[idx].is_playing;
        if volume > 0 && !playing {
            self.start_playback(idx);
        } else if volume == 0 && playing {
            self.stop_playback(idx);
        }

        self.persist_track(idx, volume);
        self.emit_track(idx);
        Ok(())
    }

    /// Start a track. A silent track is first raised to the default play
    /// volume.
    pub fn play_track(&mut self, key: &str) -> Result<(), AudioError> {
        let idx = self.index_of(key)?;
        if self.tracks[idx].volume == 0 {
            let volume = self.ctx.config.audio.default_play_volume.max(1);
            return self.set_track_volume(key, volume);
        }
        if !self.tracks[idx].is_playing {
            self.start_playback(idx);
            self.persist_track(idx, self.tracks[idx].volume);
            self.emit_track(idx);
        }
        Ok(())
    }

    /// Stop a track, keeping its volume. The stored volume becomes 0.
    pub fn pause_track(&mut self, key: &str) -> Result<(), AudioError> {
        let idx = self.index_of(key)?;
        self.pause_at(idx);
        Ok(())
    }

    pub fn toggle_track(&mut self, key: &str) -> Result<(), AudioError> {
        let idx = self.index_of(key)?;
        if self.tracks[idx].is_playing {
            self.pause_at(idx);
            Ok(())
        } else {
            self.play_track(key)
        }
    }

    pub fn stop_all_tracks(&mut self) {
        for idx in 0..self.tracks.len() {
            if self.tracks[idx].is_playing {
                self.pause_at(idx);
            }
        }
    }

    // ── Master stage ─────────────────────────────────────────────────

    /// Set the master volume, clamped to 0..=100. Returns the applied value.
    pub fn set_master_volume(&mut self, volume: i32) -> u8 {
        self.master_volume = clamp_volume(volume);
        for idx in 0..self.tracks.len() {
            self.refresh_gain(idx);
        }
        set_logged(
            self.ctx.preferences.as_ref(),
            keys::MASTER_VOLUME,
            &self.master_volume.to_string(),
        );
        debug!(master = self.master_volume, "master volume set");
        self.emit_mixer();
        self.master_volume
    }

    pub fn adjust_master_volume(&mut self, delta: i32) -> u8 {
        self.set_master_volume(i32::from(self.master_volume) + delta)
    }

    /// Flip the global mute. Returns the new muted flag.
    pub fn toggle_mute_all(&mut self) -> bool {
        self.muted = !self.muted;
        for idx in 0..self.tracks.len() {
            self.refresh_gain(idx);
        }
        set_logged(
            self.ctx.preferences.as_ref(),
            keys::MUTED,
            if self.muted { "true" } else { "false" },
        );
        let message = if self.muted {
            "All audio muted"
        } else {
            "Audio unmuted"
        };
        self.ctx.notifier.notify(message, NoticeLevel::Info);
        self.emit_mixer();
        self.muted
    }

    // ── Presets ──────────────────────────────────────────────────────

    /// Stop everything and return the preset to apply once the stop has
    /// settled. Unknown names do nothing.
    pub fn load_environment_preset(&mut self, name: &str) -> Option<PendingPreset> {
        let Some(preset) = presets::lookup(name) else {
            debug!(preset = name, "unknown environment preset");
            return None;
        };
        self.stop_all_tracks();
        self.ctx.notifier.notify(
            &format!("{} environment loaded", presets::display_name(name)),
            NoticeLevel::Success,
        );
        info!(preset = name, "environment preset loading");
        Some(preset)
    }

    /// Apply preset volumes. Keys missing from the catalog are skipped.
    pub fn apply_preset(&mut self, preset: &PendingPreset) {
        for (key, volume) in &preset.volumes {
            if let Err(e) = self.set_track_volume(key, *volume) {
                debug!(error = %e, preset = %preset.name, "preset track skipped");
            }
        }
        self.ctx.events.emit(Event::PresetLoaded {
            name: preset.name.clone(),
        });
    }

    /// Delay between [`AudioEngine::load_environment_preset`] and
    /// [`AudioEngine::apply_preset`].
    pub fn preset_settle_delay(&self) -> Duration {
        Duration::from_millis(self.ctx.config.audio.preset_settle_ms)
    }

    // ── Fades ────────────────────────────────────────────────────────

    /// Ramp a playing track from silence up to its effective gain.
    /// `Ok(None)` when the track is not playing.
    pub fn fade_in(&mut self, key: &str, duration: Duration) -> Result<Option<FadePlan>, AudioError> {
        let idx = self.index_of(key)?;
        if !self.tracks[idx].is_playing {
            return Ok(None);
        }
        let target = effective_gain(self.tracks[idx].volume, self.master_volume, self.muted);
        self.set_output_gain(idx, 0.0);
        Ok(Some(self.push_fade(key, FadeDirection::In, 0.0, target, duration)))
    }

    /// Ramp a playing track down to silence, then pause it.
    pub fn fade_out(&mut self, key: &str, duration: Duration) -> Result<Option<FadePlan>, AudioError> {
        let idx = self.index_of(key)?;
        if !self.tracks[idx].is_playing {
            return Ok(None);
        }
        let from = self.tracks[idx].output_gain;
        Ok(Some(self.push_fade(key, FadeDirection::Out, from, 0.0, duration)))
    }

    /// Advance a fade by one step. Unknown fades report `Finished`.
    pub fn step_fade(&mut self, id: FadeId) -> FadeStep {
        let Some(fade) = self.fades.get_mut(&id) else {
            return FadeStep::Finished;
        };
        fade.step += 1;
        let done = fade.step >= fade.steps;
        let gain = if done {
            fade.to
        } else {
            fade.from + (fade.to - fade.from) * (fade.step as f32 / fade.steps as f32)
        };
        let key = fade.key.clone();
        let direction = fade.direction;

        let Ok(idx) = self.index_of(&key) else {
            self.fades.remove(&id);
            return FadeStep::Finished;
        };
        self.set_output_gain(idx, gain.clamp(0.0, 1.0));

        if !done {
            return FadeStep::Continue;
        }
        self.fades.remove(&id);
        if direction == FadeDirection::Out {
            self.pause_at(idx);
        }
        debug!(track = %key, ?direction, "fade finished");
        FadeStep::Finished
    }

    /// Ring the session bell from the audio root. Silent while muted; a
    /// missing bell file is ignored.
    pub fn ring_bell(&mut self) -> bool {
        if self.muted {
            return false;
        }
        let path = format!(
            "{}/{BELL_FILE}",
            self.ctx.config.audio.audio_root.trim_end_matches('/')
        );
        match self.backend.play_once(&path, BELL_GAIN) {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "could not play notification sound");
                false
            }
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn index_of(&self, key: &str) -> Result<usize, AudioError> {
        self.tracks
            .iter()
            .position(|t| t.key == key)
            .ok_or_else(|| AudioError::UnknownTrack(key.to_string()))
    }

    fn push_fade(
        &mut self,
        key: &str,
        direction: FadeDirection,
        from: f32,
        to: f32,
        duration: Duration,
    ) -> FadePlan {
        let steps = self.ctx.config.audio.fade_steps.max(1);
        let id = FadeId(self.next_fade);
        self.next_fade += 1;
        self.fades.insert(
            id,
            Fade {
                key: key.to_string(),
                direction,
                from,
                to,
                step: 0,
                steps,
            },
        );
        FadePlan {
            id,
            step_period: duration / steps,
        }
    }

    fn refresh_gain(&mut self, idx: usize) {
        let gain = effective_gain(self.tracks[idx].volume, self.master_volume, self.muted);
        self.set_output_gain(idx, gain);
    }

    fn set_output_gain(&mut self, idx: usize, gain: f32) {
        let track = &mut self.tracks[idx];
        track.output_gain = gain;
        if let Some(source) = track.source.as_mut() {
            source.set_gain(gain);
        }
    }

    fn start_playback(&mut self, idx: usize) {
        if !self.tracks[idx].available {
            self.ctx.notifier.notify(PLAY_FAILED, NoticeLevel::Error);
            return;
        }

        if self.tracks[idx].source.is_none() {
            let path = self.tracks[idx].path.clone();
            match self.backend.open(&path) {
                Ok(mut source) => {
                    source.set_gain(self.tracks[idx].output_gain);
                    self.tracks[idx].source = Some(source);
                }
                Err(e) => {
                    warn!(track = %self.tracks[idx].key, error = %e, "audio source unavailable");
                    self.tracks[idx].available = false;
                    self.ctx.events.emit(Event::TrackUnavailable {
                        key: self.tracks[idx].key.clone(),
                    });
                    self.ctx.notifier.notify(PLAY_FAILED, NoticeLevel::Error);
                    return;
                }
            }
        }

        let result = match self.tracks[idx].source.as_mut() {
            Some(source) => source.play(),
            None => return,
        };
        match result {
            Ok(()) => {
                self.tracks[idx].is_playing = true;
                debug!(track = %self.tracks[idx].key, "track playing");
            }
            Err(e) => {
                warn!(track = %self.tracks[idx].key, error = %e, "playback failed");
                self.ctx.notifier.notify(PLAY_FAILED, NoticeLevel::Error);
            }
        }
    }

    fn stop_playback(&mut self, idx: usize) {
        let track = &mut self.tracks[idx];
        if let Some(source) = track.source.as_mut() {
            source.pause();
        }
        track.is_playing = false;
        debug!(track = %track.key, "track stopped");
    }

    fn pause_at(&mut self, idx: usize) {
        self.stop_playback(idx);
        self.persist_track(idx, 0);
        self.emit_track(idx);
    }

    fn persist_track(&self, idx: usize, volume: u8) {
        set_logged(
            self.ctx.preferences.as_ref(),
            &keys::track(&self.tracks[idx].key),
            &volume.to_string(),
        );
    }

    fn emit_track(&self, idx: usize) {
        let track = &self.tracks[idx];
        self.ctx.events.emit(Event::TrackChanged {
            key: track.key.clone(),
            volume: track.volume,
            is_playing: track.is_playing,
        });
    }

    fn emit_mixer(&self) {
        self.ctx.events.emit(Event::MixerChanged {
            master_volume: self.master_volume,
            muted: self.muted,
        });
    }

    /// Stop every source and drop all tracks and fades.
    fn teardown(&mut self) {
        for track in &mut self.tracks {
            if let Some(source) = track.source.as_mut() {
                source.pause();
            }
        }
        self.tracks.clear();
        self.fades.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::drain;
    use crate::remote::CatalogEntry;
    use crate::storage::PreferenceStore;
    use crate::testing::{FakeAudioBackend, Harness, ScriptedBackend};

    fn loaded(h: &Harness) -> (AudioEngine, crate::testing::FakeAudioHandle) {
        let backend = FakeAudioBackend::new();
        let speaker = backend.speaker();
        let mut engine = AudioEngine::new(h.ctx(), Box::new(backend));
        engine.load_catalog();
        (engine, speaker)
    }

    #[test]
    fn catalog_failure_falls_back_to_defaults() {
        let h = Harness::new();
        let mut rx = h.events.subscribe();
        let (engine, _) = loaded(&h);
        let keys: Vec<&str> = engine.tracks().iter().map(Track::key).collect();
        assert_eq!(keys, vec!["rain", "forest", "ocean", "coffee-shop", "lofi"]);
        assert!(engine.tracks().iter().all(|t| t.volume() == 0 && !t.is_playing()));
        assert_eq!(engine.track("lofi").unwrap().name(), "Lo-Fi Music");
        assert_eq!(engine.track("rain").unwrap().path(), "/static/audio/rain.mp3");
        assert!(drain(&mut rx).iter().any(|e| matches!(
            e,
            Event::CatalogLoaded { from_fallback: true, .. }
        )));
    }

    #[test]
    fn catalog_entries_are_keyed_by_lowercased_stem() {
        let backend = ScriptedBackend::default().with_audio_files(vec![
            CatalogEntry::new("Thunder.Storm.mp3", "Thunder"),
            CatalogEntry::new("thunder.ogg", "Thunder again"),
            CatalogEntry::new("birds.mp3", "Birds"),
        ]);
        let h = Harness::with_backend(backend);
        let (engine, _) = loaded(&h);
        let keys: Vec<&str> = engine.tracks().iter().map(Track::key).collect();
        assert_eq!(keys, vec!["thunder", "birds"]);
    }

    #[test]
    fn volume_zero_then_forty_plays_at_forty() {
        let h = Harness::new();
        let (mut engine, speaker) = loaded(&h);
        engine.set_track_volume("rain", 0).unwrap();
        assert!(!engine.track("rain").unwrap().is_playing());
        engine.set_track_volume("rain", 40).unwrap();
        let rain = engine.track("rain").unwrap();
        assert!(rain.is_playing());
        assert_eq!(rain.volume(), 40);
        assert!(speaker.is_playing("rain.mp3"));
    }

    #[test]
    fn volume_to_zero_stops_playback() {
        let h = Harness::new();
        let (mut engine, speaker) = loaded(&h);
        engine.set_track_volume("ocean", 70).unwrap();
        engine.set_track_volume("ocean", 0).unwrap();
        assert!(!engine.track("ocean").unwrap().is_playing());
        assert!(!speaker.is_playing("ocean.mp3"));
        assert_eq!(h.preferences.get("focusflow-track-ocean").unwrap().as_deref(), Some("0"));
    }

    #[test]
    fn play_on_silent_track_uses_default_volume() {
        let h = Harness::new();
        let (mut engine, _) = loaded(&h);
        engine.play_track("forest").unwrap();
        let forest = engine.track("forest").unwrap();
        assert_eq!(forest.volume(), 30);
        assert!(forest.is_playing());
        assert_eq!(h.preferences.get("focusflow-track-forest").unwrap().as_deref(), Some("30"));
    }

    #[test]
    fn pause_keeps_volume_but_stores_zero() {
        let h = Harness::new();
        let (mut engine, _) = loaded(&h);
        engine.set_track_volume("rain", 55).unwrap();
        engine.pause_track("rain").unwrap();
        let rain = engine.track("rain").unwrap();
        assert!(!rain.is_playing());
        assert_eq!(rain.volume(), 55);
        assert_eq!(h.preferences.get("focusflow-track-rain").unwrap().as_deref(), Some("0"));

        engine.toggle_track("rain").unwrap();
        assert!(engine.track("rain").unwrap().is_playing());
        assert_eq!(engine.track("rain").unwrap().volume(), 55);
    }

    #[test]
    fn master_volume_scales_every_track() {
        let h = Harness::new();
        let (mut engine, speaker) = loaded(&h);
        engine.set_track_volume("rain", 40).unwrap();
        engine.set_master_volume(50);
        assert!((speaker.gain("rain.mp3").unwrap() - 0.2).abs() < 1e-6);
        assert_eq!(h.preferences.get("focusflow-master-volume").unwrap().as_deref(), Some("50"));

        assert_eq!(engine.set_master_volume(150), 100);
        assert_eq!(engine.adjust_master_volume(-5), 95);
        assert_eq!(engine.set_master_volume(-3), 0);
        assert_eq!(speaker.gain("rain.mp3"), Some(0.0));
    }

    #[test]
    fn mute_silences_and_unmute_restores() {
        let h = Harness::new();
        let (mut engine, speaker) = loaded(&h);
        engine.set_track_volume("rain", 100).unwrap();
        engine.set_master_volume(100);

        assert!(engine.toggle_mute_all());
        assert_eq!(speaker.gain("rain.mp3"), Some(0.0));
        assert_eq!(h.preferences.get("focusflow-muted").unwrap().as_deref(), Some("true"));

        assert!(!engine.toggle_mute_all());
        assert_eq!(speaker.gain("rain.mp3"), Some(1.0));
        assert_eq!(h.notifier.messages(), vec!["All audio muted", "Audio unmuted"]);
    }

    #[test]
    fn unknown_track_is_reported_without_side_effects() {
        let h = Harness::new();
        let (mut engine, _) = loaded(&h);
        let mut rx = h.events.subscribe();
        assert_eq!(
            engine.set_track_volume("thunder", 20),
            Err(AudioError::UnknownTrack("thunder".into()))
        );
        assert!(engine.play_track("thunder").is_err());
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn missing_source_disables_only_that_track() {
        let h = Harness::new();
        let backend = FakeAudioBackend::new().with_missing("ocean.mp3");
        let mut engine = AudioEngine::new(h.ctx(), Box::new(backend));
        engine.load_catalog();
        let mut rx = h.events.subscribe();

        engine.set_track_volume("ocean", 60).unwrap();
        let ocean = engine.track("ocean").unwrap();
        assert!(!ocean.is_available());
        assert!(!ocean.is_playing());
        assert_eq!(h.notifier.errors(), vec![PLAY_FAILED]);
        assert!(drain(&mut rx)
            .iter()
            .any(|e| matches!(e, Event::TrackUnavailable { key } if key == "ocean")));

        engine.set_track_volume("rain", 60).unwrap();
        assert!(engine.track("rain").unwrap().is_playing());
    }

    #[test]
    fn rejected_playback_leaves_track_stopped() {
        let h = Harness::new();
        let backend = FakeAudioBackend::new().with_rejected("lofi.mp3");
        let mut engine = AudioEngine::new(h.ctx(), Box::new(backend));
        engine.load_catalog();

        engine.play_track("lofi").unwrap();
        let lofi = engine.track("lofi").unwrap();
        assert!(!lofi.is_playing());
        assert!(lofi.is_available());
        assert_eq!(h.notifier.errors(), vec![PLAY_FAILED]);
    }

    #[test]
    fn unknown_preset_changes_nothing() {
        let h = Harness::new();
        let (mut engine, _) = loaded(&h);
        engine.set_track_volume("rain", 40).unwrap();
        assert!(engine.load_environment_preset("jungle").is_none());
        assert!(engine.track("rain").unwrap().is_playing());
    }

    #[test]
    fn preset_stops_all_then_applies_known_tracks() {
        let h = Harness::new();
        let (mut engine, _) = loaded(&h);
        engine.set_track_volume("lofi", 40).unwrap();

        let pending = engine.load_environment_preset("nature").unwrap();
        assert!(engine.tracks().iter().all(|t| !t.is_playing()));
        assert!(h.notifier.messages().contains(&"Nature environment loaded".to_string()));

        engine.apply_preset(&pending);
        let forest = engine.track("forest").unwrap();
        assert_eq!(forest.volume(), 40);
        assert!(forest.is_playing());
        assert!(engine.track("birds").is_none());
        assert!(!engine.track("lofi").unwrap().is_playing());
        assert_eq!(engine.preset_settle_delay(), Duration::from_millis(100));
    }

    #[test]
    fn fade_in_ramps_to_effective_gain() {
        let h = Harness::new();
        let (mut engine, speaker) = loaded(&h);
        engine.set_master_volume(100);
        engine.set_track_volume("rain", 80).unwrap();

        let plan = engine
            .fade_in("rain", Duration::from_millis(2000))
            .unwrap()
            .unwrap();
        assert_eq!(plan.step_period, Duration::from_millis(100));
        assert_eq!(speaker.gain("rain.mp3"), Some(0.0));

        for _ in 0..10 {
            assert_eq!(engine.step_fade(plan.id), FadeStep::Continue);
        }
        assert!((speaker.gain("rain.mp3").unwrap() - 0.4).abs() < 1e-5);
        for _ in 0..9 {
            engine.step_fade(plan.id);
        }
        assert_eq!(engine.step_fade(plan.id), FadeStep::Finished);
        assert!((speaker.gain("rain.mp3").unwrap() - 0.8).abs() < 1e-6);
        assert_eq!(engine.active_fades(), 0);
        assert_eq!(engine.step_fade(plan.id), FadeStep::Finished);
    }

    #[test]
    fn fade_out_ends_paused() {
        let h = Harness::new();
        let (mut engine, speaker) = loaded(&h);
        engine.set_master_volume(100);
        engine.set_track_volume("ocean", 50).unwrap();

        let plan = engine
            .fade_out("ocean", Duration::from_secs(1))
            .unwrap()
            .unwrap();
        let mut steps = 0;
        while engine.step_fade(plan.id) == FadeStep::Continue {
            steps += 1;
        }
        assert_eq!(steps, 19);
        assert_eq!(speaker.gain("ocean.mp3"), Some(0.0));
        assert!(!engine.track("ocean").unwrap().is_playing());
        assert_eq!(engine.track("ocean").unwrap().volume(), 50);
    }

    #[test]
    fn fades_need_a_playing_track() {
        let h = Harness::new();
        let (mut engine, _) = loaded(&h);
        assert_eq!(engine.fade_in("rain", Duration::from_secs(1)), Ok(None));
        assert_eq!(engine.fade_out("rain", Duration::from_secs(1)), Ok(None));
        assert!(engine.fade_in("nope", Duration::from_secs(1)).is_err());
    }

    #[test]
    fn reload_restores_saved_preferences() {
        let h = Harness::new();
        h.preferences.set("focusflow-track-rain", "45").unwrap();
        h.preferences.set("focusflow-track-ocean", "0").unwrap();
        h.preferences.set("focusflow-master-volume", "80").unwrap();
        h.preferences.set("focusflow-muted", "true").unwrap();

        let (engine, speaker) = loaded(&h);
        assert_eq!(engine.master_volume(), 80);
        assert!(engine.is_muted());
        let rain = engine.track("rain").unwrap();
        assert!(rain.is_playing());
        assert_eq!(rain.volume(), 45);
        assert_eq!(speaker.gain("rain.mp3"), Some(0.0));
        assert!(!engine.track("ocean").unwrap().is_playing());
    }

    #[test]
    fn reload_stops_existing_sources() {
        let h = Harness::new();
        let (mut engine, speaker) = loaded(&h);
        engine.set_track_volume("forest", 30).unwrap();
        h.preferences.remove("focusflow-track-forest").unwrap();
        engine.load_catalog();
        assert!(!speaker.is_playing("forest.mp3"));
        assert!(!engine.track("forest").unwrap().is_playing());
    }

    #[test]
    fn bell_plays_once_from_audio_root_unless_muted() {
        let h = Harness::new();
        let (mut engine, speaker) = loaded(&h);
        assert!(engine.ring_bell());
        assert_eq!(speaker.one_shots(), vec![("/static/audio/bell.mp3".to_string(), 0.3)]);

        engine.toggle_mute_all();
        assert!(!engine.ring_bell());
        assert_eq!(speaker.one_shots().len(), 1);
    }

    #[test]
    fn missing_bell_is_ignored() {
        let h = Harness::new();
        let mut engine = AudioEngine::new(h.ctx(), Box::new(FakeAudioBackend::new().with_missing("bell.mp3")));
        engine.load_catalog();
        assert!(!engine.ring_bell());
        assert!(h.notifier.errors().is_empty());
    }
}
