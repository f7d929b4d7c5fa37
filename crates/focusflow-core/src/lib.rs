//! # FocusFlow Core Library
//!
//! Behaviour layer of the FocusFlow focus timer: a session countdown with
//! remote bookkeeping and crash-safe snapshots, a pomodoro cycle on top of
//! it, and an ambient audio mixer with presets and fades.
//!
//! ## Architecture
//!
//! - **Engines own no threads.** [`TimerEngine`] and [`AudioEngine`] are
//!   plain state machines; time only moves when the owner advances the
//!   [`Scheduler`]. [`FocusApp`] wires them together and keeps exactly one
//!   tick job alive while the timer runs.
//! - **Collaborators are traits.** Preference persistence, the session and
//!   catalog services, notifications, the clock and audio output are all
//!   injected through [`Context`]. Any remote failure means "carry on
//!   locally".
//! - **Remote calls never block.** Session requests run on the HTTP
//!   backend's own runtime; the timer picks up replies as time advances.
//! - **Storage**: SQLite key-value tables for preferences and the timer
//!   snapshot, TOML for configuration.
//!
//! ## Key Components
//!
//! - [`FocusApp`]: composition root and job dispatch
//! - [`TimerEngine`]: focus/break countdown state machine
//! - [`PomodoroScheduler`]: focus / short break / long break sequencing
//! - [`AudioEngine`]: per-track volumes behind a master gain stage
//! - [`Database`]: SQLite-backed preference stores
//! - [`Config`]: application configuration

pub mod app;
pub mod audio;
pub mod clock;
pub mod context;
pub mod environment;
pub mod error;
pub mod events;
pub mod notify;
pub mod remote;
pub mod scheduler;
pub mod storage;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod timer;

pub use app::{FocusApp, Job};
pub use audio::{AudioBackend, AudioEngine, AudioSource, SilentBackend, TrackStatus};
#[cfg(feature = "playback")]
pub use audio::RodioBackend;
pub use context::Context;
pub use error::{AudioError, ConfigError, CoreError, PlaybackError, RemoteError, StorageError};
pub use events::{Event, EventBus};
pub use remote::{HttpBackend, OfflineBackend};
pub use scheduler::{JobHandle, Scheduler};
pub use storage::{Config, Database, MemoryStore, PreferenceStore};
pub use timer::{PomodoroScheduler, SessionType, TimerEngine, TimerSnapshot, TimerState};
