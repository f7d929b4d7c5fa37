mod engine;
mod mixer;
#[cfg(feature = "playback")]
mod playback;
pub mod presets;
mod source;

pub use engine::{AudioEngine, FadeId, FadePlan, FadeStep, Track, TrackStatus, DEFAULT_CATALOG};
pub use mixer::{clamp_volume, effective_gain};
pub use presets::PendingPreset;
#[cfg(feature = "playback")]
pub use playback::RodioBackend;
pub use source::{AudioBackend, AudioSource, SilentBackend};
