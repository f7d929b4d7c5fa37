use std::path::Path;

use crate::error::PlaybackError;

/// One looping playback source bound to a file.
pub trait AudioSource: Send {
    fn play(&mut self) -> Result<(), PlaybackError>;
    fn pause(&mut self);
    /// Output gain in `[0, 1]`.
    fn set_gain(&mut self, gain: f32);
}

/// Opens sources on demand. Opening happens lazily, on a track's first
/// playback.
pub trait AudioBackend: Send {
    fn open(&mut self, path: &str) -> Result<Box<dyn AudioSource>, PlaybackError>;
    /// Play a file once at `gain`, over whatever is looping.
    fn play_once(&mut self, path: &str, gain: f32) -> Result<(), PlaybackError>;
}

/// Backend with no output device. Sources accept every command; with
/// `checking_files` opening fails for paths that do not exist on disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentBackend {
    check_files: bool,
}

impl SilentBackend {
    pub fn new() -> Self {
        Self { check_files: false }
    }

    pub fn checking_files() -> Self {
        Self { check_files: true }
    }
}

impl SilentBackend {
    fn check(&self, path: &str) -> Result<(), PlaybackError> {
        if self.check_files && !Path::new(path).is_file() {
            return Err(PlaybackError::SourceNotFound {
                path: path.to_string(),
            });
        }
        Ok(())
    }
}

impl AudioBackend for SilentBackend {
    fn open(&mut self, path: &str) -> Result<Box<dyn AudioSource>, PlaybackError> {
        self.check(path)?;
        Ok(Box::new(SilentSource::default()))
    }

    fn play_once(&mut self, path: &str, _gain: f32) -> Result<(), PlaybackError> {
        self.check(path)
    }
}

#[derive(Debug, Default)]
struct SilentSource {
    gain: f32,
    playing: bool,
}

impl AudioSource for SilentSource {
    fn play(&mut self) -> Result<(), PlaybackError> {
        self.playing = true;
        tracing::trace!(gain = self.gain, "silent source playing");
        Ok(())
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn set_gain(&mut self, gain: f32) {
        self.gain = gain;
    }
}
