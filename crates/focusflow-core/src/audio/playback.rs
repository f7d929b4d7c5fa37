//! Speaker output through `rodio`.

use std::fs::File;
use std::io::BufReader;

use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};

use super::source::{AudioBackend, AudioSource};
use crate::error::PlaybackError;

/// Backend playing through the default output device.
///
/// The returned [`OutputStream`] must be kept alive for as long as the
/// backend is used, and cannot leave the thread that opened it.
pub struct RodioBackend {
    handle: OutputStreamHandle,
}

impl RodioBackend {
    pub fn try_default() -> Result<(Self, OutputStream), PlaybackError> {
        let (stream, handle) =
            OutputStream::try_default().map_err(|e| PlaybackError::Rejected(e.to_string()))?;
        tracing::debug!("audio output opened");
        Ok((Self { handle }, stream))
    }

    fn sink(&self) -> Result<Sink, PlaybackError> {
        Sink::try_new(&self.handle).map_err(|e| PlaybackError::Rejected(e.to_string()))
    }
}

/// Open and speaker a file, so a missing or undecodable one fails before it
/// reaches a sink.
fn decode(path: &str) -> Result<Decoder<BufReader<File>>, PlaybackError> {
    let not_found = || PlaybackError::SourceNotFound {
        path: path.to_string(),
    };
    let file = File::open(path).map_err(|_| not_found())?;
    Decoder::new(BufReader::new(file)).map_err(|e| {
        tracing::debug!(path, error = %e, "audio file not decodable");
        not_found()
    })
}

impl AudioBackend for RodioBackend {
    fn open(&mut self, path: &str) -> Result<Box<dyn AudioSource>, PlaybackError> {
        let decoder = decode(path)?;
        let sink = self.sink()?;
        sink.pause();
        sink.set_volume(0.0);
        sink.append(decoder.repeat_infinite());
        Ok(Box::new(RodioSource { sink }))
    }

    fn play_once(&mut self, path: &str, gain: f32) -> Result<(), PlaybackError> {
        let decoder = decode(path)?;
        let sink = self.sink()?;
        sink.set_volume(gain);
        sink.append(decoder);
        sink.detach();
        Ok(())
    }
}

struct RodioSource {
    sink: Sink,
}

impl AudioSource for RodioSource {
    fn play(&mut self) -> Result<(), PlaybackError> {
        self.sink.play();
        Ok(())
    }

    fn pause(&mut self) {
        self.sink.pause();
    }

    fn set_gain(&mut self, gain: f32) {
        self.sink.set_volume(gain);
    }
}

impl Drop for RodioSource {
    fn drop(&mut self) {
        self.sink.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_not_found() {
        assert!(matches!(
            decode("/definitely/not/here.mp3"),
            Err(PlaybackError::SourceNotFound { .. })
        ));
    }

    #[test]
    fn undecodable_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("rain.mp3");
        std::fs::write(&file, b"definitely not audio").unwrap();
        assert!(matches!(
            decode(file.to_str().unwrap()),
            Err(PlaybackError::SourceNotFound { .. })
        ));
    }
}
