use clap::Subcommand;
use focusflow_core::audio::presets;
use focusflow_core::{FocusApp, TrackStatus};
use serde::Serialize;

use crate::wiring::{self, print_json, CliResult, Options};

#[derive(Subcommand)]
pub enum AudioAction {
    /// List tracks with their volumes
    Tracks,
    /// Set a track's volume (0 stops it)
    Volume {
        key: String,
        #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
        volume: u8,
    },
    /// Play a track (silent tracks start at the default volume)
    Play { key: String },
    /// Pause a track
    Pause { key: String },
    /// Set the master volume, or adjust it with --delta
    Master {
        #[arg(required_unless_present = "delta")]
        volume: Option<i32>,
        #[arg(long, allow_hyphen_values = true, conflicts_with = "volume")]
        delta: Option<i32>,
    },
    /// Toggle global mute
    Mute,
    /// Load an environment preset
    Preset {
        name: String,
        /// Skip the real-time settle delay
        #[arg(long)]
        fast: bool,
    },
    /// List environment presets
    Presets,
}

#[derive(Serialize)]
struct MixerStatus {
    master_volume: u8,
    muted: bool,
    tracks: Vec<TrackStatus>,
}

fn mixer(app: &FocusApp) -> MixerStatus {
    MixerStatus {
        master_volume: app.audio().master_volume(),
        muted: app.audio().is_muted(),
        tracks: app.audio().statuses(),
    }
}

fn track(app: &FocusApp, key: &str) -> CliResult {
    match app.audio().track(key) {
        Some(track) => print_json(&track.status()),
        None => Err(format!("unknown track: {key}").into()),
    }
}

pub fn run(action: AudioAction, opts: &Options) -> CliResult {
    if let AudioAction::Presets = action {
        let list: Vec<_> = presets::names().filter_map(presets::lookup).collect();
        return print_json(&list);
    }

    let mut wired = wiring::app(opts)?;
    let app = &mut wired.app;
    app.load_catalog();

    match action {
        AudioAction::Tracks => print_json(&mixer(app))?,
        AudioAction::Volume { key, volume } => {
            app.audio_mut().set_track_volume(&key, volume)?;
            track(app, &key)?;
            wiring::hold(&mut wired);
        }
        AudioAction::Play { key } => {
            app.audio_mut().play_track(&key)?;
            track(app, &key)?;
            wiring::hold(&mut wired);
        }
        AudioAction::Pause { key } => {
            app.audio_mut().pause_track(&key)?;
            track(app, &key)?;
        }
        AudioAction::Master { volume, delta } => {
            match (volume, delta) {
                (_, Some(delta)) => app.audio_mut().adjust_master_volume(delta),
                (Some(volume), None) => app.audio_mut().set_master_volume(volume),
                (None, None) => return Err("a volume or --delta is required".into()),
            };
            print_json(&mixer(app))?;
        }
        AudioAction::Mute => {
            app.audio_mut().toggle_mute_all();
            print_json(&mixer(app))?;
        }
        AudioAction::Preset { name, fast } => {
            if !app.load_environment_preset(&name) {
                return Err(format!("unknown preset: {name}").into());
            }
            wiring::drive(app, fast, |_, _| false);
            print_json(&mixer(app))?;
            if !fast {
                wiring::hold(&mut wired);
            }
        }
        AudioAction::Presets => {}
    }
    Ok(())
}
