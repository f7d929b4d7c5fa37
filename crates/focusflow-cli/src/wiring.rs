//! Builds the core context for one CLI invocation.

use std::any::Any;
use std::error::Error;
use std::io::{IsTerminal, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use focusflow_core::audio::AudioBackend;
use focusflow_core::notify::{
    NoticeLevel, NotificationCenter, Notifier, Permission, PlatformNotifications,
};
use focusflow_core::{
    Config, Context, Database, Event, FocusApp, HttpBackend, MemoryStore, PreferenceStore,
    SilentBackend,
};
use serde::Serialize;

pub type CliResult<T = ()> = Result<T, Box<dyn Error>>;

pub struct Options {
    pub ephemeral: bool,
    pub offline: bool,
    pub silent: bool,
}

/// Prints in-app messages to stderr so stdout stays JSON.
struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn notify(&self, message: &str, level: NoticeLevel) {
        match level {
            NoticeLevel::Error => eprintln!("error: {message}"),
            _ => eprintln!("{message}"),
        }
    }
}

/// System notifications through the OSC 9 terminal escape. Only offered
/// when stderr is a terminal.
struct TerminalNotifications;

impl PlatformNotifications for TerminalNotifications {
    fn permission(&self) -> Permission {
        if std::io::stderr().is_terminal() {
            Permission::Granted
        } else {
            Permission::Denied
        }
    }

    fn request_permission(&self) -> Permission {
        self.permission()
    }

    fn show(&self, title: &str, body: &str) {
        let mut err = std::io::stderr().lock();
        if let Err(e) = err.write_all(osc9(title, body).as_bytes()).and_then(|()| err.flush()) {
            tracing::debug!(error = %e, "failed to write notification");
        }
    }
}

fn osc9(title: &str, body: &str) -> String {
    let clean = |s: &str| s.chars().filter(|c| !c.is_control()).collect::<String>();
    format!("\x1b]9;{}: {}\x07", clean(title), clean(body))
}

pub fn context(opts: &Options) -> CliResult<Context> {
    let config = Config::load_or_default();
    let (preferences, snapshots): (Arc<dyn PreferenceStore>, Arc<dyn PreferenceStore>) =
        if opts.ephemeral {
            (Arc::new(MemoryStore::new()), Arc::new(MemoryStore::new()))
        } else {
            let db = Database::open()?;
            (Arc::new(db.preferences()), Arc::new(db.session_state()))
        };

    let offline = opts.offline || config.server.offline;
    let server = config.server.clone();
    let mut ctx = Context::new(config, preferences, snapshots)
        .with_notifier(Arc::new(StderrNotifier))
        .with_notifications(NotificationCenter::new(Box::new(TerminalNotifications)));
    if !offline {
        match HttpBackend::from_config(&server) {
            Ok(backend) => ctx = ctx.with_backend(Arc::new(backend)),
            Err(e) => tracing::warn!(error = %e, "server unavailable, running offline"),
        }
    }
    Ok(ctx)
}

/// An app plus the audio output it plays through.
pub struct Wired {
    pub app: FocusApp,
    /// Whether sound reaches a device.
    pub audible: bool,
    _output: Option<Box<dyn Any>>,
}

impl Drop for Wired {
    fn drop(&mut self) {
        self.app.flush_remote();
    }
}

/// Speaker output when built with `playback` and a device is present,
/// otherwise a silent backend.
fn audio_backend(config: &Config, opts: &Options) -> (Box<dyn AudioBackend>, Option<Box<dyn Any>>) {
    let silent: Box<dyn AudioBackend> = if Path::new(&config.audio.audio_root).is_dir() {
        Box::new(SilentBackend::checking_files())
    } else {
        Box::new(SilentBackend::new())
    };
    if opts.silent {
        return (silent, None);
    }
    match speaker() {
        Some((backend, stream)) => (backend, Some(stream)),
        None => (silent, None),
    }
}

#[cfg(feature = "playback")]
fn speaker() -> Option<(Box<dyn AudioBackend>, Box<dyn Any>)> {
    match focusflow_core::RodioBackend::try_default() {
        Ok((backend, stream)) => Some((Box::new(backend), Box::new(stream))),
        Err(e) => {
            tracing::warn!(error = %e, "no audio output, continuing silently");
            None
        }
    }
}

#[cfg(not(feature = "playback"))]
fn speaker() -> Option<(Box<dyn AudioBackend>, Box<dyn Any>)> {
    None
}

pub fn app(opts: &Options) -> CliResult<Wired> {
    let ctx = context(opts)?;
    let (backend, output) = audio_backend(&ctx.config, opts);
    Ok(Wired {
        app: FocusApp::new(ctx, backend),
        audible: output.is_some(),
        _output: output,
    })
}

/// Drive the app's scheduler until `done` says stop or nothing is left.
///
/// With `fast` set, virtual time jumps straight to each deadline.
pub fn drive(
    app: &mut FocusApp,
    fast: bool,
    mut done: impl FnMut(&mut FocusApp, &[Event]) -> bool,
) {
    while let Some(wait) = app.next_due() {
        if !fast {
            std::thread::sleep(wait);
        }
        let events = app.advance(wait);
        if done(app, &events) {
            break;
        }
    }
}

/// Keep an audible mixer playing until interrupted or until every track has
/// stopped. Returns at once when nothing can be heard.
pub fn hold(wired: &mut Wired) {
    let playing = |app: &FocusApp| app.audio().tracks().iter().any(|t| t.is_playing());
    if !wired.audible || !playing(&wired.app) {
        return;
    }
    eprintln!("Playing. Press Ctrl-C to stop.");
    while playing(&wired.app) {
        let wait = wired
            .app
            .next_due()
            .map_or(Duration::from_secs(1), |due| due.min(Duration::from_secs(1)));
        std::thread::sleep(wait);
        wired.app.advance(wait);
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// One compact JSON object per line.
pub fn print_line<T: Serialize + ?Sized>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}
