use clap::Subcommand;
use focusflow_core::storage::{keys, set_logged};
use focusflow_core::timer::format_time;
use focusflow_core::{Event, FocusApp, SessionType, TimerState};
use serde::Serialize;

use crate::wiring::{self, print_json, print_line, CliResult, Options};

#[derive(Subcommand)]
pub enum TimerAction {
    /// Run (or resume) a session until it ends
    Run {
        /// Session length in minutes for this run only
        #[arg(long)]
        minutes: Option<u32>,
        /// Run a break instead of a focus session
        #[arg(long = "break")]
        is_break: bool,
        /// Skip real-time waiting
        #[arg(long)]
        fast: bool,
    },
    /// Print the restored timer state as JSON
    Status,
    /// Stop and rewind the current session
    Reset,
    /// Discard the saved timer snapshot
    Clear,
    /// Store default session lengths in minutes
    Durations {
        #[arg(long)]
        focus: Option<u32>,
        #[arg(long = "break")]
        break_minutes: Option<u32>,
    },
}

#[derive(Serialize)]
struct TimerStatus {
    state: TimerState,
    session_type: SessionType,
    session_count: u32,
    duration_secs: u64,
    time_left_secs: u64,
    display: String,
    progress: f64,
    title: String,
}

fn status(app: &FocusApp) -> TimerStatus {
    let timer = app.timer();
    TimerStatus {
        state: timer.state(),
        session_type: timer.session_type(),
        session_count: timer.session_count(),
        duration_secs: timer.duration_secs(),
        time_left_secs: timer.time_left_secs(),
        display: timer.display(),
        progress: timer.progress(),
        title: timer.title(),
    }
}

pub fn run(action: TimerAction, opts: &Options) -> CliResult {
    match action {
        TimerAction::Run {
            minutes,
            is_break,
            fast,
        } => {
            let mut wired = wiring::app(opts)?;
            if wired.audible {
                wired.app.load_catalog();
            }
            let app = &mut wired.app;
            let resuming = app.timer().is_paused();
            if !resuming {
                if let Some(minutes) = minutes {
                    app.set_duration(minutes);
                }
                if is_break {
                    app.set_session_type(SessionType::Break);
                }
            }
            if let Some(event) = app.start() {
                print_line(&event)?;
            }
            wiring::drive(app, fast, |app, events| {
                for event in events {
                    match event {
                        Event::SessionEnded { .. } => {
                            if let Err(e) = print_line(event) {
                                tracing::warn!(error = %e, "failed to print event");
                            }
                        }
                        Event::TimerTicked { time_left_secs, .. } if !fast => {
                            eprint!("\r{}  ", format_time(*time_left_secs));
                        }
                        _ => {}
                    }
                }
                !app.timer().is_running()
            });
            if !fast {
                eprintln!();
            }
        }
        TimerAction::Status => {
            let wired = wiring::app(opts)?;
            print_json(&status(&wired.app))?;
        }
        TimerAction::Reset => {
            let mut wired = wiring::app(opts)?;
            wired.app.reset();
            print_json(&status(&wired.app))?;
        }
        TimerAction::Clear => {
            let ctx = wiring::context(opts)?;
            ctx.snapshots.remove(keys::TIMER_STATE)?;
            print_json(&serde_json::json!({ "cleared": true }))?;
        }
        TimerAction::Durations {
            focus,
            break_minutes,
        } => {
            let ctx = wiring::context(opts)?;
            let prefs = ctx.preferences.as_ref();
            if let Some(focus) = focus {
                set_logged(prefs, keys::TIMER_DURATION, &focus.to_string());
            }
            if let Some(minutes) = break_minutes {
                set_logged(prefs, keys::BREAK_DURATION, &minutes.to_string());
            }
            print_json(&serde_json::json!({
                "focus": prefs.get(keys::TIMER_DURATION)?,
                "break": prefs.get(keys::BREAK_DURATION)?,
            }))?;
        }
    }
    Ok(())
}
