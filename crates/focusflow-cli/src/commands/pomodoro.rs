use clap::Subcommand;
use focusflow_core::Event;

use crate::wiring::{self, print_json, print_line, CliResult, Options};

#[derive(Subcommand)]
pub enum PomodoroAction {
    /// Run a pomodoro cycle for a number of sessions
    Run {
        /// Sessions to run, breaks included
        #[arg(long, default_value = "8")]
        sessions: u32,
        /// Skip real-time waiting
        #[arg(long)]
        fast: bool,
    },
}

pub fn run(action: PomodoroAction, opts: &Options) -> CliResult {
    match action {
        PomodoroAction::Run { sessions, fast } => {
            if sessions == 0 {
                return Err("--sessions must be at least 1".into());
            }
            let mut wired = wiring::app(opts)?;
            if wired.audible {
                wired.app.load_catalog();
            }
            let app = &mut wired.app;
            app.start_pomodoro();
            if sessions == 1 {
                app.stop_pomodoro();
            }

            let mut ended = 0u32;
            wiring::drive(app, fast, |app, events| {
                for event in events {
                    if let Event::SessionEnded { .. } = event {
                        ended += 1;
                        if let Err(e) = print_line(event) {
                            tracing::warn!(error = %e, "failed to print event");
                        }
                    }
                }
                // The last session ends without loading another.
                if app.pomodoro().cycle_count() >= sessions {
                    app.stop_pomodoro();
                }
                !app.timer().is_running()
            });
            print_json(&serde_json::json!({ "sessions_completed": ended }))?;
        }
    }
    Ok(())
}
