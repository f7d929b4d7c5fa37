mod engine;
mod pomodoro;
mod session;

pub use engine::TimerEngine;
pub use pomodoro::{PomodoroPhase, PomodoroScheduler};
pub use session::{format_time, round_minutes, SessionType, TimerSnapshot, TimerState};
