use serde::{Deserialize, Serialize};
use tracing::info;

use super::engine::TimerEngine;
use super::session::SessionType;
use crate::events::Event;
use crate::storage::PomodoroConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PomodoroPhase {
    Focus,
    ShortBreak,
    LongBreak,
}

impl PomodoroPhase {
    pub fn session_type(self) -> SessionType {
        match self {
            PomodoroPhase::Focus => SessionType::Focus,
            PomodoroPhase::ShortBreak | PomodoroPhase::LongBreak => SessionType::Break,
        }
    }
}

/// Sequences timer sessions through the fixed focus/break cycle:
/// odd counts focus, even counts a short break, every eighth a long break.
#[derive(Debug, Clone)]
pub struct PomodoroScheduler {
    focus_min: u32,
    short_break_min: u32,
    long_break_min: u32,
    cycle_count: u32,
    active: bool,
}

impl PomodoroScheduler {
    pub fn new(config: &PomodoroConfig) -> Self {
        Self {
            focus_min: config.focus,
            short_break_min: config.short_break,
            long_break_min: config.long_break,
            cycle_count: 0,
            active: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn cycle_count(&self) -> u32 {
        self.cycle_count
    }

    /// Phase of the 1-based cycle position `cycle`.
    pub fn phase_for(cycle: u32) -> PomodoroPhase {
        if cycle > 0 && cycle % 8 == 0 {
            PomodoroPhase::LongBreak
        } else if cycle % 2 == 0 {
            PomodoroPhase::ShortBreak
        } else {
            PomodoroPhase::Focus
        }
    }

    /// Phase currently on the timer, `None` before the first session.
    pub fn current_phase(&self) -> Option<PomodoroPhase> {
        (self.active && self.cycle_count > 0).then(|| Self::phase_for(self.cycle_count))
    }

    pub fn minutes_for(&self, phase: PomodoroPhase) -> u32 {
        match phase {
            PomodoroPhase::Focus => self.focus_min,
            PomodoroPhase::ShortBreak => self.short_break_min,
            PomodoroPhase::LongBreak => self.long_break_min,
        }
    }

    pub fn start_cycle(&mut self, timer: &mut TimerEngine) -> Option<Event> {
        self.active = true;
        self.cycle_count = 0;
        info!("pomodoro cycle started");
        self.next_session(timer)
    }

    /// Load the next phase onto the timer and start it. Does nothing while
    /// inactive.
    pub fn next_session(&mut self, timer: &mut TimerEngine) -> Option<Event> {
        if !self.active {
            return None;
        }
        self.cycle_count += 1;
        let phase = Self::phase_for(self.cycle_count);
        info!(cycle = self.cycle_count, ?phase, "pomodoro next session");

        timer.set_duration(self.minutes_for(phase));
        timer.set_session_type(phase.session_type());
        timer.reset();
        timer.start()
    }

    /// Deactivate. The timer is left as it is.
    pub fn stop(&mut self) {
        self.active = false;
        self.cycle_count = 0;
    }
}
