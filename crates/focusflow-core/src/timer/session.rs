use serde::{Deserialize, Serialize};

use crate::error::SnapshotError;
use crate::remote::SessionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionType {
    Focus,
    Break,
}

impl SessionType {
    pub fn label(self) -> &'static str {
        match self {
            SessionType::Focus => "Focus",
            SessionType::Break => "Break",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionType::Focus => "focus",
            SessionType::Break => "break",
        }
    }
}

impl std::str::FromStr for SessionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "focus" => Ok(SessionType::Focus),
            "break" => Ok(SessionType::Break),
            other => Err(format!("unknown session type: {other}")),
        }
    }
}

/// Countdown lifecycle.
///
/// ```text
/// Idle -> Running -> (Paused | Completed | Skipped)
/// Paused -> Running
/// Completed | Skipped -> Idle   (next start or reset)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    Idle,
    Running,
    Paused,
    Completed,
    Skipped,
}

/// Persisted copy of the timer used to survive a reload.
///
/// Field names match the snapshot store's JSON layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub duration: u64,
    pub time_left: u64,
    pub is_running: bool,
    pub is_paused: bool,
    pub session_type: SessionType,
    pub session_count: u32,
    #[serde(default)]
    pub current_session_id: Option<SessionId>,
    /// Epoch milliseconds at save time.
    pub timestamp: i64,
}

impl TimerSnapshot {
    pub fn encode(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(raw: &str) -> Result<Self, SnapshotError> {
        let snap: TimerSnapshot = serde_json::from_str(raw)?;
        if snap.time_left > snap.duration {
            return Err(SnapshotError::Invalid(format!(
                "timeLeft {} exceeds duration {}",
                snap.time_left, snap.duration
            )));
        }
        if snap.is_running && snap.is_paused {
            return Err(SnapshotError::Invalid(
                "snapshot is both running and paused".into(),
            ));
        }
        Ok(snap)
    }
}

/// `MM:SS` rendering of a second count.
pub fn format_time(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Whole minutes, halves rounded up.
pub fn round_minutes(seconds: u64) -> u64 {
    (seconds + 30) / 60
}
