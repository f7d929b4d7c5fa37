//! Preference key names, namespaced per feature.

pub const TIMER_DURATION: &str = "focusflow-timer-duration";
pub const BREAK_DURATION: &str = "focusflow-break-duration";
pub const MASTER_VOLUME: &str = "focusflow-master-volume";
pub const MUTED: &str = "focusflow-muted";
pub const BACKGROUND: &str = "focusflow-background";

/// Snapshot store key for the in-progress timer.
pub const TIMER_STATE: &str = "focusflow-timer-state";

/// Per-track volume key, e.g. `focusflow-track-rain`.
pub fn track(key: &str) -> String {
    format!("focusflow-track-{key}")
}
