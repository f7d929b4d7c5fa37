//! Basic CLI E2E tests.
//!
//! Each test runs the built binary with HOME pointed at its own temp dir,
//! so config and the SQLite stores start fresh.

use std::process::Command;

use tempfile::TempDir;

fn run_cli(home: &TempDir, args: &[&str]) -> (i32, String, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_focusflow-cli"))
        .arg("--silent")
        .args(args)
        .env("HOME", home.path())
        .env_remove("FOCUSFLOW_ENV")
        .env_remove("FOCUSFLOW_LOG")
        .output()
        .expect("Failed to execute CLI command");

    let code = output.status.code().unwrap_or(-1);
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (code, stdout, stderr)
}

fn run_ok(home: &TempDir, args: &[&str]) -> String {
    let (code, stdout, stderr) = run_cli(home, args);
    assert_eq!(code, 0, "{args:?} failed: {stderr}");
    stdout
}

fn json(stdout: &str) -> serde_json::Value {
    serde_json::from_str(stdout).expect("stdout should be JSON")
}

fn json_lines(stdout: &str) -> Vec<serde_json::Value> {
    stdout
        .lines()
        .filter(|l| l.starts_with('{') && l.ends_with('}'))
        .filter_map(|l| serde_json::from_str(l).ok())
        .collect()
}

#[test]
fn test_config_defaults_and_set() {
    let home = TempDir::new().unwrap();
    let list = json(&run_ok(&home, &["config", "list"]));
    assert_eq!(list["timer"]["focus_duration"], 25);
    assert_eq!(list["audio"]["audio_root"], "/static/audio");

    assert_eq!(run_ok(&home, &["config", "set", "timer.focus_duration", "50"]).trim(), "ok");
    assert_eq!(run_ok(&home, &["config", "get", "timer.focus_duration"]).trim(), "50");

    let (code, _, stderr) = run_cli(&home, &["config", "get", "timer.nope"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("unknown key"));
}

#[test]
fn test_timer_status_is_idle_initially() {
    let home = TempDir::new().unwrap();
    let status = json(&run_ok(&home, &["--offline", "timer", "status"]));
    assert_eq!(status["state"], "idle");
    assert_eq!(status["session_type"], "focus");
    assert_eq!(status["display"], "25:00");
}

#[test]
fn test_timer_run_fast_completes() {
    let home = TempDir::new().unwrap();
    let stdout = run_ok(&home, &["--offline", "timer", "run", "--minutes", "1", "--fast"]);
    let events = json_lines(&stdout);
    let ended = events
        .iter()
        .find(|e| e["type"] == "SessionEnded")
        .expect("SessionEnded event");
    assert_eq!(ended["completed"], true);
    assert_eq!(ended["actual_duration_min"], 1);

    let status = json(&run_ok(&home, &["--offline", "timer", "status"]));
    assert_eq!(status["state"], "idle");
}

#[test]
fn test_durations_feed_the_next_timer() {
    let home = TempDir::new().unwrap();
    run_ok(&home, &["timer", "durations", "--focus", "45", "--break", "10"]);
    let status = json(&run_ok(&home, &["--offline", "timer", "status"]));
    assert_eq!(status["duration_secs"], 2700);
}

#[test]
fn test_pomodoro_runs_focus_then_break() {
    let home = TempDir::new().unwrap();
    let stdout = run_ok(&home, &["--offline", "pomodoro", "run", "--sessions", "2", "--fast"]);
    let events = json_lines(&stdout);
    let types: Vec<&str> = events
        .iter()
        .filter(|e| e["type"] == "SessionEnded")
        .filter_map(|e| e["session_type"].as_str())
        .collect();
    assert_eq!(types, vec!["focus", "break"]);
    assert!(stdout.contains("\"sessions_completed\": 2"));
}

#[test]
fn test_audio_volume_persists_between_runs() {
    let home = TempDir::new().unwrap();
    let rain = json(&run_ok(&home, &["--offline", "audio", "volume", "rain", "40"]));
    assert_eq!(rain["volume"], 40);
    assert_eq!(rain["is_playing"], true);

    let mixer = json(&run_ok(&home, &["--offline", "audio", "tracks"]));
    let tracks = mixer["tracks"].as_array().unwrap();
    assert_eq!(tracks.len(), 5);
    let rain = tracks.iter().find(|t| t["key"] == "rain").unwrap();
    assert_eq!(rain["volume"], 40);
    assert_eq!(rain["is_playing"], true);
}

#[test]
fn test_audio_unknown_track_fails() {
    let home = TempDir::new().unwrap();
    let (code, _, stderr) = run_cli(&home, &["--offline", "audio", "volume", "thunder", "20"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("Unknown track"));
}

#[test]
fn test_audio_mute_and_master() {
    let home = TempDir::new().unwrap();
    let mixer = json(&run_ok(&home, &["--offline", "audio", "master", "150"]));
    assert_eq!(mixer["master_volume"], 100);

    let mixer = json(&run_ok(&home, &["--offline", "audio", "mute"]));
    assert_eq!(mixer["muted"], true);
    let (_, _, stderr) = run_cli(&home, &["--offline", "audio", "mute"]);
    assert!(stderr.contains("Audio unmuted"));
}

#[test]
fn test_audio_preset_applies_after_settle() {
    let home = TempDir::new().unwrap();
    let mixer = json(&run_ok(&home, &["--offline", "audio", "preset", "study", "--fast"]));
    let tracks = mixer["tracks"].as_array().unwrap();
    let lofi = tracks.iter().find(|t| t["key"] == "lofi").unwrap();
    let rain = tracks.iter().find(|t| t["key"] == "rain").unwrap();
    assert_eq!(lofi["volume"], 40);
    assert_eq!(rain["volume"], 20);

    let (code, _, _) = run_cli(&home, &["--offline", "audio", "preset", "jungle"]);
    assert_eq!(code, 1);
}

#[test]
fn test_background_select_and_list() {
    let home = TempDir::new().unwrap();
    run_ok(&home, &["--offline", "background", "select", "focus-bg-gradient-4"]);
    let out = json(&run_ok(&home, &["--offline", "background", "list"]));
    assert_eq!(out["selected"], "focus-bg-gradient-4");
    assert_eq!(out["backgrounds"].as_array().unwrap().len(), 5);
}

#[test]
fn test_ephemeral_runs_leave_no_preferences() {
    let home = TempDir::new().unwrap();
    run_ok(&home, &["--offline", "--ephemeral", "audio", "volume", "ocean", "70"]);
    let mixer = json(&run_ok(&home, &["--offline", "audio", "tracks"]));
    let ocean = mixer["tracks"]
        .as_array()
        .unwrap()
        .iter()
        .find(|t| t["key"] == "ocean")
        .cloned()
        .unwrap();
    assert_eq!(ocean["volume"], 0);
}

#[test]
fn test_completions_bash() {
    let home = TempDir::new().unwrap();
    let out = run_ok(&home, &["completions", "bash"]);
    assert!(out.contains("focusflow-cli"));
}
