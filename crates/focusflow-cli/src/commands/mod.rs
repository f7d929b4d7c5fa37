pub mod audio;
pub mod background;
pub mod config;
pub mod pomodoro;
pub mod timer;
