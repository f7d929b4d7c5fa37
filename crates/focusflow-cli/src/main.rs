use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod wiring;

#[derive(Parser)]
#[command(name = "focusflow-cli", version, about = "FocusFlow CLI")]
struct Cli {
    /// Keep preferences and timer state in memory for this run only
    #[arg(long, global = true)]
    ephemeral: bool,
    /// Do not contact the session/catalog server
    #[arg(long, global = true)]
    offline: bool,
    /// Do not open an audio output device
    #[arg(long, global = true)]
    silent: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Focus/break timer
    Timer {
        #[command(subcommand)]
        action: commands::timer::TimerAction,
    },
    /// Pomodoro cycles
    Pomodoro {
        #[command(subcommand)]
        action: commands::pomodoro::PomodoroAction,
    },
    /// Ambient sound mixer
    Audio {
        #[command(subcommand)]
        action: commands::audio::AudioAction,
    },
    /// Focus-mode backgrounds
    Background {
        #[command(subcommand)]
        action: commands::background::BackgroundAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Print shell completions
    Completions {
        shell: clap_complete::Shell,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("FOCUSFLOW_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    init_logging();
    let cli = Cli::parse();
    let opts = wiring::Options {
        ephemeral: cli.ephemeral,
        offline: cli.offline,
        silent: cli.silent,
    };

    let result = match cli.command {
        Commands::Timer { action } => commands::timer::run(action, &opts),
        Commands::Pomodoro { action } => commands::pomodoro::run(action, &opts),
        Commands::Audio { action } => commands::audio::run(action, &opts),
        Commands::Background { action } => commands::background::run(action, &opts),
        Commands::Config { action } => commands::config::run(action),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "focusflow-cli", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
