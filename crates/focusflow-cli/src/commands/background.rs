use clap::Subcommand;
use focusflow_core::environment::{current_background, load_backgrounds, select_background};

use crate::wiring::{self, print_json, CliResult, Options};

#[derive(Subcommand)]
pub enum BackgroundAction {
    /// List built-in and catalog backgrounds
    List,
    /// Choose the focus-mode background
    Select { value: String },
}

pub fn run(action: BackgroundAction, opts: &Options) -> CliResult {
    let ctx = wiring::context(opts)?;
    match action {
        BackgroundAction::List => {
            let backgrounds = load_backgrounds(ctx.catalog.as_ref());
            print_json(&serde_json::json!({
                "selected": current_background(ctx.preferences.as_ref()),
                "backgrounds": backgrounds,
            }))?;
        }
        BackgroundAction::Select { value } => {
            if !select_background(ctx.preferences.as_ref(), &value) {
                return Err("background value must not be empty".into());
            }
            print_json(&serde_json::json!({ "selected": value.trim() }))?;
        }
    }
    Ok(())
}
