//! devprov CLI entry point.

use std::process::ExitCode;

use clap::Parser;
use devprov::cli::{execute, Cli};
use devprov::config::load_config;
use devprov::ui::Theme;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the tracing subscriber for logging.
///
/// `RUST_LOG` wins when set; otherwise INFO for this crate.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("devprov=info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    tracing::debug!("devprov starting with args: {:?}", cli);

    let theme = Theme::detect();
    let result = load_config().and_then(|config| execute(&config));

    match result {
        Ok(summary) => {
            println!("{}", summary.render(&theme));
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("{}", theme.format_error(&format!("Error: {}", e)));
            ExitCode::from(1)
        }
    }
}
