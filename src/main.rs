// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jason Ish

mod agent;
mod background;
mod cli;
mod commands;
mod config;
mod custom_commands;
mod error;
mod logging;
mod memory;
mod output;
mod queue;
mod setup;
mod sse;
mod upgrade;
mod version;

use clap::Parser;
use clap::builder::styling::{AnsiColor, Effects, Styles};

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

#[derive(Parser, Debug)]
#[command(name = version::APP_NAME)]
#[command(about = "An interactive AI coding assistant for the terminal")]
#[command(version = version::VERSION)]
#[command(styles = STYLES, color = clap::ColorChoice::Always)]
struct Args {
    #[arg(short, long, help = "Model to use for this session")]
    model: Option<String>,

    #[arg(long, help = "Skip the background check for a newer release")]
    no_update_check: bool,

    #[arg(long, help = "Skip installing the dymo-code command on PATH")]
    no_setup: bool,
}

fn main() {
    let args = Args::parse();

    let config = config::UserConfig::load();
    // Before the runtime exists: writing the environment is only sound while
    // the process is single threaded.
    let exported = config.load_api_keys_to_env();

    let log_guard = logging::init(&config::logs_dir());
    tracing::info!(
        version = version::VERSION,
        config = %config.path().display(),
        exported_keys = exported,
        "starting"
    );
    if let Some(e) = config.load_error() {
        tracing::warn!(path = %config.path().display(), error = %e, "ignoring unreadable config");
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start runtime: {}", e);
            std::process::exit(1);
        }
    };

    let cli_args = cli::CliArgs {
        model: args.model,
        no_update_check: args.no_update_check,
        no_setup: args.no_setup,
    };

    let result = runtime.block_on(cli::run(cli_args, config));
    // Don't wait on a version check that is still in flight.
    runtime.shutdown_background();

    let code = match result {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!(error = %e, "session failed");
            eprintln!("Error: {}", e.display_message());
            1
        }
    };
    // Flush the log writer; `exit` skips destructors.
    drop(log_guard);
    std::process::exit(code);
}
