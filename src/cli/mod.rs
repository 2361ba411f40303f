// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jason Ish

//! Interactive terminal session: startup, the main loop and shutdown.

pub(crate) mod input;
mod listener;
pub(crate) mod session;
mod spinner;
pub(crate) mod terminal_ui;
pub(crate) mod title;

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use tokio::sync::mpsc;

use crate::agent::{Agent, OpenAiCompatAgent};
use crate::background::{self, BackgroundOptions, BackgroundResults, GRACE_DELAY};
use crate::config::UserConfig;
use crate::custom_commands;
use crate::error::{Error, Result};
use crate::memory::MemoryStore;
use crate::output::{self, OutputContext, OutputListener};
use crate::queue::{MessageQueue, ProcessingState};
use crate::version::{APP_TITLE, VERSION};

use input::InputCapture;
use session::{Session, SessionParts};
use terminal_ui::TerminalUi;
use title::TitleUpdater;

/// Command line overrides for the session.
#[derive(Debug, Default)]
pub(crate) struct CliArgs {
    pub model: Option<String>,
    pub no_update_check: bool,
    pub no_setup: bool,
}

/// Main entry point for the interactive session.
pub(crate) async fn run(args: CliArgs, mut config: UserConfig) -> Result<()> {
    let output = {
        let listener: Arc<dyn OutputListener> = Arc::new(listener::CliListener::new());
        OutputContext::new(listener)
    };

    config.settings().theme.apply();

    let mut background = start_background(&args, &config);

    let mut memory = MemoryStore::open_default();
    greet(&mut config, &mut memory, &output).await?;

    let mut agent = OpenAiCompatAgent::new(config.settings(), output.clone());
    // Applies to this session only; `/model` persists.
    if let Some(model) = &args.model {
        agent.set_model(model);
    }
    if let Some(context) = memory.get_context_for_ai() {
        agent.add_memory_context(&context);
    }
    tracing::info!(model = agent.model_key(), "session starting");

    let state = ProcessingState::new();
    let queue = MessageQueue::new(state.clone(), output.clone());
    let ui = Arc::new(TerminalUi::new(state, output.clone()));
    let title = Arc::new(TitleUpdater::new());

    let interrupts = spawn_interrupt_forwarder();
    let (mailbox_tx, mailbox_rx) = mpsc::channel(1);
    let capture = InputCapture::spawn(queue.clone(), mailbox_tx)?;

    ui.start();
    title.update(Some(agent.model_key()), None, None);

    tokio::time::sleep(GRACE_DELAY).await;
    report_background(&mut background, &output);

    let mut session = Session::new(SessionParts {
        agent,
        queue,
        ui,
        title,
        config,
        memory,
        background,
        custom_commands: custom_commands::load_custom_commands(),
        output,
        mailbox: mailbox_rx,
        interrupts,
    });
    session.run().await;

    capture.stop();
    session.shutdown();
    tracing::info!("session ended");
    Ok(())
}

fn start_background(args: &CliArgs, config: &UserConfig) -> BackgroundResults {
    let settings = config.settings();
    let options = BackgroundOptions {
        check_updates: settings.check_updates && !args.no_update_check,
        version_url: settings.version_url.clone(),
        update_timeout: Duration::from_secs(settings.update_timeout_secs),
        auto_setup: settings.auto_setup && !args.no_setup,
    };
    if !options.check_updates && !options.auto_setup {
        return BackgroundResults::disabled();
    }
    background::spawn(options)
}

/// Print the banner and handle first-run onboarding.
async fn greet(config: &mut UserConfig, memory: &mut MemoryStore, output: &OutputContext) -> Result<()> {
    println!(
        "{} {}",
        APP_TITLE.cyan().bold(),
        format!("v{}", VERSION).bright_black()
    );
    println!(
        "{}\n",
        "Type /help for commands. Messages sent while a response is running are queued."
            .bright_black()
    );

    if !config.is_first_run() {
        if let Err(e) = config.update_last_seen() {
            tracing::warn!(error = %e, "failed to save last seen time");
        }
        if let Some(name) = config.user_name().or_else(|| memory.get_profile("name")) {
            output::emit_info(output, format!("Welcome back, {}!", name.bold()));
        }
        return Ok(());
    }

    let name = ask_name().await?;
    if let Err(e) = config.complete_first_run(&name) {
        tracing::warn!(error = %e, "failed to save first run state");
    }
    if let Err(e) = memory.set_profile("name", &name, "identity") {
        tracing::warn!(error = %e, "failed to store name in memory");
    }
    output::emit_success(output, format!("Nice to meet you, {}!", name));
    Ok(())
}

/// Ask for the user's name before the capture thread owns stdin.
async fn ask_name() -> Result<String> {
    let answer = tokio::task::spawn_blocking(|| -> io::Result<String> {
        let mut stdout = io::stdout();
        write!(stdout, "{} ", "What should I call you?".cyan())?;
        stdout.flush()?;
        let mut line = String::new();
        io::stdin().read_line(&mut line)?;
        Ok(line)
    })
    .await
    .map_err(|e| Error::Other(format!("name prompt failed: {}", e)))??;

    let name = answer.trim();
    if name.is_empty() {
        Ok("friend".to_string())
    } else {
        Ok(name.to_string())
    }
}

/// Forward Ctrl+C into a channel the session can race against.
fn spawn_interrupt_forwarder() -> mpsc::UnboundedReceiver<()> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "cannot listen for Ctrl+C");
                return;
            }
            if tx.send(()).is_err() {
                return;
            }
        }
    });
    rx
}

/// Print whatever the background tasks produced during the grace delay.
fn report_background(background: &mut BackgroundResults, output: &OutputContext) {
    if let Some(update) = background.update() {
        output::emit_warning(
            output,
            format!(
                "Update available: {} -> {}. Download it from {}",
                update.current, update.latest, update.url
            ),
        );
    }
    if let Some(outcome) = background.setup()
        && outcome.is_fresh_install()
    {
        output::emit_info(output, outcome.note());
    }
}
