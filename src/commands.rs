// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jason Ish

//! Slash command registry and dispatcher.

use colored::Colorize;

use crate::agent::Agent;
use crate::background::BackgroundResults;
use crate::cli::terminal_ui::TerminalUi;
use crate::cli::title::TitleUpdater;
use crate::config::{Theme, UserConfig};
use crate::custom_commands::CustomCommand;
use crate::memory::MemoryStore;
use crate::output::{self, OutputContext};
use crate::queue::{MessageQueue, QUEUED_PREVIEW_CHARS};
use crate::setup;
use crate::version::{APP_NAME, VERSION};

pub(crate) const PREFIX: char = '/';

/// Outcome of offering a line to the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CommandResult {
    /// Chat content; the caller sends it to the agent.
    NotACommand,
    /// A command ran (or was rejected); nothing more to do.
    Handled,
    /// Leave the session.
    Exit,
}

/// Command identifier for dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Command {
    Clear,
    Exit,
    Facts,
    Forget,
    Help,
    Model,
    Queue,
    Remember,
    Retry,
    SetName,
    Setup,
    Status,
    Themes,
    Version,
    Whoami,
}

#[derive(Debug, Clone)]
pub(crate) struct SlashCommand {
    pub command: Command,
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub description: &'static str,
    pub usage: Option<&'static str>,
}

pub(crate) const COMMANDS: &[SlashCommand] = &[
    SlashCommand {
        command: Command::Help,
        name: "help",
        aliases: &["commands", "h", "?"],
        description: "Show available commands",
        usage: None,
    },
    SlashCommand {
        command: Command::Exit,
        name: "exit",
        aliases: &["quit", "q"],
        description: "Exit the application",
        usage: None,
    },
    SlashCommand {
        command: Command::Status,
        name: "status",
        description: "Show model, queue and update status",
        aliases: &[],
        usage: None,
    },
    SlashCommand {
        command: Command::Queue,
        name: "queue",
        aliases: &[],
        description: "List queued messages",
        usage: Some("/queue [clear]"),
    },
    SlashCommand {
        command: Command::Clear,
        name: "clear",
        aliases: &["cls"],
        description: "Clear conversation history and queued messages",
        usage: None,
    },
    SlashCommand {
        command: Command::Retry,
        name: "retry",
        aliases: &[],
        description: "Send the last message again",
        usage: None,
    },
    SlashCommand {
        command: Command::Setup,
        name: "setup",
        aliases: &[],
        description: "Install the dymo-code command on PATH",
        usage: None,
    },
    SlashCommand {
        command: Command::Themes,
        name: "themes",
        aliases: &["theme"],
        description: "List or switch color themes",
        usage: Some("/themes [name]"),
    },
    SlashCommand {
        command: Command::Model,
        name: "model",
        aliases: &[],
        description: "Show or switch the model",
        usage: Some("/model [id]"),
    },
    SlashCommand {
        command: Command::Whoami,
        name: "whoami",
        aliases: &[],
        description: "Show what is remembered about you",
        usage: None,
    },
    SlashCommand {
        command: Command::SetName,
        name: "setname",
        aliases: &[],
        description: "Set your name",
        usage: Some("/setname <name>"),
    },
    SlashCommand {
        command: Command::Remember,
        name: "remember",
        aliases: &[],
        description: "Remember a fact about you",
        usage: Some("/remember <fact>"),
    },
    SlashCommand {
        command: Command::Facts,
        name: "facts",
        aliases: &[],
        description: "List remembered facts",
        usage: None,
    },
    SlashCommand {
        command: Command::Forget,
        name: "forget",
        aliases: &[],
        description: "Forget a remembered fact",
        usage: Some("/forget <id>"),
    },
    SlashCommand {
        command: Command::Version,
        name: "version",
        aliases: &[],
        description: "Show version and update status",
        usage: None,
    },
];

/// A classified input line.
#[derive(Debug, PartialEq)]
pub(crate) enum Parsed<'a> {
    NotACommand,
    /// Just the prefix.
    Bare,
    Builtin { command: Command, args: &'a str },
    Custom { command: &'a CustomCommand, args: &'a str },
    Unknown { name: String },
}

/// Classify `input` without side effects.
pub(crate) fn parse<'a>(input: &'a str, custom_commands: &'a [CustomCommand]) -> Parsed<'a> {
    let Some(rest) = input.trim().strip_prefix(PREFIX) else {
        return Parsed::NotACommand;
    };

    let (name, args) = match rest.find(char::is_whitespace) {
        Some(pos) => (&rest[..pos], rest[pos..].trim()),
        None => (rest, ""),
    };
    if name.is_empty() {
        return Parsed::Bare;
    }
    let name = name.to_lowercase();

    if let Some(cmd) = COMMANDS
        .iter()
        .find(|cmd| cmd.name == name || cmd.aliases.contains(&name.as_str()))
    {
        return Parsed::Builtin {
            command: cmd.command,
            args,
        };
    }

    if let Some(command) = custom_commands.iter().find(|cmd| cmd.name == name) {
        return Parsed::Custom { command, args };
    }

    Parsed::Unknown { name }
}

/// Everything a command handler may touch.
pub(crate) struct CommandContext<'a, A> {
    pub agent: &'a mut A,
    pub queue: &'a MessageQueue,
    pub ui: &'a TerminalUi,
    pub title: &'a TitleUpdater,
    pub config: &'a mut UserConfig,
    pub memory: &'a mut MemoryStore,
    pub background: &'a mut BackgroundResults,
    pub custom_commands: &'a [CustomCommand],
    /// The last line sent to the agent.
    pub last_input: Option<&'a str>,
    pub output: &'a OutputContext,
}

/// Route `input` to its handler.
pub(crate) fn dispatch<A: Agent>(input: &str, ctx: &mut CommandContext<'_, A>) -> CommandResult {
    let custom_commands = ctx.custom_commands;
    match parse(input, custom_commands) {
        Parsed::NotACommand => CommandResult::NotACommand,
        Parsed::Bare => {
            show_help(ctx);
            CommandResult::Handled
        }
        Parsed::Builtin { command, args } => {
            tracing::debug!(?command, "running command");
            run_builtin(command, args, ctx)
        }
        Parsed::Custom { command, args } => {
            tracing::debug!(name = %command.name, "queueing custom command");
            ctx.ui.add_to_queue(command.expand(args));
            CommandResult::Handled
        }
        Parsed::Unknown { name } => {
            output::emit_error(ctx.output, format!("Unknown command: /{}", name));
            output::emit_info(
                ctx.output,
                "Type /help for available commands.".bright_black().to_string(),
            );
            CommandResult::Handled
        }
    }
}

fn run_builtin<A: Agent>(command: Command, args: &str, ctx: &mut CommandContext<'_, A>) -> CommandResult {
    match command {
        Command::Exit => {
            let farewell = match ctx.config.user_name() {
                Some(name) => format!("Goodbye, {}!", name),
                None => "Goodbye!".to_string(),
            };
            output::emit_info(ctx.output, farewell.cyan().to_string());
            return CommandResult::Exit;
        }
        Command::Help => show_help(ctx),
        Command::Status => show_status(ctx),
        Command::Queue => queue_command(args, ctx),
        Command::Clear => {
            ctx.agent.clear_history();
            let dropped = ctx.queue.clear() + ctx.ui.clear_queue();
            let mut message = "Conversation cleared".to_string();
            if dropped > 0 {
                message.push_str(&format!(" ({} queued message(s) dropped)", dropped));
            }
            output::emit_success(ctx.output, message);
        }
        Command::Retry => match ctx.last_input {
            Some(text) => {
                output::emit_info(ctx.output, "Retrying last message".bright_black().to_string());
                ctx.ui.add_to_queue(text);
            }
            None => output::emit_warning(ctx.output, "Nothing to retry yet"),
        },
        Command::Setup => match setup::setup_command() {
            Ok(outcome) => output::emit_success(ctx.output, outcome.note()),
            Err(e) => output::emit_error(ctx.output, format!("Setup failed: {}", e)),
        },
        Command::Themes => themes_command(args, ctx),
        Command::Model => model_command(args, ctx),
        Command::Whoami => show_profile(ctx),
        Command::SetName => set_name(args, ctx),
        Command::Remember => remember(args, ctx),
        Command::Facts => show_facts(ctx),
        Command::Forget => forget(args, ctx),
        Command::Version => show_version(ctx),
    }
    CommandResult::Handled
}

fn usage_warning(command: Command, output: &OutputContext) {
    if let Some(usage) = COMMANDS
        .iter()
        .find(|c| c.command == command)
        .and_then(|c| c.usage)
    {
        output::emit_warning(output, format!("Usage: {}", usage));
    }
}

fn show_help<A>(ctx: &CommandContext<'_, A>) {
    output::emit_info(ctx.output, "Available commands:".cyan().bold().to_string());
    for cmd in COMMANDS {
        let name = cmd.usage.unwrap_or_default();
        let name = if name.is_empty() {
            format!("/{}", cmd.name)
        } else {
            name.to_string()
        };
        let mut line = format!("  {:<20} {}", name.yellow(), cmd.description);
        if !cmd.aliases.is_empty() {
            let aliases: Vec<String> = cmd.aliases.iter().map(|a| format!("/{}", a)).collect();
            line.push_str(&format!(" ({})", aliases.join(", ")).bright_black().to_string());
        }
        output::emit_info(ctx.output, line);
    }

    if !ctx.custom_commands.is_empty() {
        output::emit_info(ctx.output, "Custom commands:".cyan().bold().to_string());
        for cmd in ctx.custom_commands {
            output::emit_info(
                ctx.output,
                format!(
                    "  {:<20} {} {}",
                    format!("/{}", cmd.name).yellow(),
                    cmd.description,
                    format!("({})", cmd.source).bright_black()
                ),
            );
        }
    }
}

fn update_line(background: &mut BackgroundResults) -> String {
    if let Some(update) = background.update() {
        format!(
            "Update available: {} -> {} ({})",
            update.current, update.latest, update.url
        )
    } else if background.update_pending() {
        "Checking for updates...".to_string()
    } else {
        "No update available".to_string()
    }
}

fn show_status<A: Agent>(ctx: &mut CommandContext<'_, A>) {
    let user = ctx.config.user_name().unwrap_or("(not set)").to_string();
    let lines = [
        format!("Model:        {}", ctx.agent.model_key()),
        format!("User:         {}", user),
        format!("Queued:       {}", ctx.queue.size()),
        format!("Fast path:    {}", ctx.ui.get_queue_size()),
        format!(
            "Processing:   {}",
            if ctx.queue.is_processing() { "yes" } else { "no" }
        ),
        format!("Updates:      {}", update_line(ctx.background)),
        format!("Config:       {}", ctx.config.path().display()),
    ];
    output::emit_info(ctx.output, "Status".cyan().bold().to_string());
    for line in lines {
        output::emit_info(ctx.output, format!("  {}", line));
    }
}

fn queue_command<A>(args: &str, ctx: &mut CommandContext<'_, A>) {
    match args {
        "" => {
            let items = ctx.queue.snapshot();
            let fast = ctx.ui.get_queue_size();
            if items.is_empty() && fast == 0 {
                output::emit_info(ctx.output, "Queue is empty");
                return;
            }
            for item in items {
                output::emit_info(
                    ctx.output,
                    format!(
                        "  #{} {} {}",
                        item.position,
                        item.timestamp.format("%H:%M:%S").to_string().bright_black(),
                        output::preview(&item.content, QUEUED_PREVIEW_CHARS)
                    ),
                );
            }
            if fast > 0 {
                output::emit_info(ctx.output, format!("  {} pending command prompt(s)", fast));
            }
        }
        "clear" => {
            let dropped = ctx.queue.clear() + ctx.ui.clear_queue();
            output::emit_success(ctx.output, format!("Dropped {} queued message(s)", dropped));
        }
        _ => usage_warning(Command::Queue, ctx.output),
    }
}

fn themes_command<A>(args: &str, ctx: &mut CommandContext<'_, A>) {
    if args.is_empty() {
        let current = ctx.config.settings().theme;
        output::emit_info(ctx.output, "Themes:".cyan().bold().to_string());
        for theme in Theme::ALL {
            let marker = if *theme == current { "*" } else { " " };
            output::emit_info(
                ctx.output,
                format!("  {} {:<10} {}", marker, theme.name(), theme.description()),
            );
        }
        return;
    }

    let Some(theme) = Theme::from_name(args) else {
        output::emit_error(ctx.output, format!("Unknown theme: {}", args));
        return;
    };
    theme.apply();
    match ctx.config.update(|file| file.theme = theme) {
        Ok(()) => output::emit_success(ctx.output, format!("Theme set to {}", theme.name())),
        Err(e) => output::emit_error(ctx.output, e.display_message()),
    }
}

fn model_command<A: Agent>(args: &str, ctx: &mut CommandContext<'_, A>) {
    if args.is_empty() {
        output::emit_info(ctx.output, format!("Current model: {}", ctx.agent.model_key()));
        return;
    }

    ctx.agent.set_model(args);
    ctx.title.update(Some(args), None, None);
    let model = args.to_string();
    match ctx.config.update(|file| file.model = Some(model)) {
        Ok(()) => output::emit_success(ctx.output, format!("Model set to {}", args)),
        Err(e) => output::emit_error(ctx.output, e.display_message()),
    }
}

fn show_profile<A>(ctx: &mut CommandContext<'_, A>) {
    let entries: Vec<String> = ctx
        .memory
        .profile()
        .map(|(key, entry)| format!("  {}: {}", key, entry.value))
        .collect();
    let facts = ctx.memory.facts().len();

    if entries.is_empty() && facts == 0 {
        output::emit_info(
            ctx.output,
            "Nothing remembered yet. Use /setname or /remember.",
        );
        return;
    }
    output::emit_info(ctx.output, "Profile:".cyan().bold().to_string());
    for entry in entries {
        output::emit_info(ctx.output, entry);
    }
    if facts > 0 {
        output::emit_info(ctx.output, format!("  {} remembered fact(s)", facts));
    }
}

fn refresh_memory_context<A: Agent>(ctx: &mut CommandContext<'_, A>) {
    let context = ctx.memory.get_context_for_ai().unwrap_or_default();
    ctx.agent.add_memory_context(&context);
}

fn set_name<A: Agent>(args: &str, ctx: &mut CommandContext<'_, A>) {
    if args.is_empty() {
        usage_warning(Command::SetName, ctx.output);
        return;
    }

    let name = args.to_string();
    let result = ctx
        .memory
        .set_profile("name", args, "identity")
        .and_then(|()| ctx.config.update(|file| file.user_name = Some(name)));
    match result {
        Ok(()) => {
            refresh_memory_context(ctx);
            output::emit_success(ctx.output, format!("Nice to meet you, {}!", args));
        }
        Err(e) => output::emit_error(ctx.output, e.display_message()),
    }
}

fn remember<A: Agent>(args: &str, ctx: &mut CommandContext<'_, A>) {
    if args.is_empty() {
        usage_warning(Command::Remember, ctx.output);
        return;
    }

    match ctx.memory.add_fact(args, "general") {
        Ok(id) => {
            refresh_memory_context(ctx);
            output::emit_success(ctx.output, format!("Remembered (#{})", id));
        }
        Err(e) => output::emit_error(ctx.output, e.display_message()),
    }
}

fn show_facts<A>(ctx: &mut CommandContext<'_, A>) {
    let facts = ctx.memory.facts();
    if facts.is_empty() {
        output::emit_info(ctx.output, "No facts remembered yet. Use /remember <fact>.");
        return;
    }
    output::emit_info(ctx.output, "Facts:".cyan().bold().to_string());
    for fact in facts {
        output::emit_info(
            ctx.output,
            format!(
                "  #{} {} {}",
                fact.id,
                fact.content,
                fact.created_at.format("%Y-%m-%d").to_string().bright_black()
            ),
        );
    }
}

fn forget<A: Agent>(args: &str, ctx: &mut CommandContext<'_, A>) {
    let Ok(id) = args.trim_start_matches('#').parse::<u64>() else {
        usage_warning(Command::Forget, ctx.output);
        return;
    };
    match ctx.memory.forget(id) {
        Ok(true) => {
            refresh_memory_context(ctx);
            output::emit_success(ctx.output, format!("Forgot fact #{}", id));
        }
        Ok(false) => output::emit_warning(ctx.output, format!("No fact with id {}", id)),
        Err(e) => output::emit_error(ctx.output, e.display_message()),
    }
}

fn show_version<A>(ctx: &mut CommandContext<'_, A>) {
    output::emit_info(ctx.output, format!("{} v{}", APP_NAME, VERSION));
    output::emit_info(ctx.output, update_line(ctx.background));
}
