//! StoryHoard CLI
//!
//! Command-line interface for StoryHoard - write, publish and download
//! branching stories.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use storyhoard_core::{Config, Hoard, StoreError};

mod commands;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "storyhoard")]
#[command(about = "StoryHoard - write and read branching stories")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show status (device id, publishing, row counts)
    Status,
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
    /// Manage local stories
    Story {
        #[command(subcommand)]
        command: StoryCommands,
    },
    /// Manage chapters
    Chapter {
        #[command(subcommand)]
        command: ChapterCommands,
    },
    /// Manage choices
    Choice {
        #[command(subcommand)]
        command: ChoiceCommands,
    },
    /// Publish one of your stories to the server
    Publish {
        /// Story ID (full UUID or prefix)
        id: String,
    },
    /// Take one of your stories off the server
    Unpublish {
        /// Story ID (full UUID or prefix)
        id: String,
    },
    /// Search stories published on the server
    Browse {
        /// Title keywords (all published stories if omitted)
        query: Option<String>,
    },
    /// Download a published story into the local cache
    Download {
        /// Published story ID (full UUID or prefix)
        id: String,
    },
}

#[derive(Subcommand)]
enum StoryCommands {
    /// List local stories
    #[command(alias = "ls")]
    List {
        /// Only stories written on this device
        #[arg(long, conflicts_with = "cached")]
        own: bool,
        /// Only downloaded stories
        #[arg(long)]
        cached: bool,
        /// Filter by title keywords
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Show a story with its chapters and choices
    Show {
        /// Story ID (full UUID or prefix)
        id: String,
    },
    /// Start a new story
    #[command(alias = "new")]
    Create {
        title: String,
        #[arg(short, long, default_value = "")]
        author: String,
        #[arg(short, long, default_value = "")]
        description: String,
    },
    /// Delete a story with all its chapters
    #[command(alias = "rm")]
    Remove {
        /// Story ID (full UUID or prefix)
        id: String,
    },
}

#[derive(Subcommand)]
enum ChapterCommands {
    /// Add a chapter to a story
    Add {
        /// Story ID (full UUID or prefix)
        story_id: String,
        /// Chapter text
        text: String,
        /// Pick one choice at random when read
        #[arg(long)]
        random: bool,
        /// Photo file to attach
        #[arg(long)]
        photo: Vec<PathBuf>,
        /// Illustration file to attach
        #[arg(long)]
        illustration: Vec<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ChoiceCommands {
    /// Add a choice leading out of a chapter
    Add {
        /// Chapter the choice is shown in (full UUID or prefix)
        from: String,
        /// Choice text
        text: String,
        /// Chapter the choice leads to (full UUID or prefix)
        #[arg(long)]
        to: Option<String>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (data_dir, server_url, server_index, ...)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let result = run(cli).await;

    if let Some(hint) = result.as_ref().err().and_then(recovery_hint) {
        eprintln!("hint: {}", hint);
    }
    result
}

async fn run(cli: Cli) -> Result<()> {
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    // Config commands must work even when the config is unusable for opening the hoard
    if let Commands::Config { command } = cli.command {
        return handle_config_command(command, &output);
    }

    let config = Config::load().context("Failed to load configuration")?;
    init_logging(&config, cli.verbose);

    let hoard = Hoard::open_with_config(config)?;
    debug!(
        "Opened hoard for device {} at {:?}",
        hoard.device(),
        hoard.config().data_dir
    );

    match cli.command {
        Commands::Config { .. } => unreachable!(), // Handled above
        Commands::Status => commands::status::show(&hoard, &output),
        Commands::Story { command } => handle_story_command(command, &hoard, &output),
        Commands::Chapter { command } => handle_chapter_command(command, &hoard, &output),
        Commands::Choice { command } => handle_choice_command(command, &hoard, &output),
        Commands::Publish { id } => commands::remote::publish(&hoard, &id, &output).await,
        Commands::Unpublish { id } => commands::remote::unpublish(&hoard, &id, &output).await,
        Commands::Browse { query } => commands::remote::browse(&hoard, query, &output).await,
        Commands::Download { id } => commands::remote::download(&hoard, &id, &output).await,
    }
}

fn handle_story_command(command: StoryCommands, hoard: &Hoard, output: &Output) -> Result<()> {
    match command {
        StoryCommands::List { own, cached, search } => {
            commands::story::list(hoard, own, cached, search, output)
        }
        StoryCommands::Show { id } => commands::story::show(hoard, &id, output),
        StoryCommands::Create {
            title,
            author,
            description,
        } => commands::story::create(hoard, title, author, description, output),
        StoryCommands::Remove { id } => commands::story::remove(hoard, &id, output),
    }
}

fn handle_chapter_command(command: ChapterCommands, hoard: &Hoard, output: &Output) -> Result<()> {
    match command {
        ChapterCommands::Add {
            story_id,
            text,
            random,
            photo,
            illustration,
        } => commands::chapter::add(
            hoard,
            &story_id,
            text,
            random,
            &photo,
            &illustration,
            output,
        ),
    }
}

fn handle_choice_command(command: ChoiceCommands, hoard: &Hoard, output: &Output) -> Result<()> {
    match command {
        ChoiceCommands::Add { from, text, to } => {
            commands::choice::add(hoard, &from, text, to.as_deref(), output)
        }
    }
}

fn handle_config_command(command: Option<ConfigCommands>, output: &Output) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(output),
        Some(ConfigCommands::Set { key, value }) => commands::config::set(key, value, output),
    }
}

/// Suggestion attached to the storage error behind `err`, if any
fn recovery_hint(err: &anyhow::Error) -> Option<&'static str> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<StoreError>())
        .and_then(StoreError::recovery_suggestion)
}

/// Install the tracing subscriber
///
/// `RUST_LOG` wins over `--verbose`. Logs go to `log_file` when configured.
fn init_logging(config: &Config, verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "storyhoard_core={0},storyhoard_cli={0}",
            default_level
        ))
    });

    let log_file = config.log_file.as_ref().and_then(|path| {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| eprintln!("Cannot open log file {}: {}", path.display(), e))
            .ok()
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false);

    let _ = match log_file {
        Some(file) => builder
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .try_init(),
        None => builder.with_writer(std::io::stderr).try_init(),
    };
}
