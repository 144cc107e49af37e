//! Tubewatch CLI - tubewatch command

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd;

/// Tubewatch - Mirror a folder tree to YouTube playlists
#[derive(Parser)]
#[command(name = "tubewatch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (default: <config dir>/tubewatch/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch a directory tree and upload new videos
    Run {
        /// Directory to watch (overrides watch.root)
        root: Option<PathBuf>,

        /// Log what would be uploaded instead of calling YouTube
        #[arg(long)]
        dry_run: bool,
    },
    /// Inspect configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration
    Show,

    /// Print the config file path
    Path {
        /// Write a default config file if none exists
        #[arg(long)]
        create: bool,
    },

    /// Print an annotated example configuration
    Example,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Run { root, dry_run } => cmd::run::run(config_path, root, dry_run).await,
        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::Show => cmd::config::run_show(config_path),
            ConfigCommands::Path { create } => cmd::config::run_path(config_path, create),
            ConfigCommands::Example => cmd::config::run_example(),
        },
    }
}
