//! Configuration command
//!
//! Read-only views of the configuration; edit the TOML file to change it.

use anyhow::{Context, Result};
use cli_lib::config::{self, Config};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};

fn resolve_path(config_path: Option<&Path>) -> Result<PathBuf> {
    match config_path {
        Some(path) => Ok(path.to_path_buf()),
        None => config::config_file_path().context("Could not determine config file path"),
    }
}

fn or_unset(value: Option<&Path>) -> String {
    value
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(unset)".dimmed().to_string())
}

/// Print the effective configuration
pub fn run_show(config_path: Option<&Path>) -> Result<()> {
    let config: Config = config::load(config_path)?;
    let path = resolve_path(config_path)?;

    println!("{}", "Tubewatch Configuration".bold());
    if path.exists() {
        println!("{}: {}\n", "Location".dimmed(), path.display().dimmed());
    } else {
        println!(
            "{}: {} {}\n",
            "Location".dimmed(),
            path.display().dimmed(),
            "(not found, using defaults)".yellow()
        );
    }

    println!("{}", "[watch]".yellow());
    println!("  {} = {}", "root".cyan(), or_unset(config.watch.root.as_deref()));
    println!("  {} = {}", "release_on_remove".cyan(), config.watch.release_on_remove);
    println!("  {} = {}", "use_ignore_file".cyan(), config.watch.ignore.use_ignore_file);
    println!(
        "  {} = {:?}",
        "additional_patterns".cyan(),
        config.watch.ignore.additional_patterns
    );

    println!("\n{}", "[pipeline]".yellow());
    println!("  {} = {:?}", "title_delimiter".cyan(), config.pipeline.title_delimiter);
    println!(
        "  {} = {} {}",
        "max_concurrent_jobs".cyan(),
        config.pipeline.max_concurrent_jobs,
        if config.pipeline.max_concurrent_jobs == 1 {
            "(sequential)".dimmed().to_string()
        } else {
            "(unordered)".dimmed().to_string()
        }
    );

    println!("\n{}", "[remote]".yellow());
    println!(
        "  {} = {}",
        "dry_run".cyan(),
        if config.remote.dry_run {
            "true".green().to_string()
        } else {
            "false".to_string()
        }
    );
    println!("  {} = {}", "token_file".cyan(), or_unset(config.remote.token_file.as_deref()));
    println!("  {} = {}", "api_base".cyan(), config.remote.api_base);
    println!("  {} = {}", "upload_base".cyan(), config.remote.upload_base);
    println!(
        "  {} = {} {}",
        "call_timeout_secs".cyan(),
        config.remote.call_timeout_secs,
        format!("({}s)", config.remote.call_timeout_secs).dimmed()
    );
    println!(
        "  {} = {} {}",
        "upload_timeout_secs".cyan(),
        config.remote.upload_timeout_secs,
        format!("({} min)", config.remote.upload_timeout_secs / 60).dimmed()
    );
    println!("  {} = {}", "playlist_privacy".cyan(), config.remote.playlist_privacy);
    println!("  {} = {:?}", "video_description".cyan(), config.remote.video_description);
    println!("  {} = {:?}", "video_tags".cyan(), config.remote.video_tags);

    println!("\n{}", "[log]".yellow());
    println!("  {} = {}", "directory".cyan(), or_unset(config.log.directory.as_deref()));
    println!("  {} = {}", "filter".cyan(), config.log.filter);

    if let Err(e) = config.validate() {
        println!("\n{} {}", "✗".red(), e);
    }

    println!("\n{}", "Valid Ranges:".bold());
    println!("  max_concurrent_jobs: 1-{}", config::MAX_CONCURRENT_JOBS);
    println!("  call_timeout_secs: 1-86400");
    println!("  upload_timeout_secs: 1-604800");

    Ok(())
}

/// Show the config file path and optionally create it
pub fn run_path(config_path: Option<&Path>, create: bool) -> Result<()> {
    let path = resolve_path(config_path)?;

    if create && !path.exists() {
        config::save(&Config::default(), &path)?;
        println!("{} Created config file at: {}", "✓".green(), path.display());
    } else if path.exists() {
        println!("{}", path.display());
    } else {
        println!("{}", path.display());
        println!("{}", "File does not exist. Use --create to create it.".yellow());
    }

    Ok(())
}

/// Show example configuration
pub fn run_example() -> Result<()> {
    println!("{}", config::example_config());
    Ok(())
}
