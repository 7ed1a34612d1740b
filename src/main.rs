// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! pipestore: inspect and edit pipeline settings files from the shell

use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

use pipestore::{Filelog, MessageSink, Result, Settings, StoreConfig};

/// pipestore CLI - settings files and pipeline log
#[derive(Parser, Debug)]
#[command(name = "pipestore")]
#[command(author = "Jonathan D. A. Jewell <hyperpolymath>")]
#[command(version)]
#[command(about = "Inspect and edit pipeline settings files", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (JSON format)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable trace logging (most verbose)
    #[arg(long, global = true)]
    trace: bool,

    /// Suppress non-essential output (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print a settings file
    Show {
        file: PathBuf,
    },

    /// List top-level keys
    Keys {
        file: PathBuf,
    },

    /// Print one value; nested keys are separated by dots
    Get {
        file: PathBuf,
        key: String,

        /// Settings file consulted when the key is missing
        #[arg(long)]
        fallback: Option<PathBuf>,
    },

    /// Set a value (parsed as JSON, otherwise stored as a string)
    Set {
        file: PathBuf,
        key: String,
        value: String,

        /// Overwrite an existing top-level key
        #[arg(long)]
        force: bool,
    },

    /// Remove a top-level key
    Delete {
        file: PathBuf,
        key: String,
    },

    /// Pipeline log operations
    Log {
        #[command(subcommand)]
        action: LogCommands,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum LogCommands {
    /// Append an info entry
    Info { message: String },

    /// Append a warning entry
    Warning { message: String },

    /// Append an error entry
    Error { message: String },

    /// Truncate the log to its banner
    Clear,

    /// Print the log size in bytes
    Size,
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Generate default configuration file
    Generate {
        /// Output file path (defaults to the active config path)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config_path = cli.config.clone().unwrap_or_else(StoreConfig::default_path);
    let config = StoreConfig::load(&config_path)?;
    debug!("Using configuration {:?}", config_path);

    match cli.command {
        Commands::Show { file } => {
            let settings = open_settings(&file, &config)?;
            println!("{}", serde_json::to_string_pretty(settings.get_data())?);
        }
        Commands::Keys { file } => {
            let settings = open_settings(&file, &config)?;
            for key in settings.keys() {
                println!("{}", key);
            }
        }
        Commands::Get { file, key, fallback } => {
            let mut settings = open_settings(&file, &config)?;
            if let Some(fallback) = fallback {
                settings.set_fallback_file(fallback)?;
            }
            match settings.get_sub_property(&split_key(&key)) {
                Some(value) => println!("{}", serde_json::to_string_pretty(value)?),
                None => eprintln!("'{}' not found", key),
            }
        }
        Commands::Set { file, key, value, force } => {
            run_set(&config, &file, &key, &value, force)?;
        }
        Commands::Delete { file, key } => {
            let mut settings = open_settings(&file, &config)?;
            let log = open_log(&config)?;
            if !settings.delete_property(&key) {
                eprintln!("{}", log.warning(format_args!("'{}' not found in {}", key, file.display()))?);
                return Ok(());
            }
            save(&mut settings, &log, &file)?;
            println!("{}", log.info(format_args!("Deleted '{}' from {}", key, file.display()))?);
        }
        Commands::Log { action } => {
            run_log_command(&config, action)?;
        }
        Commands::Config { action } => {
            run_config_command(&config, action, &config_path)?;
        }
    }

    Ok(())
}

fn open_settings(file: &Path, config: &StoreConfig) -> Result<Settings> {
    let mut settings = Settings::new();
    settings.set_lock_timeout(config.lock_timeout());
    settings.set_settings_file(file)?;
    Ok(settings)
}

fn open_log(config: &StoreConfig) -> Result<Filelog> {
    Filelog::with_config(&config.log, MessageSink::new())
}

/// Flush `settings`, recording a failure in the log before returning it
fn save(settings: &mut Settings, log: &Filelog, file: &Path) -> Result<()> {
    if let Err(e) = settings.apply_settings(false) {
        log.error(format_args!("Failed to save {}: {}", file.display(), e), true)?;
        return Err(e);
    }
    Ok(())
}

fn run_set(config: &StoreConfig, file: &Path, key: &str, raw: &str, force: bool) -> Result<()> {
    let mut settings = open_settings(file, config)?;
    let log = open_log(config)?;
    let value = parse_value(raw);
    let path = split_key(key);

    if path.len() == 1 {
        if !settings.add_property(key, value, force) {
            eprintln!(
                "{}",
                log.warning(format_args!(
                    "'{}' already exists in {}; use --force to overwrite",
                    key,
                    file.display()
                ))?
            );
            return Ok(());
        }
    } else {
        settings.edit_sub_property(&path, value)?;
    }

    save(&mut settings, &log, file)?;
    println!("{}", log.info(format_args!("Set '{}' in {}", key, file.display()))?);
    Ok(())
}

fn run_log_command(config: &StoreConfig, action: LogCommands) -> Result<()> {
    let log = open_log(config)?;

    match action {
        LogCommands::Info { message } => {
            log.info(&message)?;
        }
        LogCommands::Warning { message } => {
            log.warning(&message)?;
        }
        LogCommands::Error { message } => {
            log.error(&message, true)?;
        }
        LogCommands::Clear => {
            log.clear()?;
            println!("Cleared {:?}", log.path());
        }
        LogCommands::Size => {
            println!("{}", log.get_size()?);
        }
    }

    Ok(())
}

fn run_config_command(config: &StoreConfig, action: ConfigCommands, config_path: &Path) -> Result<()> {
    match action {
        ConfigCommands::Show => {
            let json = serde_json::to_string_pretty(config)?;
            println!("{}", json);
        }
        ConfigCommands::Generate { output } => {
            let output = output.unwrap_or_else(|| config_path.to_path_buf());
            StoreConfig::default().save(&output)?;
            println!("Generated config at {:?}", output);
        }
    }

    Ok(())
}

/// Parse a command-line value as JSON, falling back to a plain string
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn split_key(key: &str) -> Vec<&str> {
    key.split('.').collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_cli_get_command() {
        let cli = Cli::try_parse_from([
            "pipestore", "get", "project.json", "fps", "--fallback", "defaults.json"
        ]).unwrap();

        match cli.command {
            Commands::Get { file, key, fallback } => {
                assert_eq!(file, PathBuf::from("project.json"));
                assert_eq!(key, "fps");
                assert_eq!(fallback, Some(PathBuf::from("defaults.json")));
            }
            _ => panic!("Expected Get command"),
        }
    }

    #[test]
    fn test_cli_set_command_with_globals() {
        let cli = Cli::try_parse_from([
            "pipestore", "set", "project.json", "fps", "25", "--force", "-v"
        ]).unwrap();

        assert!(cli.verbose);
        match cli.command {
            Commands::Set { value, force, .. } => {
                assert_eq!(value, "25");
                assert!(force);
            }
            _ => panic!("Expected Set command"),
        }
    }

    #[test]
    fn test_cli_requires_command() {
        assert!(Cli::try_parse_from(["pipestore"]).is_err());
    }

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value("25"), json!(25));
        assert_eq!(parse_value("{\"a\": true}"), json!({"a": true}));
        assert_eq!(parse_value("shot010"), json!("shot010"));
    }

    #[test]
    fn test_split_key() {
        assert_eq!(split_key("fps"), vec!["fps"]);
        assert_eq!(split_key("preview.resolution.width"), vec!["preview", "resolution", "width"]);
    }

    #[test]
    fn test_run_set_writes_file_and_log() {
        let dir = TempDir::new().unwrap();
        let mut config = StoreConfig::default();
        config.log.dir = Some(dir.path().to_path_buf());
        config.log.date = false;
        config.log.time = false;
        let file = dir.path().join("project.json");

        run_set(&config, &file, "fps", "24", false).unwrap();
        run_set(&config, &file, "preview.width", "1920", false).unwrap();
        run_set(&config, &file, "fps", "25", false).unwrap();

        let settings = Settings::from_file(&file).unwrap();
        assert_eq!(settings.get_property("fps"), Some(&json!(24)));
        assert_eq!(settings.get_sub_property(&["preview", "width"]), Some(&json!(1920)));

        let log = std::fs::read_to_string(dir.path().join("pipestore.log")).unwrap();
        assert!(log.contains("INFO     : Set 'fps' in"));
        assert!(log.contains("WARNING  : 'fps' already exists in"));
    }
}
