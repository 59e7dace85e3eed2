use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dialogue::core::error::{DialogueError, ErrorKind, classify};
use dialogue::exit_codes;
use dialogue::io::config::{
    DEFAULT_CONFIG_PATH, DialogueConfig, load_resolved_config, write_config,
};
use dialogue::io::store::{FileSessionStore, SessionStore};
use dialogue::logging;
use dialogue::replay::{load_script, run_replay};

#[derive(Parser)]
#[command(name = "dialogue", version, about = "Goal-stack dialogue orchestrator")]
struct Cli {
    /// Path to the TOML config; relative directories in it resolve against its directory.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write the default config and create the session directory.
    Init {
        /// Overwrite an existing config.
        #[arg(short, long)]
        force: bool,
    },
    /// Print a stored session as JSON.
    Show { session_id: String },
    /// Check a stored session against the schema and goal-stack invariants.
    Validate { session_id: String },
    /// Delete a stored session.
    Delete { session_id: String },
    /// Run the turns in a replay script and print each reply.
    Replay { script: PathBuf },
}

fn main() {
    logging::init();
    if let Err(err) = run() {
        eprintln!("{:#}", err);
        let code = match classify(&err) {
            Some(ErrorKind::NotFound) => exit_codes::NOT_FOUND,
            _ => exit_codes::INVALID,
        };
        std::process::exit(code);
    }
    std::process::exit(exit_codes::OK);
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Init { force } => cmd_init(&cli.config, force),
        Command::Show { session_id } => cmd_show(&load_resolved_config(&cli.config)?, &session_id),
        Command::Validate { session_id } => cmd_validate(&load_resolved_config(&cli.config)?, &session_id),
        Command::Delete { session_id } => cmd_delete(&load_resolved_config(&cli.config)?, &session_id),
        Command::Replay { script } => cmd_replay(&load_resolved_config(&cli.config)?, &script),
    }
}

fn cmd_init(config_path: &Path, force: bool) -> Result<()> {
    if force || !config_path.exists() {
        write_config(config_path, &DialogueConfig::default())?;
    }
    let cfg = load_resolved_config(config_path)?;
    std::fs::create_dir_all(&cfg.store.state_dir)
        .with_context(|| format!("create {}", cfg.store.state_dir.display()))?;
    Ok(())
}

fn open_store(cfg: &DialogueConfig) -> Result<FileSessionStore> {
    FileSessionStore::new(&cfg.store.state_dir, cfg.store.key_prefix.clone())
}

fn cmd_show(cfg: &DialogueConfig, session_id: &str) -> Result<()> {
    let session = open_store(cfg)?
        .load(session_id)?
        .ok_or_else(|| DialogueError::not_found(format!("session={session_id}")))?;
    let payload = serde_json::to_string_pretty(&session).context("serialize session")?;
    println!("{payload}");
    Ok(())
}

/// `load` runs the schema and invariant checks; reaching the print means both passed.
fn cmd_validate(cfg: &DialogueConfig, session_id: &str) -> Result<()> {
    let session = open_store(cfg)?
        .load(session_id)?
        .ok_or_else(|| DialogueError::not_found(format!("session={session_id}")))?;
    println!("ok {session_id} ({} goals)", session.goals.len());
    Ok(())
}

fn cmd_delete(cfg: &DialogueConfig, session_id: &str) -> Result<()> {
    open_store(cfg)?.delete(session_id)
}

fn cmd_replay(cfg: &DialogueConfig, script_path: &Path) -> Result<()> {
    let script = load_script(script_path)?;
    for outcome in run_replay(script, cfg)? {
        println!("[{}] {}", outcome.session_id, outcome.reply);
    }
    Ok(())
}
