//! LeafSync CLI - keep a local document and a remote copy in step
//!
//! Usage: leaf <command> [options]

mod file_endpoint;

use clap::{Parser, Subcommand};
use file_endpoint::FileEndpoint;
use leaf_common::{LeafError, EXIT_CONFIG_ERROR, EXIT_CONFLICT, EXIT_ERROR};
use leaf_config::{Config, CONFIG_PATH};
use leaf_sync::{
    diff, initial_endpoint_identifier_with, merge_with, DisconnectReason, Granularity,
    SessionEvent, SessionOptions, SessionRegistry, SyncSession,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

#[derive(Parser)]
#[command(
    name = "leaf",
    version = "0.1.0",
    about = "LeafSync: three-way sync between a local document and its remote copy"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose/debug logging
    #[arg(long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create .leafsync/config.toml with default settings
    Init,

    /// Sync a local file with a remote file until interrupted
    Sync {
        /// Local document (created empty if missing)
        local: PathBuf,

        /// Remote document
        remote: PathBuf,

        /// Override sync.interval_ms from the config
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Stop after this many successful passes
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        passes: Option<u64>,
    },

    /// Three-way merge of files; remote wins on conflict
    Merge {
        base: PathBuf,
        local: PathBuf,
        remote: PathBuf,

        /// Override sync.granularity: character or line
        #[arg(long)]
        granularity: Option<Granularity>,
    },

    /// Print the span edits turning OLD into NEW as JSON
    Diff { old: PathBuf, new: PathBuf },

    /// Print the remote project URL declared in a document
    ProjectUrl { file: PathBuf },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let root = match std::env::current_dir() {
        Ok(root) => root,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(EXIT_ERROR);
        }
    };

    let config = if matches!(cli.command, Commands::Init) {
        Config::default()
    } else {
        match Config::load(&root) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(EXIT_CONFIG_ERROR);
            }
        }
    };

    leaf_common::telemetry::init_tracing(
        cli.verbose || config.logging.verbose,
        config.logging.json,
    );
    tracing::debug!(root = %root.display(), "LeafSync CLI started");

    let result = match cli.command {
        Commands::Init => cmd_init(&root),
        Commands::Sync {
            local,
            remote,
            interval_ms,
            passes,
        } => cmd_sync(&config, local, remote, interval_ms, passes).await,
        Commands::Merge {
            base,
            local,
            remote,
            granularity,
        } => cmd_merge(&config, &base, &local, &remote, granularity),
        Commands::Diff { old, new } => cmd_diff(&old, &new),
        Commands::ProjectUrl { file } => cmd_project_url(&config, &file),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(EXIT_ERROR);
    }
}

fn cmd_init(root: &Path) -> anyhow::Result<()> {
    use std::fs;

    let config_path = root.join(CONFIG_PATH);
    if config_path.exists() {
        eprintln!("✓ {} already exists", CONFIG_PATH);
        return Ok(());
    }
    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let default_config = r#"# LeafSync Configuration

[sync]
interval_ms = 1000
granularity = "character"
rollback_remote_on_local_failure = true

[remote]
default_url = "https://overleaf.com/login"
url_marker = "overleaf-project-url"

[logging]
verbose = false
json = false
"#;
    fs::write(&config_path, default_config)?;
    eprintln!("✓ Created {}", CONFIG_PATH);
    Ok(())
}

async fn cmd_sync(
    config: &Config,
    local: PathBuf,
    remote: PathBuf,
    interval_ms: Option<u64>,
    passes: Option<u64>,
) -> anyhow::Result<()> {
    let mut options = SessionOptions::try_from(&config.sync)?;
    if let Some(ms) = interval_ms {
        anyhow::ensure!(ms > 0, "--interval-ms must be greater than zero");
        options.interval = Duration::from_millis(ms);
    }

    if !local.exists() {
        tokio::fs::write(&local, "").await?;
        eprintln!("✓ Created {}", local.display());
    }
    let seed = tokio::fs::read_to_string(&local).await?;
    let project = initial_endpoint_identifier_with(
        &seed,
        &config.remote.url_marker,
        &config.remote.default_url,
    );
    tracing::info!(%project, "Remote project");

    let key = local.display().to_string();
    let session = SyncSession::new(
        key.clone(),
        Arc::new(FileEndpoint::new(&local)),
        Arc::new(FileEndpoint::new(&remote)),
        options,
    );
    let mut events = session.subscribe();

    let registry = SessionRegistry::new();
    registry.open(key.clone(), Arc::clone(&session)).await;
    registry.connect(&key).await?;
    eprintln!("✓ Syncing {} <-> {}", local.display(), remote.display());
    registry.force_sync(&key).await?;

    let mut completed = 0u64;
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(SessionEvent::PassCompleted(report)) => {
                    completed += 1;
                    if report.conflicts > 0 {
                        eprintln!("⚠ {} conflicting region(s), kept the remote version", report.conflicts);
                    }
                    if passes.is_some_and(|limit| completed >= limit) {
                        break;
                    }
                }
                Ok(SessionEvent::Disconnected(DisconnectReason::Failed(error))) => {
                    anyhow::bail!("Sync stopped after {} pass(es): {}", completed, error);
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Missed session events");
                }
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                eprintln!("Interrupted");
                break;
            }
        }
    }

    if let Err(e) = registry.disconnect(&key).await {
        // A failed pass may have disconnected it first
        if !e.is_invalid_transition() {
            return Err(e.into());
        }
    }
    eprintln!("✓ Completed {} pass(es)", completed);
    Ok(())
}

fn cmd_merge(
    config: &Config,
    base: &Path,
    local: &Path,
    remote: &Path,
    granularity: Option<Granularity>,
) -> anyhow::Result<()> {
    let granularity = match granularity {
        Some(granularity) => granularity,
        None => config
            .sync
            .granularity
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))?,
    };

    let base = read_file(base)?;
    let local = read_file(local)?;
    let remote = read_file(remote)?;

    let outcome = merge_with(granularity, &base, &local, &remote);

    let mut stdout = std::io::stdout();
    stdout.write_all(outcome.text.as_bytes())?;
    stdout.flush()?;

    if outcome.conflict() {
        eprintln!(
            "⚠ {} conflicting region(s), kept the remote version",
            outcome.conflicts
        );
        std::process::exit(EXIT_CONFLICT);
    }
    Ok(())
}

fn cmd_diff(old: &Path, new: &Path) -> anyhow::Result<()> {
    let old = read_file(old)?;
    let new = read_file(new)?;
    let edits = diff::encode(&old, &new);
    println!("{}", serde_json::to_string_pretty(&edits)?);
    Ok(())
}

fn cmd_project_url(config: &Config, file: &Path) -> anyhow::Result<()> {
    let text = read_file(file)?;
    println!(
        "{}",
        initial_endpoint_identifier_with(
            &text,
            &config.remote.url_marker,
            &config.remote.default_url
        )
    );
    Ok(())
}

fn read_file(path: &Path) -> leaf_common::Result<String> {
    std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => LeafError::FileNotFound {
            path: path.display().to_string(),
        },
        _ => LeafError::IoError(e),
    })
}
