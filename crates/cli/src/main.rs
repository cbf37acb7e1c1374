use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use themis_core::{
    load_config, load_profile_overrides, validate_config, Config, Job, JobProgress, MediaProbe,
    WatchFolder,
};

/// Config file looked up in the working directory when `--config` is absent.
const DEFAULT_CONFIG_FILE: &str = "themis.toml";

/// Progress events buffered before new ones are dropped.
const PROGRESS_BUFFER_SIZE: usize = 64;

/// Progress is logged every this many percent.
const PROGRESS_LOG_STEP: f64 = 5.0;

#[derive(Debug, Parser)]
#[command(name = "themis", version, about = "Profile driven media transcoding")]
struct Cli {
    /// Configuration file (defaults to ./themis.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Transcode one file
    Transcode {
        input: PathBuf,
        output: PathBuf,
        /// TOML file with profile overrides
        #[arg(long)]
        profile: Option<PathBuf>,
        /// Profile override, e.g. --set video_codec=libx264
        #[arg(long = "set", value_name = "KEY=VALUE")]
        assignments: Vec<String>,
    },
    /// Print the probed description of a file as JSON
    Probe { input: PathBuf },
    /// Watch the configured input folder until interrupted
    Watch,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_json);

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("Fatal error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn run(cli: Cli) -> Result<bool> {
    let config = resolve_config(cli.config.as_deref())?;
    validate_config(&config).context("Configuration validation failed")?;

    match cli.command {
        Command::Transcode {
            input,
            output,
            profile,
            assignments,
        } => transcode(config, input, output, profile, assignments).await,
        Command::Probe { input } => {
            let source = MediaProbe::new(&config.tools.ffprobe_path)
                .probe(&input)
                .await
                .with_context(|| format!("Failed to probe {:?}", input))?;
            println!("{}", serde_json::to_string_pretty(&source)?);
            Ok(true)
        }
        Command::Watch => watch(config).await,
    }
}

fn resolve_config(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            if !default.exists() {
                info!("No configuration file, using defaults");
                return Ok(Config::default());
            }
            default
        }
    };

    info!("Loading configuration from {:?}", path);
    load_config(&path).with_context(|| format!("Failed to load config from {:?}", path))
}

async fn transcode(
    config: Config,
    input: PathBuf,
    output: PathBuf,
    profile: Option<PathBuf>,
    assignments: Vec<String>,
) -> Result<bool> {
    let overrides = load_profile_overrides(profile.as_deref(), &assignments)
        .context("Invalid profile overrides")?;

    let (progress_tx, progress_rx) = mpsc::channel(PROGRESS_BUFFER_SIZE);
    let progress_handle = tokio::spawn(log_progress(progress_rx));

    let mut job = Job::new(&input, config.tools)
        .with_profile_defaults(config.profile)
        .with_progress_listener(progress_tx);

    let cancel = cancel_on_shutdown();
    let ok = job.process(&output, &overrides, &cancel).await;

    let diagnostic = job.diagnostic().map(str::to_string);
    // Closes the progress channel
    drop(job);
    let _ = progress_handle.await;

    if let Some(diagnostic) = diagnostic {
        eprintln!("{}", diagnostic);
    }
    Ok(ok)
}

async fn watch(config: Config) -> Result<bool> {
    let watch_config = config
        .watch
        .ok_or_else(|| anyhow!("No [watch] section in the configuration"))?;

    let mut folder = WatchFolder::new(watch_config, config.tools, config.profile)
        .context("Failed to set up watch folder")?;
    folder.run(&cancel_on_shutdown()).await?;
    Ok(true)
}

async fn log_progress(mut rx: mpsc::Receiver<JobProgress>) {
    let mut next = PROGRESS_LOG_STEP;
    while let Some(progress) = rx.recv().await {
        if progress.percent >= next {
            info!(
                job_id = %progress.job_id,
                frame = progress.frame,
                total_frames = progress.total_frames,
                "{:.0}%",
                progress.percent
            );
            next = (progress.percent / PROGRESS_LOG_STEP).floor() * PROGRESS_LOG_STEP
                + PROGRESS_LOG_STEP;
        }
    }
}

/// A token cancelled on Ctrl+C or SIGTERM.
fn cancel_on_shutdown() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received, cancelling");
        trigger.cancel();
    });
    cancel
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_transcode_with_overrides() {
        let cli = Cli::parse_from([
            "themis",
            "--log-json",
            "transcode",
            "in.mp4",
            "out.mov",
            "--set",
            "width=1280",
            "--set",
            "video_codec=libx264",
        ]);
        assert!(cli.log_json);
        match cli.command {
            Command::Transcode {
                input, assignments, profile, ..
            } => {
                assert_eq!(input, PathBuf::from("in.mp4"));
                assert!(profile.is_none());
                assert_eq!(assignments, vec!["width=1280", "video_codec=libx264"]);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_explicit_missing_config_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(resolve_config(Some(&dir.path().join("missing.toml"))).is_err());
    }
}
