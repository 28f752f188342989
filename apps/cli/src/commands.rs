//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use bibliothek_artifacts::{HttpBlobStore, PublishedArtifact};
use bibliothek_changelog::GitHistory;
use bibliothek_core::pipeline::{ProgressReporter, RegisteredBuild};
use bibliothek_shared::{CONFIG_FILE_NAME, load_config};
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Bibliothek: register CI builds in the catalog.
#[derive(Parser)]
#[command(
    name = "bibliothek",
    version,
    about = "Publish build artifacts and record the build in the catalog.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Publish the configured artifacts and insert the build.
    Insert {
        /// Config file (JSON, or TOML with a .toml extension).
        #[arg(short, long, default_value = CONFIG_FILE_NAME)]
        config: PathBuf,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Show resolved configuration with secrets masked.
    Show {
        /// Config file (JSON, or TOML with a .toml extension).
        #[arg(short, long, default_value = CONFIG_FILE_NAME)]
        config: PathBuf,
    },
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "bibliothek=info",
        1 => "bibliothek=debug",
        _ => "bibliothek=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Insert { config } => cmd_insert(&config).await,
        Command::Config { action } => match action {
            ConfigAction::Show { config } => cmd_config_show(&config),
        },
    }
}

async fn cmd_insert(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)
        .wrap_err_with(|| format!("cannot load {}", config_path.display()))?;

    info!(
        project = %config.project_name,
        version = %config.version_name,
        build = config.build_number,
        channel = %config.build_channel,
        "registering build"
    );

    let store = HttpBlobStore::new(
        config.blob_store_url.clone(),
        &config.repo_username,
        &config.repo_password,
    )?;
    let history = GitHistory::new(&config.repository_path);
    let reporter = CliProgress::new();

    let result =
        bibliothek_core::pipeline::register_build(&config, &store, &history, &reporter).await;
    reporter.finish();
    let result = result?;

    // Print summary
    println!();
    println!("  Build recorded successfully!");
    println!("  Build:     {} (#{})", result.build_id, result.number);
    println!("  Project:   {}", result.identity.project_id);
    println!("  Version:   {}", result.identity.version_id);
    println!("  Changes:   {}", result.changes.len());
    println!("  Downloads: {}", result.downloads.len());
    for (artifact_type, artifact) in result.downloads.iter() {
        println!("    {artifact_type}: {} ({})", artifact.name, artifact.sha256);
    }
    println!("  Time:      {:.1}s", result.elapsed.as_secs_f64());
    println!();

    Ok(())
}

fn cmd_config_show(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)
        .wrap_err_with(|| format!("cannot load {}", config_path.display()))?;
    let json = serde_json::to_string_pretty(&config.redacted())?;
    println!("{json}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    /// Clear the spinner whether or not the pipeline succeeded.
    fn finish(&self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn artifact_published(&self, artifact: &PublishedArtifact, current: usize, total: usize) {
        self.spinner.set_message(format!(
            "Published [{current}/{total}] {}",
            artifact.blob_path
        ));
    }

    fn done(&self, _result: &RegisteredBuild) {
        self.spinner.finish_and_clear();
    }
}
