//! `ucf-sanitizer` command-line entry point.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use clap::{Args, Parser, Subcommand};
use tokio::io::AsyncReadExt;
use tokio::sync::oneshot;
use tracing_subscriber::EnvFilter;

use ucf_content_sanitizer::{
    BatchDriver, BatchProgress, BatchRunResult, Context, FeatureFlags, FsRepository,
    RecordOutcome, RecordStatus, SaveHook, Settings, sanitize,
};

/// Unwrap Postmaster and Outlook Safelinks redirects in post content.
#[derive(Parser, Debug)]
#[command(name = "ucf-sanitizer", version, about, arg_required_else_help = true)]
struct Cli {
    /// TOML settings file, layered over the defaults and under UCF_SANITIZER_* variables.
    #[arg(long, short = 'c', value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Bulk sanitization tasks over the content repository.
    #[command(subcommand)]
    Sanitize(SanitizeCommand),

    /// Run the save-time filter over FILE (or stdin) and print the result.
    FilterSave {
        /// Content type of the record being saved.
        #[arg(long = "type", value_name = "TYPE", default_value = "post")]
        post_type: String,

        input: Option<PathBuf>,
    },

    /// Run the paste filter over FILE (or stdin) and print the result.
    FilterPaste { input: Option<PathBuf> },
}

#[derive(Subcommand, Debug)]
enum SanitizeCommand {
    /// Unwrap redirector links in every eligible record.
    Content(RepoArgs),

    /// Run every sanitization task.
    All(RepoArgs),
}

#[derive(Args, Debug)]
struct RepoArgs {
    /// Directory holding one `<id>.json` file per record.
    #[arg(long, value_name = "DIR", env = "UCF_SANITIZER_REPO")]
    repo: PathBuf,
}

/// Logs progress every `every` records.
struct LogProgress {
    total: usize,
    done: usize,
    every: usize,
}

impl LogProgress {
    fn new(every: usize) -> Self {
        Self {
            total: 0,
            done: 0,
            every: every.max(1),
        }
    }
}

impl BatchProgress for LogProgress {
    fn start(&mut self, total: usize) {
        self.total = total;
        tracing::info!("Updating post content... (0/{total})");
    }

    fn tick(&mut self, outcome: &RecordOutcome) {
        self.done += 1;
        if let RecordStatus::Failed(reason) = &outcome.status {
            tracing::warn!(id = %outcome.id, "Could not update post: {reason}");
        }
        if self.done % self.every == 0 && self.done < self.total {
            tracing::info!("Updating post content... ({}/{})", self.done, self.total);
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn read_input(input: Option<&Path>) -> Result<String> {
    match input {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("Failed to read stdin")?;
            Ok(buf)
        }
    }
}

async fn sanitize_content(settings: &Settings, args: &RepoArgs) -> Result<BatchRunResult> {
    let repository = FsRepository::new(&args.repo);
    let flags = FeatureFlags::resolve(settings, Context::Batch);

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(());
        }
    });

    let result = BatchDriver::new(&repository, flags)
        .enabled_types(settings.enabled_post_types.iter().cloned())
        .progress(LogProgress::new(100))
        .shutdown(shutdown_rx)
        .run()
        .await
        .with_context(|| format!("Failed to load posts from {}", args.repo.display()))?;

    if result.interrupted {
        tracing::warn!(
            "Interrupted after {} of {} posts",
            result.total_examined,
            result.snapshot_size
        );
    }
    let failed: Vec<&str> = result.failed().collect();
    if !failed.is_empty() {
        tracing::warn!("Posts that could not be updated: {}", failed.join(", "));
    }

    println!("Success: {result}");
    Ok(result)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = Settings::load(cli.config.as_deref()).context("Failed to load settings")?;

    match &cli.command {
        Commands::Sanitize(SanitizeCommand::Content(args)) => {
            sanitize_content(&settings, args).await?;
        }
        Commands::Sanitize(SanitizeCommand::All(args)) => {
            sanitize_content(&settings, args).await?;
            println!("Success: Finished running all tasks.");
        }
        Commands::FilterSave { post_type, input } => {
            let body = read_input(input.as_deref()).await?;
            let hook = SaveHook::from_settings(&settings);
            print!("{}", hook.filter_content(post_type, &body));
        }
        Commands::FilterPaste { input } => {
            let body = read_input(input.as_deref()).await?;
            let flags = FeatureFlags::resolve(&settings, Context::Paste);
            print!("{}", sanitize(&body, &flags, Context::Paste));
        }
    }

    Ok(())
}
