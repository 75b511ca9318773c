//! repotidy - CLI entry point.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dialoguer::Confirm;
use tokio::sync::mpsc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use repotidy::assistant::{Assistant, CommandTransport};
use repotidy::autocommit::{AutoCommitter, AutocommitOutcome};
use repotidy::config::Settings;
use repotidy::git::GitRepo;
use repotidy::monitor::{self, Advisory};
use repotidy::waiter::SignalBus;

/// Intent-grouped autocommits and file size advisories.
#[derive(Parser, Debug)]
#[command(name = "repotidy")]
#[command(about = "Intent-grouped autocommits and file size advisories")]
#[command(version)]
struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Run as if started in this directory
    #[arg(short = 'C', long = "dir", global = true, default_value = ".")]
    dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stage and commit every pending change
    Commit {
        /// Use this commit message instead of generating one
        #[arg(short, long)]
        message: Option<String>,

        /// Skip the assistant and use the synthesized message
        #[arg(long)]
        no_assistant: bool,
    },

    /// Show how pending changes would be grouped, without committing
    Classify {
        /// Print the groups as JSON
        #[arg(long)]
        json: bool,
    },

    /// Watch source files and report the ones over the line threshold
    Watch {
        /// Line threshold (overrides settings)
        #[arg(long)]
        threshold: Option<usize>,

        /// Offer an assistant analysis for each oversized file
        #[arg(long)]
        analyze: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let workdir = cli
        .dir
        .canonicalize()
        .with_context(|| format!("Directory {} does not exist", cli.dir.display()))?;
    let mut settings = Settings::load(&workdir).context("Failed to load settings")?;

    match cli.command {
        Command::Commit {
            message,
            no_assistant,
        } => {
            if no_assistant {
                settings.assistant = None;
            }
            run_commit(&workdir, &settings, message.as_deref()).await
        }
        Command::Classify { json } => run_classify(&workdir, &settings, json).await,
        Command::Watch { threshold, analyze } => {
            if let Some(threshold) = threshold {
                settings.threshold = threshold;
            }
            run_watch(&workdir, &settings, analyze).await
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Build the assistant client, or `None` when unconfigured or not installed.
fn build_assistant(settings: &Settings) -> Option<Assistant> {
    let command_line = settings.assistant.as_deref()?;
    let bus = SignalBus::default();

    let transport = match CommandTransport::new(command_line, bus.clone()) {
        Ok(transport) => transport,
        Err(e) => {
            warn!("Ignoring assistant '{}': {}", command_line, e);
            return None;
        }
    };

    if let Err(e) = transport.check_installed() {
        warn!("{}. Continuing without assistant.", e);
        return None;
    }

    Some(Assistant::new(
        Arc::new(transport),
        bus,
        settings.response_marker.clone(),
        settings.request_timeouts(),
    ))
}

async fn run_commit(workdir: &Path, settings: &Settings, message: Option<&str>) -> Result<()> {
    let committer = AutoCommitter::open(workdir, settings.author.clone(), build_assistant(settings))
        .context("Failed to open repository")?;

    match committer.autocommit(message).await.context("Commit failed")? {
        AutocommitOutcome::Committed {
            id,
            message,
            source,
            files,
        } => {
            let short = id.get(..7).unwrap_or(&id);
            println!("✓ Committed {} ({} files, {} message)", short, files, source);
            println!();
            println!("{}", message);
        }
        AutocommitOutcome::NothingToCommit => println!("Nothing to commit."),
    }

    Ok(())
}

async fn run_classify(workdir: &Path, settings: &Settings, json: bool) -> Result<()> {
    let repo = GitRepo::open(workdir)
        .context("Not a git repository. Run repotidy commit once to create one.")?
        .with_identity(settings.author.clone());
    let preview = AutoCommitter::with_repo(repo, None)
        .preview()
        .await
        .context("Failed to read repository status")?;

    if json {
        let rendered = serde_json::to_string_pretty(&preview.groups)
            .context("Failed to serialize classification")?;
        println!("{}", rendered);
    } else if preview.groups.is_empty() {
        println!("No pending changes.");
    } else {
        println!("{}", preview.message);
    }

    if preview.skipped > 0 {
        eprintln!("Warning: {} status entries could not be read", preview.skipped);
    }

    Ok(())
}

async fn run_watch(workdir: &Path, settings: &Settings, analyze: bool) -> Result<()> {
    let monitor = settings.monitor().with_root(workdir);
    let assistant = if analyze { build_assistant(settings) } else { None };
    if analyze && assistant.is_none() {
        eprintln!("Warning: no assistant available, analysis disabled.");
    }

    let (_watcher, events) = monitor::watch(workdir).context("Failed to start file watcher")?;
    let (sink, mut advisories) = mpsc::unbounded_channel();

    println!(
        "Watching {} for files over {} lines (Ctrl-C to stop)...",
        workdir.display(),
        monitor.threshold()
    );
    tokio::spawn(async move { monitor.run(events, sink).await });

    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);

    loop {
        tokio::select! {
            advisory = advisories.recv() => match advisory {
                Some(advisory) => {
                    let report = report_advisory(&advisory, assistant.as_ref());
                    if until_interrupted(report, &mut interrupt).await.is_none() {
                        break;
                    }
                }
                None => break,
            },
            _ = &mut interrupt => break,
        }
    }

    Ok(())
}

/// Drive `work` to completion unless `interrupt` fires first.
async fn until_interrupted<T, I>(work: impl Future<Output = T>, interrupt: I) -> Option<T>
where
    I: Future,
{
    tokio::select! {
        output = work => Some(output),
        _ = interrupt => None,
    }
}

async fn report_advisory(advisory: &Advisory, assistant: Option<&Assistant>) {
    println!("⚠ {}", advisory.summary());

    let Some(assistant) = assistant else {
        return;
    };

    let prompt = format!("Ask the assistant for refactoring advice on {}?", advisory.file_name);
    let confirmed = tokio::task::spawn_blocking(move || {
        Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .unwrap_or(false)
    })
    .await
    .unwrap_or(false);

    if !confirmed {
        return;
    }

    let content = match tokio::fs::read_to_string(&advisory.path).await {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Warning: could not read {}: {}", advisory.path.display(), e);
            return;
        }
    };

    println!("Analyzing {}...", advisory.file_name);
    match assistant.analyze(&advisory.file_name, &content).await {
        Ok(analysis) => println!("\n{}\n", analysis),
        Err(e) => eprintln!("Warning: analysis unavailable: {}", e),
    }
}
