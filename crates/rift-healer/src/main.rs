//! Healing agent CLI.
//!
//! `rift-heal run` drives one end-to-end healing run and streams its state
//! changes; `rift-heal scan` runs the defect scanner over a local directory.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

use rift_healer::config::HealerConfig;
use rift_healer::events::RunEvent;
use rift_healer::scanner::DefectScanner;
use rift_healer::service::HealerService;
use rift_healer::types::{BugCategory, CiStatus, Defect};
use rift_scm::git::GitCli;
use rift_scm::sim::ScriptedCi;
use rift_scm::{CiStatusSource, GitWorkspace};

#[derive(Parser)]
#[command(name = "rift-heal")]
#[command(about = "Autonomous CI/CD healing agent", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (json or text)
    #[arg(long, default_value = "text", global = true)]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    Json,
    #[default]
    Text,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one healing attempt against a repository
    Run {
        /// Repository URL (or owner/repo shorthand)
        #[arg(long)]
        repo_url: String,

        /// Team name used for branch derivation
        #[arg(long)]
        team: String,

        /// Leader name used for branch derivation
        #[arg(long)]
        leader: String,

        /// Override the retry budget
        #[arg(long)]
        max_retries: Option<u32>,

        /// Use a scripted CI source instead of GitHub Actions
        #[arg(long)]
        simulate_ci: bool,
    },
    /// Scan a local directory and report defects without fixing
    Scan {
        /// Directory to scan
        #[arg(long, default_value = ".")]
        path: PathBuf,

        /// Maximum files to scan
        #[arg(long, default_value = "20")]
        max_files: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Run {
            repo_url,
            team,
            leader,
            max_retries,
            simulate_ci,
        } => run_agent(cli.format, &repo_url, &team, &leader, max_retries, simulate_ci).await,
        Commands::Scan { path, max_files } => scan_directory(cli.format, &path, max_files),
    }
}

async fn run_agent(
    format: OutputFormat,
    repo_url: &str,
    team: &str,
    leader: &str,
    max_retries: Option<u32>,
    simulate_ci: bool,
) -> Result<()> {
    let mut config = HealerConfig::from_env();
    if let Some(retries) = max_retries {
        config.max_retries = retries;
    }
    if simulate_ci {
        // Keep demo polls snappy; the scripted source answers immediately.
        config.poller.settle_secs = 0;
        config.poller.interval_secs = 1;
    }

    let service = if simulate_ci {
        let workspace: Arc<dyn GitWorkspace> = Arc::new(
            GitCli::new(config.github_token.clone()).with_clone_timeout(config.clone_timeout_secs),
        );
        let ci: Arc<dyn CiStatusSource> = Arc::new(ScriptedCi::fail_then_pass(1));
        HealerService::new(config, workspace, ci, None)
    } else {
        HealerService::with_defaults(config)
    };

    let mut events = service.subscribe();
    let started = service
        .start_run(repo_url, team, leader)
        .await
        .context("failed to start run")?;

    println!(
        "{} run {} on branch {}",
        "started".green().bold(),
        started.run_id.bold(),
        started.branch_name.cyan()
    );

    // Follow the run's events until it reaches a terminal state.
    loop {
        match events.recv().await {
            Ok(event) => {
                if event.run_id() != started.run_id {
                    continue;
                }
                if let RunEvent::StatusChanged { status, .. } = &event {
                    println!("  {} {:?}", "->".dimmed(), status);
                }
                if event.is_terminal() {
                    break;
                }
            }
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => break,
        }
    }

    let run = service
        .get_run(&started.run_id)
        .await
        .context("run vanished from the registry")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&run)?),
        OutputFormat::Text => print_run_summary(&run),
    }

    Ok(())
}

fn print_run_summary(run: &rift_healer::types::Run) {
    println!();
    println!("{}", "=== Run Summary ===".bold());
    println!("run id:     {}", run.run_id);
    println!("branch:     {}", run.branch_name);
    println!("status:     {:?}", run.status);
    println!("iterations: {}", run.iterations);
    println!("fixes:      {}", run.total_fixes);

    let ci = match run.final_ci_status {
        Some(CiStatus::Passed) => "PASSED".green().to_string(),
        Some(status) => format!("{status:?}").to_uppercase().red().to_string(),
        None => "UNKNOWN".to_string(),
    };
    println!("final CI:   {ci}");

    if let Some(score) = &run.score {
        println!(
            "score:      {} (base {} + speed {} - penalty {})",
            score.final_score.to_string().bold(),
            score.base,
            score.speed_bonus,
            score.efficiency_penalty
        );
    }
    if let Some(error) = &run.error {
        println!("error:      {}", error.red());
    }
}

fn scan_directory(format: OutputFormat, path: &Path, max_files: usize) -> Result<()> {
    let scanner = DefectScanner::new();
    let mut defects: Vec<Defect> = Vec::new();

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(path)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "py"))
        .map(walkdir::DirEntry::into_path)
        .collect();
    files.sort();
    files.truncate(max_files);

    for file in &files {
        let Ok(content) = std::fs::read_to_string(file) else {
            continue;
        };
        let rel = file
            .strip_prefix(path)
            .unwrap_or(file)
            .to_string_lossy()
            .replace('\\', "/");
        defects.extend(scanner.scan(&rel, &content));
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&defects)?),
        OutputFormat::Text => {
            if defects.is_empty() {
                println!("{}", "no defects found".green());
            }
            for defect in &defects {
                println!(
                    "{}:{} {} {}",
                    defect.file,
                    defect.line_number,
                    category_label(defect.category),
                    defect.description
                );
            }
            println!("\n{} defect(s) in {} file(s)", defects.len(), files.len());
        }
    }

    Ok(())
}

fn category_label(category: BugCategory) -> String {
    let label = category.as_str();
    match category {
        BugCategory::Syntax | BugCategory::TypeError => label.red().to_string(),
        BugCategory::Logic => label.yellow().to_string(),
        _ => label.cyan().to_string(),
    }
}
