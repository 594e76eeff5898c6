//! Medic CLI
//!
//! Drives the remediation engine from a terminal: open an investigation,
//! approve or cancel a parked session, inspect stored sessions.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;

use medic::{
    AnthropicProvider, ExecutionMode, FileSessionStore, KubectlExecutor, MedicConfig,
    RemediateRequest, RemediationOrchestrator, RiskLevel, SessionStore,
};
use runner::LocalShell;

/// AI-assisted cluster remediation
#[derive(Parser)]
#[command(name = "medic")]
#[command(about = "AI-assisted cluster remediation - investigate symptoms, gate and execute fixes")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to medic-config.json
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Investigate a symptom and propose (or run) a fix
    Investigate {
        /// Natural-language symptom description
        #[arg(long)]
        issue: String,

        /// Approval mode
        #[arg(long, default_value = "manual")]
        mode: String,

        /// Confidence required for unattended execution
        #[arg(long)]
        confidence_threshold: Option<f64>,

        /// Highest risk allowed for unattended execution
        #[arg(long)]
        max_risk: Option<String>,
    },
    /// Approve a session that is awaiting a choice
    Approve {
        /// Session identifier from a prior investigate call
        #[arg(long)]
        session: String,

        /// 1 = execute now, 2 = print the commands to run yourself
        #[arg(long)]
        choice: u8,
    },
    /// Cancel a session that is awaiting approval
    Cancel {
        /// Session identifier
        #[arg(long)]
        session: String,
    },
    /// Print a stored session record
    Show {
        /// Session identifier
        #[arg(long)]
        session: String,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<MedicConfig> {
    match path {
        Some(path) => {
            MedicConfig::load(path).with_context(|| format!("loading {}", path.display()))
        }
        None => Ok(MedicConfig::from_env()),
    }
}

fn build_orchestrator(config: MedicConfig) -> RemediationOrchestrator {
    RemediationOrchestrator::new(
        Arc::new(FileSessionStore::new(&config.session_dir)),
        Arc::new(AnthropicProvider::from_env()),
        Arc::new(KubectlExecutor::new()),
        Arc::new(LocalShell::new()),
        config,
    )
}

fn print_response(response: &serde_json::Value) -> Result<()> {
    let status = response
        .get("status")
        .and_then(serde_json::Value::as_str)
        .unwrap_or("unknown");
    let line = format!("status: {status}");
    match status {
        "executed_successfully" | "success" => println!("{}", line.green()),
        "awaiting_user_approval" | "delegated" => println!("{}", line.yellow()),
        _ => println!("{}", line.red()),
    }
    println!("{}", serde_json::to_string_pretty(response)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing if verbose
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("medic=debug,runner=debug")
            .init();
    }

    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Investigate {
            issue,
            mode,
            confidence_threshold,
            max_risk,
        } => {
            let mode: ExecutionMode = mode.parse().context("invalid --mode")?;
            let max_risk_level: Option<RiskLevel> = max_risk
                .as_deref()
                .map(str::parse)
                .transpose()
                .context("invalid --max-risk")?;

            let orchestrator = build_orchestrator(config);
            let response = orchestrator
                .handle(RemediateRequest {
                    issue: Some(issue),
                    mode: Some(mode),
                    confidence_threshold,
                    max_risk_level,
                    ..RemediateRequest::default()
                })
                .await
                .context("remediation failed")?;
            print_response(&response)?;
        }
        Commands::Approve { session, choice } => {
            let orchestrator = build_orchestrator(config);
            let response = orchestrator
                .handle(RemediateRequest {
                    execute_choice: Some(choice),
                    session_id: Some(session),
                    ..RemediateRequest::default()
                })
                .await
                .context("approval failed")?;
            print_response(&response)?;
        }
        Commands::Cancel { session } => {
            let orchestrator = build_orchestrator(config);
            let response = orchestrator
                .cancel(&session)
                .await
                .context("cancel failed")?;
            print_response(&response)?;
        }
        Commands::Show { session } => {
            let store = FileSessionStore::new(&config.session_dir);
            let record = store
                .read(&session)
                .await
                .context("could not load session")?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
    }

    Ok(())
}
