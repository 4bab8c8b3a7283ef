//! Kairos command-line agent.
//!
//! Reads foreground-window samples as JSON lines on stdin (or plays a
//! scripted demo), decides each window, and prints nudges to stdout. Logs
//! go to stderr.
//!
//! # Examples
//!
//! ```sh
//! # Scripted demo with one-minute windows
//! kairos run --demo --window-secs 60
//!
//! # Pipe samples from a poller
//! my-poller | kairos run --goals coding,writing
//!
//! # Decide one saved summary without running the loop
//! kairos classify --summary window.json
//!
//! # Check a live backend
//! kairos probe --oracle-mode live --oracle-url http://localhost:8080
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use kairos::activity::ActivitySummary;
use kairos::cli::{ConfigArgs, init_tracing};
use kairos::oracle::{HttpOracle, local_decision};
use kairos::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Intent-aware focus agent.
#[derive(Parser)]
#[command(name = "kairos", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the agent until Ctrl-C.
    Run {
        #[command(flatten)]
        config: ConfigArgs,

        /// Use the scripted demo source instead of stdin.
        #[arg(long, env = "KAIROS_DEMO")]
        demo: bool,
    },
    /// Classify a saved activity summary and print the local decision.
    Classify {
        #[command(flatten)]
        config: ConfigArgs,

        /// Path to an ActivitySummary JSON file.
        #[arg(long)]
        summary: PathBuf,
    },
    /// Check that the live decision backend is reachable.
    Probe {
        #[command(flatten)]
        config: ConfigArgs,
    },
}

#[tokio::main]
async fn main() -> Result<(), String> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Command::Run { config, demo } => run(config, demo).await,
        Command::Classify { config, summary } => classify(config, summary),
        Command::Probe { config } => probe(config).await,
    }
}

async fn run(args: ConfigArgs, demo: bool) -> Result<(), String> {
    let config = args.resolve().map_err(|e| e.to_string())?;
    let store = AgentStateStore::new(config.timeline_capacity);

    let console = FnEventHandler::new(|event| {
        if let AgentEvent::Nudge { message, record } = event {
            println!(
                "[{}] {message}",
                record.decision.timestamp.with_timezone(&chrono::Local).format("%H:%M")
            );
        }
    });
    let handler = CompositeEventHandler::new()
        .with(LoggingHandler)
        .with(console);

    let agent = Agent::new(config, store)
        .map_err(|e| e.to_string())?
        .with_event_handler(handler);

    let source = if demo {
        SampleSource::demo()
    } else {
        SampleSource::Stdin
    };
    info!("Kairos running ({source:?}); press Ctrl-C to stop");

    let cancel = CancellationToken::new();
    let handles = spawn_pipeline(agent, source, cancel.clone());

    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl-C: {e}");
                return;
            }
            info!("Shutting down");
            cancel.cancel();
        }
    });

    for joined in futures::future::join_all(handles).await {
        if let Err(e) = joined {
            warn!("Task ended abnormally: {e}");
        }
    }
    if source == SampleSource::Stdin {
        // A pending blocking stdin read would hold the runtime open until the next line.
        std::process::exit(0);
    }
    Ok(())
}

fn classify(args: ConfigArgs, path: PathBuf) -> Result<(), String> {
    let config = args.resolve().map_err(|e| e.to_string())?;
    let content = std::fs::read_to_string(&path)
        .map_err(|e| format!("failed to read '{}': {e}", path.display()))?;
    let summary: ActivitySummary = serde_json::from_str(&content)
        .map_err(|e| format!("failed to parse '{}': {e}", path.display()))?;
    summary
        .validate()
        .map_err(|e| format!("invalid summary '{}': {e}", path.display()))?;

    let classification = config.classifier().classify(&summary, &config.goals);
    let decision = local_decision(
        &classification,
        &config.goals,
        config.nudge_confidence_threshold,
        summary.period_end,
    );

    let output = serde_json::json!({
        "focus_context": summary.focus_context(),
        "classification": classification,
        "decision": decision,
    });
    let text = serde_json::to_string_pretty(&output).map_err(|e| e.to_string())?;
    println!("{text}");
    Ok(())
}

async fn probe(args: ConfigArgs) -> Result<(), String> {
    let config = args.resolve().map_err(|e| e.to_string())?;
    if config.oracle_mode != OracleMode::Live {
        println!(
            "Oracle mode is '{}'; nothing to probe. Pass --oracle-mode live.",
            config.oracle_mode
        );
        return Ok(());
    }

    let oracle = HttpOracle::new(&config.oracle_endpoint, config.oracle_timeout)?;
    let health = oracle
        .probe()
        .await
        .map_err(|e| format!("{} is unhealthy: {e}", oracle.endpoint()))?;
    println!("{} is healthy: {health}", oracle.endpoint());
    Ok(())
}
