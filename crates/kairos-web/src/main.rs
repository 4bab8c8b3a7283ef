//! Kairos agent with its REST surface.
//!
//! Runs the same pipeline as `kairos run` and serves the agent's state on
//! the configured port until Ctrl-C.
//!
//! # Usage
//!
//! ```bash
//! cargo run -p kairos-web -- --demo --window-secs 60
//! cargo run -p kairos-web -- --port 8080 --goals coding,writing < samples.jsonl
//! curl http://127.0.0.1:3001/api/decision
//! ```

use clap::Parser;
use kairos::cli::{ConfigArgs, init_tracing};
use kairos::prelude::*;
use kairos_web::{WebConfig, spawn_web};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Kairos agent with a read-only REST API.
#[derive(Parser)]
#[command(name = "kairos-web", version)]
struct Args {
    #[command(flatten)]
    config: ConfigArgs,

    /// Port for the REST API.
    #[arg(long, default_value_t = 3001)]
    port: u16,

    /// Use the scripted demo source instead of stdin.
    #[arg(long, env = "KAIROS_DEMO")]
    demo: bool,
}

#[tokio::main]
async fn main() -> Result<(), String> {
    let args = Args::parse();
    init_tracing();

    // 1. Resolve and validate configuration before anything starts.
    let config = args.config.resolve().map_err(|e| e.to_string())?;

    // 2. Shared store: written by the agent, read by the API.
    let store = AgentStateStore::new(config.timeline_capacity);
    let cancel = CancellationToken::new();

    // 3. REST API.
    let web_config = WebConfig {
        bind_addr: ([127, 0, 0, 1], args.port).into(),
    };
    let addr = spawn_web(store.clone(), web_config, cancel.clone()).await?;
    println!("Kairos API: http://{addr}/api/state");

    // 4. Agent pipeline.
    let agent = Agent::new(config, store)
        .map_err(|e| e.to_string())?
        .with_event_handler(LoggingHandler);
    let source = if args.demo {
        SampleSource::demo()
    } else {
        SampleSource::Stdin
    };
    let handles = spawn_pipeline(agent, source, cancel.clone());

    // 5. Run until Ctrl-C.
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("failed to listen for Ctrl-C: {e}"))?;
    info!("Shutting down");
    cancel.cancel();

    for handle in handles {
        if let Err(e) = handle.await {
            warn!("Task ended abnormally: {e}");
        }
    }
    if source == SampleSource::Stdin {
        // A pending blocking stdin read would hold the runtime open until the next line.
        std::process::exit(0);
    }
    Ok(())
}
