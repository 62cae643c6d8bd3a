use std::sync::Arc;

use anyhow::Context;
use browser_agent::artifacts::{self, ArtifactStore};
use browser_agent::rpc::{self, RpcState};
use browser_agent::{builtin_skills, logging, Config, SessionManager};
use browser_driver::cdp::CdpDriver;
use browser_driver::Driver;
use clap::Parser;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "browser-agent", about = "Browser automation agent", version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    if let Err(err) = run().await {
        error!(target = "agent", error = %format!("{err:#}"), "startup failed");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = Config::from_env();
    info!(
        target = "agent",
        engine = %config.engine,
        headless = config.headless,
        data_dir = %config.data_dir.display(),
        port = config.port,
        artifacts_port = config.artifacts_port,
        "starting browser agent"
    );

    if config.virtual_display && std::env::var("DISPLAY").is_err() {
        // Display bootstrap is the container's job; flag the mismatch early.
        info!(target = "agent", "virtual display requested but DISPLAY is unset");
    }

    let driver: Arc<dyn Driver> = Arc::new(CdpDriver::new());
    let sessions = SessionManager::new(
        driver,
        config.browser_config(),
        config.session_timeout,
        config.sweep_interval,
    );
    sessions.spawn_sweeper().await;

    let artifacts = Arc::new(
        ArtifactStore::new(&config.data_dir).context("failed to create artifact store")?,
    );

    let artifact_base_url = format!("http://localhost:{}", config.artifacts_port);
    let skills = builtin_skills(
        Arc::clone(&sessions),
        Arc::clone(&artifacts),
        artifact_base_url,
    );

    let shutdown = tokio::sync::watch::Sender::new(false);
    let mut artifact_shutdown = shutdown.subscribe();
    let artifact_server = tokio::spawn(artifacts::serve(
        Arc::clone(&artifacts),
        config.artifacts_port,
        async move {
            let _ = artifact_shutdown.changed().await;
        },
    ));

    let state = RpcState {
        skills,
        sessions: Arc::clone(&sessions),
        agent_version: env!("CARGO_PKG_VERSION"),
    };
    let mut rpc_shutdown = shutdown.subscribe();
    let rpc_server = tokio::spawn(rpc::serve(state, config.port, async move {
        let _ = rpc_shutdown.changed().await;
    }));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!(target = "agent", "shutdown signal received");

    let _ = shutdown.send(true);
    sessions.shutdown().await;

    rpc_server.await.context("agent server task panicked")??;
    artifact_server
        .await
        .context("artifact server task panicked")??;

    info!(target = "agent", "shutdown complete");
    Ok(())
}
