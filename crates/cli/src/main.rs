use anyhow::{Context, Result};
use berth_core::{AgentConfig, FileConfigLoader, FileServerConfigStore, DEFAULT_CONFIG_PATH};
use clap::{Parser, Subcommand};
use events::{EventBus, EventEnvelope};
use orchestrator::{Collaborators, HostResources, RunOutcome, Sequencer, StartOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "berth")]
#[command(about = "Start the workload container and report its status", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log at debug level unless RUST_LOG is set
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Bring the workload up and wait for it to complete
    Start {
        /// Identity provider (aws, alicloud)
        #[arg(long)]
        provider: String,

        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,

        /// Name of the server configuration to fetch
        #[arg(long = "serverconfig")]
        server_config: String,
    },
    /// Show the server configuration persisted by the last start
    Status {
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    match cli.command {
        Commands::Start {
            provider,
            config,
            server_config,
        } => {
            start(StartOptions {
                provider,
                config_path: config,
                server_config_name: server_config,
            })
            .await
        }
        Commands::Status { config } => status(&config).await,
    }
}

async fn start(options: StartOptions) -> Result<()> {
    let collaborators = Collaborators {
        identity: Arc::new(host::MetadataIdentity::new()),
        config_loader: Arc::new(FileConfigLoader),
        connector: Arc::new(api::HttpConnector::new()),
        runtime: Arc::new(runtime::DockerCli::new()),
        logins: Arc::new(host::LocalUsers::new()),
        resources: Arc::new(HostResources),
    };
    let bus = EventBus::new();
    let event_log = tokio::spawn(log_events(bus.subscribe()));
    let sequencer = Sequencer::new(collaborators).with_events(bus);

    let result = sequencer.run(&options).await;
    // Closing the last sender lets the log drain and stop.
    drop(sequencer);
    let _ = event_log.await;

    let outcome =
        result.with_context(|| format!("Start of '{}' failed", options.server_config_name))?;

    match outcome {
        RunOutcome::Completed => tracing::info!("Workload is up"),
        RunOutcome::TimedOut => {
            tracing::warn!("Workload did not complete before the deadline")
        }
    }
    Ok(())
}

/// Log every envelope on the bus at debug level until it closes.
async fn log_events(mut rx: broadcast::Receiver<EventEnvelope>) -> usize {
    let mut logged = 0;
    loop {
        match rx.recv().await {
            Ok(envelope) => {
                logged += 1;
                match serde_json::to_string(&envelope.event) {
                    Ok(event) => tracing::debug!(seq = envelope.seq, %event, "Event"),
                    Err(e) => tracing::debug!(seq = envelope.seq, error = %e, "Unserializable event"),
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Event log fell behind");
            }
            Err(broadcast::error::RecvError::Closed) => return logged,
        }
    }
}

async fn status(config_path: &Path) -> Result<()> {
    let config = AgentConfig::load_from_file(config_path)
        .await
        .context("Failed to load agent config")?;
    let store = FileServerConfigStore::new(&config.server_config_path);

    match store.read().await.context("Failed to read server config")? {
        Some(server) => {
            println!("Server config: {}", store.path().display());
            println!("  image:   {}", server.image);
            println!("  updated: {}", server.updated);
            println!("  ports:   {:?}", server.ports);
            println!("  users:   {}", server.users.len());
            println!();
            println!("{}", serde_json::to_string_pretty(&server)?);
        }
        None => println!("No server config at {}", store.path().display()),
    }
    Ok(())
}

fn init_tracing(debug: bool) {
    let default_filter = if debug {
        "berth=debug,orchestrator=debug,api=debug,runtime=debug,host=debug,vcs=debug"
    } else {
        "berth=info,orchestrator=info,api=info,runtime=info,host=info,vcs=info"
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();
}
