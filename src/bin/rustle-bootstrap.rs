use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rustle_bootstrap::config::{load_cluster_spec, validate};
use rustle_bootstrap::connection::{connect, Canceller};
use rustle_bootstrap::phase::{default_phases, Manager, ManagerConfig};
use rustle_bootstrap::types::Cluster;
use std::path::PathBuf;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "rustle-bootstrap")]
#[command(about = "Bootstrap k0s clusters over SSH")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct RustleBootstrapCli {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Run the bootstrap pipeline against every host in the cluster file
    Apply {
        /// Cluster file (YAML or JSON)
        #[arg(short, long, default_value = "cluster.yaml")]
        config: PathBuf,

        /// Maximum number of hosts worked on at once
        #[arg(long)]
        concurrency: Option<usize>,

        /// Print the final host report as JSON
        #[arg(long)]
        report: bool,
    },

    /// Load and check a cluster file without contacting any host
    Check {
        /// Cluster file (YAML or JSON)
        #[arg(short, long, default_value = "cluster.yaml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = RustleBootstrapCli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt().with_max_level(level).init();

    info!("Starting rustle-bootstrap v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Apply {
            config,
            concurrency,
            report,
        } => run_apply(config, concurrency, report).await,
        Command::Check { config } => run_check(config).await,
    }
}

async fn run_check(config: PathBuf) -> Result<()> {
    let spec = load_cluster_spec(&config)
        .await
        .with_context(|| format!("loading {}", config.display()))?;
    let version = validate(&spec)?;

    println!("✅ {} is valid", config.display());
    println!("  version: {version}");
    for host in &spec.hosts {
        println!("  - {}@{}:{}", host.user, host.address, host.port);
    }

    Ok(())
}

async fn run_apply(config: PathBuf, concurrency: Option<usize>, report: bool) -> Result<()> {
    let spec = load_cluster_spec(&config)
        .await
        .with_context(|| format!("loading {}", config.display()))?;

    let (canceller, signal) = Canceller::new();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing running commands");
            canceller.cancel();
        }
    });

    let mut cluster = Cluster::from_spec(&spec, connect, signal.clone())?;
    info!(
        "Bootstrapping {} host(s) to {}",
        cluster.hosts.len(),
        cluster.version
    );

    let mut manager = Manager::new(ManagerConfig { concurrency }).with_cancel(signal);
    manager.add_phases(default_phases());

    let result = manager.run(&mut cluster).await;

    if report {
        println!("{}", serde_json::to_string_pretty(&cluster.report())?);
    }

    match result {
        Ok(()) => {
            info!("Cluster is ready");
            Ok(())
        }
        Err(e) => {
            error!("Bootstrap failed: {}", e);
            Err(e.into())
        }
    }
}
