use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use credit_manager::config::{CreditsConfig, StoreBackend};
use credit_manager::store::{BalanceStore, InMemoryStore};
use credit_manager::{CreditManager, RegulatedResource, StaticResource};

#[derive(Debug, Parser)]
#[command(name = "credit-manager", version, about = "Spend and inspect per-minute credit balances")]
struct Cli {
    /// Configuration file (YAML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, clap::Args)]
struct ResourceArgs {
    /// Resource identity shared by every process limiting the same resource
    #[arg(long)]
    id: String,

    /// Credits the resource may spend per minute
    #[arg(long)]
    quota: i64,

    /// Type tag used when deriving the balance key
    #[arg(long, default_value = "cli")]
    tag: String,
}

impl ResourceArgs {
    fn resource(&self) -> StaticResource {
        StaticResource::new(self.id.as_str(), self.quota).with_tag(self.tag.as_str())
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Spend credits, waiting for replenishment when the balance is short
    Spend {
        #[command(flatten)]
        resource: ResourceArgs,

        /// Credits to spend per request
        #[arg(long)]
        credits: i64,

        /// Number of requests to make
        #[arg(long, default_value_t = 1)]
        repeat: u32,
    },
    /// Print the current, replenished balance
    Balance {
        #[command(flatten)]
        resource: ResourceArgs,

        /// Print JSON instead of plain text
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let config = CreditsConfig::load(cli.config.as_deref())?;
    info!(
        backend = ?config.store.backend,
        key_prefix = %config.manager.key_prefix,
        "Configuration loaded"
    );

    let store = open_store(&config).await?;
    let manager = CreditManager::with_config(store, config.manager.clone());

    match cli.command {
        Command::Spend {
            resource,
            credits,
            repeat,
        } => {
            let resource = register(&manager, &resource)?;
            tokio::select! {
                result = spend(&manager, &resource, credits, repeat) => result?,
                received = interrupted() => {
                    // Dropping the spend future abandons any wait before its debit is written.
                    let received = received?;
                    info!(signal = received, "Spend cancelled, pending debit not written");
                }
            }
        }
        Command::Balance { resource, json } => {
            let resource = register(&manager, &resource)?;
            let balance = manager.retrieve_balance(&resource).await?;
            if json {
                let output = serde_json::json!({
                    "resource": resource.resource_id(),
                    "quota": resource.credits_per_minute(),
                    "balance": balance,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                println!("{}", balance);
            }
        }
    }

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn open_store(config: &CreditsConfig) -> anyhow::Result<Arc<dyn BalanceStore>> {
    match config.store.backend {
        StoreBackend::Memory => Ok(Arc::new(InMemoryStore::new())),
        #[cfg(feature = "redis")]
        StoreBackend::Redis => {
            let store = credit_manager::store::RedisStore::connect(&config.store.redis_url).await?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "redis"))]
        StoreBackend::Redis => {
            anyhow::bail!("the redis store backend requires building with the `redis` feature")
        }
    }
}

fn register(manager: &CreditManager, args: &ResourceArgs) -> anyhow::Result<StaticResource> {
    let resource = args.resource();
    if !manager.register(&resource) {
        anyhow::bail!("quota must be at least 1 credit per minute, got {}", args.quota);
    }
    Ok(resource)
}

async fn spend(
    manager: &CreditManager,
    resource: &StaticResource,
    credits: i64,
    repeat: u32,
) -> anyhow::Result<()> {
    for request in 1..=repeat {
        manager.spend_credits(resource, credits).await?;
        let balance = manager.retrieve_balance(resource).await?;
        info!(request = request, credits = credits, balance = balance, "Credits spent");
    }
    Ok(())
}

/// Resolve with the name of the signal that interrupted a spend.
#[cfg(unix)]
async fn interrupted() -> std::io::Result<&'static str> {
    let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())?;
    tokio::select! {
        result = signal::ctrl_c() => result.map(|_| "Ctrl+C"),
        _ = terminate.recv() => Ok("SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn interrupted() -> std::io::Result<&'static str> {
    signal::ctrl_c().await.map(|_| "Ctrl+C")
}
