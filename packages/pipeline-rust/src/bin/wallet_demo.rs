//! Wallet demo: runs wallet operations through the full interceptor pipeline.
//!
//! # Usage
//!
//! ```bash
//! wallet-demo withdraw --account joey --amount 1000 --banking-account 919
//! wallet-demo --caller-id Kyo --caller-role guest store-value --banking-account 919 --amount 80 --account joey
//! wallet-demo create-guid --name Joey --seed 91 --repeat 3
//! wallet-demo --manifest wallet.json --json-logs scenario
//! ```
//!
//! Log verbosity follows `RUST_LOG` (default `info`).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use cutpoint_core::{MetadataRegistry, Principal};
use cutpoint_pipeline::adapters::{
    LoggingTransactionManager, StaticCallerContext, TracingInvocationLog, TracingNotifier,
};
use cutpoint_pipeline::cache::{CacheStore, CacheSweeper, InMemoryCacheStore};
use cutpoint_pipeline::service::domain::{
    register_wallet_operations, wallet_metadata, ConsoleBankingAccount, ConsoleWalletRepo,
    FixedFee, Wallet, WalletClient,
};
use cutpoint_pipeline::service::{
    build_interceptor_pipeline, Dispatcher, OperationRouter, PipelineConfig, PipelineDeps,
};
use tracing::{error, info, info_span, Instrument};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "wallet-demo")]
#[command(about = "Run wallet operations through the cutpoint interceptor pipeline")]
struct Args {
    /// Id of the caller every operation runs on behalf of
    #[arg(long, env = "CUTPOINT_CALLER_ID", default_value = "joey")]
    caller_id: String,

    /// Role of the caller, checked against `authorized` markers
    #[arg(long, env = "CUTPOINT_CALLER_ROLE", default_value = "member")]
    caller_role: String,

    /// JSON metadata manifest; defaults to the built-in wallet declarations
    #[arg(long, env = "CUTPOINT_MANIFEST")]
    manifest: Option<PathBuf>,

    /// JSON pipeline configuration file
    #[arg(long, env = "CUTPOINT_CONFIG")]
    config: Option<PathBuf>,

    /// Interval between cache sweeps in milliseconds (overrides the config file)
    #[arg(long, env = "CUTPOINT_CACHE_SWEEP_INTERVAL_MS")]
    sweep_interval_ms: Option<u64>,

    /// Emit logs as JSON lines
    #[arg(long, env = "CUTPOINT_JSON_LOGS")]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Pay out of a wallet into a banking account
    Withdraw {
        #[arg(long)]
        account: String,
        #[arg(long)]
        amount: i64,
        #[arg(long)]
        banking_account: String,
    },
    /// Top up a wallet from a banking account
    StoreValue {
        #[arg(long)]
        banking_account: String,
        #[arg(long)]
        amount: i64,
        #[arg(long)]
        account: String,
    },
    /// Create a guid; repeated calls within a second are served from cache
    CreateGuid {
        #[arg(long)]
        name: String,
        #[arg(long)]
        seed: i64,
        #[arg(long, default_value_t = 1)]
        repeat: u32,
    },
    /// Run every operation, including a rejected guest call
    Scenario,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init();
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<PipelineConfig> {
    let Some(path) = path else {
        return Ok(PipelineConfig::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid config {}", path.display()))
}

fn load_registry(path: Option<&Path>) -> anyhow::Result<MetadataRegistry> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read manifest {}", path.display()))?;
            Ok(MetadataRegistry::from_json(&raw)?)
        }
        None => Ok(wallet_metadata()?),
    }
}

async fn run(
    command: Command,
    client: WalletClient,
    caller: &StaticCallerContext,
) -> anyhow::Result<()> {
    match command {
        Command::Withdraw {
            account,
            amount,
            banking_account,
        } => {
            client.withdraw(&account, amount, &banking_account).await?;
            info!(%account, amount, %banking_account, "withdraw done");
        }
        Command::StoreValue {
            banking_account,
            amount,
            account,
        } => {
            client.store_value(&banking_account, amount, &account).await?;
            info!(%banking_account, amount, %account, "store value done");
        }
        Command::CreateGuid { name, seed, repeat } => {
            for _ in 0..repeat {
                let guid = client.create_guid(&name, seed).await?;
                info!(%name, seed, %guid, "guid");
            }
        }
        Command::Scenario => {
            client.withdraw("joey", 1000, "919").await?;
            for (name, seed) in [("Joey", 91), ("Joey", 91), ("Tom", 66), ("Joey", 91)] {
                let guid = client.create_guid(name, seed).await?;
                info!(name, seed, %guid, "guid");
            }

            caller.switch_to(Principal::new("Kyo", "guest"));
            match client.store_value("919", 80, "joey").await {
                Ok(()) => info!("store value done"),
                Err(e) => error!(error = %e, "store value rejected"),
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.json_logs);

    let mut config = load_config(args.config.as_deref())?;
    if let Some(interval) = args.sweep_interval_ms {
        config.cache_sweep_interval_ms = interval;
    }
    let registry = load_registry(args.manifest.as_deref())?;
    info!(operations = registry.len(), "metadata registry loaded");

    let wallet = Arc::new(Wallet::new(
        Arc::new(ConsoleWalletRepo),
        Arc::new(ConsoleBankingAccount),
        Arc::new(FixedFee::default()),
    ));
    let mut router = OperationRouter::new();
    register_wallet_operations(&mut router, wallet);

    let cache: Arc<dyn CacheStore> = Arc::new(InMemoryCacheStore::new());
    let mut sweeper = CacheSweeper::start(Arc::clone(&cache), config.cache_sweep_interval_ms);

    let pipeline = build_interceptor_pipeline(
        router,
        PipelineDeps {
            invocation_log: Arc::new(TracingInvocationLog),
            cache,
            transactions: Arc::new(LoggingTransactionManager),
            notifier: Arc::new(TracingNotifier),
        },
    );
    let caller = Arc::new(StaticCallerContext::new(Principal::new(
        args.caller_id,
        args.caller_role.as_str(),
    )));
    let client = WalletClient::new(Dispatcher::new(pipeline, Arc::new(registry), caller.clone()));

    let span = info_span!("wallet-demo", node_id = %config.node_id);
    let result = run(args.command, client, &caller).instrument(span).await;

    sweeper.stop().await;
    result
}
