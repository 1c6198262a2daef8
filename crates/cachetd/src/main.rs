//! `cachetd`: hosts cachet providers until shut down.

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cachet::BackendFactory;
use cachet::Engine;
use cachet::Provider;

use crate::config::DaemonConfig;

#[derive(Debug, Parser)]
#[command(name = "cachetd", about = "Hosts cachet providers")]
struct Args {
    /// JSON configuration file.
    #[arg(long)]
    config: PathBuf,

    /// Listen address, overriding the one in the configuration file.
    #[arg(long)]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut config = DaemonConfig::load(&args.config)?;
    if args.listen.is_some() {
        config.listen = args.listen;
    }

    let engine = Engine::new(config.engine.clone());
    let factory = Arc::new(BackendFactory::with_builtin());
    tracing::info!(engine = %engine.self_address(), backends = ?factory.type_names(), "starting");

    let mut providers = Vec::with_capacity(config.providers.len());
    for entry in &config.providers {
        let provider = Provider::start(&engine, entry.provider_id, entry.provider_config(), factory.clone())
            .await
            .with_context(|| format!("Could not start provider {}", entry.provider_id))?;
        tracing::info!(provider = entry.provider_id, caches = provider.cache_count().await, "provider ready");
        providers.push(provider);
    }

    if let Some(address) = &config.listen {
        engine
            .listen(address)
            .await
            .with_context(|| format!("Could not listen on {}", address))?;
    }

    tokio::select! {
        _ = engine.wait_for_shutdown() => {
            tracing::info!("shutdown requested remotely");
        }
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                tracing::warn!(error = %e, "unable to listen for shutdown signal");
            }
            tracing::info!("shutdown signal received");
        }
    }

    engine.shutdown();
    drop(providers);
    tracing::info!("stopped");
    Ok(())
}
