use anyhow::Result;
use chain_indexer::cache::RedisClient;
use chain_indexer::config::IndexerConfig;
use chain_indexer::db;
use chain_indexer::rpc::fetcher::JsonRpcClient;
use chain_indexer::rpc::ingester::ChainIngester;
use chain_indexer::store::PgStore;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

async fn connect_cache(url: &str) -> Result<RedisClient> {
    let mut client = RedisClient::new(url).await?;
    client.ping().await?;
    Ok(client)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    println!("🚀 Starting Chain Event Indexer - Log Ingester");
    println!("===============================================\n");

    let config = IndexerConfig::from_env()?;
    let pool = db::connect_and_migrate(&config.database_url).await?;
    let store = Arc::new(PgStore::new(pool));

    let cache = match config.redis_url.as_deref() {
        Some(url) => match connect_cache(url).await {
            Ok(client) => Some(client),
            Err(e) => {
                warn!(error = %e, "Redis unavailable, continuing without cache");
                None
            }
        },
        None => None,
    };

    let cancel = CancellationToken::new();
    let mut handles = Vec::with_capacity(config.chains.len());

    for chain in &config.chains {
        let client = Arc::new(JsonRpcClient::new(chain.rpc_url.clone())?);
        let mut ingester = ChainIngester::new(
            chain.chain_id,
            chain.contracts.clone(),
            config.ingest,
            client.clone(),
            client,
            store.clone(),
        );
        if let Some(cache) = cache.clone() {
            ingester = ingester.with_cache(cache);
        }

        info!(
            chain_id = chain.chain_id,
            contracts = chain.contracts.len(),
            "spawning chain ingester"
        );
        handles.push(tokio::spawn(ingester.run(cancel.child_token())));
    }

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested, waiting for ingesters to stop");
    cancel.cancel();

    for result in futures_util::future::join_all(handles).await {
        if let Err(e) = result {
            warn!(error = %e, "ingester task panicked");
        }
    }

    Ok(())
}
