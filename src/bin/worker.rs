use anyhow::Result;
use chain_indexer::airdrop::AirdropRebuildJob;
use chain_indexer::config::IndexerConfig;
use chain_indexer::db;
use chain_indexer::points::PointsJob;
use chain_indexer::rpc::submitter::AlloySubmitter;
use chain_indexer::store::PgStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    println!("🌳 Starting Chain Event Indexer - Airdrop & Points Worker");
    println!("========================================================\n");

    let config = IndexerConfig::from_env()?;
    let pool = db::connect_and_migrate(&config.database_url).await?;
    let store = Arc::new(PgStore::new(pool));

    let endpoints: HashMap<u64, url::Url> = config
        .chains
        .iter()
        .map(|chain| (chain.chain_id, chain.rpc_url.clone()))
        .collect();
    let submitter = AlloySubmitter::new(
        config.admin_private_key.as_deref(),
        endpoints,
        config.receipt_timeout,
    )?;
    if !submitter.has_signer() {
        warn!("AIRDROP_ADMIN_PRIVATE_KEY not set, roots will be computed but never submitted");
    }

    let rebuild = AirdropRebuildJob::new(store.clone(), Arc::new(submitter), config.merkle_interval);
    let points = PointsJob::new(store, config.points_interval);

    let cancel = CancellationToken::new();
    let handles = vec![
        tokio::spawn(rebuild.run(cancel.child_token())),
        tokio::spawn(points.run(cancel.child_token())),
    ];

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested, waiting for the worker jobs to stop");
    cancel.cancel();

    for result in futures_util::future::join_all(handles).await {
        if let Err(e) = result {
            warn!(error = %e, "worker job panicked");
        }
    }
    Ok(())
}
