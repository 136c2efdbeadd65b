use crate::cache::RedisClient;
use crate::cache::redis_client::BATCH_CHANNEL;
use crate::config::{IngestSettings, WatchedContract};
use crate::error::IndexerError;
use crate::models::{BatchSummary, IngestBatch, PoolSnapshot, TypedRecord, hex_address};
use crate::rpc::fetcher::{LogFetcher, PoolReader};
use crate::rpc::parser::parse_logs;
use crate::store::IndexerStore;
use alloy::primitives::{Address, B256};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What one contract's sync step did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Nothing confirmed beyond the checkpoint yet.
    UpToDate { checkpoint: u64, target: u64 },
    Committed(BatchSummary),
}

/// Ingestion worker for a single chain. Owns everything it needs, so one
/// chain can be driven and tested in isolation.
pub struct ChainIngester {
    chain_id: u64,
    contracts: Vec<WatchedContract>,
    settings: IngestSettings,
    fetcher: Arc<dyn LogFetcher>,
    pools: Arc<dyn PoolReader>,
    store: Arc<dyn IndexerStore>,
    cache: Option<RedisClient>,
}

impl ChainIngester {
    pub fn new(
        chain_id: u64,
        contracts: Vec<WatchedContract>,
        settings: IngestSettings,
        fetcher: Arc<dyn LogFetcher>,
        pools: Arc<dyn PoolReader>,
        store: Arc<dyn IndexerStore>,
    ) -> Self {
        Self {
            chain_id,
            contracts,
            settings,
            fetcher,
            pools,
            store,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: RedisClient) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Poll until cancelled. An in-flight tick is dropped on cancellation;
    /// its transaction never committed, so nothing needs undoing.
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut ticker = interval(self.settings.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            chain_id = self.chain_id,
            contracts = self.contracts.len(),
            "chain ingestion started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.tick() => {
                    if let Err(e) = result {
                        warn!(chain_id = self.chain_id, error = %e, "tick failed, retrying next interval");
                    }
                }
            }
        }

        info!(chain_id = self.chain_id, "chain ingestion stopped");
    }

    /// One polling cycle: read the head once, then sync every watched
    /// contract in order. A failing contract does not hold back the others.
    pub async fn tick(&mut self) -> Result<Vec<SyncOutcome>, IndexerError> {
        let head = self.fetcher.current_height().await?;

        let mut outcomes = Vec::with_capacity(self.contracts.len());
        for contract in self.contracts.clone() {
            match self.sync_contract(&contract, head).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => warn!(
                    chain_id = self.chain_id,
                    contract = %contract.address,
                    role = %contract.role,
                    error = %e,
                    "contract sync failed, checkpoint unchanged"
                ),
            }
        }
        Ok(outcomes)
    }

    /// Fetch, parse and commit the next confirmed range for one contract.
    pub async fn sync_contract(
        &mut self,
        contract: &WatchedContract,
        head: u64,
    ) -> Result<SyncOutcome, IndexerError> {
        // Without a checkpoint the start block itself is the first one to read.
        let from_block = match self.store.checkpoint(self.chain_id, contract.address).await? {
            Some(block) => block.saturating_add(1),
            None => contract.start_block,
        };

        let confirmed = head.checked_sub(self.settings.confirmation_lag);
        let target = match confirmed {
            Some(target) if target >= from_block => target,
            _ => {
                let checkpoint = from_block.saturating_sub(1);
                let target = confirmed.unwrap_or(0);
                debug!(chain_id = self.chain_id, contract = %contract.address, checkpoint, target, "nothing to sync");
                return Ok(SyncOutcome::UpToDate { checkpoint, target });
            }
        };

        let span = self.settings.max_block_range.max(1) - 1;
        let to_block = target.min(from_block.saturating_add(span));

        let logs = self
            .fetcher
            .logs_in_range(contract.address, from_block, to_block)
            .await?;
        let parsed = parse_logs(&logs, self.chain_id);

        let mut records = parsed.records;
        self.enrich_pool_events(&mut records).await?;
        let snapshots = self.read_touched_pools(&records).await;

        let batch = IngestBatch {
            chain_id: self.chain_id,
            contract: contract.address,
            from_block,
            to_block,
            records,
            snapshots,
        };
        let summary = self.store.commit_batch(&batch).await?;

        info!(
            chain_id = self.chain_id,
            contract = %contract.address,
            role = %contract.role,
            from_block,
            to_block,
            logs = logs.len(),
            inserted = summary.inserted,
            duplicates = summary.duplicates,
            unknown = parsed.unknown,
            malformed = parsed.malformed,
            "batch committed"
        );

        self.notify(&summary).await;
        Ok(SyncOutcome::Committed(summary))
    }

    /// Attribute pool events to the transaction sender and fill in the
    /// pool's token pair.
    async fn enrich_pool_events(&mut self, records: &mut [TypedRecord]) -> Result<(), IndexerError> {
        let mut senders: HashMap<B256, Address> = HashMap::new();
        let mut pairs: HashMap<Address, (Address, Address)> = HashMap::new();

        for record in records.iter_mut() {
            let TypedRecord::Pool(event) = record else {
                continue;
            };

            let sender = match senders.get(&event.tx_hash) {
                Some(sender) => *sender,
                None => {
                    let sender = self.fetcher.sender_of(event.tx_hash).await?;
                    senders.insert(event.tx_hash, sender);
                    sender
                }
            };
            event.wallet = sender;

            let (token0, token1) = match pairs.get(&event.pool) {
                Some(pair) => *pair,
                None => {
                    let pair = self.resolve_pool_tokens(event.pool).await?;
                    pairs.insert(event.pool, pair);
                    pair
                }
            };
            event.token0 = token0;
            event.token1 = token1;
        }
        Ok(())
    }

    /// Stored pair first, then Redis, then a live contract read. A zero
    /// address means the pair was never resolved.
    async fn resolve_pool_tokens(&mut self, pool: Address) -> Result<(Address, Address), IndexerError> {
        if let Some((token0, token1)) = self.store.pool_tokens(self.chain_id, pool).await? {
            if !token0.is_zero() && !token1.is_zero() {
                return Ok((token0, token1));
            }
        }

        let pool_hex = hex_address(&pool);
        if let Some(cache) = self.cache.as_mut() {
            match cache.get_pool_tokens(self.chain_id, &pool_hex).await {
                Ok(Some((token0, token1))) => {
                    if let (Ok(token0), Ok(token1)) = (Address::from_str(&token0), Address::from_str(&token1)) {
                        if !token0.is_zero() && !token1.is_zero() {
                            return Ok((token0, token1));
                        }
                    }
                }
                Ok(None) => {}
                Err(e) => warn!(pool = %pool, error = %e, "pool token cache read failed"),
            }
        }

        let (token0, token1) = self.pools.token_pair(pool).await?;
        debug!(chain_id = self.chain_id, pool = %pool, %token0, %token1, "resolved pool tokens");

        if let Some(cache) = self.cache.as_mut() {
            let pair = (hex_address(&token0), hex_address(&token1));
            if let Err(e) = cache.set_pool_tokens(self.chain_id, &pool_hex, &pair).await {
                warn!(pool = %pool, error = %e, "pool token cache write failed");
            }
        }
        Ok((token0, token1))
    }

    /// Fresh reserves for every pool in the batch. A failed read leaves the
    /// pool out, so its stored reserves are kept.
    async fn read_touched_pools(&self, records: &[TypedRecord]) -> Vec<(Address, PoolSnapshot)> {
        let mut pools: Vec<Address> = records
            .iter()
            .filter_map(|record| match record {
                TypedRecord::Pool(event) => Some(event.pool),
                _ => None,
            })
            .collect();
        pools.sort();
        pools.dedup();

        let mut snapshots = Vec::with_capacity(pools.len());
        for pool in pools {
            match self.pools.snapshot(pool).await {
                Ok(snapshot) => snapshots.push((pool, snapshot)),
                Err(e) => warn!(
                    chain_id = self.chain_id,
                    pool = %pool,
                    error = %e,
                    "pool reserve read failed, keeping stored reserves"
                ),
            }
        }
        snapshots
    }

    async fn notify(&mut self, summary: &BatchSummary) {
        if summary.inserted == 0 {
            return;
        }
        if let Some(cache) = self.cache.as_mut() {
            if let Err(e) = cache.publish(BATCH_CHANNEL, summary).await {
                warn!(chain_id = self.chain_id, error = %e, "batch notification failed");
            }
        }
    }
}
