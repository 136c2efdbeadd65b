use crate::error::IndexerError;
use crate::models::{
    AirdropCampaign, BatchSummary, CampaignRootUpdate, IngestBatch, LedgerMovement,
    PointsAccount, PointsUpdate, PoolEventRecord, PoolState, ScoreRule, TaskReward, TypedRecord,
    UserBalance, WhitelistEntry, hex_address, queries,
};
use crate::updaters::DerivedUpdates;
use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use sqlx::PgPool;
use std::str::FromStr;
use tracing::debug;

/// Storage seam shared by the ingestion workers, the rebuild job and the
/// read-side accessors.
#[async_trait]
pub trait IndexerStore: Send + Sync {
    async fn checkpoint(&self, chain_id: u64, contract: Address) -> Result<Option<u64>, IndexerError>;

    /// Insert the batch's records, apply derived updates for the ones that
    /// were new and advance the checkpoint to `batch.to_block`, atomically.
    async fn commit_batch(&self, batch: &IngestBatch) -> Result<BatchSummary, IndexerError>;

    /// Cached token pair of a pool, if a row exists.
    async fn pool_tokens(
        &self,
        chain_id: u64,
        pool: Address,
    ) -> Result<Option<(Address, Address)>, IndexerError>;

    async fn active_campaigns(&self) -> Result<Vec<AirdropCampaign>, IndexerError>;

    async fn completed_task_rewards(&self, airdrop_id: U256) -> Result<Vec<TaskReward>, IndexerError>;

    async fn persist_campaign_root(&self, update: &CampaignRootUpdate) -> Result<(), IndexerError>;

    async fn user_balance(
        &self,
        chain_id: u64,
        token: Address,
        wallet: Address,
    ) -> Result<Option<UserBalance>, IndexerError>;

    async fn pool_state(&self, chain_id: u64, pool: Address) -> Result<Option<PoolState>, IndexerError>;

    async fn pool_events(
        &self,
        chain_id: u64,
        pool: Address,
        limit: usize,
    ) -> Result<Vec<PoolEventRecord>, IndexerError>;

    async fn whitelist_entry(
        &self,
        airdrop_id: U256,
        wallet: Address,
    ) -> Result<Option<WhitelistEntry>, IndexerError>;

    async fn campaign(&self, airdrop_id: U256) -> Result<Option<AirdropCampaign>, IndexerError>;

    /// Rebuild a balance from the full ledger history. Returns the new total.
    async fn reconcile_user_balance(
        &self,
        chain_id: u64,
        token: Address,
        wallet: Address,
    ) -> Result<String, IndexerError>;

    /// Token addresses come back lowercase.
    async fn score_rules(&self) -> Result<Vec<ScoreRule>, IndexerError>;

    /// Every balance row with its points state.
    async fn points_accounts(&self) -> Result<Vec<PointsAccount>, IndexerError>;

    async fn ledger_movements(
        &self,
        chain_id: u64,
        token: Address,
        wallet: Address,
        after_id: i64,
    ) -> Result<Vec<LedgerMovement>, IndexerError>;

    /// Compare-and-set on the points cursor; false if it already moved.
    async fn save_points(&self, update: &PointsUpdate) -> Result<bool, IndexerError>;
}

/// Count what a batch contributed, given the records that were new.
pub fn summarize(batch: &IngestBatch, fresh: &[TypedRecord]) -> BatchSummary {
    let mut summary = BatchSummary {
        chain_id: batch.chain_id,
        contract: hex_address(&batch.contract),
        from_block: batch.from_block,
        to_block: batch.to_block,
        inserted: fresh.len(),
        duplicates: batch.records.len() - fresh.len(),
        ..BatchSummary::default()
    };
    for record in fresh {
        match record {
            TypedRecord::Ledger(_) => summary.ledger_entries += 1,
            TypedRecord::Pool(_) => summary.pool_events += 1,
            TypedRecord::Reward(_) => summary.reward_events += 1,
            TypedRecord::CampaignCreated(_) | TypedRecord::CampaignActivated(_) => {
                summary.campaign_updates += 1
            }
        }
    }
    summary
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn parse_address(raw: &str) -> Result<Address, IndexerError> {
    Address::from_str(raw).map_err(|e| IndexerError::InvalidValue(format!("address {raw}: {e}")))
}

#[async_trait]
impl IndexerStore for PgStore {
    async fn checkpoint(&self, chain_id: u64, contract: Address) -> Result<Option<u64>, IndexerError> {
        Ok(queries::get_checkpoint(&self.pool, chain_id, &contract).await?)
    }

    async fn commit_batch(&self, batch: &IngestBatch) -> Result<BatchSummary, IndexerError> {
        let mut tx = self.pool.begin().await?;

        let mut fresh = Vec::with_capacity(batch.records.len());
        for record in &batch.records {
            let inserted = match record {
                TypedRecord::Ledger(entry) => queries::insert_ledger_entry(&mut tx, entry).await?,
                TypedRecord::Pool(event) => queries::insert_pool_event(&mut tx, event).await?,
                TypedRecord::Reward(event) => queries::insert_reward_event(&mut tx, event).await?,
                // Campaign metadata is an idempotent upsert with no history table.
                TypedRecord::CampaignCreated(_) | TypedRecord::CampaignActivated(_) => true,
            };
            if inserted {
                fresh.push(record.clone());
            }
        }

        let updates = DerivedUpdates::from_records(&fresh, &batch.snapshots);
        for delta in &updates.balances {
            queries::apply_balance_delta(&mut tx, delta).await?;
        }
        for touch in &updates.pools {
            queries::upsert_pool_state(&mut tx, touch).await?;
        }
        for completion in &updates.tasks {
            let rows = queries::mark_task_done(&mut tx, completion).await?;
            debug!(wallet = %completion.wallet, task = completion.task_name, rows, "task flagged");
        }
        for (airdrop_id, entry) in &updates.whitelist {
            queries::upsert_whitelist_entry(&mut tx, airdrop_id, entry).await?;
        }
        for created in &updates.campaigns_created {
            queries::upsert_campaign(&mut tx, created).await?;
        }
        for activated in &updates.campaigns_activated {
            queries::activate_campaign(&mut tx, activated).await?;
        }

        queries::upsert_checkpoint(&mut tx, batch.chain_id, &batch.contract, batch.to_block).await?;
        tx.commit().await?;

        Ok(summarize(batch, &fresh))
    }

    async fn pool_tokens(
        &self,
        chain_id: u64,
        pool: Address,
    ) -> Result<Option<(Address, Address)>, IndexerError> {
        match queries::get_pool_tokens(&self.pool, chain_id, &pool).await? {
            Some((token0, token1)) => Ok(Some((parse_address(&token0)?, parse_address(&token1)?))),
            None => Ok(None),
        }
    }

    async fn active_campaigns(&self) -> Result<Vec<AirdropCampaign>, IndexerError> {
        Ok(queries::get_active_campaigns(&self.pool).await?)
    }

    async fn completed_task_rewards(&self, airdrop_id: U256) -> Result<Vec<TaskReward>, IndexerError> {
        Ok(queries::get_completed_task_rewards(&self.pool, &airdrop_id).await?)
    }

    async fn persist_campaign_root(&self, update: &CampaignRootUpdate) -> Result<(), IndexerError> {
        Ok(queries::persist_campaign_root(&self.pool, update).await?)
    }

    async fn user_balance(
        &self,
        chain_id: u64,
        token: Address,
        wallet: Address,
    ) -> Result<Option<UserBalance>, IndexerError> {
        Ok(queries::get_user_balance(&self.pool, chain_id, &token, &wallet).await?)
    }

    async fn pool_state(&self, chain_id: u64, pool: Address) -> Result<Option<PoolState>, IndexerError> {
        Ok(queries::get_pool_state(&self.pool, chain_id, &pool).await?)
    }

    async fn pool_events(
        &self,
        chain_id: u64,
        pool: Address,
        limit: usize,
    ) -> Result<Vec<PoolEventRecord>, IndexerError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        Ok(queries::get_recent_pool_events(&self.pool, chain_id, &pool, limit).await?)
    }

    async fn whitelist_entry(
        &self,
        airdrop_id: U256,
        wallet: Address,
    ) -> Result<Option<WhitelistEntry>, IndexerError> {
        Ok(queries::get_whitelist_entry(&self.pool, &airdrop_id, &wallet).await?)
    }

    async fn campaign(&self, airdrop_id: U256) -> Result<Option<AirdropCampaign>, IndexerError> {
        Ok(queries::get_campaign(&self.pool, &airdrop_id).await?)
    }

    async fn reconcile_user_balance(
        &self,
        chain_id: u64,
        token: Address,
        wallet: Address,
    ) -> Result<String, IndexerError> {
        Ok(queries::reconcile_user_balance(&self.pool, chain_id, &token, &wallet).await?)
    }

    async fn score_rules(&self) -> Result<Vec<ScoreRule>, IndexerError> {
        Ok(queries::get_score_rules(&self.pool).await?)
    }

    async fn points_accounts(&self) -> Result<Vec<PointsAccount>, IndexerError> {
        Ok(queries::get_points_accounts(&self.pool).await?)
    }

    async fn ledger_movements(
        &self,
        chain_id: u64,
        token: Address,
        wallet: Address,
        after_id: i64,
    ) -> Result<Vec<LedgerMovement>, IndexerError> {
        Ok(queries::get_ledger_movements(&self.pool, chain_id, &token, &wallet, after_id).await?)
    }

    async fn save_points(&self, update: &PointsUpdate) -> Result<bool, IndexerError> {
        Ok(queries::save_points(&self.pool, update).await?)
    }
}
