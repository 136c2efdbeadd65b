use alloy::primitives::{Address, B256, I256, U256};
use chrono::{DateTime, Utc};
use serde::Serialize;

// ==========================================
// TYPED RECORDS (output of the log parsers)
// ==========================================

/// One decoded log. Every variant carries its `(tx_hash, log_index)` origin,
/// which is the idempotency key in storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypedRecord {
    Ledger(LedgerEntry),
    Pool(PoolEvent),
    Reward(RewardEvent),
    CampaignCreated(CampaignCreated),
    CampaignActivated(CampaignActivated),
}

impl TypedRecord {
    pub fn key(&self) -> (B256, u64) {
        match self {
            TypedRecord::Ledger(r) => (r.tx_hash, r.log_index),
            TypedRecord::Pool(r) => (r.tx_hash, r.log_index),
            TypedRecord::Reward(r) => (r.tx_hash, r.log_index),
            TypedRecord::CampaignCreated(r) => (r.tx_hash, r.log_index),
            TypedRecord::CampaignActivated(r) => (r.tx_hash, r.log_index),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LedgerKind {
    Staked,
    Withdrawn,
}

impl LedgerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerKind::Staked => "Staked",
            LedgerKind::Withdrawn => "Withdrawn",
        }
    }
}

/// A stake or withdraw operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub chain_id: u64,
    pub contract: Address,
    pub wallet: Address,
    pub pool_id: U256,
    pub token: Address,
    pub amount: U256,
    pub kind: LedgerKind,
    pub tx_hash: B256,
    pub log_index: u64,
    pub block_number: u64,
    pub operation_time: DateTime<Utc>,
    pub unlock_time: Option<DateTime<Utc>>,
}

impl LedgerEntry {
    /// `+amount` for stakes, `-amount` for withdrawals.
    pub fn signed_amount(&self) -> I256 {
        let magnitude = I256::try_from(self.amount).unwrap_or(I256::MAX);
        match self.kind {
            LedgerKind::Staked => magnitude,
            LedgerKind::Withdrawn => -magnitude,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PoolEventKind {
    Swap,
    AddLiquidity,
    RemoveLiquidity,
}

impl PoolEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PoolEventKind::Swap => "Swap",
            PoolEventKind::AddLiquidity => "AddLiquidity",
            PoolEventKind::RemoveLiquidity => "RemoveLiquidity",
        }
    }
}

/// A swap or liquidity change on a pair contract. `wallet` starts out as the
/// indexed sender and is replaced by the transaction sender during ingestion;
/// the token pair is filled in the same way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolEvent {
    pub chain_id: u64,
    pub pool: Address,
    pub kind: PoolEventKind,
    pub wallet: Address,
    pub token0: Address,
    pub token1: Address,
    pub amount0_in: U256,
    pub amount1_in: U256,
    pub amount0_out: U256,
    pub amount1_out: U256,
    pub tx_hash: B256,
    pub log_index: u64,
    pub block_number: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RewardKind {
    Claimed,
    TotalUpdated,
}

impl RewardKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RewardKind::Claimed => "RewardClaimed",
            RewardKind::TotalUpdated => "TotalRewardUpdated",
        }
    }
}

/// `amount` is the claimed amount for claims and the new total for updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardEvent {
    pub chain_id: u64,
    pub contract: Address,
    pub airdrop_id: U256,
    pub wallet: Address,
    pub kind: RewardKind,
    pub amount: U256,
    pub total_reward: U256,
    pub claimed_reward: U256,
    pub pending_reward: U256,
    pub event_time: DateTime<Utc>,
    pub tx_hash: B256,
    pub log_index: u64,
    pub block_number: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignCreated {
    pub chain_id: u64,
    pub contract: Address,
    pub airdrop_id: U256,
    pub name: String,
    pub merkle_root: B256,
    pub total_reward: U256,
    pub tree_version: U256,
    pub tx_hash: B256,
    pub log_index: u64,
    pub block_number: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignActivated {
    pub chain_id: u64,
    pub contract: Address,
    pub airdrop_id: U256,
    pub tx_hash: B256,
    pub log_index: u64,
    pub block_number: u64,
}

// ==========================================
// POOL READS
// ==========================================

/// Point-in-time read of a pair contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolSnapshot {
    pub reserve0: U256,
    pub reserve1: U256,
    pub total_supply: U256,
}

// ==========================================
// BATCHES
// ==========================================

/// Everything one ingestion step hands to the store: the parsed records of
/// blocks `from_block..=to_block` for one contract plus the pool reads taken for
/// the pools it touched.
#[derive(Debug, Clone)]
pub struct IngestBatch {
    pub chain_id: u64,
    pub contract: Address,
    pub from_block: u64,
    pub to_block: u64,
    pub records: Vec<TypedRecord>,
    pub snapshots: Vec<(Address, PoolSnapshot)>,
}

/// Published on Redis after a batch commits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub chain_id: u64,
    pub contract: String,
    pub from_block: u64,
    pub to_block: u64,
    pub inserted: usize,
    pub duplicates: usize,
    pub ledger_entries: usize,
    pub pool_events: usize,
    pub reward_events: usize,
    pub campaign_updates: usize,
}
