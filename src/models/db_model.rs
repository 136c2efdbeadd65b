use alloy::primitives::{Address, B256, U256};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;

// ==========================================
// 1. READ MODELS (Postgres rows)
// ==========================================
//
// Addresses and hashes are stored as lowercase 0x-prefixed hex. On-chain
// integers live in NUMERIC columns and are read back as base-10 strings.

/// Running stake balance in the 'user_balances' table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserBalance {
    pub chain_id: i64,
    pub token_address: String,
    pub wallet_address: String,
    pub total_amount: String,
    pub last_block_number: i64,
}

/// Current state of a pair contract in 'pool_states'.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct PoolState {
    pub chain_id: i64,
    pub pool_address: String,
    pub token0_address: String,
    pub token1_address: String,
    pub reserve0: String,
    pub reserve1: String,
    pub total_supply: String,
    pub price: String,
    pub tx_count: i64,
    pub last_block_number: i64,
    pub is_active: bool,
}

/// A row of the 'pool_events' history.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct PoolEventRecord {
    pub chain_id: i64,
    pub pool_address: String,
    pub event_kind: String,
    pub wallet_address: String,
    pub token0_address: String,
    pub token1_address: String,
    pub amount0_in: String,
    pub amount1_in: String,
    pub amount0_out: String,
    pub amount1_out: String,
    pub tx_hash: String,
    pub log_index: i64,
    pub block_number: i64,
}

/// A wallet's entitlement and inclusion proof in 'airdrop_whitelist'.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct WhitelistEntry {
    pub airdrop_id: String,
    pub wallet_address: String,
    pub total_reward_wei: String,
    pub merkle_proof: Vec<String>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct AirdropCampaign {
    pub airdrop_id: String,
    pub chain_id: i64,
    pub contract_address: String,
    pub name: String,
    pub merkle_root: String,
    pub total_reward: String,
    pub tree_version: String,
    pub is_active: bool,
}

/// One completed task bound to a campaign, with its fixed reward.
#[derive(Debug, Clone, FromRow, PartialEq, Eq)]
pub struct TaskReward {
    pub wallet_address: String,
    pub reward_amount: Decimal,
}

/// Points earned per staked token per hour, from 'score_rules'.
#[derive(Debug, Clone, FromRow, PartialEq, Eq)]
pub struct ScoreRule {
    pub chain_id: i64,
    pub token_address: String,
    pub score: Decimal,
    /// Decimals of the staked token; ledger amounts are divided by 10^decimals.
    pub decimals: i32,
}

/// Points state carried on a 'user_balances' row.
#[derive(Debug, Clone, FromRow, PartialEq, Eq)]
pub struct PointsAccount {
    pub chain_id: i64,
    pub token_address: String,
    pub wallet_address: String,
    pub points: Decimal,
    /// Staked amount points were last accrued on, in token base units.
    pub points_amount: String,
    pub points_time: Option<DateTime<Utc>>,
    /// Highest ledger row id already folded into `points_amount`.
    pub points_cursor: i64,
}

/// A ledger row as seen by the points job.
#[derive(Debug, Clone, FromRow, PartialEq, Eq)]
pub struct LedgerMovement {
    pub id: i64,
    pub signed_amount: String,
    pub operation_time: DateTime<Utc>,
}

// ==========================================
// 2. WRITE MODELS
// ==========================================

/// Output of a successful rebuild, persisted in one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignRootUpdate {
    pub airdrop_id: U256,
    pub merkle_root: B256,
    pub tree_version: u32,
    pub entries: Vec<WhitelistUpdate>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhitelistUpdate {
    pub wallet: Address,
    pub total_reward_wei: U256,
    /// `None` leaves an existing proof untouched.
    pub merkle_proof: Option<Vec<B256>>,
}

/// New points state for one account. Applied only while the stored cursor
/// still equals `previous_cursor`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointsUpdate {
    pub chain_id: i64,
    pub token_address: String,
    pub wallet_address: String,
    pub points: Decimal,
    pub points_amount: i128,
    pub points_time: DateTime<Utc>,
    pub previous_cursor: i64,
    pub points_cursor: i64,
}

// ==========================================
// 3. HEX HELPERS
// ==========================================

pub fn hex_address(address: &Address) -> String {
    alloy::hex::encode_prefixed(address)
}

pub fn hex_hash(hash: &B256) -> String {
    alloy::hex::encode_prefixed(hash)
}
