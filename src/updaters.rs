//! Derived-state updates computed from the records a batch actually inserted.
//!
//! These are pure functions; the store applies their output inside the same
//! transaction as the inserts and the checkpoint advance.

use crate::models::{
    CampaignActivated, CampaignCreated, LedgerEntry, LedgerKind, PoolEvent, PoolEventKind,
    PoolSnapshot, RewardEvent, RewardKind, TypedRecord, WhitelistUpdate,
};
use alloy::primitives::{Address, I256, U256};
use std::collections::BTreeMap;

pub const TASK_STAKE_ONCE: &str = "Stake Once";
pub const TASK_SWAP_ONCE: &str = "Swap Once";
pub const TASK_PROVIDE_LIQUIDITY: &str = "Provide Liquidity";

const PRICE_DECIMALS: usize = 18;

/// Net stake movement for one (wallet, token) within a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceDelta {
    pub chain_id: u64,
    pub token: Address,
    pub wallet: Address,
    pub delta: I256,
    pub last_block: u64,
}

/// Pool activity within a batch plus the fresh read taken for it, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolTouch {
    pub chain_id: u64,
    pub pool: Address,
    pub token0: Address,
    pub token1: Address,
    pub tx_count: u64,
    pub last_block: u64,
    pub snapshot: Option<PoolSnapshot>,
}

impl PoolTouch {
    pub fn price(&self) -> Option<String> {
        self.snapshot.map(|s| format_price(s.reserve0, s.reserve1))
    }
}

/// A task to flag as done for a wallet. The wallet is lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct TaskCompletion {
    pub wallet: String,
    pub task_name: &'static str,
}

/// Everything a batch changes outside the immutable event tables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DerivedUpdates {
    pub balances: Vec<BalanceDelta>,
    pub pools: Vec<PoolTouch>,
    pub tasks: Vec<TaskCompletion>,
    /// (airdrop id, update) pairs from TotalRewardUpdated, last writer wins.
    pub whitelist: Vec<(U256, WhitelistUpdate)>,
    pub campaigns_created: Vec<CampaignCreated>,
    pub campaigns_activated: Vec<CampaignActivated>,
}

impl DerivedUpdates {
    /// Derive updates from newly inserted records, in fetch order.
    pub fn from_records(records: &[TypedRecord], snapshots: &[(Address, PoolSnapshot)]) -> Self {
        let mut ledger = Vec::new();
        let mut pool_events = Vec::new();
        let mut rewards = Vec::new();
        let mut updates = DerivedUpdates::default();

        for record in records {
            match record {
                TypedRecord::Ledger(entry) => ledger.push(entry),
                TypedRecord::Pool(event) => pool_events.push(event),
                TypedRecord::Reward(event) => rewards.push(event),
                TypedRecord::CampaignCreated(created) => {
                    updates.campaigns_created.push(created.clone())
                }
                TypedRecord::CampaignActivated(activated) => {
                    updates.campaigns_activated.push(activated.clone())
                }
            }
        }

        updates.balances = balance_deltas(&ledger);
        updates.pools = pool_touches(&pool_events, snapshots);
        updates.tasks = task_completions(records);
        updates.whitelist = whitelist_updates(&rewards);
        updates
    }
}

/// Sum signed deltas per (wallet, token).
pub fn balance_deltas(entries: &[&LedgerEntry]) -> Vec<BalanceDelta> {
    let mut grouped: BTreeMap<(u64, Address, Address), (I256, u64)> = BTreeMap::new();
    for entry in entries {
        let slot = grouped
            .entry((entry.chain_id, entry.token, entry.wallet))
            .or_insert((I256::ZERO, 0));
        slot.0 += entry.signed_amount();
        slot.1 = slot.1.max(entry.block_number);
    }

    grouped
        .into_iter()
        .map(|((chain_id, token, wallet), (delta, last_block))| BalanceDelta {
            chain_id,
            token,
            wallet,
            delta,
            last_block,
        })
        .collect()
}

/// Count events per pool and attach its snapshot.
pub fn pool_touches(events: &[&PoolEvent], snapshots: &[(Address, PoolSnapshot)]) -> Vec<PoolTouch> {
    let mut grouped: BTreeMap<(u64, Address), PoolTouch> = BTreeMap::new();
    for event in events {
        let touch = grouped
            .entry((event.chain_id, event.pool))
            .or_insert_with(|| PoolTouch {
                chain_id: event.chain_id,
                pool: event.pool,
                token0: event.token0,
                token1: event.token1,
                tx_count: 0,
                last_block: 0,
                snapshot: snapshots
                    .iter()
                    .find(|(pool, _)| *pool == event.pool)
                    .map(|(_, snapshot)| *snapshot),
            });
        touch.tx_count += 1;
        touch.last_block = touch.last_block.max(event.block_number);
    }
    grouped.into_values().collect()
}

/// Auto-verified tasks completed by the records, deduplicated.
pub fn task_completions(records: &[TypedRecord]) -> Vec<TaskCompletion> {
    let mut out: Vec<TaskCompletion> = records
        .iter()
        .filter_map(|record| match record {
            TypedRecord::Ledger(entry) if entry.kind == LedgerKind::Staked => {
                Some((entry.wallet, TASK_STAKE_ONCE))
            }
            TypedRecord::Pool(event) if event.kind == PoolEventKind::Swap => {
                Some((event.wallet, TASK_SWAP_ONCE))
            }
            TypedRecord::Pool(event) if event.kind == PoolEventKind::AddLiquidity => {
                Some((event.wallet, TASK_PROVIDE_LIQUIDITY))
            }
            _ => None,
        })
        .filter(|(wallet, _)| !wallet.is_zero())
        .map(|(wallet, task_name)| TaskCompletion {
            wallet: alloy::hex::encode_prefixed(wallet),
            task_name,
        })
        .collect();
    out.sort();
    out.dedup();
    out
}

/// Latest total per (airdrop, wallet) from TotalRewardUpdated events.
pub fn whitelist_updates(rewards: &[&RewardEvent]) -> Vec<(U256, WhitelistUpdate)> {
    let mut latest: BTreeMap<(U256, Address), U256> = BTreeMap::new();
    for event in rewards.iter().filter(|e| e.kind == RewardKind::TotalUpdated) {
        latest.insert((event.airdrop_id, event.wallet), event.total_reward);
    }

    latest
        .into_iter()
        .map(|((airdrop_id, wallet), total)| {
            (
                airdrop_id,
                WhitelistUpdate {
                    wallet,
                    total_reward_wei: total,
                    merkle_proof: None,
                },
            )
        })
        .collect()
}

/// `reserve1 / reserve0` as a decimal string truncated to 18 places, or "0"
/// when the pool has no reserve0.
pub fn format_price(reserve0: U256, reserve1: U256) -> String {
    if reserve0.is_zero() {
        return "0".to_string();
    }

    let scale = U256::from(10u64).pow(U256::from(PRICE_DECIMALS));
    let scaled = match reserve1.checked_mul(scale) {
        Some(numerator) => numerator / reserve0,
        // Only reachable for reserves far above uint112; keep integer precision.
        None => (reserve1 / reserve0).saturating_mul(scale),
    };

    let integer = scaled / scale;
    let fraction = scaled % scale;
    if fraction.is_zero() {
        return integer.to_string();
    }

    let digits = format!("{:0>width$}", fraction.to_string(), width = PRICE_DECIMALS);
    format!("{integer}.{}", digits.trim_end_matches('0'))
}
