//! In-memory doubles for the storage and chain seams, plus builders for
//! the raw logs the watched contracts emit.

use crate::error::IndexerError;
use crate::models::{
    AirdropCampaign, BatchSummary, CampaignRootUpdate, IngestBatch, LedgerMovement, PointsAccount,
    PointsUpdate, PoolEventRecord, PoolSnapshot, PoolState, RawLog, ScoreRule, TaskReward,
    TypedRecord, UserBalance, WhitelistEntry, hex_address, hex_hash,
};
use crate::models::queries::TASK_STATUS_DONE;
use crate::rpc::fetcher::{LogFetcher, PoolReader};
use crate::rpc::parser::EventKind;
use crate::rpc::submitter::{MerkleRootSubmitter, SubmitError};
use crate::store::{IndexerStore, summarize};
use crate::updaters::{DerivedUpdates, format_price};
use alloy::primitives::{Address, B256, Bytes, I256, U256, keccak256};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ==========================================
// STORE
// ==========================================

#[derive(Debug, Clone)]
struct SeedTask {
    task_id: i64,
    name: String,
    auto_verified: bool,
    reward: Decimal,
}

#[derive(Debug, Clone, Default)]
struct MemoryPoints {
    points: Decimal,
    amount: i128,
    time: Option<DateTime<Utc>>,
    cursor: i64,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    checkpoints: HashMap<(u64, Address), u64>,
    seen: HashSet<(B256, u64)>,
    records: Vec<TypedRecord>,
    balances: BTreeMap<(u64, Address, Address), (I256, u64)>,
    pools: BTreeMap<(u64, Address), PoolState>,
    campaigns: BTreeMap<U256, AirdropCampaign>,
    whitelist: BTreeMap<(U256, Address), WhitelistEntry>,
    tasks: Vec<SeedTask>,
    task_status: BTreeMap<(String, i64), i16>,
    bindings: Vec<(U256, i64)>,
    root_updates: Vec<CampaignRootUpdate>,
    score_rules: Vec<ScoreRule>,
    points: BTreeMap<(u64, Address, Address), MemoryPoints>,
}

/// `IndexerStore` with the same commit semantics as the Postgres store:
/// a batch either lands completely or not at all.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    fail_next_commit: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `commit_batch` fail before anything is written.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    pub fn set_checkpoint(&self, chain_id: u64, contract: Address, block: u64) {
        lock(&self.state).checkpoints.insert((chain_id, contract), block);
    }

    /// Register a task definition and return its id.
    pub fn add_task(&self, name: &str, auto_verified: bool, reward: Decimal) -> i64 {
        let mut state = lock(&self.state);
        let task_id = state.tasks.len() as i64 + 1;
        state.tasks.push(SeedTask {
            task_id,
            name: name.to_string(),
            auto_verified,
            reward,
        });
        task_id
    }

    pub fn bind_task(&self, airdrop_id: U256, task_id: i64) {
        lock(&self.state).bindings.push((airdrop_id, task_id));
    }

    /// Mark a task done for a wallet without going through ingestion.
    pub fn complete_task(&self, wallet: Address, task_id: i64) {
        lock(&self.state)
            .task_status
            .insert((hex_address(&wallet), task_id), TASK_STATUS_DONE);
    }

    pub fn task_status(&self, wallet: Address, task_id: i64) -> Option<i16> {
        lock(&self.state)
            .task_status
            .get(&(hex_address(&wallet), task_id))
            .copied()
    }

    pub fn insert_campaign(&self, campaign: AirdropCampaign) {
        let id = campaign.airdrop_id.parse::<U256>().unwrap_or_default();
        lock(&self.state).campaigns.insert(id, campaign);
    }

    /// Number of event rows held, across every event table.
    pub fn event_count(&self) -> usize {
        lock(&self.state).records.len()
    }

    pub fn records(&self) -> Vec<TypedRecord> {
        lock(&self.state).records.clone()
    }

    /// Sum of every running balance for a token.
    pub fn total_balance(&self, chain_id: u64, token: Address) -> I256 {
        lock(&self.state)
            .balances
            .iter()
            .filter(|((chain, tok, _), _)| *chain == chain_id && *tok == token)
            .fold(I256::ZERO, |acc, (_, (amount, _))| acc + *amount)
    }

    pub fn root_updates(&self) -> Vec<CampaignRootUpdate> {
        lock(&self.state).root_updates.clone()
    }

    pub fn set_score_rule(&self, chain_id: u64, token: Address, score: Decimal, decimals: i32) {
        let mut state = lock(&self.state);
        state
            .score_rules
            .retain(|rule| !(rule.chain_id == chain_id as i64 && rule.token_address == hex_address(&token)));
        state.score_rules.push(ScoreRule {
            chain_id: chain_id as i64,
            token_address: hex_address(&token),
            score,
            decimals,
        });
    }

    /// Accrued points and the amount they were last accrued on.
    pub fn points_of(&self, chain_id: u64, token: Address, wallet: Address) -> Option<(Decimal, i128)> {
        lock(&self.state)
            .points
            .get(&(chain_id, token, wallet))
            .map(|p| (p.points, p.amount))
    }
}

impl MemoryState {
    fn insert_record(&mut self, record: &TypedRecord) -> bool {
        match record {
            TypedRecord::CampaignCreated(_) | TypedRecord::CampaignActivated(_) => true,
            _ => {
                if !self.seen.insert(record.key()) {
                    return false;
                }
                self.records.push(record.clone());
                true
            }
        }
    }

    fn apply(&mut self, updates: &DerivedUpdates) {
        for delta in &updates.balances {
            let slot = self
                .balances
                .entry((delta.chain_id, delta.token, delta.wallet))
                .or_insert((I256::ZERO, 0));
            slot.0 += delta.delta;
            slot.1 = slot.1.max(delta.last_block);
        }

        for touch in &updates.pools {
            let state = self
                .pools
                .entry((touch.chain_id, touch.pool))
                .or_insert_with(|| PoolState {
                    chain_id: touch.chain_id as i64,
                    pool_address: hex_address(&touch.pool),
                    token0_address: hex_address(&touch.token0),
                    token1_address: hex_address(&touch.token1),
                    reserve0: "0".to_string(),
                    reserve1: "0".to_string(),
                    total_supply: "0".to_string(),
                    price: "0".to_string(),
                    tx_count: 0,
                    last_block_number: 0,
                    is_active: true,
                });
            if !touch.token0.is_zero() {
                state.token0_address = hex_address(&touch.token0);
            }
            if !touch.token1.is_zero() {
                state.token1_address = hex_address(&touch.token1);
            }
            if let Some(snapshot) = touch.snapshot {
                state.reserve0 = snapshot.reserve0.to_string();
                state.reserve1 = snapshot.reserve1.to_string();
                state.total_supply = snapshot.total_supply.to_string();
                state.price = format_price(snapshot.reserve0, snapshot.reserve1);
            }
            state.tx_count += touch.tx_count as i64;
            state.last_block_number = state.last_block_number.max(touch.last_block as i64);
        }

        for completion in &updates.tasks {
            let ids: Vec<i64> = self
                .tasks
                .iter()
                .filter(|task| task.auto_verified && task.name == completion.task_name)
                .map(|task| task.task_id)
                .collect();
            for task_id in ids {
                self.task_status
                    .insert((completion.wallet.clone(), task_id), TASK_STATUS_DONE);
            }
        }

        for (airdrop_id, update) in &updates.whitelist {
            self.upsert_whitelist(*airdrop_id, update);
        }

        for created in &updates.campaigns_created {
            let campaign = self
                .campaigns
                .entry(created.airdrop_id)
                .or_insert_with(|| AirdropCampaign {
                    airdrop_id: created.airdrop_id.to_string(),
                    chain_id: created.chain_id as i64,
                    contract_address: hex_address(&created.contract),
                    name: String::new(),
                    merkle_root: hex_hash(&created.merkle_root),
                    total_reward: "0".to_string(),
                    tree_version: created.tree_version.to_string(),
                    is_active: false,
                });
            campaign.chain_id = created.chain_id as i64;
            campaign.contract_address = hex_address(&created.contract);
            campaign.name = created.name.clone();
            campaign.total_reward = created.total_reward.to_string();
            if !campaign.is_active {
                campaign.merkle_root = hex_hash(&created.merkle_root);
                campaign.tree_version = created.tree_version.to_string();
            }
        }

        for activated in &updates.campaigns_activated {
            let campaign = self
                .campaigns
                .entry(activated.airdrop_id)
                .or_insert_with(|| AirdropCampaign {
                    airdrop_id: activated.airdrop_id.to_string(),
                    chain_id: activated.chain_id as i64,
                    contract_address: hex_address(&activated.contract),
                    name: String::new(),
                    merkle_root: String::new(),
                    total_reward: "0".to_string(),
                    tree_version: "0".to_string(),
                    is_active: true,
                });
            campaign.is_active = true;
        }
    }

    fn upsert_whitelist(&mut self, airdrop_id: U256, update: &crate::models::WhitelistUpdate) {
        let entry = self
            .whitelist
            .entry((airdrop_id, update.wallet))
            .or_insert_with(|| WhitelistEntry {
                airdrop_id: airdrop_id.to_string(),
                wallet_address: hex_address(&update.wallet),
                total_reward_wei: "0".to_string(),
                merkle_proof: Vec::new(),
            });
        entry.total_reward_wei = update.total_reward_wei.to_string();
        if let Some(proof) = &update.merkle_proof {
            entry.merkle_proof = proof.iter().map(hex_hash).collect();
        }
    }
}

#[async_trait]
impl IndexerStore for MemoryStore {
    async fn checkpoint(&self, chain_id: u64, contract: Address) -> Result<Option<u64>, IndexerError> {
        Ok(lock(&self.state).checkpoints.get(&(chain_id, contract)).copied())
    }

    async fn commit_batch(&self, batch: &IngestBatch) -> Result<BatchSummary, IndexerError> {
        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(IndexerError::Other(anyhow::anyhow!("injected commit failure")));
        }

        let mut guard = lock(&self.state);
        let mut state = guard.clone();

        let fresh: Vec<TypedRecord> = batch
            .records
            .iter()
            .filter(|record| state.insert_record(record))
            .cloned()
            .collect();

        state.apply(&DerivedUpdates::from_records(&fresh, &batch.snapshots));

        let checkpoint = state
            .checkpoints
            .entry((batch.chain_id, batch.contract))
            .or_insert(0);
        *checkpoint = (*checkpoint).max(batch.to_block);

        *guard = state;
        Ok(summarize(batch, &fresh))
    }

    async fn pool_tokens(
        &self,
        chain_id: u64,
        pool: Address,
    ) -> Result<Option<(Address, Address)>, IndexerError> {
        let state = lock(&self.state);
        Ok(state.pools.get(&(chain_id, pool)).and_then(|p| {
            Some((p.token0_address.parse().ok()?, p.token1_address.parse().ok()?))
        }))
    }

    async fn active_campaigns(&self) -> Result<Vec<AirdropCampaign>, IndexerError> {
        Ok(lock(&self.state)
            .campaigns
            .values()
            .filter(|c| c.is_active)
            .cloned()
            .collect())
    }

    async fn completed_task_rewards(&self, airdrop_id: U256) -> Result<Vec<TaskReward>, IndexerError> {
        let state = lock(&self.state);
        let bound: HashSet<i64> = state
            .bindings
            .iter()
            .filter(|(id, _)| *id == airdrop_id)
            .map(|(_, task_id)| *task_id)
            .collect();

        Ok(state
            .task_status
            .iter()
            .filter(|((_, task_id), status)| bound.contains(task_id) && **status == TASK_STATUS_DONE)
            .filter_map(|((wallet, task_id), _)| {
                let task = state.tasks.iter().find(|t| t.task_id == *task_id)?;
                Some(TaskReward {
                    wallet_address: wallet.clone(),
                    reward_amount: task.reward,
                })
            })
            .collect())
    }

    async fn persist_campaign_root(&self, update: &CampaignRootUpdate) -> Result<(), IndexerError> {
        let mut state = lock(&self.state);
        for entry in &update.entries {
            state.upsert_whitelist(update.airdrop_id, entry);
        }
        if let Some(campaign) = state.campaigns.get_mut(&update.airdrop_id) {
            campaign.merkle_root = hex_hash(&update.merkle_root);
            campaign.tree_version = update.tree_version.to_string();
        }
        state.root_updates.push(update.clone());
        Ok(())
    }

    async fn user_balance(
        &self,
        chain_id: u64,
        token: Address,
        wallet: Address,
    ) -> Result<Option<UserBalance>, IndexerError> {
        Ok(lock(&self.state)
            .balances
            .get(&(chain_id, token, wallet))
            .map(|(amount, last_block)| UserBalance {
                chain_id: chain_id as i64,
                token_address: hex_address(&token),
                wallet_address: hex_address(&wallet),
                total_amount: amount.to_string(),
                last_block_number: *last_block as i64,
            }))
    }

    async fn pool_state(&self, chain_id: u64, pool: Address) -> Result<Option<PoolState>, IndexerError> {
        Ok(lock(&self.state).pools.get(&(chain_id, pool)).cloned())
    }

    async fn pool_events(
        &self,
        chain_id: u64,
        pool: Address,
        limit: usize,
    ) -> Result<Vec<PoolEventRecord>, IndexerError> {
        let state = lock(&self.state);
        let mut events: Vec<PoolEventRecord> = state
            .records
            .iter()
            .filter_map(|record| match record {
                TypedRecord::Pool(e) if e.chain_id == chain_id && e.pool == pool => Some(PoolEventRecord {
                    chain_id: e.chain_id as i64,
                    pool_address: hex_address(&e.pool),
                    event_kind: e.kind.as_str().to_string(),
                    wallet_address: hex_address(&e.wallet),
                    token0_address: hex_address(&e.token0),
                    token1_address: hex_address(&e.token1),
                    amount0_in: e.amount0_in.to_string(),
                    amount1_in: e.amount1_in.to_string(),
                    amount0_out: e.amount0_out.to_string(),
                    amount1_out: e.amount1_out.to_string(),
                    tx_hash: hex_hash(&e.tx_hash),
                    log_index: e.log_index as i64,
                    block_number: e.block_number as i64,
                }),
                _ => None,
            })
            .collect();
        events.sort_by(|a, b| (b.block_number, b.log_index).cmp(&(a.block_number, a.log_index)));
        events.truncate(limit);
        Ok(events)
    }

    async fn whitelist_entry(
        &self,
        airdrop_id: U256,
        wallet: Address,
    ) -> Result<Option<WhitelistEntry>, IndexerError> {
        Ok(lock(&self.state).whitelist.get(&(airdrop_id, wallet)).cloned())
    }

    async fn campaign(&self, airdrop_id: U256) -> Result<Option<AirdropCampaign>, IndexerError> {
        Ok(lock(&self.state).campaigns.get(&airdrop_id).cloned())
    }

    async fn score_rules(&self) -> Result<Vec<ScoreRule>, IndexerError> {
        Ok(lock(&self.state).score_rules.clone())
    }

    async fn points_accounts(&self) -> Result<Vec<PointsAccount>, IndexerError> {
        let state = lock(&self.state);
        Ok(state
            .balances
            .keys()
            .map(|key| {
                let (chain_id, token, wallet) = key;
                let points = state.points.get(key).cloned().unwrap_or_default();
                PointsAccount {
                    chain_id: *chain_id as i64,
                    token_address: hex_address(token),
                    wallet_address: hex_address(wallet),
                    points: points.points,
                    points_amount: points.amount.to_string(),
                    points_time: points.time,
                    points_cursor: points.cursor,
                }
            })
            .collect())
    }

    async fn ledger_movements(
        &self,
        chain_id: u64,
        token: Address,
        wallet: Address,
        after_id: i64,
    ) -> Result<Vec<LedgerMovement>, IndexerError> {
        // Row ids follow insertion order across the event history.
        Ok(lock(&self.state)
            .records
            .iter()
            .enumerate()
            .filter_map(|(index, record)| match record {
                TypedRecord::Ledger(e) if e.chain_id == chain_id && e.token == token && e.wallet == wallet => {
                    Some(LedgerMovement {
                        id: index as i64 + 1,
                        signed_amount: e.signed_amount().to_string(),
                        operation_time: e.operation_time,
                    })
                }
                _ => None,
            })
            .filter(|movement| movement.id > after_id)
            .collect())
    }

    async fn save_points(&self, update: &PointsUpdate) -> Result<bool, IndexerError> {
        let parse = |raw: &str| {
            raw.parse::<Address>()
                .map_err(|e| IndexerError::InvalidValue(format!("address {raw}: {e}")))
        };
        let key = (
            update.chain_id as u64,
            parse(&update.token_address)?,
            parse(&update.wallet_address)?,
        );

        let mut state = lock(&self.state);
        if !state.balances.contains_key(&key) {
            return Ok(false);
        }
        let slot = state.points.entry(key).or_default();
        if slot.cursor != update.previous_cursor {
            return Ok(false);
        }
        *slot = MemoryPoints {
            points: update.points,
            amount: update.points_amount,
            time: Some(update.points_time),
            cursor: update.points_cursor,
        };
        Ok(true)
    }

    async fn reconcile_user_balance(
        &self,
        chain_id: u64,
        token: Address,
        wallet: Address,
    ) -> Result<String, IndexerError> {
        let mut state = lock(&self.state);
        let (total, last_block) = state
            .records
            .iter()
            .filter_map(|record| match record {
                TypedRecord::Ledger(e) if e.chain_id == chain_id && e.token == token && e.wallet == wallet => {
                    Some((e.signed_amount(), e.block_number))
                }
                _ => None,
            })
            .fold((I256::ZERO, 0u64), |(sum, last), (amount, block)| {
                (sum + amount, last.max(block))
            });

        let slot = state
            .balances
            .entry((chain_id, token, wallet))
            .or_insert((I256::ZERO, 0));
        slot.0 = total;
        slot.1 = slot.1.max(last_block);
        Ok(total.to_string())
    }
}

// ==========================================
// CHAIN
// ==========================================

#[derive(Debug, Default)]
struct ChainState {
    head: u64,
    logs: Vec<RawLog>,
    senders: HashMap<B256, Address>,
    pairs: HashMap<Address, (Address, Address)>,
    snapshots: HashMap<Address, PoolSnapshot>,
    requested: Vec<(Address, u64, u64)>,
    fail_logs: bool,
}

/// Scriptable chain: a head height, a log set and pair contract state.
#[derive(Debug, Default)]
pub struct MockChain {
    state: Mutex<ChainState>,
}

impl MockChain {
    pub fn new(head: u64) -> Self {
        let chain = Self::default();
        chain.set_head(head);
        chain
    }

    pub fn set_head(&self, head: u64) {
        lock(&self.state).head = head;
    }

    pub fn push_log(&self, log: RawLog) {
        lock(&self.state).logs.push(log);
    }

    pub fn set_sender(&self, tx_hash: B256, sender: Address) {
        lock(&self.state).senders.insert(tx_hash, sender);
    }

    pub fn set_pair(&self, pool: Address, token0: Address, token1: Address) {
        lock(&self.state).pairs.insert(pool, (token0, token1));
    }

    pub fn set_snapshot(&self, pool: Address, snapshot: PoolSnapshot) {
        lock(&self.state).snapshots.insert(pool, snapshot);
    }

    pub fn clear_snapshot(&self, pool: Address) {
        lock(&self.state).snapshots.remove(&pool);
    }

    /// Make every log query fail until reset.
    pub fn fail_log_queries(&self, fail: bool) {
        lock(&self.state).fail_logs = fail;
    }

    /// Every `(contract, from, to)` range that was queried, in order.
    pub fn requested_ranges(&self) -> Vec<(Address, u64, u64)> {
        lock(&self.state).requested.clone()
    }
}

#[async_trait]
impl LogFetcher for MockChain {
    async fn current_height(&self) -> Result<u64, IndexerError> {
        Ok(lock(&self.state).head)
    }

    async fn logs_in_range(
        &self,
        contract: Address,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RawLog>, IndexerError> {
        let mut state = lock(&self.state);
        if state.fail_logs {
            return Err(IndexerError::RpcError("eth_getLogs unavailable".to_string()));
        }
        state.requested.push((contract, from_block, to_block));

        let mut logs: Vec<RawLog> = state
            .logs
            .iter()
            .filter(|log| {
                log.address == contract && log.block_number >= from_block && log.block_number <= to_block
            })
            .cloned()
            .collect();
        logs.sort_by_key(|log| (log.block_number, log.log_index));
        Ok(logs)
    }

    async fn sender_of(&self, tx_hash: B256) -> Result<Address, IndexerError> {
        lock(&self.state)
            .senders
            .get(&tx_hash)
            .copied()
            .ok_or_else(|| IndexerError::RpcError(format!("transaction {tx_hash} not found")))
    }
}

#[async_trait]
impl PoolReader for MockChain {
    async fn token_pair(&self, pool: Address) -> Result<(Address, Address), IndexerError> {
        lock(&self.state)
            .pairs
            .get(&pool)
            .copied()
            .ok_or_else(|| IndexerError::RpcError(format!("token0() reverted on {pool}")))
    }

    async fn snapshot(&self, pool: Address) -> Result<PoolSnapshot, IndexerError> {
        lock(&self.state)
            .snapshots
            .get(&pool)
            .copied()
            .ok_or_else(|| IndexerError::RpcError(format!("getReserves() reverted on {pool}")))
    }
}

// ==========================================
// SUBMITTER
// ==========================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedRoot {
    pub chain_id: u64,
    pub contract: Address,
    pub airdrop_id: U256,
    pub root: B256,
    pub version: u32,
}

/// Records every root update and answers with a scripted result.
#[derive(Debug, Default)]
pub struct RecordingSubmitter {
    calls: Mutex<Vec<SubmittedRoot>>,
    failure: Mutex<Option<SubmitError>>,
}

impl RecordingSubmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every call with `error` until cleared.
    pub fn fail_with(&self, error: Option<SubmitError>) {
        *lock(&self.failure) = error;
    }

    pub fn calls(&self) -> Vec<SubmittedRoot> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl MerkleRootSubmitter for RecordingSubmitter {
    async fn update_merkle_root(
        &self,
        chain_id: u64,
        contract: Address,
        airdrop_id: U256,
        root: B256,
        version: u32,
    ) -> Result<B256, SubmitError> {
        lock(&self.calls).push(SubmittedRoot {
            chain_id,
            contract,
            airdrop_id,
            root,
            version,
        });
        if let Some(error) = lock(&self.failure).clone() {
            return Err(error);
        }
        Ok(keccak256(root))
    }
}

// ==========================================
// LOG BUILDERS
// ==========================================

/// Deterministic transaction hash for a log position.
pub fn tx_hash_at(block: u64, log_index: u64) -> B256 {
    let mut bytes = [0u8; 16];
    bytes[..8].copy_from_slice(&block.to_be_bytes());
    bytes[8..].copy_from_slice(&log_index.to_be_bytes());
    keccak256(bytes)
}

fn words(values: &[U256]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_be_bytes::<32>()).collect()
}

fn event_topic(kind: EventKind) -> B256 {
    kind.topic().unwrap_or_default()
}

fn raw_log(contract: Address, topics: Vec<B256>, data: Vec<u8>, block: u64, log_index: u64) -> RawLog {
    RawLog {
        address: contract,
        topics,
        data: Bytes::from(data),
        block_number: block,
        tx_hash: tx_hash_at(block, log_index),
        log_index,
    }
}

pub fn staked_log(
    contract: Address,
    wallet: Address,
    token: Address,
    amount: u64,
    block: u64,
    log_index: u64,
) -> RawLog {
    let op_time = U256::from(1_700_000_000u64 + block);
    raw_log(
        contract,
        vec![
            event_topic(EventKind::Staked),
            wallet.into_word(),
            B256::from(U256::from(1u64)),
            token.into_word(),
        ],
        words(&[U256::from(amount), op_time, op_time + U256::from(86_400u64)]),
        block,
        log_index,
    )
}

pub fn withdrawn_log(
    contract: Address,
    wallet: Address,
    token: Address,
    amount: u64,
    block: u64,
    log_index: u64,
) -> RawLog {
    raw_log(
        contract,
        vec![
            event_topic(EventKind::Withdrawn),
            wallet.into_word(),
            B256::from(U256::from(1u64)),
            token.into_word(),
        ],
        words(&[U256::from(amount), U256::from(1_700_000_000u64 + block)]),
        block,
        log_index,
    )
}

/// Swap of `amount_in` token0 for `amount_out` token1.
pub fn swap_log(pool: Address, router: Address, amount_in: u64, amount_out: u64, block: u64, log_index: u64) -> RawLog {
    raw_log(
        pool,
        vec![event_topic(EventKind::Swap), router.into_word(), router.into_word()],
        words(&[
            U256::from(amount_in),
            U256::ZERO,
            U256::ZERO,
            U256::from(amount_out),
        ]),
        block,
        log_index,
    )
}

pub fn mint_log(pool: Address, router: Address, amount0: u64, amount1: u64, block: u64, log_index: u64) -> RawLog {
    raw_log(
        pool,
        vec![event_topic(EventKind::Mint), router.into_word()],
        words(&[U256::from(amount0), U256::from(amount1)]),
        block,
        log_index,
    )
}

pub fn total_reward_updated_log(
    contract: Address,
    airdrop_id: u64,
    wallet: Address,
    total: u64,
    block: u64,
    log_index: u64,
) -> RawLog {
    raw_log(
        contract,
        vec![
            event_topic(EventKind::TotalRewardUpdated),
            B256::from(U256::from(airdrop_id)),
            wallet.into_word(),
        ],
        words(&[
            U256::from(total),
            U256::ZERO,
            U256::from(total),
            U256::from(1_700_000_000u64 + block),
        ]),
        block,
        log_index,
    )
}

pub fn airdrop_created_log(
    contract: Address,
    airdrop_id: u64,
    name: &str,
    root: B256,
    block: u64,
    log_index: u64,
) -> RawLog {
    let mut data = words(&[
        U256::from(128u64),
        U256::from_be_bytes(root.0),
        U256::from(1_000u64),
        U256::from(1u64),
        U256::from(name.len()),
    ]);
    let mut tail = name.as_bytes().to_vec();
    tail.resize(name.len().div_ceil(32) * 32, 0);
    data.extend(tail);

    raw_log(
        contract,
        vec![event_topic(EventKind::AirdropCreated), B256::from(U256::from(airdrop_id))],
        data,
        block,
        log_index,
    )
}

pub fn airdrop_activated_log(contract: Address, airdrop_id: u64, block: u64, log_index: u64) -> RawLog {
    raw_log(
        contract,
        vec![event_topic(EventKind::AirdropActivated), B256::from(U256::from(airdrop_id))],
        Vec::new(),
        block,
        log_index,
    )
}

/// A log whose topic0 matches no watched event.
pub fn unknown_log(contract: Address, block: u64, log_index: u64) -> RawLog {
    raw_log(
        contract,
        vec![keccak256("Approval(address,address,uint256)")],
        words(&[U256::from(1u64)]),
        block,
        log_index,
    )
}
