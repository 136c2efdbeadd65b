//! Periodic Merkle rebuild for active airdrop campaigns.

use crate::error::IndexerError;
use crate::merkle::{RewardTree, build_reward_tree};
use crate::models::{AirdropCampaign, CampaignRootUpdate, TaskReward, WhitelistUpdate, hex_hash};
use crate::rpc::submitter::{MerkleRootSubmitter, SubmitError};
use crate::store::IndexerStore;
use alloy::primitives::{Address, B256, U256};
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Reward amounts are configured in whole tokens; leaves commit to wei.
const REWARD_DECIMALS: u32 = 18;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebuildOutcome {
    /// No wallet has a completed, bound task yet.
    NoRewards,
    Unchanged { root: B256 },
    /// No signing key configured; nothing was submitted or persisted.
    SkippedNoSigner { root: B256 },
    Updated {
        root: B256,
        version: u32,
        tx_hash: B256,
        wallets: usize,
    },
}

/// Convert a whole-token decimal to wei, truncating below 1 wei.
pub fn scale_to_wei(amount: Decimal) -> Option<U256> {
    if amount.is_sign_negative() {
        return None;
    }
    let mantissa = U256::from(amount.mantissa().unsigned_abs());
    let scale = amount.scale();
    let ten = U256::from(10u64);
    if scale <= REWARD_DECIMALS {
        mantissa.checked_mul(ten.pow(U256::from(REWARD_DECIMALS - scale)))
    } else {
        Some(mantissa / ten.pow(U256::from(scale - REWARD_DECIMALS)))
    }
}

/// Sum completed-task rewards per wallet and scale them to wei. Wallets
/// that end up at zero are dropped.
pub fn aggregate_rewards(rows: &[TaskReward]) -> Vec<(Address, U256)> {
    let mut totals: BTreeMap<Address, Decimal> = BTreeMap::new();
    for row in rows {
        let wallet = match Address::from_str(row.wallet_address.trim()) {
            Ok(wallet) => wallet,
            Err(e) => {
                warn!(wallet = %row.wallet_address, error = %e, "skipping reward for invalid wallet");
                continue;
            }
        };
        let total = totals.entry(wallet).or_insert(Decimal::ZERO);
        match total.checked_add(row.reward_amount) {
            Some(sum) => *total = sum,
            None => warn!(%wallet, "reward total overflowed, keeping previous sum"),
        }
    }

    totals
        .into_iter()
        .filter_map(|(wallet, total)| match scale_to_wei(total) {
            Some(wei) if !wei.is_zero() => Some((wallet, wei)),
            Some(_) => None,
            None => {
                warn!(%wallet, %total, "reward total cannot be expressed in wei");
                None
            }
        })
        .collect()
}

/// Version tag for a new root: the current unix time, bumped past the stored
/// version if the clock has not moved on. Fails once no larger `uint32` is left.
pub fn next_tree_version(now_secs: i64, stored: &str) -> Result<u32, IndexerError> {
    let now = u64::try_from(now_secs).unwrap_or(0);
    let stored = stored.trim().parse::<u64>().unwrap_or(0);
    let next = if now > stored { now } else { stored.saturating_add(1) };
    u32::try_from(next).map_err(|_| {
        IndexerError::InvalidValue(format!("tree version {next} does not fit in uint32"))
    })
}

fn same_root(stored: &str, root: &B256) -> bool {
    let stored = stored.trim().trim_start_matches("0x").trim_start_matches("0X");
    let computed = hex_hash(root);
    stored.eq_ignore_ascii_case(computed.trim_start_matches("0x"))
}

/// Push a new root to a campaign contract. Shared by the rebuild job and
/// manual admin triggers.
pub async fn submit_merkle_root_update(
    submitter: &dyn MerkleRootSubmitter,
    chain_id: u64,
    contract: Address,
    airdrop_id: U256,
    root: B256,
    version: u32,
) -> Result<B256, SubmitError> {
    info!(chain_id, %contract, %airdrop_id, %root, version, "submitting merkle root");
    let tx_hash = submitter
        .update_merkle_root(chain_id, contract, airdrop_id, root, version)
        .await?;
    info!(chain_id, %airdrop_id, %tx_hash, "merkle root confirmed on-chain");
    Ok(tx_hash)
}

pub struct AirdropRebuildJob {
    store: Arc<dyn IndexerStore>,
    submitter: Arc<dyn MerkleRootSubmitter>,
    interval: Duration,
}

impl AirdropRebuildJob {
    pub fn new(
        store: Arc<dyn IndexerStore>,
        submitter: Arc<dyn MerkleRootSubmitter>,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            submitter,
            interval,
        }
    }

    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = self.interval.as_secs(), "airdrop rebuild job started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.rebuild_all() => {
                    if let Err(e) = result {
                        warn!(error = %e, "failed to load active campaigns");
                    }
                }
            }
        }

        info!("airdrop rebuild job stopped");
    }

    /// Rebuild every active campaign in turn. Per-campaign failures are
    /// logged and do not stop the cycle.
    pub async fn rebuild_all(&self) -> Result<Vec<(String, RebuildOutcome)>, IndexerError> {
        let campaigns = self.store.active_campaigns().await?;
        let mut outcomes = Vec::with_capacity(campaigns.len());

        for campaign in campaigns {
            match self.rebuild_campaign(&campaign).await {
                Ok(outcome) => outcomes.push((campaign.airdrop_id.clone(), outcome)),
                Err(e) => error!(
                    airdrop_id = %campaign.airdrop_id,
                    chain_id = campaign.chain_id,
                    error = %e,
                    "campaign rebuild failed, will retry next cycle"
                ),
            }
        }
        Ok(outcomes)
    }

    /// Aggregate, build, and if the root moved: commit it on-chain first,
    /// then persist the proofs and root.
    pub async fn rebuild_campaign(&self, campaign: &AirdropCampaign) -> Result<RebuildOutcome, IndexerError> {
        let airdrop_id = U256::from_str(&campaign.airdrop_id).map_err(|e| {
            IndexerError::InvalidValue(format!("airdrop id {}: {e}", campaign.airdrop_id))
        })?;
        let contract = Address::from_str(&campaign.contract_address).map_err(|e| {
            IndexerError::InvalidValue(format!("contract {}: {e}", campaign.contract_address))
        })?;
        let chain_id = u64::try_from(campaign.chain_id)
            .map_err(|e| IndexerError::InvalidValue(format!("chain id {}: {e}", campaign.chain_id)))?;

        let rows = self.store.completed_task_rewards(airdrop_id).await?;
        let rewards = aggregate_rewards(&rows);
        if rewards.is_empty() {
            info!(%airdrop_id, "no completed rewards, skipping rebuild");
            return Ok(RebuildOutcome::NoRewards);
        }

        let tree = build_reward_tree(&rewards);
        if same_root(&campaign.merkle_root, &tree.root) {
            info!(%airdrop_id, root = %tree.root, "merkle root unchanged");
            return Ok(RebuildOutcome::Unchanged { root: tree.root });
        }

        let version = next_tree_version(Utc::now().timestamp(), &campaign.tree_version)?;
        let tx_hash = match submit_merkle_root_update(
            self.submitter.as_ref(),
            chain_id,
            contract,
            airdrop_id,
            tree.root,
            version,
        )
        .await
        {
            Ok(tx_hash) => tx_hash,
            Err(SubmitError::MissingSigner) => {
                warn!(%airdrop_id, "no admin signing key configured, skipping root update");
                return Ok(RebuildOutcome::SkippedNoSigner { root: tree.root });
            }
            Err(e) => return Err(e.into()),
        };

        let update = root_update(airdrop_id, version, &tree);
        self.store.persist_campaign_root(&update).await?;

        info!(
            %airdrop_id,
            root = %tree.root,
            version,
            wallets = update.entries.len(),
            "merkle root rebuilt"
        );
        Ok(RebuildOutcome::Updated {
            root: tree.root,
            version,
            tx_hash,
            wallets: update.entries.len(),
        })
    }
}

fn root_update(airdrop_id: U256, version: u32, tree: &RewardTree) -> CampaignRootUpdate {
    CampaignRootUpdate {
        airdrop_id,
        merkle_root: tree.root,
        tree_version: version,
        entries: tree
            .entries
            .iter()
            .map(|entry| WhitelistUpdate {
                wallet: entry.wallet,
                total_reward_wei: entry.amount,
                merkle_proof: Some(entry.proof.clone()),
            })
            .collect(),
    }
}
