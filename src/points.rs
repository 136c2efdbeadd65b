//! Hourly points accrual over the staking ledger.
//!
//! A wallet earns `score` points per whole staked token per hour. Each run
//! credits the amount held since the previous run, then folds in every ledger
//! row past the account's cursor, credited from its own operation time.

use crate::error::IndexerError;
use crate::models::{LedgerMovement, PointsAccount, PointsUpdate, ScoreRule};
use crate::store::IndexerStore;
use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What one accrual pass did across every account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PointsSummary {
    pub updated: usize,
    pub without_rule: usize,
    /// Cursor moved by another writer between read and save.
    pub conflicts: usize,
    pub failed: usize,
}

fn invalid(message: String) -> IndexerError {
    IndexerError::InvalidValue(message)
}

fn parse_amount(raw: &str) -> Result<i128, IndexerError> {
    raw.trim()
        .parse::<i128>()
        .map_err(|e| invalid(format!("amount {raw}: {e}")))
}

/// Points per hour for `amount` base units under `rule`.
pub fn hourly_rate(amount: i128, rule: &ScoreRule) -> Result<Decimal, IndexerError> {
    let scale = u32::try_from(rule.decimals)
        .map_err(|_| invalid(format!("token decimals {}", rule.decimals)))?;
    let tokens = Decimal::try_from_i128_with_scale(amount, scale)
        .map_err(|e| invalid(format!("amount {amount} at {scale} decimals: {e}")))?;
    tokens
        .checked_mul(rule.score)
        .ok_or_else(|| invalid(format!("rate for {tokens} tokens overflowed")))
}

/// Points earned by holding `amount` from `since` until `now`, in whole
/// minutes and rounded to two places. Nothing accrues for a future `since`.
pub fn points_between(
    amount: i128,
    since: DateTime<Utc>,
    now: DateTime<Utc>,
    rule: &ScoreRule,
) -> Result<Decimal, IndexerError> {
    let minutes = (now - since).num_minutes().max(0);
    let points = hourly_rate(amount, rule)?
        .checked_mul(Decimal::from(minutes))
        .and_then(|p| p.checked_div(Decimal::from(60)))
        .ok_or_else(|| invalid(format!("points for {amount} over {minutes} minutes overflowed")))?;
    Ok(points.round_dp(2))
}

/// New points state for `account` at `now`.
pub fn accrue(
    account: &PointsAccount,
    rule: &ScoreRule,
    movements: &[LedgerMovement],
    now: DateTime<Utc>,
) -> Result<PointsUpdate, IndexerError> {
    let mut held = parse_amount(&account.points_amount)?;
    let mut earned = match account.points_time {
        Some(since) => points_between(held, since, now, rule)?,
        None => Decimal::ZERO,
    };
    let mut cursor = account.points_cursor;

    for movement in movements {
        let amount = parse_amount(&movement.signed_amount)?;
        let delta = points_between(amount, movement.operation_time, now, rule)?;
        earned = earned
            .checked_add(delta)
            .ok_or_else(|| invalid(format!("points of {} overflowed", account.wallet_address)))?;
        held = held
            .checked_add(amount)
            .ok_or_else(|| invalid(format!("held amount of {} overflowed", account.wallet_address)))?;
        cursor = cursor.max(movement.id);
    }

    let points = account
        .points
        .checked_add(earned)
        .ok_or_else(|| invalid(format!("points of {} overflowed", account.wallet_address)))?;

    Ok(PointsUpdate {
        chain_id: account.chain_id,
        token_address: account.token_address.clone(),
        wallet_address: account.wallet_address.clone(),
        points,
        points_amount: held,
        points_time: now,
        previous_cursor: account.points_cursor,
        points_cursor: cursor,
    })
}

pub struct PointsJob {
    store: Arc<dyn IndexerStore>,
    interval: Duration,
}

impl PointsJob {
    pub fn new(store: Arc<dyn IndexerStore>, interval: Duration) -> Self {
        Self { store, interval }
    }

    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = self.interval.as_secs(), "points job started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.accrue_all(Utc::now()) => {
                    if let Err(e) = result {
                        warn!(error = %e, "points accrual failed, retrying next interval");
                    }
                }
            }
        }

        info!("points job stopped");
    }

    /// Accrue every account that has a score rule. A failing account is
    /// logged and left for the next pass.
    pub async fn accrue_all(&self, now: DateTime<Utc>) -> Result<PointsSummary, IndexerError> {
        let rules: HashMap<(i64, String), ScoreRule> = self
            .store
            .score_rules()
            .await?
            .into_iter()
            .map(|rule| ((rule.chain_id, rule.token_address.to_lowercase()), rule))
            .collect();
        let accounts = self.store.points_accounts().await?;

        let mut summary = PointsSummary::default();
        for account in &accounts {
            let key = (account.chain_id, account.token_address.to_lowercase());
            let Some(rule) = rules.get(&key) else {
                summary.without_rule += 1;
                continue;
            };

            match self.accrue_account(account, rule, now).await {
                Ok(true) => summary.updated += 1,
                Ok(false) => {
                    debug!(wallet = %account.wallet_address, "points cursor moved, skipping");
                    summary.conflicts += 1;
                }
                Err(e) => {
                    warn!(
                        chain_id = account.chain_id,
                        token = %account.token_address,
                        wallet = %account.wallet_address,
                        error = %e,
                        "points accrual failed for account"
                    );
                    summary.failed += 1;
                }
            }
        }

        info!(
            accounts = accounts.len(),
            updated = summary.updated,
            without_rule = summary.without_rule,
            failed = summary.failed,
            "points accrued"
        );
        Ok(summary)
    }

    async fn accrue_account(
        &self,
        account: &PointsAccount,
        rule: &ScoreRule,
        now: DateTime<Utc>,
    ) -> Result<bool, IndexerError> {
        let chain_id = u64::try_from(account.chain_id)
            .map_err(|_| invalid(format!("chain id {}", account.chain_id)))?;
        let token = Address::from_str(&account.token_address)
            .map_err(|e| invalid(format!("token {}: {e}", account.token_address)))?;
        let wallet = Address::from_str(&account.wallet_address)
            .map_err(|e| invalid(format!("wallet {}: {e}", account.wallet_address)))?;

        let movements = self
            .store
            .ledger_movements(chain_id, token, wallet, account.points_cursor)
            .await?;
        let update = accrue(account, rule, &movements, now)?;
        self.store.save_points(&update).await
    }
}
