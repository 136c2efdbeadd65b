use super::{
    AirdropCampaign, CampaignActivated, CampaignCreated, CampaignRootUpdate, LedgerEntry,
    LedgerMovement, PointsAccount, PointsUpdate, PoolEvent, PoolEventRecord, PoolState,
    RewardEvent, ScoreRule, TaskReward, UserBalance, WhitelistEntry, WhitelistUpdate, hex_address,
    hex_hash,
};
use crate::updaters::{BalanceDelta, PoolTouch, TaskCompletion};
use alloy::primitives::{Address, U256};
use anyhow::{Context, Result};
use sqlx::{PgConnection, PgPool};

/// Task status value for a completed task.
pub const TASK_STATUS_DONE: i16 = 2;

// ==========================================
// CHECKPOINTS
// ==========================================

pub async fn get_checkpoint(pool: &PgPool, chain_id: u64, contract: &Address) -> Result<Option<u64>> {
    let block: Option<i64> = sqlx::query_scalar(
        r#"
        SELECT last_block_number
        FROM chain_checkpoints
        WHERE chain_id = $1 AND contract_address = $2
        "#,
    )
    .bind(chain_id as i64)
    .bind(hex_address(contract))
    .fetch_optional(pool)
    .await
    .context("Failed to fetch checkpoint")?;

    Ok(block.map(|b| b.max(0) as u64))
}

/// Advance a checkpoint. Never moves it backwards.
pub async fn upsert_checkpoint(
    conn: &mut PgConnection,
    chain_id: u64,
    contract: &Address,
    block: u64,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO chain_checkpoints (chain_id, contract_address, last_block_number, updated_at)
        VALUES ($1, $2, $3, NOW())
        ON CONFLICT (chain_id, contract_address)
        DO UPDATE SET
            last_block_number = GREATEST(chain_checkpoints.last_block_number, EXCLUDED.last_block_number),
            updated_at = NOW()
        "#,
    )
    .bind(chain_id as i64)
    .bind(hex_address(contract))
    .bind(block as i64)
    .execute(conn)
    .await
    .context("Failed to upsert checkpoint")?;

    Ok(())
}

// ==========================================
// EVENT HISTORY (insert once per tx_hash, log_index)
// ==========================================

/// Returns false when the row already existed.
pub async fn insert_ledger_entry(conn: &mut PgConnection, entry: &LedgerEntry) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO ledger_entries (
            chain_id, contract_address, wallet_address, pool_id, token_address,
            signed_amount, event_kind, tx_hash, log_index, block_number,
            operation_time, unlock_time
        ) VALUES ($1, $2, $3, CAST($4 AS NUMERIC), $5, CAST($6 AS NUMERIC), $7, $8, $9, $10, $11, $12)
        ON CONFLICT (tx_hash, log_index) DO NOTHING
        "#,
    )
    .bind(entry.chain_id as i64)
    .bind(hex_address(&entry.contract))
    .bind(hex_address(&entry.wallet))
    .bind(entry.pool_id.to_string())
    .bind(hex_address(&entry.token))
    .bind(entry.signed_amount().to_string())
    .bind(entry.kind.as_str())
    .bind(hex_hash(&entry.tx_hash))
    .bind(entry.log_index as i64)
    .bind(entry.block_number as i64)
    .bind(entry.operation_time)
    .bind(entry.unlock_time)
    .execute(conn)
    .await
    .context("Failed to insert ledger entry")?;

    Ok(result.rows_affected() == 1)
}

pub async fn insert_pool_event(conn: &mut PgConnection, event: &PoolEvent) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO pool_events (
            chain_id, pool_address, event_kind, wallet_address, token0_address, token1_address,
            amount0_in, amount1_in, amount0_out, amount1_out, tx_hash, log_index, block_number
        ) VALUES (
            $1, $2, $3, $4, $5, $6,
            CAST($7 AS NUMERIC), CAST($8 AS NUMERIC), CAST($9 AS NUMERIC), CAST($10 AS NUMERIC),
            $11, $12, $13
        )
        ON CONFLICT (tx_hash, log_index) DO NOTHING
        "#,
    )
    .bind(event.chain_id as i64)
    .bind(hex_address(&event.pool))
    .bind(event.kind.as_str())
    .bind(hex_address(&event.wallet))
    .bind(hex_address(&event.token0))
    .bind(hex_address(&event.token1))
    .bind(event.amount0_in.to_string())
    .bind(event.amount1_in.to_string())
    .bind(event.amount0_out.to_string())
    .bind(event.amount1_out.to_string())
    .bind(hex_hash(&event.tx_hash))
    .bind(event.log_index as i64)
    .bind(event.block_number as i64)
    .execute(conn)
    .await
    .context("Failed to insert pool event")?;

    Ok(result.rows_affected() == 1)
}

pub async fn insert_reward_event(conn: &mut PgConnection, event: &RewardEvent) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO reward_events (
            chain_id, contract_address, airdrop_id, wallet_address, event_kind,
            amount, total_reward, claimed_reward, pending_reward,
            event_time, tx_hash, log_index, block_number
        ) VALUES (
            $1, $2, CAST($3 AS NUMERIC), $4, $5,
            CAST($6 AS NUMERIC), CAST($7 AS NUMERIC), CAST($8 AS NUMERIC), CAST($9 AS NUMERIC),
            $10, $11, $12, $13
        )
        ON CONFLICT (tx_hash, log_index) DO NOTHING
        "#,
    )
    .bind(event.chain_id as i64)
    .bind(hex_address(&event.contract))
    .bind(event.airdrop_id.to_string())
    .bind(hex_address(&event.wallet))
    .bind(event.kind.as_str())
    .bind(event.amount.to_string())
    .bind(event.total_reward.to_string())
    .bind(event.claimed_reward.to_string())
    .bind(event.pending_reward.to_string())
    .bind(event.event_time)
    .bind(hex_hash(&event.tx_hash))
    .bind(event.log_index as i64)
    .bind(event.block_number as i64)
    .execute(conn)
    .await
    .context("Failed to insert reward event")?;

    Ok(result.rows_affected() == 1)
}

// ==========================================
// DERIVED STATE
// ==========================================

/// Add a signed delta to a running balance; a new row starts at the delta.
pub async fn apply_balance_delta(conn: &mut PgConnection, delta: &BalanceDelta) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO user_balances (chain_id, token_address, wallet_address, total_amount, last_block_number, updated_at)
        VALUES ($1, $2, $3, CAST($4 AS NUMERIC), $5, NOW())
        ON CONFLICT (chain_id, token_address, wallet_address)
        DO UPDATE SET
            total_amount = user_balances.total_amount + EXCLUDED.total_amount,
            last_block_number = GREATEST(user_balances.last_block_number, EXCLUDED.last_block_number),
            updated_at = NOW()
        "#,
    )
    .bind(delta.chain_id as i64)
    .bind(hex_address(&delta.token))
    .bind(hex_address(&delta.wallet))
    .bind(delta.delta.to_string())
    .bind(delta.last_block as i64)
    .execute(conn)
    .await
    .context("Failed to apply balance delta")?;

    Ok(())
}

/// Bump the pool's tx count and, when a fresh read is available, replace
/// reserves, supply and price. Zero-address tokens never overwrite known ones.
pub async fn upsert_pool_state(conn: &mut PgConnection, touch: &PoolTouch) -> Result<()> {
    let snapshot = touch.snapshot.unwrap_or_default();
    let price = touch.price().unwrap_or_else(|| "0".to_string());

    sqlx::query(
        r#"
        INSERT INTO pool_states (
            chain_id, pool_address, token0_address, token1_address,
            reserve0, reserve1, total_supply, price,
            tx_count, last_block_number, is_active, updated_at
        ) VALUES (
            $1, $2, $3, $4,
            CAST($5 AS NUMERIC), CAST($6 AS NUMERIC), CAST($7 AS NUMERIC), $8,
            $9, $10, TRUE, NOW()
        )
        ON CONFLICT (chain_id, pool_address)
        DO UPDATE SET
            token0_address = CASE WHEN EXCLUDED.token0_address = $11
                THEN pool_states.token0_address ELSE EXCLUDED.token0_address END,
            token1_address = CASE WHEN EXCLUDED.token1_address = $11
                THEN pool_states.token1_address ELSE EXCLUDED.token1_address END,
            reserve0 = CASE WHEN $12 THEN EXCLUDED.reserve0 ELSE pool_states.reserve0 END,
            reserve1 = CASE WHEN $12 THEN EXCLUDED.reserve1 ELSE pool_states.reserve1 END,
            total_supply = CASE WHEN $12 THEN EXCLUDED.total_supply ELSE pool_states.total_supply END,
            price = CASE WHEN $12 THEN EXCLUDED.price ELSE pool_states.price END,
            tx_count = pool_states.tx_count + EXCLUDED.tx_count,
            last_block_number = GREATEST(pool_states.last_block_number, EXCLUDED.last_block_number),
            updated_at = NOW()
        "#,
    )
    .bind(touch.chain_id as i64)
    .bind(hex_address(&touch.pool))
    .bind(hex_address(&touch.token0))
    .bind(hex_address(&touch.token1))
    .bind(snapshot.reserve0.to_string())
    .bind(snapshot.reserve1.to_string())
    .bind(snapshot.total_supply.to_string())
    .bind(price)
    .bind(touch.tx_count as i64)
    .bind(touch.last_block as i64)
    .bind(hex_address(&Address::ZERO))
    .bind(touch.snapshot.is_some())
    .execute(conn)
    .await
    .context("Failed to upsert pool state")?;

    Ok(())
}

/// Flag every auto-verified task with this name as done for the wallet.
pub async fn mark_task_done(conn: &mut PgConnection, completion: &TaskCompletion) -> Result<u64> {
    let result = sqlx::query(
        r#"
        INSERT INTO user_task_status (wallet_address, task_id, user_status, updated_at)
        SELECT $1, t.task_id, $3, NOW()
        FROM tasks t
        WHERE t.task_name = $2 AND t.verify_type = 'auto'
        ON CONFLICT (wallet_address, task_id)
        DO UPDATE SET user_status = EXCLUDED.user_status, updated_at = NOW()
        "#,
    )
    .bind(&completion.wallet)
    .bind(completion.task_name)
    .bind(TASK_STATUS_DONE)
    .execute(conn)
    .await
    .context("Failed to mark task done")?;

    Ok(result.rows_affected())
}

/// Upsert a whitelist row. A `None` proof keeps the stored one.
pub async fn upsert_whitelist_entry(
    conn: &mut PgConnection,
    airdrop_id: &U256,
    update: &WhitelistUpdate,
) -> Result<()> {
    let proof: Option<Vec<String>> = update
        .merkle_proof
        .as_ref()
        .map(|proof| proof.iter().map(hex_hash).collect());

    sqlx::query(
        r#"
        INSERT INTO airdrop_whitelist (airdrop_id, wallet_address, total_reward_wei, merkle_proof, updated_at)
        VALUES (CAST($1 AS NUMERIC), $2, CAST($3 AS NUMERIC), COALESCE($4, '{}'::TEXT[]), NOW())
        ON CONFLICT (airdrop_id, wallet_address)
        DO UPDATE SET
            total_reward_wei = EXCLUDED.total_reward_wei,
            merkle_proof = COALESCE($4, airdrop_whitelist.merkle_proof),
            updated_at = NOW()
        "#,
    )
    .bind(airdrop_id.to_string())
    .bind(hex_address(&update.wallet))
    .bind(update.total_reward_wei.to_string())
    .bind(proof)
    .execute(conn)
    .await
    .context("Failed to upsert whitelist entry")?;

    Ok(())
}

/// Record campaign metadata. The root of an active campaign is left alone.
pub async fn upsert_campaign(conn: &mut PgConnection, created: &CampaignCreated) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO airdrop_campaigns (
            airdrop_id, chain_id, contract_address, name, merkle_root,
            total_reward, tree_version, is_active, updated_at
        ) VALUES (CAST($1 AS NUMERIC), $2, $3, $4, $5, CAST($6 AS NUMERIC), CAST($7 AS NUMERIC), FALSE, NOW())
        ON CONFLICT (airdrop_id)
        DO UPDATE SET
            chain_id = EXCLUDED.chain_id,
            contract_address = EXCLUDED.contract_address,
            name = EXCLUDED.name,
            total_reward = EXCLUDED.total_reward,
            merkle_root = CASE WHEN airdrop_campaigns.is_active
                THEN airdrop_campaigns.merkle_root ELSE EXCLUDED.merkle_root END,
            tree_version = CASE WHEN airdrop_campaigns.is_active
                THEN airdrop_campaigns.tree_version ELSE EXCLUDED.tree_version END,
            updated_at = NOW()
        "#,
    )
    .bind(created.airdrop_id.to_string())
    .bind(created.chain_id as i64)
    .bind(hex_address(&created.contract))
    .bind(&created.name)
    .bind(hex_hash(&created.merkle_root))
    .bind(created.total_reward.to_string())
    .bind(created.tree_version.to_string())
    .execute(conn)
    .await
    .context("Failed to upsert airdrop campaign")?;

    Ok(())
}

pub async fn activate_campaign(conn: &mut PgConnection, activated: &CampaignActivated) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO airdrop_campaigns (airdrop_id, chain_id, contract_address, is_active, updated_at)
        VALUES (CAST($1 AS NUMERIC), $2, $3, TRUE, NOW())
        ON CONFLICT (airdrop_id)
        DO UPDATE SET is_active = TRUE, updated_at = NOW()
        "#,
    )
    .bind(activated.airdrop_id.to_string())
    .bind(activated.chain_id as i64)
    .bind(hex_address(&activated.contract))
    .execute(conn)
    .await
    .context("Failed to activate airdrop campaign")?;

    Ok(())
}

// ==========================================
// MERKLE REBUILD
// ==========================================

pub async fn get_active_campaigns(pool: &PgPool) -> Result<Vec<AirdropCampaign>> {
    let campaigns = sqlx::query_as::<_, AirdropCampaign>(
        r#"
        SELECT
            airdrop_id::text AS airdrop_id,
            chain_id,
            contract_address,
            name,
            merkle_root,
            total_reward::text AS total_reward,
            tree_version::text AS tree_version,
            is_active
        FROM airdrop_campaigns
        WHERE is_active = TRUE
        ORDER BY airdrop_id
        "#,
    )
    .fetch_all(pool)
    .await
    .context("Failed to fetch active campaigns")?;

    Ok(campaigns)
}

/// Completed tasks bound to a campaign, one row per (wallet, task).
pub async fn get_completed_task_rewards(pool: &PgPool, airdrop_id: &U256) -> Result<Vec<TaskReward>> {
    let rewards = sqlx::query_as::<_, TaskReward>(
        r#"
        SELECT uts.wallet_address, t.reward_amount
        FROM user_task_status uts
        JOIN airdrop_task_bindings atb ON atb.task_id = uts.task_id
        JOIN tasks t ON t.task_id = uts.task_id
        WHERE atb.airdrop_id = CAST($1 AS NUMERIC) AND uts.user_status = $2
        ORDER BY uts.wallet_address, t.task_id
        "#,
    )
    .bind(airdrop_id.to_string())
    .bind(TASK_STATUS_DONE)
    .fetch_all(pool)
    .await
    .context("Failed to fetch completed task rewards")?;

    Ok(rewards)
}

/// Write every proof and the new root in one transaction.
pub async fn persist_campaign_root(pool: &PgPool, update: &CampaignRootUpdate) -> Result<()> {
    let mut tx = pool.begin().await?;

    for entry in &update.entries {
        upsert_whitelist_entry(&mut tx, &update.airdrop_id, entry).await?;
    }

    sqlx::query(
        r#"
        UPDATE airdrop_campaigns
        SET merkle_root = $2, tree_version = CAST($3 AS NUMERIC), updated_at = NOW()
        WHERE airdrop_id = CAST($1 AS NUMERIC)
        "#,
    )
    .bind(update.airdrop_id.to_string())
    .bind(hex_hash(&update.merkle_root))
    .bind(update.tree_version.to_string())
    .execute(&mut *tx)
    .await
    .context("Failed to update campaign root")?;

    tx.commit().await.context("Failed to commit campaign root")?;
    Ok(())
}

// ==========================================
// POINTS
// ==========================================

pub async fn get_score_rules(pool: &PgPool) -> Result<Vec<ScoreRule>> {
    let rules = sqlx::query_as::<_, ScoreRule>(
        r#"
        SELECT chain_id, LOWER(token_address) AS token_address, score, decimals
        FROM score_rules
        ORDER BY chain_id, token_address
        "#,
    )
    .fetch_all(pool)
    .await
    .context("Failed to fetch score rules")?;

    Ok(rules)
}

pub async fn get_points_accounts(pool: &PgPool) -> Result<Vec<PointsAccount>> {
    let accounts = sqlx::query_as::<_, PointsAccount>(
        r#"
        SELECT
            chain_id,
            token_address,
            wallet_address,
            points,
            points_amount::text AS points_amount,
            points_time,
            points_cursor
        FROM user_balances
        ORDER BY chain_id, token_address, wallet_address
        "#,
    )
    .fetch_all(pool)
    .await
    .context("Failed to fetch points accounts")?;

    Ok(accounts)
}

/// Ledger rows of one account with an id above `after_id`, oldest first.
pub async fn get_ledger_movements(
    pool: &PgPool,
    chain_id: u64,
    token: &Address,
    wallet: &Address,
    after_id: i64,
) -> Result<Vec<LedgerMovement>> {
    let movements = sqlx::query_as::<_, LedgerMovement>(
        r#"
        SELECT id, signed_amount::text AS signed_amount, operation_time
        FROM ledger_entries
        WHERE chain_id = $1 AND token_address = $2 AND wallet_address = $3 AND id > $4
        ORDER BY id
        "#,
    )
    .bind(chain_id as i64)
    .bind(hex_address(token))
    .bind(hex_address(wallet))
    .bind(after_id)
    .fetch_all(pool)
    .await
    .context("Failed to fetch ledger movements")?;

    Ok(movements)
}

/// Returns false when another writer moved the cursor first.
pub async fn save_points(pool: &PgPool, update: &PointsUpdate) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE user_balances
        SET
            points = $4,
            points_amount = CAST($5 AS NUMERIC),
            points_time = $6,
            points_cursor = $8,
            updated_at = NOW()
        WHERE chain_id = $1 AND token_address = $2 AND wallet_address = $3
            AND points_cursor = $7
        "#,
    )
    .bind(update.chain_id)
    .bind(&update.token_address)
    .bind(&update.wallet_address)
    .bind(update.points)
    .bind(update.points_amount.to_string())
    .bind(update.points_time)
    .bind(update.previous_cursor)
    .bind(update.points_cursor)
    .execute(pool)
    .await
    .context("Failed to save points")?;

    Ok(result.rows_affected() == 1)
}

// ==========================================
// READ ACCESSORS
// ==========================================

pub async fn get_pool_tokens(
    pool: &PgPool,
    chain_id: u64,
    pool_address: &Address,
) -> Result<Option<(String, String)>> {
    let tokens = sqlx::query_as::<_, (String, String)>(
        r#"
        SELECT token0_address, token1_address
        FROM pool_states
        WHERE chain_id = $1 AND pool_address = $2
        "#,
    )
    .bind(chain_id as i64)
    .bind(hex_address(pool_address))
    .fetch_optional(pool)
    .await
    .context("Failed to fetch pool tokens")?;

    Ok(tokens)
}

pub async fn get_user_balance(
    pool: &PgPool,
    chain_id: u64,
    token: &Address,
    wallet: &Address,
) -> Result<Option<UserBalance>> {
    let balance = sqlx::query_as::<_, UserBalance>(
        r#"
        SELECT
            chain_id,
            token_address,
            wallet_address,
            total_amount::text AS total_amount,
            last_block_number
        FROM user_balances
        WHERE chain_id = $1 AND token_address = $2 AND wallet_address = $3
        "#,
    )
    .bind(chain_id as i64)
    .bind(hex_address(token))
    .bind(hex_address(wallet))
    .fetch_optional(pool)
    .await
    .context("Failed to fetch user balance")?;

    Ok(balance)
}

pub async fn get_pool_state(pool: &PgPool, chain_id: u64, pool_address: &Address) -> Result<Option<PoolState>> {
    let state = sqlx::query_as::<_, PoolState>(
        r#"
        SELECT
            chain_id,
            pool_address,
            token0_address,
            token1_address,
            reserve0::text AS reserve0,
            reserve1::text AS reserve1,
            total_supply::text AS total_supply,
            price,
            tx_count,
            last_block_number,
            is_active
        FROM pool_states
        WHERE chain_id = $1 AND pool_address = $2
        "#,
    )
    .bind(chain_id as i64)
    .bind(hex_address(pool_address))
    .fetch_optional(pool)
    .await
    .context("Failed to fetch pool state")?;

    Ok(state)
}

/// Newest first.
pub async fn get_recent_pool_events(
    pool: &PgPool,
    chain_id: u64,
    pool_address: &Address,
    limit: i64,
) -> Result<Vec<PoolEventRecord>> {
    let events = sqlx::query_as::<_, PoolEventRecord>(
        r#"
        SELECT
            chain_id,
            pool_address,
            event_kind,
            wallet_address,
            token0_address,
            token1_address,
            amount0_in::text AS amount0_in,
            amount1_in::text AS amount1_in,
            amount0_out::text AS amount0_out,
            amount1_out::text AS amount1_out,
            tx_hash,
            log_index,
            block_number
        FROM pool_events
        WHERE chain_id = $1 AND pool_address = $2
        ORDER BY block_number DESC, log_index DESC
        LIMIT $3
        "#,
    )
    .bind(chain_id as i64)
    .bind(hex_address(pool_address))
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("Failed to fetch pool events")?;

    Ok(events)
}

pub async fn get_whitelist_entry(
    pool: &PgPool,
    airdrop_id: &U256,
    wallet: &Address,
) -> Result<Option<WhitelistEntry>> {
    let entry = sqlx::query_as::<_, WhitelistEntry>(
        r#"
        SELECT
            airdrop_id::text AS airdrop_id,
            wallet_address,
            total_reward_wei::text AS total_reward_wei,
            merkle_proof
        FROM airdrop_whitelist
        WHERE airdrop_id = CAST($1 AS NUMERIC) AND wallet_address = $2
        "#,
    )
    .bind(airdrop_id.to_string())
    .bind(hex_address(wallet))
    .fetch_optional(pool)
    .await
    .context("Failed to fetch whitelist entry")?;

    Ok(entry)
}

pub async fn get_campaign(pool: &PgPool, airdrop_id: &U256) -> Result<Option<AirdropCampaign>> {
    let campaign = sqlx::query_as::<_, AirdropCampaign>(
        r#"
        SELECT
            airdrop_id::text AS airdrop_id,
            chain_id,
            contract_address,
            name,
            merkle_root,
            total_reward::text AS total_reward,
            tree_version::text AS tree_version,
            is_active
        FROM airdrop_campaigns
        WHERE airdrop_id = CAST($1 AS NUMERIC)
        "#,
    )
    .bind(airdrop_id.to_string())
    .fetch_optional(pool)
    .await
    .context("Failed to fetch airdrop campaign")?;

    Ok(campaign)
}

// ==========================================
// RECONCILIATION
// ==========================================

/// Recompute a balance from the full ledger history and overwrite the
/// derived row. Returns the recomputed total.
pub async fn reconcile_user_balance(
    pool: &PgPool,
    chain_id: u64,
    token: &Address,
    wallet: &Address,
) -> Result<String> {
    let mut tx = pool.begin().await?;

    let (total, last_block): (String, i64) = sqlx::query_as(
        r#"
        SELECT COALESCE(SUM(signed_amount), 0)::text, COALESCE(MAX(block_number), 0)
        FROM ledger_entries
        WHERE chain_id = $1 AND token_address = $2 AND wallet_address = $3
        "#,
    )
    .bind(chain_id as i64)
    .bind(hex_address(token))
    .bind(hex_address(wallet))
    .fetch_one(&mut *tx)
    .await
    .context("Failed to sum ledger history")?;

    sqlx::query(
        r#"
        INSERT INTO user_balances (chain_id, token_address, wallet_address, total_amount, last_block_number, updated_at)
        VALUES ($1, $2, $3, CAST($4 AS NUMERIC), $5, NOW())
        ON CONFLICT (chain_id, token_address, wallet_address)
        DO UPDATE SET
            total_amount = EXCLUDED.total_amount,
            last_block_number = GREATEST(user_balances.last_block_number, EXCLUDED.last_block_number),
            updated_at = NOW()
        "#,
    )
    .bind(chain_id as i64)
    .bind(hex_address(token))
    .bind(hex_address(wallet))
    .bind(&total)
    .bind(last_block)
    .execute(&mut *tx)
    .await
    .context("Failed to overwrite user balance")?;

    tx.commit().await.context("Failed to commit reconciliation")?;
    Ok(total)
}
