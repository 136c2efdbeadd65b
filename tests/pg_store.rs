//! Store behaviour against a real Postgres schema. Needs DATABASE_URL.

use alloy::primitives::{Address, B256, U256};
use chain_indexer::models::{
    CampaignRootUpdate, IngestBatch, PointsUpdate, PoolEvent, PoolEventKind, PoolSnapshot,
    TypedRecord, WhitelistUpdate, hex_address, hex_hash,
};
use chain_indexer::points::PointsJob;
use chain_indexer::rpc::parser::parse_logs;
use chain_indexer::store::{IndexerStore, PgStore};
use chain_indexer::test_utils::{
    airdrop_activated_log, airdrop_created_log, staked_log, total_reward_updated_log, tx_hash_at,
    withdrawn_log,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

const CHAIN: u64 = 11155111;

fn stake_contract() -> Address {
    Address::with_last_byte(0x51)
}

fn airdrop_contract() -> Address {
    Address::with_last_byte(0xa1)
}

fn pair() -> Address {
    Address::with_last_byte(0x77)
}

fn token() -> Address {
    Address::with_last_byte(0xcc)
}

fn wallet(n: u8) -> Address {
    Address::with_last_byte(n)
}

fn batch(contract: Address, from_block: u64, to_block: u64, records: Vec<TypedRecord>) -> IngestBatch {
    IngestBatch {
        chain_id: CHAIN,
        contract,
        from_block,
        to_block,
        records,
        snapshots: Vec::new(),
    }
}

fn parsed(logs: &[chain_indexer::models::RawLog]) -> Vec<TypedRecord> {
    let parsed = parse_logs(logs, CHAIN);
    assert_eq!(parsed.malformed, 0);
    parsed.records
}

fn swap(token0: Address, token1: Address, block: u64) -> TypedRecord {
    TypedRecord::Pool(PoolEvent {
        chain_id: CHAIN,
        pool: pair(),
        kind: PoolEventKind::Swap,
        wallet: wallet(9),
        token0,
        token1,
        amount0_in: U256::from(10),
        amount1_in: U256::ZERO,
        amount0_out: U256::ZERO,
        amount1_out: U256::from(20),
        tx_hash: tx_hash_at(block, 0),
        log_index: 0,
        block_number: block,
    })
}

async fn count(pool: &sqlx::PgPool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await
        .unwrap()
}

#[sqlx::test(migrations = "./migrations")]
async fn overlapping_batches_insert_each_log_once(pool: sqlx::PgPool) {
    let store = PgStore::new(pool.clone());
    let first = parsed(&[
        staked_log(stake_contract(), wallet(1), token(), 100, 3, 0),
        staked_log(stake_contract(), wallet(1), token(), 50, 8, 0),
    ]);
    let summary = store
        .commit_batch(&batch(stake_contract(), 0, 10, first))
        .await
        .unwrap();
    assert_eq!((summary.inserted, summary.duplicates), (2, 0));

    // Re-ingest blocks 5..=20 after a restart; block 8 was already stored.
    let second = parsed(&[
        staked_log(stake_contract(), wallet(1), token(), 50, 8, 0),
        withdrawn_log(stake_contract(), wallet(1), token(), 30, 15, 0),
    ]);
    let summary = store
        .commit_batch(&batch(stake_contract(), 5, 20, second))
        .await
        .unwrap();
    assert_eq!((summary.inserted, summary.duplicates), (1, 1));

    assert_eq!(count(&pool, "ledger_entries").await, 3);
    let balance = store
        .user_balance(CHAIN, token(), wallet(1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(balance.total_amount, "120");
    assert_eq!(balance.last_block_number, 15);

    let reconciled = store
        .reconcile_user_balance(CHAIN, token(), wallet(1))
        .await
        .unwrap();
    assert_eq!(reconciled, "120");
}

#[sqlx::test(migrations = "./migrations")]
async fn checkpoint_never_moves_backwards(pool: sqlx::PgPool) {
    let store = PgStore::new(pool);
    assert_eq!(store.checkpoint(CHAIN, stake_contract()).await.unwrap(), None);

    store
        .commit_batch(&batch(stake_contract(), 0, 20, Vec::new()))
        .await
        .unwrap();
    store
        .commit_batch(&batch(stake_contract(), 0, 10, Vec::new()))
        .await
        .unwrap();
    assert_eq!(store.checkpoint(CHAIN, stake_contract()).await.unwrap(), Some(20));

    store
        .commit_batch(&batch(stake_contract(), 21, 30, Vec::new()))
        .await
        .unwrap();
    assert_eq!(store.checkpoint(CHAIN, stake_contract()).await.unwrap(), Some(30));
}

#[sqlx::test(migrations = "./migrations")]
async fn failed_batch_leaves_no_trace(pool: sqlx::PgPool) {
    let store = PgStore::new(pool.clone());
    sqlx::query("DROP TABLE airdrop_campaigns")
        .execute(&pool)
        .await
        .unwrap();

    let mut records = parsed(&[staked_log(stake_contract(), wallet(1), token(), 100, 3, 0)]);
    records.extend(parsed(&[airdrop_created_log(airdrop_contract(), 1, "Genesis", B256::ZERO, 4, 0)]));

    let result = store.commit_batch(&batch(stake_contract(), 0, 10, records)).await;
    assert!(result.is_err());

    assert_eq!(count(&pool, "ledger_entries").await, 0);
    assert_eq!(count(&pool, "user_balances").await, 0);
    assert_eq!(store.checkpoint(CHAIN, stake_contract()).await.unwrap(), None);
}

#[sqlx::test(migrations = "./migrations")]
async fn zero_token_touch_keeps_the_known_pair(pool: sqlx::PgPool) {
    let store = PgStore::new(pool);
    let (token0, token1) = (Address::with_last_byte(0xa0), Address::with_last_byte(0xb0));
    let snapshot = PoolSnapshot {
        reserve0: U256::from(1_000),
        reserve1: U256::from(2_000),
        total_supply: U256::from(500),
    };

    let mut first = batch(pair(), 0, 10, vec![swap(token0, token1, 5)]);
    first.snapshots = vec![(pair(), snapshot)];
    store.commit_batch(&first).await.unwrap();

    // Unresolved pair and no fresh read.
    store
        .commit_batch(&batch(pair(), 11, 20, vec![swap(Address::ZERO, Address::ZERO, 12)]))
        .await
        .unwrap();

    let state = store.pool_state(CHAIN, pair()).await.unwrap().unwrap();
    assert_eq!(state.token0_address, hex_address(&token0));
    assert_eq!(state.token1_address, hex_address(&token1));
    assert_eq!((state.reserve0.as_str(), state.reserve1.as_str()), ("1000", "2000"));
    assert_eq!(state.total_supply, "500");
    assert_eq!(state.price, "2");
    assert_eq!(state.tx_count, 2);
    assert_eq!(state.last_block_number, 12);

    assert_eq!(
        store.pool_tokens(CHAIN, pair()).await.unwrap(),
        Some((token0, token1))
    );
    let events = store.pool_events(CHAIN, pair(), 10).await.unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].block_number, 12);
}

#[sqlx::test(migrations = "./migrations")]
async fn active_campaign_root_survives_replayed_creation(pool: sqlx::PgPool) {
    let store = PgStore::new(pool);
    let created_root = B256::repeat_byte(0x11);
    let created = airdrop_created_log(airdrop_contract(), 7, "Season 1", created_root, 3, 0);

    store
        .commit_batch(&batch(airdrop_contract(), 0, 5, parsed(&[created.clone()])))
        .await
        .unwrap();
    store
        .commit_batch(&batch(
            airdrop_contract(),
            6,
            10,
            parsed(&[airdrop_activated_log(airdrop_contract(), 7, 8, 0)]),
        ))
        .await
        .unwrap();

    let rebuilt_root = B256::repeat_byte(0x22);
    store
        .persist_campaign_root(&CampaignRootUpdate {
            airdrop_id: U256::from(7),
            merkle_root: rebuilt_root,
            tree_version: 1_700_000_500,
            entries: Vec::new(),
        })
        .await
        .unwrap();

    // A restart replays the creation log.
    store
        .commit_batch(&batch(airdrop_contract(), 0, 10, parsed(&[created])))
        .await
        .unwrap();

    let campaign = store.campaign(U256::from(7)).await.unwrap().unwrap();
    assert!(campaign.is_active);
    assert_eq!(campaign.name, "Season 1");
    assert_eq!(campaign.merkle_root, hex_hash(&rebuilt_root));
    assert_eq!(campaign.tree_version, "1700000500");

    let active = store.active_campaigns().await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].airdrop_id, "7");
}

#[sqlx::test(migrations = "./migrations")]
async fn inactive_campaign_takes_the_replayed_root(pool: sqlx::PgPool) {
    let store = PgStore::new(pool);
    store
        .commit_batch(&batch(
            airdrop_contract(),
            0,
            5,
            parsed(&[airdrop_created_log(airdrop_contract(), 3, "Draft", B256::repeat_byte(1), 2, 0)]),
        ))
        .await
        .unwrap();
    store
        .commit_batch(&batch(
            airdrop_contract(),
            6,
            10,
            parsed(&[airdrop_created_log(airdrop_contract(), 3, "Draft", B256::repeat_byte(2), 7, 0)]),
        ))
        .await
        .unwrap();

    let campaign = store.campaign(U256::from(3)).await.unwrap().unwrap();
    assert!(!campaign.is_active);
    assert_eq!(campaign.merkle_root, hex_hash(&B256::repeat_byte(2)));
    assert!(store.active_campaigns().await.unwrap().is_empty());
}

#[sqlx::test(migrations = "./migrations")]
async fn reward_update_keeps_the_stored_proof(pool: sqlx::PgPool) {
    let store = PgStore::new(pool);
    let proof = vec![B256::repeat_byte(0xab), B256::repeat_byte(0xcd)];
    store
        .persist_campaign_root(&CampaignRootUpdate {
            airdrop_id: U256::from(5),
            merkle_root: B256::repeat_byte(0x33),
            tree_version: 2,
            entries: vec![WhitelistUpdate {
                wallet: wallet(1),
                total_reward_wei: U256::from(100),
                merkle_proof: Some(proof.clone()),
            }],
        })
        .await
        .unwrap();

    store
        .commit_batch(&batch(
            airdrop_contract(),
            0,
            10,
            parsed(&[
                total_reward_updated_log(airdrop_contract(), 5, wallet(1), 250, 4, 0),
                total_reward_updated_log(airdrop_contract(), 5, wallet(2), 80, 4, 1),
            ]),
        ))
        .await
        .unwrap();

    let known = store.whitelist_entry(U256::from(5), wallet(1)).await.unwrap().unwrap();
    assert_eq!(known.total_reward_wei, "250");
    assert_eq!(known.merkle_proof, proof.iter().map(hex_hash).collect::<Vec<_>>());

    let fresh = store.whitelist_entry(U256::from(5), wallet(2)).await.unwrap().unwrap();
    assert_eq!(fresh.total_reward_wei, "80");
    assert!(fresh.merkle_proof.is_empty());
}

#[sqlx::test(migrations = "./migrations")]
async fn completed_tasks_feed_campaign_rewards(pool: sqlx::PgPool) {
    let store = PgStore::new(pool.clone());
    let task_id: i64 = sqlx::query_scalar(
        "INSERT INTO tasks (task_name, verify_type, reward_amount) VALUES ('Stake Once', 'auto', 12.5) RETURNING task_id",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    sqlx::query("INSERT INTO airdrop_task_bindings (airdrop_id, task_id) VALUES (9, $1)")
        .bind(task_id)
        .execute(&pool)
        .await
        .unwrap();

    store
        .commit_batch(&batch(
            stake_contract(),
            0,
            10,
            parsed(&[staked_log(stake_contract(), wallet(4), token(), 1, 2, 0)]),
        ))
        .await
        .unwrap();

    let rewards = store.completed_task_rewards(U256::from(9)).await.unwrap();
    assert_eq!(rewards.len(), 1);
    assert_eq!(rewards[0].wallet_address, hex_address(&wallet(4)));
    assert_eq!(rewards[0].reward_amount, Decimal::from_str("12.5").unwrap());
}

#[sqlx::test(migrations = "./migrations")]
async fn points_save_is_a_compare_and_set(pool: sqlx::PgPool) {
    let store = PgStore::new(pool);
    store
        .commit_batch(&batch(
            stake_contract(),
            0,
            10,
            parsed(&[staked_log(stake_contract(), wallet(1), token(), 100, 3, 0)]),
        ))
        .await
        .unwrap();

    let update = PointsUpdate {
        chain_id: CHAIN as i64,
        token_address: hex_address(&token()),
        wallet_address: hex_address(&wallet(1)),
        points: Decimal::from_str("12.34").unwrap(),
        points_amount: 100,
        points_time: Utc::now(),
        previous_cursor: 0,
        points_cursor: 1,
    };
    assert!(store.save_points(&update).await.unwrap());
    assert!(!store.save_points(&update).await.unwrap());

    let accounts = store.points_accounts().await.unwrap();
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0].points, Decimal::from_str("12.34").unwrap());
    assert_eq!(accounts[0].points_amount, "100");
    assert_eq!(accounts[0].points_cursor, 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn points_job_accrues_from_postgres(pool: sqlx::PgPool) {
    let store = Arc::new(PgStore::new(pool.clone()));
    // Rules may be entered with uppercase hex.
    sqlx::query("INSERT INTO score_rules (chain_id, token_address, score, decimals) VALUES ($1, $2, 2, 0)")
        .bind(CHAIN as i64)
        .bind(hex_address(&token()).to_uppercase().replacen("0X", "0x", 1))
        .execute(&pool)
        .await
        .unwrap();

    store
        .commit_batch(&batch(
            stake_contract(),
            0,
            10,
            parsed(&[
                staked_log(stake_contract(), wallet(1), token(), 30, 0, 0),
                withdrawn_log(stake_contract(), wallet(1), token(), 10, 0, 1),
            ]),
        ))
        .await
        .unwrap();

    let movements = store
        .ledger_movements(CHAIN, token(), wallet(1), 0)
        .await
        .unwrap();
    assert_eq!(
        movements.iter().map(|m| m.signed_amount.as_str()).collect::<Vec<_>>(),
        vec!["30", "-10"]
    );

    // Both rows carry operation time 1_700_000_000; accrue two hours later.
    let now = DateTime::from_timestamp(1_700_007_200, 0).unwrap();
    let job = PointsJob::new(store.clone(), Duration::from_secs(3600));
    let summary = job.accrue_all(now).await.unwrap();
    assert_eq!(summary.updated, 1);

    let accounts = store.points_accounts().await.unwrap();
    assert_eq!(accounts[0].points, Decimal::from(80));
    assert_eq!(accounts[0].points_amount, "20");
    assert_eq!(accounts[0].points_cursor, movements[1].id);
    assert_eq!(accounts[0].points_time, Some(now));

    // Nothing new past the cursor.
    assert!(store
        .ledger_movements(CHAIN, token(), wallet(1), accounts[0].points_cursor)
        .await
        .unwrap()
        .is_empty());
}
