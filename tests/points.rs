use alloy::primitives::Address;
use chain_indexer::config::{ContractRole, IngestSettings, WatchedContract};
use chain_indexer::points::{PointsJob, PointsSummary};
use chain_indexer::rpc::ingester::ChainIngester;
use chain_indexer::test_utils::{MemoryStore, MockChain, staked_log, withdrawn_log};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

const CHAIN: u64 = 56;
const UNIT: u64 = 1_000_000;

fn stake_contract() -> Address {
    Address::with_last_byte(0x51)
}

fn token() -> Address {
    Address::with_last_byte(0xcc)
}

fn wallet(n: u8) -> Address {
    Address::with_last_byte(n)
}

/// Log builders stamp operation time as 1_700_000_000 + block.
fn seconds_after_genesis(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
}

fn dec(raw: &str) -> Decimal {
    Decimal::from_str(raw).unwrap()
}

async fn ingest(chain: &Arc<MockChain>, store: &Arc<MemoryStore>) {
    let mut ingester = ChainIngester::new(
        CHAIN,
        vec![WatchedContract {
            address: stake_contract(),
            role: ContractRole::Stake,
            start_block: 0,
        }],
        IngestSettings::default(),
        chain.clone(),
        chain.clone(),
        store.clone(),
    );
    ingester.tick().await.unwrap();
}

fn job(store: &Arc<MemoryStore>) -> PointsJob {
    PointsJob::new(store.clone(), Duration::from_millis(10))
}

#[tokio::test]
async fn stakes_accrue_points_from_their_operation_time() {
    let chain = Arc::new(MockChain::new(1_000));
    chain.push_log(staked_log(stake_contract(), wallet(1), token(), 100 * UNIT, 10, 0));
    chain.push_log(staked_log(stake_contract(), wallet(2), token(), 50 * UNIT, 10, 1));
    chain.push_log(withdrawn_log(stake_contract(), wallet(2), token(), 20 * UNIT, 610, 0));

    let store = Arc::new(MemoryStore::new());
    store.set_score_rule(CHAIN, token(), Decimal::ONE, 6);
    ingest(&chain, &store).await;

    let now = seconds_after_genesis(10 + 7_200);
    let summary = job(&store).accrue_all(now).await.unwrap();
    assert_eq!(summary.updated, 2);

    // Two hours of 100 tokens.
    assert_eq!(
        store.points_of(CHAIN, token(), wallet(1)),
        Some((dec("200"), i128::from(100 * UNIT)))
    );
    // Two hours of 50 tokens, minus 110 minutes of the 20 withdrawn.
    assert_eq!(
        store.points_of(CHAIN, token(), wallet(2)),
        Some((dec("63.33"), i128::from(30 * UNIT)))
    );

    // An hour later only the held amounts accrue.
    let later = now + chrono::Duration::hours(1);
    job(&store).accrue_all(later).await.unwrap();
    assert_eq!(store.points_of(CHAIN, token(), wallet(1)).map(|p| p.0), Some(dec("300")));
    assert_eq!(store.points_of(CHAIN, token(), wallet(2)).map(|p| p.0), Some(dec("93.33")));
}

#[tokio::test]
async fn rerunning_at_the_same_instant_adds_nothing() {
    let chain = Arc::new(MockChain::new(100));
    chain.push_log(staked_log(stake_contract(), wallet(1), token(), 10 * UNIT, 20, 0));

    let store = Arc::new(MemoryStore::new());
    store.set_score_rule(CHAIN, token(), dec("0.5"), 6);
    ingest(&chain, &store).await;

    let now = seconds_after_genesis(20 + 3_600);
    let job = job(&store);
    job.accrue_all(now).await.unwrap();
    job.accrue_all(now).await.unwrap();

    assert_eq!(store.points_of(CHAIN, token(), wallet(1)), Some((dec("5"), i128::from(10 * UNIT))));
}

#[tokio::test]
async fn stake_indexed_after_a_pass_is_still_credited_in_full() {
    let chain = Arc::new(MockChain::new(100));
    chain.push_log(staked_log(stake_contract(), wallet(1), token(), 10 * UNIT, 10, 0));
    let store = Arc::new(MemoryStore::new());
    store.set_score_rule(CHAIN, token(), Decimal::ONE, 6);
    ingest(&chain, &store).await;

    let first = seconds_after_genesis(10 + 3_600);
    job(&store).accrue_all(first).await.unwrap();
    assert_eq!(store.points_of(CHAIN, token(), wallet(1)).map(|p| p.0), Some(dec("10")));

    // Staked at block 150, but only confirmed after the first pass.
    chain.push_log(staked_log(stake_contract(), wallet(1), token(), 6 * UNIT, 150, 0));
    chain.set_head(200);
    ingest(&chain, &store).await;

    let second = first + chrono::Duration::hours(1);
    job(&store).accrue_all(second).await.unwrap();

    // 10 more for the old stake, 6 tokens for 117 whole minutes for the new one.
    assert_eq!(
        store.points_of(CHAIN, token(), wallet(1)),
        Some((dec("31.7"), i128::from(16 * UNIT)))
    );
}

#[tokio::test]
async fn tokens_without_a_rule_are_left_alone() {
    let other = Address::with_last_byte(0xdd);
    let chain = Arc::new(MockChain::new(100));
    chain.push_log(staked_log(stake_contract(), wallet(1), token(), 10 * UNIT, 10, 0));
    chain.push_log(staked_log(stake_contract(), wallet(1), other, 10 * UNIT, 11, 0));

    let store = Arc::new(MemoryStore::new());
    store.set_score_rule(CHAIN, token(), Decimal::ONE, 6);
    ingest(&chain, &store).await;

    let summary = job(&store).accrue_all(seconds_after_genesis(4_000)).await.unwrap();
    assert_eq!(
        summary,
        PointsSummary {
            updated: 1,
            without_rule: 1,
            conflicts: 0,
            failed: 0,
        }
    );
    assert_eq!(store.points_of(CHAIN, other, wallet(1)), None);
}

#[tokio::test]
async fn points_job_stops_on_cancellation() {
    let chain = Arc::new(MockChain::new(100));
    chain.push_log(staked_log(stake_contract(), wallet(1), token(), 10 * UNIT, 10, 0));
    let store = Arc::new(MemoryStore::new());
    store.set_score_rule(CHAIN, token(), Decimal::ONE, 6);
    ingest(&chain, &store).await;

    let cancel = tokio_util::sync::CancellationToken::new();
    let handle = tokio::spawn(job(&store).run(cancel.clone()));

    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("points job did not stop")
        .unwrap();

    assert!(store.points_of(CHAIN, token(), wallet(1)).is_some());
}
