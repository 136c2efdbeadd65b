use crate::models::{
    CampaignActivated, CampaignCreated, LedgerEntry, LedgerKind, PoolEvent, PoolEventKind,
    RawLog, RewardEvent, RewardKind, TypedRecord,
};
use alloy::primitives::{Address, B256, U256, keccak256};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{debug, warn};

/// Every event the indexer understands, plus `Unknown` for anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Staked,
    Withdrawn,
    Swap,
    Mint,
    Burn,
    RewardClaimed,
    TotalRewardUpdated,
    AirdropCreated,
    AirdropActivated,
    Unknown,
}

impl EventKind {
    pub const KNOWN: [EventKind; 9] = [
        EventKind::Staked,
        EventKind::Withdrawn,
        EventKind::Swap,
        EventKind::Mint,
        EventKind::Burn,
        EventKind::RewardClaimed,
        EventKind::TotalRewardUpdated,
        EventKind::AirdropCreated,
        EventKind::AirdropActivated,
    ];

    /// Solidity event signature whose keccak256 hash is topic0.
    pub const fn signature(self) -> Option<&'static str> {
        match self {
            EventKind::Staked => Some("Staked(address,uint256,address,uint256,uint256,uint256)"),
            EventKind::Withdrawn => Some("Withdrawn(address,uint256,address,uint256,uint256)"),
            EventKind::Swap => Some("Swap(address,uint256,uint256,uint256,uint256,address)"),
            EventKind::Mint => Some("Mint(address,uint256,uint256)"),
            EventKind::Burn => Some("Burn(address,uint256,uint256,address)"),
            EventKind::RewardClaimed => {
                Some("RewardClaimed(uint256,address,uint256,uint256,uint256,uint256,uint256)")
            }
            EventKind::TotalRewardUpdated => {
                Some("UpdateTotalRewardUpdated(uint256,address,uint256,uint256,uint256,uint256)")
            }
            EventKind::AirdropCreated => Some("AirdropCreated(uint256,string,bytes32,uint256,uint256)"),
            EventKind::AirdropActivated => Some("AirdropActivated(uint256)"),
            EventKind::Unknown => None,
        }
    }

    pub fn topic(self) -> Option<B256> {
        self.signature().map(|sig| keccak256(sig.as_bytes()))
    }

    /// Minimum (topics, data bytes) a well formed log of this kind carries.
    const fn min_shape(self) -> (usize, usize) {
        match self {
            EventKind::Staked => (4, 96),
            EventKind::Withdrawn => (4, 64),
            EventKind::Swap => (3, 128),
            EventKind::Mint => (2, 64),
            EventKind::Burn => (3, 64),
            EventKind::RewardClaimed => (3, 160),
            EventKind::TotalRewardUpdated => (3, 128),
            EventKind::AirdropCreated => (2, 128),
            EventKind::AirdropActivated => (2, 0),
            EventKind::Unknown => (0, 0),
        }
    }
}

/// 9999-12-31T23:59:59Z, the latest timestamp kept for an event.
const MAX_TIMESTAMP_SECS: u64 = 253_402_300_799;

static TOPIC_TABLE: LazyLock<HashMap<B256, EventKind>> = LazyLock::new(|| {
    EventKind::KNOWN
        .iter()
        .filter_map(|kind| kind.topic().map(|topic| (topic, *kind)))
        .collect()
});

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("log has no known event signature")]
    UnknownEvent,

    #[error("{kind:?} needs at least {expected} topics, got {actual}")]
    TopicCount {
        kind: EventKind,
        expected: usize,
        actual: usize,
    },

    #[error("{kind:?} needs at least {expected} data bytes, got {actual}")]
    DataLength {
        kind: EventKind,
        expected: usize,
        actual: usize,
    },

    #[error("{kind:?} field {field} is out of range")]
    OutOfRange { kind: EventKind, field: &'static str },
}

/// Resolve the event kind of a log from its first topic.
pub fn classify(log: &RawLog) -> EventKind {
    log.topics
        .first()
        .and_then(|topic| TOPIC_TABLE.get(topic).copied())
        .unwrap_or(EventKind::Unknown)
}

/// Decode a log into its typed record.
pub fn parse(log: &RawLog, chain_id: u64) -> Result<TypedRecord, ParseError> {
    let kind = classify(log);
    if kind == EventKind::Unknown {
        return Err(ParseError::UnknownEvent);
    }

    let (min_topics, min_data) = kind.min_shape();
    if log.topics.len() < min_topics {
        return Err(ParseError::TopicCount {
            kind,
            expected: min_topics,
            actual: log.topics.len(),
        });
    }
    if log.data.len() < min_data {
        return Err(ParseError::DataLength {
            kind,
            expected: min_data,
            actual: log.data.len(),
        });
    }

    let fields = Fields { kind, log };
    match kind {
        EventKind::Staked | EventKind::Withdrawn => Ok(parse_ledger(&fields, chain_id)),
        EventKind::Swap | EventKind::Mint | EventKind::Burn => Ok(parse_pool(&fields, chain_id)),
        EventKind::RewardClaimed | EventKind::TotalRewardUpdated => Ok(parse_reward(&fields, chain_id)),
        EventKind::AirdropCreated => parse_campaign_created(&fields, chain_id),
        EventKind::AirdropActivated => Ok(TypedRecord::CampaignActivated(CampaignActivated {
            chain_id,
            contract: log.address,
            airdrop_id: fields.topic_u256(1),
            tx_hash: log.tx_hash,
            log_index: log.log_index,
            block_number: log.block_number,
        })),
        EventKind::Unknown => Err(ParseError::UnknownEvent),
    }
}

/// Result of parsing a fetched range.
#[derive(Debug, Default)]
pub struct ParsedLogs {
    pub records: Vec<TypedRecord>,
    pub unknown: usize,
    pub malformed: usize,
}

/// Parse every log in fetch order. Unknown and malformed logs are logged and
/// counted; they never abort the batch.
pub fn parse_logs(logs: &[RawLog], chain_id: u64) -> ParsedLogs {
    logs.iter().fold(ParsedLogs::default(), |mut acc, log| {
        match parse(log, chain_id) {
            Ok(record) => acc.records.push(record),
            Err(ParseError::UnknownEvent) => {
                debug!(
                    chain_id,
                    tx_hash = %log.tx_hash,
                    log_index = log.log_index,
                    topic0 = ?log.topics.first(),
                    "skipping log with unknown topic"
                );
                acc.unknown += 1;
            }
            Err(e) => {
                warn!(
                    chain_id,
                    tx_hash = %log.tx_hash,
                    log_index = log.log_index,
                    error = %e,
                    "dropping malformed log"
                );
                acc.malformed += 1;
            }
        }
        acc
    })
}

// ------------------------------------------
// Field access
// ------------------------------------------

/// Accessors over a log whose shape was already checked against `min_shape`.
struct Fields<'a> {
    kind: EventKind,
    log: &'a RawLog,
}

impl Fields<'_> {
    fn topic_address(&self, index: usize) -> Address {
        Address::from_word(self.log.topics[index])
    }

    fn topic_u256(&self, index: usize) -> U256 {
        U256::from_be_bytes(self.log.topics[index].0)
    }

    fn word(&self, slot: usize) -> U256 {
        U256::from_be_slice(&self.log.data[slot * 32..(slot + 1) * 32])
    }

    fn word_b256(&self, slot: usize) -> B256 {
        B256::from_slice(&self.log.data[slot * 32..(slot + 1) * 32])
    }

    /// Unix seconds in `slot`, or `None` past the last storable instant.
    fn word_secs(&self, slot: usize) -> Option<i64> {
        let secs: u64 = self.word(slot).try_into().ok()?;
        (secs <= MAX_TIMESTAMP_SECS).then_some(secs as i64)
    }

    /// Event timestamp, clamped to the last storable instant.
    fn word_time(&self, slot: usize) -> DateTime<Utc> {
        let secs = self.word_secs(slot).unwrap_or(MAX_TIMESTAMP_SECS as i64);
        DateTime::from_timestamp(secs, 0).unwrap_or_default()
    }

    /// Optional deadline; sentinels such as `type(uint256).max` mean none.
    fn word_deadline(&self, slot: usize) -> Option<DateTime<Utc>> {
        self.word_secs(slot)
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
    }

    /// ABI dynamic `string` whose head offset sits in `slot`.
    fn word_string(&self, slot: usize, field: &'static str) -> Result<String, ParseError> {
        let out_of_range = || ParseError::OutOfRange {
            kind: self.kind,
            field,
        };
        let data: &[u8] = self.log.data.as_ref();
        let offset: usize = self.word(slot).try_into().map_err(|_| out_of_range())?;
        let len_end = offset.checked_add(32).ok_or_else(out_of_range)?;
        if len_end > data.len() {
            return Err(out_of_range());
        }
        let len: usize = U256::from_be_slice(&data[offset..len_end])
            .try_into()
            .map_err(|_| out_of_range())?;
        let end = len_end.checked_add(len).ok_or_else(out_of_range)?;
        if end > data.len() {
            return Err(out_of_range());
        }
        Ok(String::from_utf8_lossy(&data[len_end..end]).into_owned())
    }
}

fn parse_ledger(f: &Fields<'_>, chain_id: u64) -> TypedRecord {
    let (kind, unlock_time) = match f.kind {
        EventKind::Staked => (LedgerKind::Staked, f.word_deadline(2)),
        _ => (LedgerKind::Withdrawn, None),
    };

    TypedRecord::Ledger(LedgerEntry {
        chain_id,
        contract: f.log.address,
        wallet: f.topic_address(1),
        pool_id: f.topic_u256(2),
        token: f.topic_address(3),
        amount: f.word(0),
        kind,
        tx_hash: f.log.tx_hash,
        log_index: f.log.log_index,
        block_number: f.log.block_number,
        operation_time: f.word_time(1),
        unlock_time,
    })
}

fn parse_pool(f: &Fields<'_>, chain_id: u64) -> TypedRecord {
    let zero = U256::ZERO;
    let (kind, amounts) = match f.kind {
        EventKind::Swap => (
            PoolEventKind::Swap,
            [f.word(0), f.word(1), f.word(2), f.word(3)],
        ),
        EventKind::Mint => (PoolEventKind::AddLiquidity, [f.word(0), f.word(1), zero, zero]),
        _ => (PoolEventKind::RemoveLiquidity, [zero, zero, f.word(0), f.word(1)]),
    };

    TypedRecord::Pool(PoolEvent {
        chain_id,
        pool: f.log.address,
        kind,
        wallet: f.topic_address(1),
        token0: Address::ZERO,
        token1: Address::ZERO,
        amount0_in: amounts[0],
        amount1_in: amounts[1],
        amount0_out: amounts[2],
        amount1_out: amounts[3],
        tx_hash: f.log.tx_hash,
        log_index: f.log.log_index,
        block_number: f.log.block_number,
    })
}

fn parse_reward(f: &Fields<'_>, chain_id: u64) -> TypedRecord {
    // RewardClaimed leads with the claimed amount; the update event starts at the total.
    let (kind, amount, base) = match f.kind {
        EventKind::RewardClaimed => (RewardKind::Claimed, f.word(0), 1),
        _ => (RewardKind::TotalUpdated, f.word(0), 0),
    };

    TypedRecord::Reward(RewardEvent {
        chain_id,
        contract: f.log.address,
        airdrop_id: f.topic_u256(1),
        wallet: f.topic_address(2),
        kind,
        amount,
        total_reward: f.word(base),
        claimed_reward: f.word(base + 1),
        pending_reward: f.word(base + 2),
        event_time: f.word_time(base + 3),
        tx_hash: f.log.tx_hash,
        log_index: f.log.log_index,
        block_number: f.log.block_number,
    })
}

fn parse_campaign_created(f: &Fields<'_>, chain_id: u64) -> Result<TypedRecord, ParseError> {
    Ok(TypedRecord::CampaignCreated(CampaignCreated {
        chain_id,
        contract: f.log.address,
        airdrop_id: f.topic_u256(1),
        name: f.word_string(0, "name")?,
        merkle_root: f.word_b256(1),
        total_reward: f.word(2),
        tree_version: f.word(3),
        tx_hash: f.log.tx_hash,
        log_index: f.log.log_index,
        block_number: f.log.block_number,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::Bytes;

    fn word(v: u64) -> [u8; 32] {
        U256::from(v).to_be_bytes::<32>()
    }

    fn log(kind: EventKind, topics: Vec<B256>, data: Vec<u8>) -> RawLog {
        let mut all = vec![kind.topic().unwrap_or(B256::repeat_byte(0xee))];
        all.extend(topics);
        RawLog {
            address: Address::with_last_byte(0x99),
            topics: all,
            data: Bytes::from(data),
            block_number: 120,
            tx_hash: B256::repeat_byte(0x11),
            log_index: 3,
        }
    }

    fn data(words: &[u64]) -> Vec<u8> {
        words.iter().flat_map(|w| word(*w)).collect()
    }

    #[test]
    fn classifies_every_known_signature() {
        for kind in EventKind::KNOWN {
            let raw = log(kind, vec![], vec![]);
            assert_eq!(classify(&raw), kind);
        }
        assert_eq!(TOPIC_TABLE.len(), EventKind::KNOWN.len());
    }

    #[test]
    fn unknown_topic_yields_no_record_and_no_error() {
        let raw = log(EventKind::Unknown, vec![], data(&[1, 2, 3]));
        assert_eq!(classify(&raw), EventKind::Unknown);

        let parsed = parse_logs(&[raw], 1);
        assert!(parsed.records.is_empty());
        assert_eq!(parsed.unknown, 1);
        assert_eq!(parsed.malformed, 0);
    }

    #[test]
    fn log_without_topics_is_unknown() {
        let mut raw = log(EventKind::Staked, vec![], vec![]);
        raw.topics.clear();
        assert_eq!(classify(&raw), EventKind::Unknown);
    }

    #[test]
    fn parses_staked() {
        let user = Address::with_last_byte(0xaa);
        let token = Address::with_last_byte(0xcc);
        let raw = log(
            EventKind::Staked,
            vec![user.into_word(), B256::from(U256::from(7)), token.into_word()],
            data(&[500, 1_700_000_000, 1_700_086_400]),
        );

        let TypedRecord::Ledger(entry) = parse(&raw, 11155111).unwrap() else {
            panic!("expected ledger entry");
        };
        assert_eq!(entry.kind, LedgerKind::Staked);
        assert_eq!(entry.wallet, user);
        assert_eq!(entry.token, token);
        assert_eq!(entry.pool_id, U256::from(7));
        assert_eq!(entry.amount, U256::from(500));
        assert_eq!(entry.operation_time.timestamp(), 1_700_000_000);
        assert_eq!(entry.unlock_time.map(|t| t.timestamp()), Some(1_700_086_400));
        assert_eq!(entry.signed_amount().to_string(), "500");
    }

    #[test]
    fn staked_without_lock_keeps_the_entry() {
        let raw = log(
            EventKind::Staked,
            vec![
                Address::with_last_byte(0xaa).into_word(),
                B256::from(U256::from(7)),
                Address::with_last_byte(0xcc).into_word(),
            ],
            [word(500), word(1_700_000_000), U256::MAX.to_be_bytes::<32>()].concat(),
        );

        let TypedRecord::Ledger(entry) = parse(&raw, 1).unwrap() else {
            panic!("expected ledger entry");
        };
        assert_eq!(entry.amount, U256::from(500));
        assert_eq!(entry.operation_time.timestamp(), 1_700_000_000);
        assert_eq!(entry.unlock_time, None);

        let parsed = parse_logs(&[raw], 1);
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.malformed, 0);
    }

    #[test]
    fn far_future_timestamps_are_clamped() {
        let user = Address::with_last_byte(0xab);
        let mut payload = data(&[300, 0, 300]);
        payload.extend(U256::MAX.to_be_bytes::<32>());
        let raw = log(
            EventKind::TotalRewardUpdated,
            vec![B256::from(U256::from(9)), user.into_word()],
            payload,
        );

        let TypedRecord::Reward(update) = parse(&raw, 1).unwrap() else {
            panic!("expected reward event");
        };
        assert_eq!(update.event_time.timestamp(), MAX_TIMESTAMP_SECS as i64);
        assert_eq!(update.amount, U256::from(300));
    }

    #[test]
    fn withdrawn_is_negative() {
        let raw = log(
            EventKind::Withdrawn,
            vec![
                Address::with_last_byte(1).into_word(),
                B256::ZERO,
                Address::with_last_byte(2).into_word(),
            ],
            data(&[42, 1_700_000_000]),
        );
        let TypedRecord::Ledger(entry) = parse(&raw, 1).unwrap() else {
            panic!("expected ledger entry");
        };
        assert_eq!(entry.kind, LedgerKind::Withdrawn);
        assert_eq!(entry.unlock_time, None);
        assert_eq!(entry.signed_amount().to_string(), "-42");
    }

    #[test]
    fn mint_and_burn_map_to_liquidity_events() {
        let sender = Address::with_last_byte(5).into_word();
        let mint = log(EventKind::Mint, vec![sender], data(&[10, 20]));
        let burn = log(EventKind::Burn, vec![sender, sender], data(&[3, 4]));

        let TypedRecord::Pool(add) = parse(&mint, 1).unwrap() else {
            panic!("expected pool event");
        };
        assert_eq!(add.kind, PoolEventKind::AddLiquidity);
        assert_eq!((add.amount0_in, add.amount1_in), (U256::from(10), U256::from(20)));
        assert_eq!(add.amount0_out, U256::ZERO);

        let TypedRecord::Pool(remove) = parse(&burn, 1).unwrap() else {
            panic!("expected pool event");
        };
        assert_eq!(remove.kind, PoolEventKind::RemoveLiquidity);
        assert_eq!((remove.amount0_out, remove.amount1_out), (U256::from(3), U256::from(4)));
    }

    #[test]
    fn swap_reads_four_amounts() {
        let sender = Address::with_last_byte(5).into_word();
        let raw = log(EventKind::Swap, vec![sender, sender], data(&[1, 0, 0, 2]));
        let TypedRecord::Pool(swap) = parse(&raw, 1).unwrap() else {
            panic!("expected pool event");
        };
        assert_eq!(swap.kind, PoolEventKind::Swap);
        assert_eq!(swap.amount0_in, U256::from(1));
        assert_eq!(swap.amount1_out, U256::from(2));
        assert_eq!(swap.token0, Address::ZERO);
    }

    #[test]
    fn reward_events_decode_their_slots() {
        let user = Address::with_last_byte(0xab);
        let claimed = log(
            EventKind::RewardClaimed,
            vec![B256::from(U256::from(9)), user.into_word()],
            data(&[5, 100, 25, 75, 1_700_000_000]),
        );
        let TypedRecord::Reward(claim) = parse(&claimed, 1).unwrap() else {
            panic!("expected reward event");
        };
        assert_eq!(claim.kind, RewardKind::Claimed);
        assert_eq!(claim.airdrop_id, U256::from(9));
        assert_eq!(claim.wallet, user);
        assert_eq!(claim.amount, U256::from(5));
        assert_eq!(claim.total_reward, U256::from(100));
        assert_eq!(claim.pending_reward, U256::from(75));

        let updated = log(
            EventKind::TotalRewardUpdated,
            vec![B256::from(U256::from(9)), user.into_word()],
            data(&[300, 0, 300, 1_700_000_000]),
        );
        let TypedRecord::Reward(update) = parse(&updated, 1).unwrap() else {
            panic!("expected reward event");
        };
        assert_eq!(update.kind, RewardKind::TotalUpdated);
        assert_eq!(update.amount, U256::from(300));
        assert_eq!(update.total_reward, U256::from(300));
        assert_eq!(update.pending_reward, U256::from(300));
    }

    #[test]
    fn airdrop_created_decodes_dynamic_name() {
        let root = B256::repeat_byte(0x42);
        let name = b"Season One";
        let mut payload = Vec::new();
        payload.extend(word(128));
        payload.extend(root.0);
        payload.extend(word(1_000));
        payload.extend(word(1));
        payload.extend(word(name.len() as u64));
        let mut tail = name.to_vec();
        tail.resize(32, 0);
        payload.extend(tail);

        let raw = log(EventKind::AirdropCreated, vec![B256::from(U256::from(4))], payload);
        let TypedRecord::CampaignCreated(created) = parse(&raw, 1).unwrap() else {
            panic!("expected campaign");
        };
        assert_eq!(created.name, "Season One");
        assert_eq!(created.merkle_root, root);
        assert_eq!(created.total_reward, U256::from(1_000));
        assert_eq!(created.airdrop_id, U256::from(4));
    }

    #[test]
    fn airdrop_created_with_bad_offset_is_rejected() {
        let raw = log(
            EventKind::AirdropCreated,
            vec![B256::from(U256::from(4))],
            data(&[4096, 0, 0, 0]),
        );
        assert!(matches!(parse(&raw, 1), Err(ParseError::OutOfRange { .. })));
    }

    #[test]
    fn short_logs_are_rejected_not_fatal() {
        let short_topics = log(EventKind::Staked, vec![B256::ZERO], data(&[1, 2, 3]));
        assert!(matches!(
            parse(&short_topics, 1),
            Err(ParseError::TopicCount { expected: 4, actual: 2, .. })
        ));

        let short_data = log(EventKind::Swap, vec![B256::ZERO, B256::ZERO], data(&[1, 2]));
        assert!(matches!(
            parse(&short_data, 1),
            Err(ParseError::DataLength { expected: 128, actual: 64, .. })
        ));

        let good = log(
            EventKind::AirdropActivated,
            vec![B256::from(U256::from(1))],
            vec![],
        );
        let parsed = parse_logs(&[short_topics, good, short_data], 1);
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.malformed, 2);
    }
}
