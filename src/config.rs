use alloy::primitives::Address;
use anyhow::{Context, Result, bail};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

const DEFAULT_CONFIRMATION_LAG: u64 = 6;
const DEFAULT_MAX_BLOCK_RANGE: u64 = 1000;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 12;
const DEFAULT_MERKLE_INTERVAL_SECS: u64 = 60;
const DEFAULT_POINTS_INTERVAL_SECS: u64 = 3600;
const DEFAULT_RECEIPT_TIMEOUT_SECS: u64 = 120;

/// Runtime configuration shared by the `indexer` and `worker` binaries.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    pub database_url: String,
    pub redis_url: Option<String>,
    pub chains: Vec<ChainConfig>,
    pub ingest: IngestSettings,
    pub merkle_interval: Duration,
    pub points_interval: Duration,
    pub receipt_timeout: Duration,
    /// Hex private key used to sign `updateMerkleRoot` calls. Rebuilds are
    /// skipped when it is absent.
    pub admin_private_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub rpc_url: Url,
    pub contracts: Vec<WatchedContract>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchedContract {
    pub address: Address,
    pub role: ContractRole,
    /// First block to index when no checkpoint exists yet.
    pub start_block: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractRole {
    Stake,
    Pool,
    Airdrop,
}

impl fmt::Display for ContractRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractRole::Stake => write!(f, "stake"),
            ContractRole::Pool => write!(f, "pool"),
            ContractRole::Airdrop => write!(f, "airdrop"),
        }
    }
}

/// Polling parameters for a chain ingestion worker.
#[derive(Debug, Clone, Copy)]
pub struct IngestSettings {
    pub confirmation_lag: u64,
    pub max_block_range: u64,
    pub poll_interval: Duration,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            confirmation_lag: DEFAULT_CONFIRMATION_LAG,
            max_block_range: DEFAULT_MAX_BLOCK_RANGE,
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
        }
    }
}

impl IndexerConfig {
    /// Load configuration from the environment.
    ///
    /// Required: `DATABASE_URL`, `CHAIN_IDS` and `RPC_URL_<id>` for every listed chain.
    /// Per chain, `STAKE_CONTRACTS_<id>`, `POOL_CONTRACTS_<id>` and
    /// `AIRDROP_CONTRACTS_<id>` hold comma separated addresses and
    /// `START_BLOCK_<id>` sets where a fresh checkpoint begins.
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set in .env")?;
        let redis_url = optional_var("REDIS_URL");

        let chain_ids = env::var("CHAIN_IDS").context("CHAIN_IDS must be set in .env")?;
        let mut chains = Vec::new();
        for raw in chain_ids.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let chain_id: u64 = raw
                .parse()
                .with_context(|| format!("Invalid chain id in CHAIN_IDS: {raw}"))?;
            chains.push(ChainConfig::from_env(chain_id)?);
        }
        if chains.is_empty() {
            bail!("CHAIN_IDS must list at least one chain");
        }

        let ingest = IngestSettings {
            confirmation_lag: parse_or("CONFIRMATION_LAG", DEFAULT_CONFIRMATION_LAG)?,
            max_block_range: parse_or("MAX_BLOCK_RANGE", DEFAULT_MAX_BLOCK_RANGE)?.max(1),
            poll_interval: Duration::from_secs(parse_or(
                "POLL_INTERVAL_SECS",
                DEFAULT_POLL_INTERVAL_SECS,
            )?),
        };

        Ok(Self {
            database_url,
            redis_url,
            chains,
            ingest,
            merkle_interval: Duration::from_secs(parse_or(
                "MERKLE_INTERVAL_SECS",
                DEFAULT_MERKLE_INTERVAL_SECS,
            )?),
            points_interval: Duration::from_secs(parse_or(
                "POINTS_INTERVAL_SECS",
                DEFAULT_POINTS_INTERVAL_SECS,
            )?),
            receipt_timeout: Duration::from_secs(parse_or(
                "RECEIPT_TIMEOUT_SECS",
                DEFAULT_RECEIPT_TIMEOUT_SECS,
            )?),
            admin_private_key: optional_var("AIRDROP_ADMIN_PRIVATE_KEY"),
        })
    }
}

impl ChainConfig {
    fn from_env(chain_id: u64) -> Result<Self> {
        let rpc_var = format!("RPC_URL_{chain_id}");
        let rpc_url = env::var(&rpc_var).with_context(|| format!("{rpc_var} must be set"))?;
        let rpc_url = Url::parse(&rpc_url).with_context(|| format!("{rpc_var} is not a valid URL"))?;
        let start_block = parse_or(&format!("START_BLOCK_{chain_id}"), 0)?;

        let mut contracts = Vec::new();
        for (prefix, role) in [
            ("STAKE_CONTRACTS", ContractRole::Stake),
            ("POOL_CONTRACTS", ContractRole::Pool),
            ("AIRDROP_CONTRACTS", ContractRole::Airdrop),
        ] {
            let name = format!("{prefix}_{chain_id}");
            if let Some(list) = optional_var(&name) {
                for address in parse_address_list(&list).with_context(|| format!("Invalid {name}"))? {
                    contracts.push(WatchedContract {
                        address,
                        role,
                        start_block,
                    });
                }
            }
        }

        Ok(Self {
            chain_id,
            rpc_url,
            contracts,
        })
    }
}

/// Parse a comma separated list of hex addresses, ignoring blanks and duplicates.
pub fn parse_address_list(raw: &str) -> Result<Vec<Address>> {
    let mut out: Vec<Address> = Vec::new();
    for item in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let address =
            Address::from_str(item).with_context(|| format!("Invalid address: {item}"))?;
        if !out.contains(&address) {
            out.push(address);
        }
    }
    Ok(out)
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_or(name: &str, default: u64) -> Result<u64> {
    match optional_var(name) {
        Some(v) => v
            .trim()
            .parse()
            .with_context(|| format!("{name} must be an unsigned integer")),
        None => Ok(default),
    }
}
