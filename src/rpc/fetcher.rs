use crate::error::IndexerError;
use crate::models::{
    PoolSnapshot, RawLog, RpcLog, RpcRequest, RpcResponse, RpcTransaction, hex_address, hex_hash,
    parse_hex_u64,
};
use alloy::primitives::{Address, B256, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::sol;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};
use url::Url;

const MAX_RETRIES: u64 = 5;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Read side of a chain: head height, logs and transaction senders.
/// Implementations must tolerate overlapping range queries.
#[async_trait]
pub trait LogFetcher: Send + Sync {
    async fn current_height(&self) -> Result<u64, IndexerError>;

    /// Logs emitted by `contract` in blocks `from_block..=to_block`, ascending.
    async fn logs_in_range(
        &self,
        contract: Address,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RawLog>, IndexerError>;

    async fn sender_of(&self, tx_hash: B256) -> Result<Address, IndexerError>;
}

/// Point-in-time reads of a pair contract.
#[async_trait]
pub trait PoolReader: Send + Sync {
    async fn token_pair(&self, pool: Address) -> Result<(Address, Address), IndexerError>;

    async fn snapshot(&self, pool: Address) -> Result<PoolSnapshot, IndexerError>;
}

sol! {
    #[sol(rpc)]
    interface IUniswapV2Pair {
        function token0() external view returns (address);
        function token1() external view returns (address);
        function getReserves() external view returns (uint112 reserve0, uint112 reserve1, uint32 blockTimestampLast);
        function totalSupply() external view returns (uint256);
    }
}

/// Reserves and supply as stored on a pool row.
pub fn pool_snapshot(reserves: &IUniswapV2Pair::getReservesReturn, total_supply: U256) -> PoolSnapshot {
    PoolSnapshot {
        reserve0: U256::from(reserves.reserve0),
        reserve1: U256::from(reserves.reserve1),
        total_supply,
    }
}

/// JSON-RPC client over HTTP. Log and transaction queries go through the
/// retrying request loop; pair contract reads go through an alloy provider.
pub struct JsonRpcClient {
    client: reqwest::Client,
    url: Url,
    next_id: AtomicU64,
    provider: DynProvider,
}

impl JsonRpcClient {
    pub fn new(url: Url) -> Result<Self, IndexerError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| IndexerError::RpcError(format!("failed to build HTTP client: {e}")))?;
        let provider = ProviderBuilder::new().connect_http(url.clone()).erased();

        Ok(Self {
            client,
            url,
            next_id: AtomicU64::new(1),
            provider,
        })
    }

    fn pair(&self, pool: Address) -> IUniswapV2Pair::IUniswapV2PairInstance<DynProvider> {
        IUniswapV2Pair::new(pool, self.provider.clone())
    }

    /// Send one request. HTTP 429 and network failures are retried with a
    /// linear cool-down; JSON-RPC errors are returned as is.
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<Option<T>, IndexerError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let mut attempt = 0;
        loop {
            attempt += 1;

            let response = match self.client.post(self.url.clone()).json(&request).send().await {
                Ok(resp) => resp,
                Err(e) => {
                    if attempt >= MAX_RETRIES {
                        return Err(IndexerError::RpcError(format!("{method}: {e}")));
                    }
                    warn!(method, attempt, error = %e, "RPC network error, retrying");
                    sleep(Duration::from_secs(attempt)).await;
                    continue;
                }
            };

            if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
                if attempt >= MAX_RETRIES {
                    return Err(IndexerError::RpcError(format!(
                        "{method}: rate limited {attempt} times"
                    )));
                }
                warn!(method, attempt, "rate limited, cooling down");
                sleep(Duration::from_secs(attempt * 2)).await;
                continue;
            }

            let body: RpcResponse<T> = response
                .error_for_status()
                .map_err(|e| IndexerError::RpcError(format!("{method}: {e}")))?
                .json()
                .await
                .map_err(|e| IndexerError::RpcError(format!("{method}: invalid response: {e}")))?;

            if let Some(error) = body.error {
                return Err(IndexerError::RpcError(format!(
                    "{method}: {} (code {})",
                    error.message, error.code
                )));
            }
            return Ok(body.result);
        }
    }
}

#[async_trait]
impl LogFetcher for JsonRpcClient {
    async fn current_height(&self) -> Result<u64, IndexerError> {
        let result: Option<String> = self.call("eth_blockNumber", json!([])).await?;
        let raw = result.ok_or_else(|| IndexerError::RpcError("eth_blockNumber returned null".into()))?;
        parse_hex_u64(&raw).map_err(IndexerError::RpcError)
    }

    async fn logs_in_range(
        &self,
        contract: Address,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RawLog>, IndexerError> {
        let filter = json!([{
            "address": hex_address(&contract),
            "fromBlock": format!("{from_block:#x}"),
            "toBlock": format!("{to_block:#x}"),
        }]);
        let logs: Vec<RpcLog> = self.call("eth_getLogs", filter).await?.unwrap_or_default();

        let mut out = Vec::with_capacity(logs.len());
        for log in logs {
            if log.removed {
                continue;
            }
            match RawLog::try_from(log) {
                Ok(raw) => out.push(raw),
                Err(e) => warn!(%contract, error = %e, "skipping undecodable RPC log"),
            }
        }
        out.sort_by_key(|log| (log.block_number, log.log_index));
        debug!(%contract, from_block, to_block, count = out.len(), "fetched logs");
        Ok(out)
    }

    async fn sender_of(&self, tx_hash: B256) -> Result<Address, IndexerError> {
        let tx: Option<RpcTransaction> = self
            .call("eth_getTransactionByHash", json!([hex_hash(&tx_hash)]))
            .await?;
        let tx = tx.ok_or_else(|| IndexerError::RpcError(format!("transaction {tx_hash} not found")))?;
        Address::from_str(&tx.from)
            .map_err(|e| IndexerError::RpcError(format!("transaction {} sender: {e}", tx.hash)))
    }
}

#[async_trait]
impl PoolReader for JsonRpcClient {
    async fn token_pair(&self, pool: Address) -> Result<(Address, Address), IndexerError> {
        let pair = self.pair(pool);
        let token0 = pair
            .token0()
            .call()
            .await
            .map_err(|e| IndexerError::RpcError(format!("token0() on {pool}: {e}")))?;
        let token1 = pair
            .token1()
            .call()
            .await
            .map_err(|e| IndexerError::RpcError(format!("token1() on {pool}: {e}")))?;
        Ok((token0, token1))
    }

    async fn snapshot(&self, pool: Address) -> Result<PoolSnapshot, IndexerError> {
        let pair = self.pair(pool);
        let reserves = pair
            .getReserves()
            .call()
            .await
            .map_err(|e| IndexerError::RpcError(format!("getReserves() on {pool}: {e}")))?;
        let total_supply = pair
            .totalSupply()
            .call()
            .await
            .map_err(|e| IndexerError::RpcError(format!("totalSupply() on {pool}: {e}")))?;
        Ok(pool_snapshot(&reserves, total_supply))
    }
}
