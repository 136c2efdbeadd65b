use alloy::primitives::{Address, B256, Bytes};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

// ==========================================
// JSON-RPC ENVELOPES
// ==========================================

#[derive(Debug, Clone, Serialize)]
pub struct RpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: serde_json::Value,
}

/// Missing `result` or `error` members deserialize as `None`.
#[derive(Debug, Deserialize)]
pub struct RpcResponse<T> {
    pub result: Option<T>,
    pub error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
pub struct RpcErrorBody {
    pub code: i64,
    pub message: String,
}

// ==========================================
// eth_getLogs / eth_getTransactionByHash
// ==========================================

/// A log entry exactly as returned by `eth_getLogs`: every field is a hex string.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcLog {
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
    pub block_number: Option<String>,
    pub transaction_hash: Option<String>,
    pub log_index: Option<String>,
    #[serde(default)]
    pub removed: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcTransaction {
    pub hash: String,
    pub from: String,
}

/// A decoded EVM log, the input of the event classifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    pub block_number: u64,
    pub tx_hash: B256,
    pub log_index: u64,
}

impl TryFrom<RpcLog> for RawLog {
    type Error = String;

    fn try_from(log: RpcLog) -> Result<Self, Self::Error> {
        let address = Address::from_str(&log.address).map_err(|e| format!("address: {e}"))?;
        let topics = log
            .topics
            .iter()
            .map(|t| B256::from_str(t).map_err(|e| format!("topic {t}: {e}")))
            .collect::<Result<Vec<_>, _>>()?;
        let data = Bytes::from_str(&log.data).map_err(|e| format!("data: {e}"))?;
        let block_number = parse_hex_u64(log.block_number.as_deref().ok_or("pending log")?)?;
        let tx_hash = B256::from_str(log.transaction_hash.as_deref().ok_or("missing tx hash")?)
            .map_err(|e| format!("tx hash: {e}"))?;
        let log_index = parse_hex_u64(log.log_index.as_deref().ok_or("missing log index")?)?;

        Ok(Self {
            address,
            topics,
            data,
            block_number,
            tx_hash,
            log_index,
        })
    }
}

/// Parse a `0x` prefixed quantity.
pub fn parse_hex_u64(raw: &str) -> Result<u64, String> {
    let digits = raw.trim_start_matches("0x");
    if digits.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(digits, 16).map_err(|e| format!("quantity {raw}: {e}"))
}
