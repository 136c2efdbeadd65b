use alloy::network::EthereumWallet;
use alloy::primitives::{Address, B256, U256};
use alloy::providers::ProviderBuilder;
use alloy::signers::local::PrivateKeySigner;
use alloy::sol;
use async_trait::async_trait;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::info;
use url::Url;

sol! {
    #[sol(rpc)]
    interface IMerkleAirdrop {
        function updateMerkleRoot(uint256 airdropId, bytes32 newRoot, uint32 newVersion) external;
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    #[error("no signing key configured")]
    MissingSigner,

    #[error("no RPC endpoint configured for chain {0}")]
    UnknownChain(u64),

    #[error("transaction failed: {0}")]
    Transaction(String),

    #[error("transaction {0} reverted")]
    Reverted(B256),
}

/// Sends `updateMerkleRoot` to an airdrop contract and waits for inclusion.
#[async_trait]
pub trait MerkleRootSubmitter: Send + Sync {
    async fn update_merkle_root(
        &self,
        chain_id: u64,
        contract: Address,
        airdrop_id: U256,
        root: B256,
        version: u32,
    ) -> Result<B256, SubmitError>;
}

/// Submitter backed by an alloy wallet provider. Gas and nonce come from
/// the provider's fillers.
pub struct AlloySubmitter {
    signer: Option<PrivateKeySigner>,
    endpoints: HashMap<u64, Url>,
    receipt_timeout: Duration,
}

impl AlloySubmitter {
    pub fn new(
        private_key: Option<&str>,
        endpoints: HashMap<u64, Url>,
        receipt_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let signer = private_key
            .map(|key| PrivateKeySigner::from_str(key.trim()))
            .transpose()
            .map_err(|e| anyhow::anyhow!("Invalid AIRDROP_ADMIN_PRIVATE_KEY: {e}"))?;

        if let Some(signer) = &signer {
            info!(admin = %signer.address(), "airdrop admin signer loaded");
        }

        Ok(Self {
            signer,
            endpoints,
            receipt_timeout,
        })
    }

    pub fn has_signer(&self) -> bool {
        self.signer.is_some()
    }
}

#[async_trait]
impl MerkleRootSubmitter for AlloySubmitter {
    async fn update_merkle_root(
        &self,
        chain_id: u64,
        contract: Address,
        airdrop_id: U256,
        root: B256,
        version: u32,
    ) -> Result<B256, SubmitError> {
        let signer = self.signer.clone().ok_or(SubmitError::MissingSigner)?;
        let url = self
            .endpoints
            .get(&chain_id)
            .cloned()
            .ok_or(SubmitError::UnknownChain(chain_id))?;

        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect_http(url);
        let airdrop = IMerkleAirdrop::new(contract, provider);

        let pending = airdrop
            .updateMerkleRoot(airdrop_id, root, version)
            .send()
            .await
            .map_err(|e| SubmitError::Transaction(e.to_string()))?;
        let tx_hash = *pending.tx_hash();

        let receipt = pending
            .with_timeout(Some(self.receipt_timeout))
            .get_receipt()
            .await
            .map_err(|e| SubmitError::Transaction(format!("{tx_hash}: {e}")))?;

        if !receipt.status() {
            return Err(SubmitError::Reverted(tx_hash));
        }
        Ok(tx_hash)
    }
}
