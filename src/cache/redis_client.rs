use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisResult};
use tracing::{info, warn};

/// Channel that receives a summary of every committed batch.
pub const BATCH_CHANNEL: &str = "indexer:batches";

/// Token pairs never change for a deployed pair contract.
const POOL_TOKENS_TTL_SECS: u64 = 24 * 60 * 60;

#[derive(Clone)]
pub struct RedisClient {
    pub connection: ConnectionManager,
}

pub fn pool_tokens_key(chain_id: u64, pool: &str) -> String {
    format!("pool_tokens:{chain_id}:{pool}")
}

impl RedisClient {
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url).context("Failed to create Redis client")?;

        let connection = ConnectionManager::new(client)
            .await
            .context("Failed to establish Redis connection")?;

        info!("Successfully connected to Redis");

        Ok(Self { connection })
    }

    pub async fn publish<T: serde::Serialize>(&mut self, channel: &str, message: &T) -> Result<()> {
        let json = serde_json::to_string(message).context("Failed to serialize message")?;

        match self.connection.publish::<_, _, ()>(channel, json).await {
            Ok(_) => Ok(()),
            Err(e) => {
                warn!(channel, error = %e, "Redis publish error");

                if e.is_connection_dropped() || e.is_io_error() {
                    warn!("Redis connection lost, the manager will reconnect");
                }

                Err(e.into())
            }
        }
    }

    pub async fn set<T: serde::Serialize>(
        &mut self,
        key: &str,
        value: &T,
        expiry_seconds: Option<u64>,
    ) -> Result<()> {
        let json = serde_json::to_string(value).context("Failed to serialize value")?;

        if let Some(seconds) = expiry_seconds {
            self.connection
                .set_ex::<_, _, ()>(key, json, seconds)
                .await
                .context("Failed to set key with expiry")?;
        } else {
            self.connection
                .set::<_, _, ()>(key, json)
                .await
                .context("Failed to set key")?;
        }

        Ok(())
    }

    pub async fn get<T: serde::de::DeserializeOwned>(&mut self, key: &str) -> Result<Option<T>> {
        let result: RedisResult<Option<String>> = self.connection.get(key).await;

        match result {
            Ok(Some(json)) => {
                let value = serde_json::from_str(&json).context("Failed to deserialize value")?;
                Ok(Some(value))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Cached `(token0, token1)` hex pair of a pool.
    pub async fn get_pool_tokens(&mut self, chain_id: u64, pool: &str) -> Result<Option<(String, String)>> {
        self.get(&pool_tokens_key(chain_id, pool)).await
    }

    pub async fn set_pool_tokens(&mut self, chain_id: u64, pool: &str, tokens: &(String, String)) -> Result<()> {
        self.set(&pool_tokens_key(chain_id, pool), tokens, Some(POOL_TOKENS_TTL_SECS))
            .await
    }

    pub async fn ping(&mut self) -> Result<()> {
        redis::cmd("PING")
            .query_async::<String>(&mut self.connection)
            .await
            .context("Redis PING failed")?;
        Ok(())
    }
}
