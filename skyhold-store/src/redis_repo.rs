use async_trait::async_trait;
use redis::{AsyncCommands, RedisResult};
use skyhold_core::{IdempotencyLedger, Reservation, StoreError};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

impl RedisClient {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    /// SET NX EX: only writes if the key does not exist yet.
    pub async fn set_if_absent(&self, key: &str, value: &str, ttl_seconds: u64) -> RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let result: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl_seconds)
            .query_async(&mut conn)
            .await?;

        Ok(result.is_some())
    }

    pub async fn get_value(&self, key: &str) -> RedisResult<Option<String>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.get(key).await
    }
}

/// Idempotency ledger backed by Redis. Outcomes are stored as JSON and
/// expire with the configured TTL.
pub struct RedisIdempotencyLedger {
    redis: RedisClient,
    ttl_seconds: u64,
}

impl RedisIdempotencyLedger {
    pub fn new(redis: RedisClient, ttl: Duration) -> Self {
        Self { redis, ttl_seconds: ttl.as_secs().max(1) }
    }

    fn key(key: &str) -> String {
        format!("idempotency:{}", key)
    }
}

fn cache_err(e: redis::RedisError) -> StoreError {
    StoreError::Cache(e.to_string())
}

#[async_trait]
impl IdempotencyLedger for RedisIdempotencyLedger {
    async fn lookup(&self, key: &str) -> Result<Option<Reservation>, StoreError> {
        let raw = self.redis.get_value(&Self::key(key)).await.map_err(cache_err)?;
        raw.map(|json| serde_json::from_str(&json).map_err(|e| StoreError::Serialization(e.to_string())))
            .transpose()
    }

    async fn record(&self, key: &str, outcome: &Reservation) -> Result<bool, StoreError> {
        let json = serde_json::to_string(outcome)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let stored = self
            .redis
            .set_if_absent(&Self::key(key), &json, self.ttl_seconds)
            .await
            .map_err(cache_err)?;

        if stored {
            info!(key, "Idempotency record stored");
        } else {
            debug!(key, "Idempotency record already present, keeping first outcome");
        }
        Ok(stored)
    }
}
