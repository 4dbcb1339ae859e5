use async_trait::async_trait;
use redis::{AsyncCommands, RedisResult};
use std::time::Duration;
use tracing::{debug, warn};
use vanbook_core::{LockError, LockOutcome, SeatKey, SeatLocker};

/// Seat locks as plain Redis keys: `SET key 1 NX EX ttl` to take, `DEL` to release.
#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
    op_timeout: Duration,
}

impl RedisClient {
    pub fn new(connection_string: &str, op_timeout: Duration) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client, op_timeout })
    }

    pub async fn acquire_seat_lock(&self, key: &SeatKey, ttl_seconds: u64) -> RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        // SET NX: only set if key does not exist
        let result: Option<String> = redis::cmd("SET")
            .arg(key.lock_key())
            .arg(1)
            .arg("NX")
            .arg("EX")
            .arg(ttl_seconds.max(1))
            .query_async(&mut conn)
            .await?;

        Ok(result.is_some())
    }

    pub async fn release_seat_lock(&self, key: &SeatKey) -> RedisResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.del(key.lock_key()).await
    }

    pub async fn ping(&self) -> RedisResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async(&mut conn).await
    }
}

#[async_trait]
impl SeatLocker for RedisClient {
    async fn try_acquire(&self, key: &SeatKey, ttl: Duration) -> LockOutcome {
        match tokio::time::timeout(self.op_timeout, self.acquire_seat_lock(key, ttl.as_secs())).await {
            Ok(Ok(true)) => LockOutcome::Acquired,
            Ok(Ok(false)) => {
                debug!("Seat lock {} already held", key);
                LockOutcome::Held
            }
            Ok(Err(e)) => {
                warn!("Redis error acquiring {}: {}", key, e);
                LockOutcome::BackendDown
            }
            Err(_) => {
                warn!("Redis timed out acquiring {} after {:?}", key, self.op_timeout);
                LockOutcome::BackendDown
            }
        }
    }

    async fn release(&self, key: &SeatKey) -> Result<(), LockError> {
        match tokio::time::timeout(self.op_timeout, self.release_seat_lock(key)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(LockError::Unavailable(e.to_string())),
            Err(_) => Err(LockError::Unavailable(format!("release of {} timed out", key))),
        }
    }
}
