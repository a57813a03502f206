//! Redis list queue + pub/sub result channel.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

use super::{JobQueue, ResultPublisher};
use crate::config::QueueConfig;
use crate::error::QueueError;
use crate::types::BatchResult;

/// Redis-backed job queue and result publisher.
///
/// `ConnectionManager` reconnects on its own and is cheap to clone, so each
/// command works on a clone.
#[derive(Clone)]
pub struct RedisQueue {
    conn: ConnectionManager,
    queue_name: String,
    results_channel: String,
}

impl RedisQueue {
    /// Connect using the queue configuration.
    pub async fn connect(config: &QueueConfig) -> Result<Self, QueueError> {
        let client = Client::open(config.connection_info())?;
        let conn = ConnectionManager::new(client).await?;
        tracing::info!(
            host = %config.host,
            port = config.port,
            db = config.db,
            queue = %config.queue_name,
            channel = %config.results_channel,
            "Connected to Redis"
        );
        Ok(Self {
            conn,
            queue_name: config.queue_name.clone(),
            results_channel: config.results_channel.clone(),
        })
    }
}

#[async_trait]
impl JobQueue for RedisQueue {
    async fn dequeue(&self, timeout: Duration) -> Result<Option<String>, QueueError> {
        let mut conn = self.conn.clone();
        // BRPOP replies with [key, value], or nil when the wait expires
        let popped: Option<(String, String)> = redis::cmd("BRPOP")
            .arg(&self.queue_name)
            .arg(timeout.as_secs().max(1))
            .query_async(&mut conn)
            .await?;
        Ok(popped.map(|(_, payload)| payload))
    }
}

#[async_trait]
impl ResultPublisher for RedisQueue {
    async fn publish(&self, result: &BatchResult) -> Result<usize, QueueError> {
        let payload = serde_json::to_string(result)?;
        let mut conn = self.conn.clone();
        let receivers: usize = conn.publish(&self.results_channel, payload).await?;
        tracing::debug!(
            job_id = %result.job_id,
            channel = %self.results_channel,
            receivers,
            "Published batch result"
        );
        Ok(receivers)
    }
}
