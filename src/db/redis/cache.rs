use redis::AsyncCommands;
use redis::Client;
use std::fmt::Display;
use tokio::sync::mpsc;

use crate::error::AppError;
use crate::error::AppResult;

/// Catalog responses worth sharing across users and requests
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Popular videos for a region code
    Popular(String),
    /// Upload collection id of a channel
    ChannelUploads(String),
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::Popular(region) => write!(f, "popular:{}", region.to_lowercase()),
            CacheKey::ChannelUploads(channel_id) => write!(f, "uploads:{}", channel_id),
        }
    }
}

/// Creates a Redis client for caching
///
/// Establishes a connection to Redis for fast data caching.
/// Uses connection pooling via the connection-manager feature.
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    let client = Client::open(redis_url)?;
    Ok(client)
}

/// Message for asynchronous cache writes
struct CacheWriteMessage {
    key: String,
    value: String,
    ttl: u64,
}

/// Cache handler for storing and retrieving data from Redis
#[derive(Clone)]
pub struct Cache {
    redis_client: Client,
    write_tx: mpsc::UnboundedSender<CacheWriteMessage>,
}

/// Handle for gracefully shutting down the cache writer
pub struct CacheWriterHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl CacheWriterHandle {
    /// Initiates a graceful shutdown of the cache writer
    ///
    /// Sends a shutdown signal to the writer task, which flushes pending
    /// writes to Redis before exiting.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        tracing::info!("Cache writer shutdown signal sent");
    }
}

impl Cache {
    /// Creates a new Cache instance with an async write background task
    ///
    /// Cache writes are queued to a spawned task so a slow Redis never delays
    /// a curation response.
    pub async fn new(redis_client: Client) -> (Self, CacheWriterHandle) {
        let (write_tx, write_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let client = redis_client.clone();
        tokio::spawn(async move {
            Self::cache_writer_task(client, write_rx, shutdown_rx).await;
        });

        let cache = Self {
            redis_client,
            write_tx,
        };

        let handle = CacheWriterHandle { shutdown_tx };

        (cache, handle)
    }

    /// Background task that drains queued writes until shutdown
    async fn cache_writer_task(
        client: Client,
        mut write_rx: mpsc::UnboundedReceiver<CacheWriteMessage>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        tracing::info!("Cache writer task started");

        loop {
            tokio::select! {
                Some(msg) = write_rx.recv() => {
                    if let Err(e) = Self::write_to_redis(&client, msg).await {
                        tracing::error!(error = %e, "Failed to write to Redis cache");
                    }
                }
                _ = shutdown_rx.recv() => {
                    write_rx.close();
                    let mut flushed = 0usize;
                    while let Some(msg) = write_rx.recv().await {
                        match Self::write_to_redis(&client, msg).await {
                            Ok(()) => flushed += 1,
                            Err(e) => tracing::error!(error = %e, "Failed to flush cache write during shutdown"),
                        }
                    }

                    tracing::info!(flushed, "Cache writer task stopped");
                    break;
                }
            }
        }
    }

    async fn write_to_redis(client: &Client, msg: CacheWriteMessage) -> AppResult<()> {
        let mut conn = client.get_multiplexed_async_connection().await?;
        let _: () = conn.set_ex(msg.key, msg.value, msg.ttl).await?;
        Ok(())
    }

    /// Retrieves a value from the cache by key
    ///
    /// Returns `None` on a miss; a value that no longer deserializes is an error.
    pub async fn get_from_cache<T: serde::de::DeserializeOwned>(
        &self,
        key: &CacheKey,
    ) -> AppResult<Option<T>> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let cached: Option<String> = conn.get(format!("{}", key)).await?;

        match cached {
            Some(json) => Ok(Some(decode(&json)?)),
            None => Ok(None),
        }
    }

    /// Retrieves several keys in one round trip, in key order
    pub async fn get_many_from_cache<T: serde::de::DeserializeOwned>(
        &self,
        keys: &[CacheKey],
    ) -> AppResult<Vec<Option<T>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let raw_keys: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        let cached: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&raw_keys)
            .query_async(&mut conn)
            .await?;

        cached
            .into_iter()
            .map(|entry| entry.map(|json| decode(&json)).transpose())
            .collect()
    }

    /// Stores a value in the cache asynchronously without blocking
    ///
    /// The value is serialized here and handed to the background writer;
    /// failures are logged, never returned.
    pub fn set_in_background<T: serde::Serialize>(&self, key: &CacheKey, value: &T, ttl: u64) {
        let json = match serde_json::to_string(value) {
            Ok(j) => j,
            Err(e) => {
                tracing::error!(error = %e, "Cache serialization error");
                return;
            }
        };

        let msg = CacheWriteMessage {
            key: format!("{}", key),
            value: json,
            ttl,
        };

        if let Err(e) = self.write_tx.send(msg) {
            tracing::error!(error = %e, "Failed to send cache write message");
        }
    }
}

fn decode<T: serde::de::DeserializeOwned>(json: &str) -> AppResult<T> {
    serde_json::from_str(json)
        .map_err(|e| AppError::Internal(format!("Cache deserialization error: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_display_popular_lowercases_region() {
        let key = CacheKey::Popular("US".to_string());
        assert_eq!(format!("{}", key), "popular:us");
    }

    #[test]
    fn test_cache_key_display_channel_uploads() {
        let key = CacheKey::ChannelUploads("UCabc123".to_string());
        assert_eq!(format!("{}", key), "uploads:UCabc123");
    }

    #[test]
    fn test_decode_rejects_corrupt_entry() {
        let result: AppResult<Vec<String>> = decode("not json");
        assert!(matches!(result, Err(AppError::Internal(_))));
    }

    #[tokio::test]
    async fn test_cache_miss() {
        // Needs a live Redis
        let Ok(redis_url) = std::env::var("REDIS_URL") else {
            return;
        };

        let client = create_redis_client(&redis_url).unwrap();
        let (cache, _handle) = Cache::new(client).await;

        let key = CacheKey::ChannelUploads("nonexistent_channel_12345".to_string());
        let retrieved: Option<String> = cache.get_from_cache(&key).await.unwrap();

        assert_eq!(retrieved, None);
    }

    #[tokio::test]
    async fn test_set_in_background_then_get_many() {
        let Ok(redis_url) = std::env::var("REDIS_URL") else {
            return;
        };

        let client = create_redis_client(&redis_url).unwrap();
        let (cache, handle) = Cache::new(client.clone()).await;

        let hit = CacheKey::ChannelUploads("cache_test_channel".to_string());
        let miss = CacheKey::ChannelUploads("cache_test_missing".to_string());
        cache.set_in_background(&hit, &"UUcache_test".to_string(), 60);

        handle.shutdown().await;
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        let retrieved: Vec<Option<String>> = cache
            .get_many_from_cache(&[hit.clone(), miss])
            .await
            .unwrap();
        assert_eq!(retrieved, vec![Some("UUcache_test".to_string()), None]);

        let mut conn = client.get_multiplexed_async_connection().await.unwrap();
        let _: () = conn.del(format!("{}", hit)).await.unwrap();
    }
}
