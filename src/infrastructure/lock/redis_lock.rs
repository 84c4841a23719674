use crate::infrastructure::lock::{DistributedLock, LockError, LockKey, LockToken};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use time::Duration;
use tracing::debug;

const KEY_PREFIX: &str = "lock:";
const RETRY_DELAY: std::time::Duration = std::time::Duration::from_millis(50);

/// Compare-and-delete so a holder can only release its own acquisition;
/// a stale or foreign token leaves the key untouched.
const RELEASE_SCRIPT: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("del", KEYS[1])
else
    return 0
end
"#;

/// Redis-backed lock client: `SET key token PX ttl NX` to acquire, Lua
/// compare-and-delete to release. The TTL makes every acquisition
/// self-expiring, so a crashed holder never blocks the fleet past it.
#[derive(Clone)]
pub struct RedisLockClient {
    conn: ConnectionManager,
}

impl RedisLockClient {
    pub async fn connect(url: &str) -> Result<Self, LockError> {
        let client = redis::Client::open(url).map_err(|e| LockError::Backend(e.to_string()))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| LockError::Backend(e.to_string()))?;

        Ok(Self { conn })
    }

    fn storage_key(key: &LockKey) -> String {
        format!("{KEY_PREFIX}{key}")
    }

    async fn try_set(
        &self,
        storage_key: &str,
        token: &LockToken,
        ttl_ms: u64,
    ) -> Result<bool, LockError> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(storage_key)
            .arg(token.as_str())
            .arg("PX")
            .arg(ttl_ms)
            .arg("NX")
            .query_async(&mut conn)
            .await
            .map_err(|e| LockError::Backend(e.to_string()))?;

        Ok(reply.is_some())
    }
}

#[async_trait]
impl DistributedLock for RedisLockClient {
    async fn acquire(
        &self,
        key: &LockKey,
        ttl: Duration,
        wait_timeout: Duration,
    ) -> Result<LockToken, LockError> {
        let storage_key = Self::storage_key(key);
        let token = LockToken::new();
        let ttl_ms = ttl.whole_milliseconds().max(1) as u64;
        let wait = if wait_timeout.is_positive() {
            wait_timeout.unsigned_abs()
        } else {
            std::time::Duration::ZERO
        };
        let deadline = tokio::time::Instant::now() + wait;

        // Step 1: Attempt the atomic set; retry only while wait budget remains.
        loop {
            let out_of_budget = |now: tokio::time::Instant| now >= deadline;
            match self.try_set(&storage_key, &token, ttl_ms).await {
                Ok(true) => {
                    debug!(key = %key, "lock acquired");
                    return Ok(token);
                }
                Ok(false) if out_of_budget(tokio::time::Instant::now()) => {
                    return Err(LockError::Contention {
                        key: key.as_str().to_string(),
                    });
                }
                Ok(false) => {
                    debug!(key = %key, "lock busy, retrying");
                }
                Err(err) if out_of_budget(tokio::time::Instant::now()) => return Err(err),
                Err(_) => {
                    debug!(key = %key, "lock backend error, retrying");
                }
            }

            let remaining = deadline - tokio::time::Instant::now();
            tokio::time::sleep(RETRY_DELAY.min(remaining)).await;
        }
    }

    async fn release(&self, key: &LockKey, token: &LockToken) -> Result<bool, LockError> {
        let storage_key = Self::storage_key(key);
        let mut conn = self.conn.clone();

        let released: i64 = redis::Script::new(RELEASE_SCRIPT)
            .key(&storage_key)
            .arg(token.as_str())
            .invoke_async(&mut conn)
            .await
            .map_err(|e| LockError::Backend(e.to_string()))?;

        if released == 1 {
            debug!(key = %key, "lock released");
        }
        Ok(released == 1)
    }

    async fn is_locked(&self, key: &LockKey) -> Result<bool, LockError> {
        let storage_key = Self::storage_key(key);
        let mut conn = self.conn.clone();

        let exists: i64 = redis::cmd("EXISTS")
            .arg(&storage_key)
            .query_async(&mut conn)
            .await
            .map_err(|e| LockError::Backend(e.to_string()))?;

        Ok(exists == 1)
    }
}
