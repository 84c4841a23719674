pub mod redis_lock;

use async_trait::async_trait;
use thiserror::Error;
use time::Duration;
use uuid::Uuid;

/// Key naming a contended critical section. Task keys are derived from
/// static metadata only, so every replica computes the identical key for
/// the same logical task.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockKey(String);

impl LockKey {
    /// Key for a recurring task, scoped by the owning type and task name:
    /// `cron:<OwnerType>:<task>`.
    pub fn for_task<O>(task: &str) -> Self {
        let owner = std::any::type_name::<O>()
            .rsplit("::")
            .next()
            .unwrap_or("task");
        Self(format!("cron:{owner}:{task}"))
    }

    /// Key for a per-instance resource critical section: `resource:<id>`.
    pub fn for_resource(id: impl std::fmt::Display) -> Self {
        Self(format!("resource:{id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LockKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque ownership proof returned by a successful acquire. Release only
/// succeeds while the backend still maps the key to this token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockToken(String);

impl LockToken {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for LockToken {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Error)]
pub enum LockError {
    /// Another holder currently owns the key. Expected steady-state
    /// outcome under contention, not a fault.
    #[error("lock '{key}' is held by another owner")]
    Contention { key: String },
    /// The lock backend failed or was unreachable.
    #[error("lock backend error: {0}")]
    Backend(String),
}

/// Time-bounded mutual exclusion shared by every replica.
///
/// The TTL caps how long a holder may keep the key without releasing it;
/// there is no renewal protocol, so callers size the TTL to at least twice
/// the worst expected critical-section runtime.
#[async_trait]
pub trait DistributedLock: Send + Sync {
    /// Attempt to take `key` for `ttl`, retrying for at most `wait_timeout`.
    /// A zero wait is a single non-blocking attempt.
    async fn acquire(
        &self,
        key: &LockKey,
        ttl: Duration,
        wait_timeout: Duration,
    ) -> Result<LockToken, LockError>;

    /// Release `key` if `token` still owns it. Returns `false` when the
    /// lock already expired or belongs to someone else; safe either way.
    async fn release(&self, key: &LockKey, token: &LockToken) -> Result<bool, LockError>;

    /// Whether any holder currently owns `key`. Diagnostic only.
    async fn is_locked(&self, key: &LockKey) -> Result<bool, LockError>;
}
