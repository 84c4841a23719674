use crate::infrastructure::lock::{DistributedLock, LockError, LockKey};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_LOCK_TTL: Duration = Duration::minutes(5);

pub type TaskResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;
pub type TaskFuture = Pin<Box<dyn Future<Output = TaskResult> + Send>>;

/// Construction-time options for a guarded task.
#[derive(Debug, Clone)]
pub struct TaskGuardConfig {
    /// Used only for logging.
    pub name: String,
    pub lock_key: LockKey,
    /// Upper bound on how long one firing may hold the lock. There is no
    /// renewal, so size this to at least twice the worst expected runtime.
    pub lock_ttl: Duration,
    /// When true (the default), a held lock means another replica owns this
    /// firing and we silently do nothing this cycle.
    pub skip_on_lock_failure: bool,
}

impl TaskGuardConfig {
    /// Defaults: lock key derived from the owning type and task name,
    /// 5 minute TTL, skip on contention.
    pub fn for_task<O>(task: &str) -> Self {
        Self {
            name: task.to_string(),
            lock_key: LockKey::for_task::<O>(task),
            lock_ttl: DEFAULT_LOCK_TTL,
            skip_on_lock_failure: true,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.lock_ttl = ttl;
        self
    }

    pub fn with_lock_key(mut self, key: LockKey) -> Self {
        self.lock_key = key;
        self
    }

    /// Surface contention to the scheduler instead of skipping.
    pub fn fail_on_contention(mut self) -> Self {
        self.skip_on_lock_failure = false;
        self
    }
}

#[derive(Debug, Error)]
pub enum GuardConfigError {
    #[error("lock TTL must be positive, got {0}")]
    InvalidTtl(Duration),
    #[error("cluster mode requires a distributed lock client")]
    MissingLockClient,
}

#[derive(Debug, Error)]
pub enum GuardError {
    #[error("lock '{key}' is held by another replica")]
    Contention { key: String },
    #[error("guard misconfigured: {0}")]
    Config(#[from] GuardConfigError),
    #[error("task failed: {0}")]
    Task(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Outcome of one scheduled firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskRun {
    Completed,
    Skipped,
}

/// Makes a periodic task cluster-safe: exactly one replica executes each
/// firing, while single-node deployments pay no locking overhead at all.
pub struct GuardedTask {
    config: TaskGuardConfig,
    cluster_mode: bool,
    lock: Option<Arc<dyn DistributedLock>>,
    task: Arc<dyn Fn() -> TaskFuture + Send + Sync>,
}

impl std::fmt::Debug for GuardedTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardedTask")
            .field("config", &self.config)
            .field("cluster_mode", &self.cluster_mode)
            .field("lock", &self.lock.is_some())
            .finish_non_exhaustive()
    }
}

impl GuardedTask {
    /// Dependencies are explicit: running in cluster mode without a lock
    /// client is a configuration error here, not a surprise at 3am.
    pub fn new(
        config: TaskGuardConfig,
        cluster_mode: bool,
        lock: Option<Arc<dyn DistributedLock>>,
        task: impl Fn() -> TaskFuture + Send + Sync + 'static,
    ) -> Result<Self, GuardConfigError> {
        if !config.lock_ttl.is_positive() {
            return Err(GuardConfigError::InvalidTtl(config.lock_ttl));
        }
        if cluster_mode && lock.is_none() {
            return Err(GuardConfigError::MissingLockClient);
        }

        Ok(Self {
            config,
            cluster_mode,
            lock,
            task: Arc::new(task),
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Execute one scheduled firing.
    pub async fn run(&self) -> Result<TaskRun, GuardError> {
        // Step 1: Single-node mode invokes the task directly; no lock calls.
        if !self.cluster_mode {
            (self.task)().await.map_err(GuardError::Task)?;
            return Ok(TaskRun::Completed);
        }

        let Some(lock) = self.lock.as_ref() else {
            return Err(GuardError::Config(GuardConfigError::MissingLockClient));
        };

        // Step 2: Non-blocking attempt. Firings must never queue behind the
        // lock; a firing that woke up after the schedule moved on would run
        // stale work.
        let token = match lock
            .acquire(&self.config.lock_key, self.config.lock_ttl, Duration::ZERO)
            .await
        {
            Ok(token) => token,
            Err(err) => return self.acquire_failed(err),
        };

        // Step 3: Run the task, then release whatever the outcome. A leaked
        // lock would block every replica until the TTL expires.
        let outcome = (self.task)().await;
        if let Err(err) = lock.release(&self.config.lock_key, &token).await {
            warn!(
                task = %self.config.name,
                error = %err,
                "lock release failed; lock will expire at TTL"
            );
        }

        outcome.map_err(GuardError::Task)?;
        Ok(TaskRun::Completed)
    }

    fn acquire_failed(&self, err: LockError) -> Result<TaskRun, GuardError> {
        let key = self.config.lock_key.as_str().to_string();
        match err {
            LockError::Contention { .. } => {
                if self.config.skip_on_lock_failure {
                    debug!(task = %self.config.name, "lock held elsewhere, skipping this firing");
                    return Ok(TaskRun::Skipped);
                }
                Err(GuardError::Contention { key })
            }
            // An unreachable lock service is handled like contention: skip
            // rather than run unguarded.
            LockError::Backend(reason) => {
                warn!(task = %self.config.name, reason = %reason, "lock backend unavailable, skipping this firing");
                if self.config.skip_on_lock_failure {
                    return Ok(TaskRun::Skipped);
                }
                Err(GuardError::Contention { key })
            }
        }
    }
}
