use lockstep::application::context::AppContext;
use lockstep::application::scheduling::guard::{GuardedTask, TaskGuardConfig};
use lockstep::application::scheduling::runner::TaskRunner;
use lockstep::application::scheduling::schedule::Schedule;
use lockstep::application::usecases::expire_coupons::ExpireCouponsUseCase;
use lockstep::config;
use lockstep::domain::value_objects::timestamps::Timestamp;
use lockstep::infrastructure::cluster::replica::ClusterEnv;
use lockstep::infrastructure::db::postgres::PostgresDatabase;
use lockstep::infrastructure::db::repositories::Repositories;
use lockstep::infrastructure::lock::DistributedLock;
use lockstep::infrastructure::lock::redis_lock::RedisLockClient;
use std::sync::Arc;
use time::Duration;

/// Owner type for maintenance-task lock keys.
struct CouponMaintenance;

#[tokio::main]
async fn main() {
    // Step 1: Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Step 2: Load configuration and resolve replica identity.
    let settings = config::load().expect("load config");
    let cluster = ClusterEnv::from_process_env();
    let cluster_mode = cluster.is_cluster_mode();
    tracing::info!(
        cluster_mode,
        replica = cluster.replica_id(),
        replicas = cluster.total_replicas(),
        "resolved replica identity"
    );

    // Step 3: Connect to the database and build repositories.
    let db = Arc::new(
        PostgresDatabase::connect(&settings.db.url)
            .await
            .expect("connect database"),
    );
    let repos = Repositories::postgres(db.clone());
    let ctx = Arc::new(AppContext::new(repos));

    // Step 4: Connect the lock client when peers may exist. Single-node
    // deployments never touch the lock backend.
    let lock: Option<Arc<dyn DistributedLock>> = if cluster_mode {
        let client = RedisLockClient::connect(&settings.redis.url)
            .await
            .expect("connect lock backend");
        Some(Arc::new(client))
    } else {
        None
    };

    // Step 5: Register the guarded expiry sweep.
    let sweep_ctx = ctx.clone();
    let sweep = GuardedTask::new(
        TaskGuardConfig::for_task::<CouponMaintenance>("expire_coupons")
            .with_ttl(Duration::seconds(settings.locks.default_ttl_seconds)),
        cluster_mode,
        lock,
        move || {
            let ctx = sweep_ctx.clone();
            Box::pin(async move {
                ExpireCouponsUseCase::run_once(&ctx, Timestamp::now_utc())
                    .await
                    .map(|_| ())
                    .map_err(|e| format!("{e:?}").into())
            })
        },
    )
    .expect("configure expiry sweep");

    let mut runner = TaskRunner::new();
    let mut schedule = Schedule::every(Duration::seconds(
        settings.scheduler.expire_sweep_interval_seconds,
    ));
    if settings.scheduler.run_on_startup {
        schedule = schedule.with_startup_run();
    }
    runner.register(schedule, sweep);

    // Step 6: Run until interrupted.
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        let _ = shutdown_tx.send(true);
    });

    runner.run(shutdown_rx).await;
}
