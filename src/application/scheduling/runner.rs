use crate::application::scheduling::guard::{GuardedTask, TaskRun};
use crate::application::scheduling::schedule::Schedule;
use std::sync::Arc;
use tracing::{debug, warn};

/// Fires registered guarded tasks on their intervals until shutdown.
///
/// One tokio task per registration; the guard decides per firing whether
/// this replica actually runs the work.
pub struct TaskRunner {
    tasks: Vec<(Schedule, Arc<GuardedTask>)>,
}

impl TaskRunner {
    pub fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    pub fn register(&mut self, schedule: Schedule, task: GuardedTask) {
        self.tasks.push((schedule, Arc::new(task)));
    }

    /// Run every registered task loop until `shutdown` flips to true.
    pub async fn run(self, shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut handles = Vec::new();

        for (schedule, task) in self.tasks {
            let mut shutdown = shutdown.clone();
            handles.push(tokio::spawn(async move {
                if schedule.run_on_startup {
                    fire(&task).await;
                }

                let period = if schedule.every.is_positive() {
                    schedule.every.unsigned_abs()
                } else {
                    std::time::Duration::from_secs(1)
                };

                loop {
                    if *shutdown.borrow() {
                        break;
                    }
                    tokio::select! {
                        _ = shutdown.changed() => {
                            if *shutdown.borrow() {
                                break;
                            }
                        }
                        _ = tokio::time::sleep(period) => {
                            fire(&task).await;
                        }
                    }
                }
            }));
        }

        for handle in handles {
            let _ = handle.await;
        }
    }
}

impl Default for TaskRunner {
    fn default() -> Self {
        Self::new()
    }
}

async fn fire(task: &GuardedTask) {
    match task.run().await {
        Ok(TaskRun::Completed) => debug!(task = task.name(), "scheduled task completed"),
        Ok(TaskRun::Skipped) => debug!(task = task.name(), "scheduled task skipped"),
        Err(err) => warn!(task = task.name(), error = %err, "scheduled task failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::TaskRunner;
    use crate::application::scheduling::guard::{GuardedTask, TaskGuardConfig};
    use crate::application::scheduling::schedule::Schedule;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use time::Duration;

    struct Maintenance;

    fn counting_guard(counter: Arc<AtomicUsize>) -> GuardedTask {
        GuardedTask::new(
            TaskGuardConfig::for_task::<Maintenance>("tick"),
            false,
            None,
            move || {
                let counter = counter.clone();
                Box::pin(async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn given_short_interval_when_run_should_fire_repeatedly_until_shutdown() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut runner = TaskRunner::new();
        runner.register(
            Schedule::every(Duration::milliseconds(50)),
            counting_guard(counter.clone()),
        );
        let (tx, rx) = tokio::sync::watch::channel(false);

        let running = tokio::spawn(runner.run(rx));
        tokio::time::sleep(std::time::Duration::from_millis(220)).await;
        tx.send(true).unwrap();
        running.await.unwrap();

        assert!(counter.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn given_startup_run_when_run_should_fire_before_first_tick() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut runner = TaskRunner::new();
        runner.register(
            Schedule::every(Duration::hours(1)).with_startup_run(),
            counting_guard(counter.clone()),
        );
        let (tx, rx) = tokio::sync::watch::channel(false);

        let running = tokio::spawn(runner.run(rx));
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        tx.send(true).unwrap();
        running.await.unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn given_no_startup_run_and_long_interval_when_shutdown_should_not_fire() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut runner = TaskRunner::new();
        runner.register(
            Schedule::every(Duration::hours(1)),
            counting_guard(counter.clone()),
        );
        let (tx, rx) = tokio::sync::watch::channel(false);

        let running = tokio::spawn(runner.run(rx));
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        tx.send(true).unwrap();
        running.await.unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
