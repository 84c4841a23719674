use time::Duration;

/// Trigger metadata for a registered task. The guard never interprets it;
/// only the runner does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub every: Duration,
    pub run_on_startup: bool,
}

impl Schedule {
    pub fn every(every: Duration) -> Self {
        Self {
            every,
            run_on_startup: false,
        }
    }

    pub fn every_minute() -> Self {
        Self::every(Duration::minutes(1))
    }

    pub fn every_5_minutes() -> Self {
        Self::every(Duration::minutes(5))
    }

    pub fn every_10_minutes() -> Self {
        Self::every(Duration::minutes(10))
    }

    pub fn every_30_minutes() -> Self {
        Self::every(Duration::minutes(30))
    }

    pub fn every_hour() -> Self {
        Self::every(Duration::hours(1))
    }

    pub fn every_day() -> Self {
        Self::every(Duration::days(1))
    }

    /// Fire once immediately at boot, then on the regular interval.
    pub fn with_startup_run(mut self) -> Self {
        self.run_on_startup = true;
        self
    }
}
