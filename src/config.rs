use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub db: Db,
    pub redis: Redis,
    pub scheduler: Scheduler,
    pub locks: Locks,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Db {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Redis {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Scheduler {
    pub expire_sweep_interval_seconds: i64,
    pub run_on_startup: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Locks {
    /// TTL for scheduled-task locks. There is no renewal protocol: size
    /// this to at least twice the worst observed task runtime, or a slow
    /// holder can overlap with the next winner.
    pub default_ttl_seconds: i64,
}

/// Load settings from `config/default.toml`, `config/<env>.toml`, and env overrides.
pub fn load() -> Result<Settings, config::ConfigError> {
    let env_name = std::env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());
    config::Config::builder()
        .add_source(config::File::with_name("config/default"))
        .add_source(config::File::with_name(&format!("config/{env_name}")).required(false))
        .add_source(config::Environment::with_prefix("LOCKSTEP").separator("__"))
        .build()?
        .try_deserialize()
}
