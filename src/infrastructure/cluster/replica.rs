use std::env;

/// Snapshot of the process environment used to answer "am I one replica
/// among several, and which one?". Captured once at startup; pure data
/// afterwards so tests substitute fixed values instead of mutating the
/// process environment.
#[derive(Debug, Clone, Default)]
pub struct ClusterEnv {
    /// Operator override (`CLUSTER_MODE`). A truthy value forces cluster
    /// mode ahead of every heuristic.
    pub mode_override: Option<bool>,
    /// Orchestrator-injected discovery marker (`KUBERNETES_SERVICE_HOST`).
    pub orchestrator_marker: bool,
    /// Explicit replica-count hint (`CLUSTER_REPLICAS`).
    pub replica_count: Option<u32>,
    /// Process-manager instance index (`NODE_APP_INSTANCE`, pm2 cluster mode).
    pub instance_index: Option<u32>,
    /// Process hostname (`HOSTNAME`); orchestrators suffix an ordinal.
    pub hostname: Option<String>,
}

impl ClusterEnv {
    pub fn from_process_env() -> Self {
        Self {
            mode_override: env::var("CLUSTER_MODE").ok().and_then(|v| parse_bool(&v)),
            orchestrator_marker: env::var("KUBERNETES_SERVICE_HOST").is_ok(),
            replica_count: env::var("CLUSTER_REPLICAS")
                .ok()
                .and_then(|v| v.trim().parse().ok()),
            instance_index: env::var("NODE_APP_INSTANCE")
                .ok()
                .and_then(|v| v.trim().parse().ok()),
            hostname: env::var("HOSTNAME").ok(),
        }
    }

    /// Whether more than one peer process may handle the same scheduled
    /// task. Checks go from operator certainty to heuristic inference;
    /// absent or unparseable input degrades to the single-instance answer.
    pub fn is_cluster_mode(&self) -> bool {
        if self.mode_override == Some(true) {
            return true;
        }
        if self.orchestrator_marker {
            return true;
        }
        if self.replica_count.is_some_and(|n| n > 1) {
            return true;
        }
        self.instance_index.is_some()
    }

    /// Stable ordinal of this replica, for logging and diagnostics only.
    pub fn replica_id(&self) -> u32 {
        if let Some(ordinal) = self.hostname.as_deref().and_then(hostname_ordinal) {
            return ordinal;
        }
        self.instance_index.unwrap_or(0)
    }

    /// Advisory replica count. Without an explicit hint the true number is
    /// unknowable from inside a pod, so cluster mode reports a conservative
    /// non-zero default; never use this for correctness decisions.
    pub fn total_replicas(&self) -> u32 {
        if let Some(count) = self.replica_count.filter(|n| *n > 0) {
            return count;
        }
        if self.is_cluster_mode() { 2 } else { 1 }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parses the trailing numeric segment of orchestrator pod names such as
/// `billing-7d9f8b-2`.
fn hostname_ordinal(hostname: &str) -> Option<u32> {
    hostname.rsplit('-').next()?.parse().ok()
}
