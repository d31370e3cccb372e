use domain::value_objects::policy::{FeePolicy, LifecyclePolicy};
use infra::payments::provider_client::ProviderClientConfig;

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub worker_server: WorkerServer,
    pub database: Database,
    pub payment_provider: ProviderClientConfig,
    pub policy: Policy,
    pub sweep: Sweep,
}

#[derive(Debug, Clone)]
pub struct WorkerServer {
    pub port: u16,
    pub timeout: u64,
    pub body_limit: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
}

/// Same policy knobs the backend loads. Both services must agree on them,
/// so they read the same environment variables.
#[derive(Debug, Clone)]
pub struct Policy {
    pub fee_policy_version: String,
    pub fee_bps: i64,
    pub review_days: i64,
    pub dispute_window_days: i64,
    pub dispute_escalate_days: i64,
}

impl Policy {
    pub fn fee_policy(&self) -> FeePolicy {
        FeePolicy {
            version: self.fee_policy_version.clone(),
            fee_bps: self.fee_bps,
        }
    }

    pub fn lifecycle_policy(&self) -> LifecyclePolicy {
        LifecyclePolicy {
            review_days: self.review_days,
            dispute_window_days: self.dispute_window_days,
            dispute_escalate_days: self.dispute_escalate_days,
        }
    }
}

/// Background sweep cadence. `internal_token` guards the manual trigger
/// endpoints; when it is unset those endpoints refuse to run.
#[derive(Debug, Clone)]
pub struct Sweep {
    pub interval_secs: u64,
    pub batch_size: i64,
    pub internal_token: Option<String>,
}
