use domain::value_objects::policy::{FeePolicy, LifecyclePolicy};
use infra::payments::provider_client::ProviderClientConfig;

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub backend_server: BackendServer,
    pub database: Database,
    pub payment_provider: ProviderClientConfig,
    pub policy: Policy,
}

#[derive(Debug, Clone)]
pub struct BackendServer {
    pub port: u16,
    pub body_limit: u64,
    pub timeout: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
}

/// Marketplace policy knobs. The fee side is versioned; the version string
/// travels onto every settlement row written under it.
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
