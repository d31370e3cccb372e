use anyhow::{Ok, Result};
use infra::payments::provider_client::ProviderClientConfig;

use super::config_model::{Database, DotEnvyConfig, Policy, Sweep, WorkerServer};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let worker_server = WorkerServer {
        port: std::env::var("SERVER_PORT_WORKER")
            .expect("SERVER_PORT_WORKER is invalid")
            .parse()?,
        body_limit: std::env::var("SERVER_BODY_LIMIT")
            .expect("SERVER_BODY_LIMIT is invalid")
            .parse()?,
        timeout: std::env::var("SERVER_TIMEOUT")
            .expect("SERVER_TIMEOUT is invalid")
            .parse()?,
    };

    let database = Database {
        url: std::env::var("DATABASE_URL").expect("DATABASE_URL is invalid"),
    };

    let payment_provider = ProviderClientConfig {
        api_base_url: std::env::var("PAYMENT_PROVIDER_API_BASE_URL")
            .expect("PAYMENT_PROVIDER_API_BASE_URL is invalid"),
        secret_key: std::env::var("PAYMENT_PROVIDER_SECRET_KEY")
            .expect("PAYMENT_PROVIDER_SECRET_KEY is invalid"),
        webhook_secret: std::env::var("PAYMENT_PROVIDER_WEBHOOK_SECRET")
            .expect("PAYMENT_PROVIDER_WEBHOOK_SECRET is invalid"),
        request_timeout_secs: std::env::var("PAYMENT_PROVIDER_TIMEOUT")
            .unwrap_or_else(|_| "10".to_string())
            .parse()?,
        max_retries: std::env::var("PAYMENT_PROVIDER_MAX_RETRIES")
            .unwrap_or_else(|_| "2".to_string())
            .parse()?,
    };

    let policy = Policy {
        fee_policy_version: std::env::var("FEE_POLICY_VERSION")
            .unwrap_or_else(|_| "2025-01".to_string()),
        fee_bps: std::env::var("PLATFORM_FEE_BPS")
            .unwrap_or_else(|_| "1500".to_string())
            .parse()?,
        review_days: std::env::var("REVIEW_PERIOD_DAYS")
            .unwrap_or_else(|_| "3".to_string())
            .parse()?,
        dispute_window_days: std::env::var("DISPUTE_WINDOW_DAYS")
            .unwrap_or_else(|_| "14".to_string())
            .parse()?,
        dispute_escalate_days: std::env::var("DISPUTE_ESCALATE_DAYS")
            .unwrap_or_else(|_| "3".to_string())
            .parse()?,
    };

    let sweep = Sweep {
        interval_secs: std::env::var("SWEEP_INTERVAL_SECS")
            .unwrap_or_else(|_| "60".to_string())
            .parse()?,
        batch_size: std::env::var("SWEEP_BATCH_SIZE")
            .unwrap_or_else(|_| "50".to_string())
            .parse()?,
        internal_token: std::env::var("INTERNAL_SWEEP_TOKEN").ok().and_then(|v| {
            let trimmed = v.trim().to_string();
            (!trimmed.is_empty()).then_some(trimmed)
        }),
    };

    Ok(DotEnvyConfig {
        worker_server,
        database,
        payment_provider,
        policy,
        sweep,
    })
}
