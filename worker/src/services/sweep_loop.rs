use std::{sync::Arc, time::Duration};

use anyhow::Result;
use tracing::error;

use crate::config::config_model::Sweep;
use crate::usecases::auto_accept_sweep::{AutoAcceptSweepParams, AutoAcceptSweepUseCase};
use crate::usecases::dispute_escalation_sweep::{
    DisputeEscalationSweepParams, DisputeEscalationSweepUseCase,
};

/// Runs both sweeps on a fixed cadence. Each tick is independent; an error
/// in one sweep is logged and the next tick retries from a fresh listing.
pub async fn run_sweep_loop(
    auto_accept: Arc<AutoAcceptSweepUseCase>,
    dispute_escalation: Arc<DisputeEscalationSweepUseCase>,
    sweep: Sweep,
    escalate_open_after_days: i64,
) -> Result<()> {
    loop {
        let params = AutoAcceptSweepParams {
            limit: sweep.batch_size,
            dry_run: false,
        };
        if let Err(e) = auto_accept.run(params).await {
            error!("Error while sweeping deliveries due for auto-accept: {}", e);
        }

        let params = DisputeEscalationSweepParams {
            open_longer_than_days: escalate_open_after_days,
            limit: sweep.batch_size,
            dry_run: false,
        };
        if let Err(e) = dispute_escalation.run(params).await {
            error!("Error while sweeping stale disputes for mediation: {}", e);
        }

        tokio::time::sleep(Duration::from_secs(sweep.interval_secs)).await;
    }
}
