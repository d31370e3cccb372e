use std::sync::Arc;

use anyhow::Result;
use chrono::{Duration, Utc};
use domain::repositories::disputes::DisputeRepository;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct DisputeEscalationSweepParams {
    pub open_longer_than_days: i64,
    pub limit: i64,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default)]
pub struct DisputeEscalationSweepResult {
    pub scanned: usize,
    pub escalated: usize,
    pub failed: usize,
    pub candidate_ids: Vec<Uuid>,
    pub escalated_ids: Vec<Uuid>,
}

/// Moves disputes that sat in `open` past the escalation window into
/// `mediation`, which puts them on the operations queue. Escalation never
/// touches the order; resolution does that.
pub struct DisputeEscalationSweepUseCase {
    disputes: Arc<dyn DisputeRepository + Send + Sync>,
}

impl DisputeEscalationSweepUseCase {
    pub fn new(disputes: Arc<dyn DisputeRepository + Send + Sync>) -> Self {
        Self { disputes }
    }

    pub async fn run(
        &self,
        params: DisputeEscalationSweepParams,
    ) -> Result<DisputeEscalationSweepResult> {
        let open_longer_than_days = params.open_longer_than_days.max(0);
        let opened_before = Utc::now() - Duration::days(open_longer_than_days);
        let limit = params.limit.max(1);

        let stale_disputes = self.disputes.list_open_before(opened_before, limit).await?;

        let mut result = DisputeEscalationSweepResult {
            scanned: stale_disputes.len(),
            ..Default::default()
        };

        for dispute in stale_disputes {
            if result.candidate_ids.len() < 20 {
                result.candidate_ids.push(dispute.id);
            }

            if params.dry_run {
                continue;
            }

            match self.disputes.mark_mediation(dispute.id).await {
                Ok(()) => {
                    result.escalated += 1;
                    if result.escalated_ids.len() < 20 {
                        result.escalated_ids.push(dispute.id);
                    }
                }
                Err(err) => {
                    error!(
                        dispute_id = %dispute.id,
                        order_id = %dispute.order_id,
                        error = ?err,
                        "dispute_escalation_sweep: failed to move dispute to mediation"
                    );
                    result.failed += 1;
                }
            }
        }

        info!(
            scanned = result.scanned,
            escalated = result.escalated,
            failed = result.failed,
            dry_run = params.dry_run,
            "dispute_escalation_sweep: completed"
        );

        Ok(result)
    }
}
