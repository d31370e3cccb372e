use chrono::Duration;

/// Platform fee policy active at settlement time. The version string is
/// stamped onto every settlement row so historical orders stay auditable
/// after a fee change.
#[derive(Debug, Clone)]
pub struct FeePolicy {
    pub version: String,
    pub fee_bps: i64,
}

#[derive(Debug, Clone)]
pub struct LifecyclePolicy {
    pub review_days: i64,
    pub dispute_window_days: i64,
    pub dispute_escalate_days: i64,
}

impl LifecyclePolicy {
    pub fn review_period(&self) -> Duration {
        Duration::days(self.review_days)
    }

    pub fn dispute_window(&self) -> Duration {
        Duration::days(self.dispute_window_days)
    }

    pub fn dispute_escalate_after(&self) -> Duration {
        Duration::days(self.dispute_escalate_days)
    }
}
