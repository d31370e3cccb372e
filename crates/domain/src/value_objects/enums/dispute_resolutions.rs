use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Outcome recorded on a dispute. `Pending` is the value a dispute carries
/// until a resolver decides it; the other four are final and written at most
/// once.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DisputeResolution {
    Pending,
    FullRefund,
    PartialRefund,
    Revision,
    NoAction,
}

impl DisputeResolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisputeResolution::Pending => "pending",
            DisputeResolution::FullRefund => "full_refund",
            DisputeResolution::PartialRefund => "partial_refund",
            DisputeResolution::Revision => "revision",
            DisputeResolution::NoAction => "no_action",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(DisputeResolution::Pending),
            "full_refund" => Some(DisputeResolution::FullRefund),
            "partial_refund" => Some(DisputeResolution::PartialRefund),
            "revision" => Some(DisputeResolution::Revision),
            "no_action" => Some(DisputeResolution::NoAction),
            _ => None,
        }
    }
}

impl Display for DisputeResolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
