use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DisputeReason {
    NotDelivered,
    NotAsDescribed,
    QualityIssue,
    Other,
}

impl DisputeReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisputeReason::NotDelivered => "not_delivered",
            DisputeReason::NotAsDescribed => "not_as_described",
            DisputeReason::QualityIssue => "quality_issue",
            DisputeReason::Other => "other",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "not_delivered" => Some(DisputeReason::NotDelivered),
            "not_as_described" => Some(DisputeReason::NotAsDescribed),
            "quality_issue" => Some(DisputeReason::QualityIssue),
            "other" => Some(DisputeReason::Other),
            _ => None,
        }
    }
}

impl Display for DisputeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
