use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DisputeStatus {
    Open,
    Mediation,
    Resolved,
}

impl DisputeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisputeStatus::Open => "open",
            DisputeStatus::Mediation => "mediation",
            DisputeStatus::Resolved => "resolved",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "open" => Some(DisputeStatus::Open),
            "mediation" => Some(DisputeStatus::Mediation),
            "resolved" => Some(DisputeStatus::Resolved),
            _ => None,
        }
    }
}

impl Display for DisputeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
