use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EscrowState {
    Authorized,
    Captured,
    ReleasedToSeller,
    Refunded,
    Voided,
}

impl EscrowState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EscrowState::Authorized => "authorized",
            EscrowState::Captured => "captured",
            EscrowState::ReleasedToSeller => "released_to_seller",
            EscrowState::Refunded => "refunded",
            EscrowState::Voided => "voided",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "authorized" => Some(EscrowState::Authorized),
            "captured" => Some(EscrowState::Captured),
            "released_to_seller" => Some(EscrowState::ReleasedToSeller),
            "refunded" => Some(EscrowState::Refunded),
            "voided" => Some(EscrowState::Voided),
            _ => None,
        }
    }

    /// Money has left the hold one way or the other; no further gateway calls
    /// may be issued against it.
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            EscrowState::ReleasedToSeller | EscrowState::Refunded | EscrowState::Voided
        )
    }
}

impl Display for EscrowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
