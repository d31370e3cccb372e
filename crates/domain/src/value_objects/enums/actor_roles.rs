use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Party acting on an order. Authentication lives outside this service, so
/// handlers receive the acting role plus the actor id and the use cases
/// enforce party-matching.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ActorRole {
    Buyer,
    Seller,
    Operator,
}

impl ActorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorRole::Buyer => "buyer",
            ActorRole::Seller => "seller",
            ActorRole::Operator => "operator",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "buyer" => Some(ActorRole::Buyer),
            "seller" => Some(ActorRole::Seller),
            "operator" => Some(ActorRole::Operator),
            _ => None,
        }
    }
}

impl Display for ActorRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
