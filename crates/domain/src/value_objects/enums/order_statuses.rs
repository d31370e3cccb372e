use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderStatus {
    PendingPayment,
    Accepted,
    InProgress,
    Delivered,
    Revision,
    Disputed,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::PendingPayment => "pending_payment",
            OrderStatus::Accepted => "accepted",
            OrderStatus::InProgress => "in_progress",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Revision => "revision",
            OrderStatus::Disputed => "disputed",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "pending_payment" => Some(OrderStatus::PendingPayment),
            "accepted" => Some(OrderStatus::Accepted),
            "in_progress" => Some(OrderStatus::InProgress),
            "delivered" => Some(OrderStatus::Delivered),
            "revision" => Some(OrderStatus::Revision),
            "disputed" => Some(OrderStatus::Disputed),
            "completed" => Some(OrderStatus::Completed),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// Single source of truth for the order state machine. Every status write
    /// goes through this check before touching storage.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;

        matches!(
            (self, next),
            (PendingPayment, Accepted)
                | (PendingPayment, Cancelled)
                | (Accepted, InProgress)
                | (Accepted, Cancelled)
                | (InProgress, Delivered)
                | (InProgress, Cancelled)
                | (Delivered, Revision)
                | (Delivered, Completed)
                | (Delivered, Disputed)
                | (Revision, InProgress)
                | (Revision, Disputed)
                | (Disputed, Completed)
                | (Disputed, Cancelled)
                | (Disputed, Revision)
        )
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
