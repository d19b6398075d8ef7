//! Orders. The user's cart is simply their single `open` order; checkout
//! moves it through `processing`/`completed`, cancellation to `cancelled`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Order {
    pub id: Uuid,
    pub order_number: Option<String>,
    pub user_id: Uuid,
    pub status: String,
    pub total: i64,
    pub payment_method_id: Option<Uuid>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub name: String,
    pub unit_price: i64,
    pub quantity: i32,
    pub line_total: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Open,
    Processing,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(Self::Open),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Transitions the admin surface may perform. Checkout handles
    /// `open -> processing/completed` itself.
    pub fn admin_can_set(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Processing, Self::Completed) | (Self::Processing, Self::Cancelled)
        )
    }

    /// Customers may cancel paid or in-flight orders, not carts.
    pub fn cancellable(&self) -> bool {
        matches!(self, Self::Processing | Self::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_roundtrip() {
        for s in ["open", "processing", "completed", "cancelled"] {
            assert_eq!(OrderStatus::parse(s).unwrap().as_str(), s);
        }
        assert!(OrderStatus::parse("shipped").is_none());
    }

    #[test]
    fn admin_transitions() {
        assert!(OrderStatus::Processing.admin_can_set(OrderStatus::Completed));
        assert!(OrderStatus::Processing.admin_can_set(OrderStatus::Cancelled));
        assert!(!OrderStatus::Open.admin_can_set(OrderStatus::Completed));
        assert!(!OrderStatus::Completed.admin_can_set(OrderStatus::Processing));
        assert!(!OrderStatus::Cancelled.admin_can_set(OrderStatus::Completed));
    }

    #[test]
    fn cancellation_rules() {
        assert!(OrderStatus::Processing.cancellable());
        assert!(OrderStatus::Completed.cancellable());
        assert!(!OrderStatus::Open.cancellable());
        assert!(!OrderStatus::Cancelled.cancellable());
    }
}
