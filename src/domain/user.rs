//! Users and the append-only credit ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub display_name: String,
    pub role: String,
    pub credits: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One ledger row per balance change. `amount` is signed; `balance_after`
/// records the balance as of this row, written in the same transaction.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CreditTransaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: i64,
    pub balance_after: i64,
    pub kind: String,
    pub note: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Purchase,
    Coupon,
    OrderPayment,
    OrderRefund,
    ApprovalCharge,
    ApprovalRefund,
    AdminAdjust,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Purchase => "purchase",
            Self::Coupon => "coupon",
            Self::OrderPayment => "order_payment",
            Self::OrderRefund => "order_refund",
            Self::ApprovalCharge => "approval_charge",
            Self::ApprovalRefund => "approval_refund",
            Self::AdminAdjust => "admin_adjust",
        }
    }

    /// Kinds that add credits. `admin_adjust` can go either way.
    pub fn is_credit(&self) -> bool {
        matches!(
            self,
            Self::Purchase | Self::Coupon | Self::OrderRefund | Self::ApprovalRefund
        )
    }

    pub fn is_debit(&self) -> bool {
        matches!(self, Self::OrderPayment | Self::ApprovalCharge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_direction() {
        assert!(TransactionKind::Coupon.is_credit());
        assert!(TransactionKind::OrderRefund.is_credit());
        assert!(TransactionKind::OrderPayment.is_debit());
        assert!(TransactionKind::ApprovalCharge.is_debit());
        assert!(!TransactionKind::AdminAdjust.is_credit());
        assert!(!TransactionKind::AdminAdjust.is_debit());
    }

    #[test]
    fn kind_labels_match_ledger_rows() {
        assert_eq!(TransactionKind::OrderPayment.as_str(), "order_payment");
        assert_eq!(TransactionKind::ApprovalRefund.as_str(), "approval_refund");
    }
}
