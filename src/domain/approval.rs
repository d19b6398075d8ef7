//! Approval requests: a user submits an Installation ID (IID) for a given
//! approval product; credits are charged up front and refunded on rejection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Microsoft IIDs are 63 digits, usually entered as 9 blocks of 7.
const IID_DIGITS: usize = 63;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ApprovalRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub iid: String,
    pub status: String,
    pub confirmation_number: Option<String>,
    pub credits_charged: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalStatus {
    Pending,
    Completed,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    /// A rejected request may still be completed later (support re-runs the
    /// IID); a completed one is final.
    pub fn can_transition(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Completed)
                | (Self::Pending, Self::Rejected)
                | (Self::Rejected, Self::Completed)
        )
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IidError {
    #[error("installation ID must contain only digits, spaces and dashes")]
    InvalidCharacters,

    #[error("installation ID must be {IID_DIGITS} digits, got {0}")]
    WrongLength(usize),
}

/// Strip block separators and validate the digit count.
pub fn normalize_iid(raw: &str) -> Result<String, IidError> {
    let mut digits = String::with_capacity(IID_DIGITS);
    for c in raw.chars() {
        match c {
            '0'..='9' => digits.push(c),
            ' ' | '-' => {}
            _ => return Err(IidError::InvalidCharacters),
        }
    }
    if digits.len() != IID_DIGITS {
        return Err(IidError::WrongLength(digits.len()));
    }
    Ok(digits)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blocks() -> String {
        (0..9)
            .map(|_| "1234567")
            .collect::<Vec<_>>()
            .join("-")
    }

    #[test]
    fn accepts_dashed_blocks() {
        let iid = normalize_iid(&blocks()).unwrap();
        assert_eq!(iid.len(), 63);
        assert!(iid.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn accepts_plain_digits() {
        assert!(normalize_iid(&"7".repeat(63)).is_ok());
    }

    #[test]
    fn rejects_letters() {
        assert_eq!(
            normalize_iid("1234567-abcdefg"),
            Err(IidError::InvalidCharacters)
        );
    }

    #[test]
    fn rejects_wrong_length() {
        assert_eq!(
            normalize_iid(&"1".repeat(62)),
            Err(IidError::WrongLength(62))
        );
    }

    #[test]
    fn status_transitions() {
        use ApprovalStatus::*;
        assert!(Pending.can_transition(Completed));
        assert!(Pending.can_transition(Rejected));
        assert!(Rejected.can_transition(Completed));
        assert!(!Completed.can_transition(Rejected));
        assert!(!Completed.can_transition(Pending));
        assert!(!Rejected.can_transition(Pending));
    }
}
