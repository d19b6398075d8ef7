//! Coupon codes: fixed credit grants gated by expiry, a global use cap,
//! once-per-user redemption and a minimum-balance precondition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Coupon {
    pub id: Uuid,
    pub code: String,
    pub credits: i64,
    pub active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub max_uses: i32,
    pub used_count: i32,
    pub min_balance: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CouponUsage {
    pub id: Uuid,
    pub coupon_id: Uuid,
    pub user_id: Uuid,
    pub redeemed_at: DateTime<Utc>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CouponRejection {
    #[error("coupon is not active")]
    Inactive,

    #[error("coupon has expired")]
    Expired,

    #[error("coupon usage limit reached")]
    Exhausted,

    #[error("coupon already redeemed by this account")]
    AlreadyUsed,

    #[error("a balance of at least {required} credits is required to redeem this coupon")]
    BelowMinimumBalance { required: i64 },
}

/// Check every redemption precondition. Pure so the full matrix is testable
/// without a database; the caller holds row locks while acting on the result.
pub fn validate_redemption(
    coupon: &Coupon,
    already_used: bool,
    user_balance: i64,
    now: DateTime<Utc>,
) -> Result<(), CouponRejection> {
    if !coupon.active {
        return Err(CouponRejection::Inactive);
    }
    if let Some(expires_at) = coupon.expires_at {
        if expires_at < now {
            return Err(CouponRejection::Expired);
        }
    }
    if coupon.used_count >= coupon.max_uses {
        return Err(CouponRejection::Exhausted);
    }
    if already_used {
        return Err(CouponRejection::AlreadyUsed);
    }
    if let Some(required) = coupon.min_balance {
        if user_balance < required {
            return Err(CouponRejection::BelowMinimumBalance { required });
        }
    }
    Ok(())
}

/// Coupon codes are stored and matched uppercase.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn coupon() -> Coupon {
        Coupon {
            id: Uuid::now_v7(),
            code: "WELCOME10".into(),
            credits: 10,
            active: true,
            expires_at: None,
            max_uses: 100,
            used_count: 0,
            min_balance: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn valid_coupon_passes() {
        assert_eq!(validate_redemption(&coupon(), false, 0, Utc::now()), Ok(()));
    }

    #[test]
    fn inactive_rejected() {
        let mut c = coupon();
        c.active = false;
        assert_eq!(
            validate_redemption(&c, false, 0, Utc::now()),
            Err(CouponRejection::Inactive)
        );
    }

    #[test]
    fn expired_rejected() {
        let mut c = coupon();
        c.expires_at = Some(Utc::now() - Duration::hours(1));
        assert_eq!(
            validate_redemption(&c, false, 0, Utc::now()),
            Err(CouponRejection::Expired)
        );
    }

    #[test]
    fn future_expiry_accepted() {
        let mut c = coupon();
        c.expires_at = Some(Utc::now() + Duration::hours(1));
        assert_eq!(validate_redemption(&c, false, 0, Utc::now()), Ok(()));
    }

    #[test]
    fn exhausted_rejected() {
        let mut c = coupon();
        c.max_uses = 5;
        c.used_count = 5;
        assert_eq!(
            validate_redemption(&c, false, 0, Utc::now()),
            Err(CouponRejection::Exhausted)
        );
    }

    #[test]
    fn repeat_use_rejected() {
        assert_eq!(
            validate_redemption(&coupon(), true, 0, Utc::now()),
            Err(CouponRejection::AlreadyUsed)
        );
    }

    #[test]
    fn minimum_balance_enforced() {
        let mut c = coupon();
        c.min_balance = Some(50);
        assert_eq!(
            validate_redemption(&c, false, 49, Utc::now()),
            Err(CouponRejection::BelowMinimumBalance { required: 50 })
        );
        assert_eq!(validate_redemption(&c, false, 50, Utc::now()), Ok(()));
    }

    #[test]
    fn inactive_wins_over_expired() {
        // rejection order is fixed so clients see a stable message
        let mut c = coupon();
        c.active = false;
        c.expires_at = Some(Utc::now() - Duration::hours(1));
        assert_eq!(
            validate_redemption(&c, true, 0, Utc::now()),
            Err(CouponRejection::Inactive)
        );
    }

    #[test]
    fn code_normalization() {
        assert_eq!(normalize_code("  welcome10 "), "WELCOME10");
    }
}
