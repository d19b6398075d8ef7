//! Coupon redemption: validate, then atomically credit the user, bump the
//! use count and record both the usage and the ledger row.

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::auth::CurrentUser;
use crate::domain::coupon::{self, Coupon};
use crate::domain::user::TransactionKind;
use crate::error::{AppError, Result};
use crate::events;
use crate::routes::credits::apply_delta;
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct RedeemRequest {
    #[validate(length(min = 1, max = 64))]
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct RedeemResponse {
    pub credits_granted: i64,
    pub balance: i64,
}

pub async fn redeem(
    State(s): State<AppState>,
    user: CurrentUser,
    Json(r): Json<RedeemRequest>,
) -> Result<Json<RedeemResponse>> {
    r.validate()?;
    let code = coupon::normalize_code(&r.code);

    let mut tx = s.db.begin().await?;

    // the row lock serializes concurrent redemptions of the same code
    let coupon = sqlx::query_as::<_, Coupon>(
        "SELECT * FROM coupons WHERE code = $1 FOR UPDATE",
    )
    .bind(&code)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::NotFound("coupon"))?;

    let already_used: Option<(Uuid,)> = sqlx::query_as(
        "SELECT id FROM coupon_usages WHERE coupon_id = $1 AND user_id = $2",
    )
    .bind(coupon.id)
    .bind(user.id)
    .fetch_optional(&mut *tx)
    .await?;

    let (balance,): (i64,) =
        sqlx::query_as("SELECT credits FROM users WHERE id = $1 FOR UPDATE")
            .bind(user.id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(AppError::NotFound("user"))?;

    coupon::validate_redemption(&coupon, already_used.is_some(), balance, Utc::now())?;

    sqlx::query("UPDATE coupons SET used_count = used_count + 1 WHERE id = $1")
        .bind(coupon.id)
        .execute(&mut *tx)
        .await?;
    sqlx::query(
        "INSERT INTO coupon_usages (id, coupon_id, user_id) VALUES ($1, $2, $3)",
    )
    .bind(Uuid::now_v7())
    .bind(coupon.id)
    .bind(user.id)
    .execute(&mut *tx)
    .await?;
    let balance = apply_delta(
        &mut tx,
        user.id,
        coupon.credits,
        TransactionKind::Coupon,
        &format!("Coupon {code}"),
    )
    .await?;

    tx.commit().await?;
    tracing::info!(user = %user.id, %code, credits = coupon.credits, "coupon redeemed");
    events::publish(
        &s.nats,
        events::COUPON_REDEEMED,
        serde_json::json!({"user_id": user.id, "code": code, "credits": coupon.credits}),
    )
    .await;

    Ok(Json(RedeemResponse {
        credits_granted: coupon.credits,
        balance,
    }))
}
