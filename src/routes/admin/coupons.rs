//! Admin coupon management.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AdminUser;
use crate::domain::coupon::{self, Coupon, CouponUsage};
use crate::error::{AppError, Result};
use crate::routes::{page_window, ListParams, Paginated};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CouponRequest {
    #[validate(length(min = 3, max = 64))]
    pub code: String,
    #[validate(range(min = 1))]
    pub credits: i64,
    pub active: Option<bool>,
    pub expires_at: Option<DateTime<Utc>>,
    #[validate(range(min = 1))]
    pub max_uses: i32,
    pub min_balance: Option<i64>,
}

pub async fn list(
    State(s): State<AppState>,
    _admin: AdminUser,
    Query(p): Query<ListParams>,
) -> Result<Json<Paginated<Coupon>>> {
    let (limit, offset, page) = page_window(&p);
    let coupons = sqlx::query_as::<_, Coupon>(
        "SELECT * FROM coupons ORDER BY created_at DESC LIMIT $1 OFFSET $2",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(&s.db)
    .await?;
    let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM coupons")
        .fetch_one(&s.db)
        .await?;
    Ok(Json(Paginated {
        data: coupons,
        total,
        page,
    }))
}

pub async fn create(
    State(s): State<AppState>,
    _admin: AdminUser,
    Json(r): Json<CouponRequest>,
) -> Result<(StatusCode, Json<Coupon>)> {
    r.validate()?;
    let code = coupon::normalize_code(&r.code);
    let created = sqlx::query_as::<_, Coupon>(
        "INSERT INTO coupons (id, code, credits, active, expires_at, max_uses, min_balance) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(&code)
    .bind(r.credits)
    .bind(r.active.unwrap_or(true))
    .bind(r.expires_at)
    .bind(r.max_uses)
    .bind(r.min_balance)
    .fetch_one(&s.db)
    .await
    .map_err(|e| {
        let unique = e
            .as_database_error()
            .is_some_and(|d| d.kind() == sqlx::error::ErrorKind::UniqueViolation);
        if unique {
            AppError::Conflict(format!("coupon code {code} already exists"))
        } else {
            e.into()
        }
    })?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update(
    State(s): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(r): Json<CouponRequest>,
) -> Result<Json<Coupon>> {
    r.validate()?;
    let code = coupon::normalize_code(&r.code);
    sqlx::query_as::<_, Coupon>(
        "UPDATE coupons SET code = $2, credits = $3, active = $4, expires_at = $5, \
           max_uses = $6, min_balance = $7 \
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(&code)
    .bind(r.credits)
    .bind(r.active.unwrap_or(true))
    .bind(r.expires_at)
    .bind(r.max_uses)
    .bind(r.min_balance)
    .fetch_optional(&s.db)
    .await?
    .map(Json)
    .ok_or(AppError::NotFound("coupon"))
}

/// Redeemed coupons stay for the audit trail; deactivate them instead.
pub async fn remove(
    State(s): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    let coupon = sqlx::query_as::<_, Coupon>("SELECT * FROM coupons WHERE id = $1")
        .bind(id)
        .fetch_optional(&s.db)
        .await?
        .ok_or(AppError::NotFound("coupon"))?;
    if coupon.used_count > 0 {
        return Err(AppError::Conflict(
            "coupon has redemptions; deactivate it instead".into(),
        ));
    }
    sqlx::query("DELETE FROM coupons WHERE id = $1")
        .bind(id)
        .execute(&s.db)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn usages(
    State(s): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<CouponUsage>>> {
    let rows = sqlx::query_as::<_, CouponUsage>(
        "SELECT * FROM coupon_usages WHERE coupon_id = $1 ORDER BY redeemed_at DESC",
    )
    .bind(id)
    .fetch_all(&s.db)
    .await?;
    Ok(Json(rows))
}
