//! Admin user listing and manual credit adjustments.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AdminUser;
use crate::domain::user::{TransactionKind, User};
use crate::error::{AppError, Result};
use crate::routes::credits::apply_delta;
use crate::routes::{page_window, ListParams, Paginated};
use crate::AppState;

pub async fn list_users(
    State(s): State<AppState>,
    _admin: AdminUser,
    Query(p): Query<ListParams>,
) -> Result<Json<Paginated<User>>> {
    let (limit, offset, page) = page_window(&p);
    let search = p.search.as_deref().map(str::trim).filter(|t| !t.is_empty());
    let users = sqlx::query_as::<_, User>(
        "SELECT * FROM users WHERE \
           ($1::text IS NULL OR email ILIKE '%' || $1 || '%' OR display_name ILIKE '%' || $1 || '%') \
         ORDER BY created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(search)
    .bind(limit)
    .bind(offset)
    .fetch_all(&s.db)
    .await?;
    let (total,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM users WHERE \
           ($1::text IS NULL OR email ILIKE '%' || $1 || '%' OR display_name ILIKE '%' || $1 || '%')",
    )
    .bind(search)
    .fetch_one(&s.db)
    .await?;
    Ok(Json(Paginated {
        data: users,
        total,
        page,
    }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct AdjustCreditsRequest {
    /// Signed delta; negative deductions fail when the balance is too low.
    pub amount: i64,
    #[validate(length(min = 1, max = 500))]
    pub note: String,
}

pub async fn adjust_credits(
    State(s): State<AppState>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(r): Json<AdjustCreditsRequest>,
) -> Result<Json<User>> {
    r.validate()?;
    if r.amount == 0 {
        return Err(AppError::Validation("amount must be non-zero".into()));
    }

    let mut tx = s.db.begin().await?;
    apply_delta(
        &mut tx,
        id,
        r.amount,
        TransactionKind::AdminAdjust,
        r.note.trim(),
    )
    .await?;
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
    tx.commit().await?;

    tracing::info!(
        admin = %admin.0.id, user = %id, amount = r.amount,
        "manual credit adjustment"
    );
    Ok(Json(user))
}
