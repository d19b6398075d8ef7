//! Approval requests: submit an Installation ID against an approval product;
//! the product price is charged up front.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::domain::approval::{self, ApprovalRequest};
use crate::domain::catalog::Product;
use crate::domain::user::TransactionKind;
use crate::error::{AppError, Result};
use crate::events;
use crate::routes::credits::apply_delta;
use crate::routes::{page_window, ListParams, Paginated};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub product_id: Uuid,
    pub iid: String,
}

pub async fn submit(
    State(s): State<AppState>,
    user: CurrentUser,
    Json(r): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<ApprovalRequest>)> {
    let iid = approval::normalize_iid(&r.iid)?;

    let mut tx = s.db.begin().await?;

    let product = sqlx::query_as::<_, Product>(
        "SELECT * FROM products WHERE id = $1 AND status = 'active'",
    )
    .bind(r.product_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::NotFound("product"))?;

    apply_delta(
        &mut tx,
        user.id,
        -product.price,
        TransactionKind::ApprovalCharge,
        &format!("Approval request: {}", product.name),
    )
    .await?;

    let request = sqlx::query_as::<_, ApprovalRequest>(
        "INSERT INTO approval_requests (id, user_id, product_id, iid, status, credits_charged) \
         VALUES ($1, $2, $3, $4, 'pending', $5) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(user.id)
    .bind(product.id)
    .bind(&iid)
    .bind(product.price)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    tracing::info!(user = %user.id, request = %request.id, "approval request submitted");
    events::publish(
        &s.nats,
        events::APPROVAL_SUBMITTED,
        serde_json::json!({
            "request_id": request.id,
            "user_id": user.id,
            "product_id": product.id,
            "credits": product.price,
        }),
    )
    .await;

    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn list_own(
    State(s): State<AppState>,
    user: CurrentUser,
    Query(p): Query<ListParams>,
) -> Result<Json<Paginated<ApprovalRequest>>> {
    let (limit, offset, page) = page_window(&p);
    let rows = sqlx::query_as::<_, ApprovalRequest>(
        "SELECT * FROM approval_requests WHERE user_id = $1 \
         ORDER BY created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(user.id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&s.db)
    .await?;
    let (total,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM approval_requests WHERE user_id = $1")
            .bind(user.id)
            .fetch_one(&s.db)
            .await?;
    Ok(Json(Paginated {
        data: rows,
        total,
        page,
    }))
}
