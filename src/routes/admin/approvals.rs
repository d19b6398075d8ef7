//! Admin approval-request processing: issue confirmation numbers or reject
//! (refunding the up-front charge).

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AdminUser;
use crate::domain::approval::{ApprovalRequest, ApprovalStatus};
use crate::domain::user::TransactionKind;
use crate::error::{AppError, Result};
use crate::events;
use crate::routes::credits::apply_delta;
use crate::routes::{page_window, ListParams, Paginated};
use crate::AppState;

pub async fn list(
    State(s): State<AppState>,
    _admin: AdminUser,
    Query(p): Query<ListParams>,
) -> Result<Json<Paginated<ApprovalRequest>>> {
    let (limit, offset, page) = page_window(&p);
    let rows = sqlx::query_as::<_, ApprovalRequest>(
        "SELECT * FROM approval_requests WHERE ($1::text IS NULL OR status = $1) \
         ORDER BY created_at LIMIT $2 OFFSET $3",
    )
    .bind(p.status.as_deref())
    .bind(limit)
    .bind(offset)
    .fetch_all(&s.db)
    .await?;
    let (total,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM approval_requests WHERE ($1::text IS NULL OR status = $1)",
    )
    .bind(p.status.as_deref())
    .fetch_one(&s.db)
    .await?;
    Ok(Json(Paginated {
        data: rows,
        total,
        page,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    pub status: String,
    pub confirmation_number: Option<String>,
}

pub async fn set_status(
    State(s): State<AppState>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(r): Json<SetStatusRequest>,
) -> Result<Json<ApprovalRequest>> {
    let next = ApprovalStatus::parse(&r.status)
        .ok_or_else(|| AppError::Validation(format!("unknown approval status {}", r.status)))?;

    let mut tx = s.db.begin().await?;
    let request = sqlx::query_as::<_, ApprovalRequest>(
        "SELECT * FROM approval_requests WHERE id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::NotFound("approval request"))?;
    let current = ApprovalStatus::parse(&request.status).ok_or_else(|| {
        AppError::Validation(format!("request has unknown status {}", request.status))
    })?;
    if !current.can_transition(next) {
        return Err(AppError::InvalidTransition {
            from: request.status.clone(),
            to: r.status.clone(),
        });
    }

    let confirmation = match next {
        ApprovalStatus::Completed => {
            let number = r
                .confirmation_number
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .ok_or_else(|| {
                    AppError::Validation("confirmation number is required".into())
                })?;
            Some(number.to_string())
        }
        _ => None,
    };

    match (current, next) {
        (ApprovalStatus::Pending, ApprovalStatus::Rejected) => {
            apply_delta(
                &mut tx,
                request.user_id,
                request.credits_charged,
                TransactionKind::ApprovalRefund,
                "Approval request rejected",
            )
            .await?;
        }
        (ApprovalStatus::Rejected, ApprovalStatus::Completed) => {
            // the refund already went out; completing re-charges
            apply_delta(
                &mut tx,
                request.user_id,
                -request.credits_charged,
                TransactionKind::ApprovalCharge,
                "Approval request completed after rejection",
            )
            .await?;
        }
        _ => {}
    }

    let request = sqlx::query_as::<_, ApprovalRequest>(
        "UPDATE approval_requests SET status = $2, confirmation_number = $3, updated_at = NOW() \
         WHERE id = $1 RETURNING *",
    )
    .bind(request.id)
    .bind(next.as_str())
    .bind(confirmation)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;

    tracing::info!(
        admin = %admin.0.id, request = %request.id, status = next.as_str(),
        "approval request resolved"
    );
    events::publish(
        &s.nats,
        events::APPROVAL_RESOLVED,
        serde_json::json!({
            "request_id": request.id,
            "user_id": request.user_id,
            "status": next.as_str(),
        }),
    )
    .await;

    Ok(Json(request))
}
