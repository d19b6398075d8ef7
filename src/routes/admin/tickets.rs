//! Admin support desk: staff replies and status management.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AdminUser;
use crate::domain::ticket::{Ticket, TicketMessage, TicketStatus};
use crate::error::{AppError, Result};
use crate::routes::tickets::{insert_message, ReplyRequest};
use crate::routes::{page_window, ListParams, Paginated};
use crate::AppState;

pub async fn list(
    State(s): State<AppState>,
    _admin: AdminUser,
    Query(p): Query<ListParams>,
) -> Result<Json<Paginated<Ticket>>> {
    let (limit, offset, page) = page_window(&p);
    let tickets = sqlx::query_as::<_, Ticket>(
        "SELECT * FROM tickets WHERE ($1::text IS NULL OR status = $1) \
         ORDER BY updated_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(p.status.as_deref())
    .bind(limit)
    .bind(offset)
    .fetch_all(&s.db)
    .await?;
    let (total,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM tickets WHERE ($1::text IS NULL OR status = $1)",
    )
    .bind(p.status.as_deref())
    .fetch_one(&s.db)
    .await?;
    Ok(Json(Paginated {
        data: tickets,
        total,
        page,
    }))
}

/// Staff reply; an `open` ticket moves to `in_progress`.
pub async fn reply(
    State(s): State<AppState>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(r): Json<ReplyRequest>,
) -> Result<(StatusCode, Json<TicketMessage>)> {
    r.validate()?;
    let mut tx = s.db.begin().await?;
    let ticket = sqlx::query_as::<_, Ticket>("SELECT * FROM tickets WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound("ticket"))?;

    let next = match TicketStatus::parse(&ticket.status) {
        Some(TicketStatus::Open) => TicketStatus::InProgress,
        Some(other) => other,
        None => TicketStatus::InProgress,
    };
    sqlx::query("UPDATE tickets SET status = $2, updated_at = NOW() WHERE id = $1")
        .bind(ticket.id)
        .bind(next.as_str())
        .execute(&mut *tx)
        .await?;
    let message = insert_message(&mut tx, ticket.id, admin.0.id, r.body.trim(), true).await?;
    tx.commit().await?;
    Ok((StatusCode::CREATED, Json(message)))
}

#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    pub status: String,
}

pub async fn set_status(
    State(s): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(r): Json<SetStatusRequest>,
) -> Result<Json<Ticket>> {
    let next = TicketStatus::parse(&r.status)
        .ok_or_else(|| AppError::Validation(format!("unknown ticket status {}", r.status)))?;
    sqlx::query_as::<_, Ticket>(
        "UPDATE tickets SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(next.as_str())
    .fetch_optional(&s.db)
    .await?
    .map(Json)
    .ok_or(AppError::NotFound("ticket"))
}
