//! Support desk, customer side: tickets with a threaded message list.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;
use validator::Validate;

use crate::auth::CurrentUser;
use crate::domain::ticket::{self, Ticket, TicketMessage, TicketStatus};
use crate::error::{AppError, Result};
use crate::routes::{page_window, ListParams, Paginated};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct TicketThread {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub messages: Vec<TicketMessage>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTicketRequest {
    #[validate(length(min = 1, max = 200))]
    pub subject: String,
    #[validate(length(min = 1, max = 50))]
    pub category: String,
    pub priority: Option<String>,
    #[validate(length(min = 1, max = 5000))]
    pub message: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReplyRequest {
    #[validate(length(min = 1, max = 5000))]
    pub body: String,
}

pub(crate) async fn insert_message(
    tx: &mut Transaction<'_, Postgres>,
    ticket_id: Uuid,
    author_id: Uuid,
    body: &str,
    from_staff: bool,
) -> Result<TicketMessage> {
    let message = sqlx::query_as::<_, TicketMessage>(
        "INSERT INTO ticket_messages (id, ticket_id, author_id, body, from_staff) \
         VALUES ($1, $2, $3, $4, $5) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(ticket_id)
    .bind(author_id)
    .bind(body)
    .bind(from_staff)
    .fetch_one(&mut **tx)
    .await?;
    Ok(message)
}

pub async fn create(
    State(s): State<AppState>,
    user: CurrentUser,
    Json(r): Json<CreateTicketRequest>,
) -> Result<(StatusCode, Json<TicketThread>)> {
    r.validate()?;
    let priority = r.priority.as_deref().unwrap_or("normal");
    if !ticket::valid_priority(priority) {
        return Err(AppError::Validation(format!("unknown priority {priority}")));
    }

    let mut tx = s.db.begin().await?;
    let ticket = sqlx::query_as::<_, Ticket>(
        "INSERT INTO tickets (id, user_id, subject, category, priority, status) \
         VALUES ($1, $2, $3, $4, $5, 'open') RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(user.id)
    .bind(r.subject.trim())
    .bind(r.category.trim())
    .bind(priority)
    .fetch_one(&mut *tx)
    .await?;
    let message = insert_message(&mut tx, ticket.id, user.id, r.message.trim(), false).await?;
    tx.commit().await?;

    tracing::info!(ticket = %ticket.id, user = %user.id, "ticket opened");
    Ok((
        StatusCode::CREATED,
        Json(TicketThread {
            ticket,
            messages: vec![message],
        }),
    ))
}

pub async fn list_own(
    State(s): State<AppState>,
    user: CurrentUser,
    Query(p): Query<ListParams>,
) -> Result<Json<Paginated<Ticket>>> {
    let (limit, offset, page) = page_window(&p);
    let tickets = sqlx::query_as::<_, Ticket>(
        "SELECT * FROM tickets WHERE user_id = $1 ORDER BY updated_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(user.id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&s.db)
    .await?;
    let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tickets WHERE user_id = $1")
        .bind(user.id)
        .fetch_one(&s.db)
        .await?;
    Ok(Json(Paginated {
        data: tickets,
        total,
        page,
    }))
}

pub async fn get_thread(
    State(s): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<TicketThread>> {
    let ticket = sqlx::query_as::<_, Ticket>("SELECT * FROM tickets WHERE id = $1")
        .bind(id)
        .fetch_optional(&s.db)
        .await?
        .ok_or(AppError::NotFound("ticket"))?;
    if ticket.user_id != user.id && !user.is_admin() {
        return Err(AppError::NotFound("ticket"));
    }
    let messages = sqlx::query_as::<_, TicketMessage>(
        "SELECT * FROM ticket_messages WHERE ticket_id = $1 ORDER BY created_at",
    )
    .bind(ticket.id)
    .fetch_all(&s.db)
    .await?;
    Ok(Json(TicketThread { ticket, messages }))
}

/// Customer reply; reopens a closed ticket.
pub async fn reply(
    State(s): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(r): Json<ReplyRequest>,
) -> Result<(StatusCode, Json<TicketMessage>)> {
    r.validate()?;
    let mut tx = s.db.begin().await?;
    let ticket = sqlx::query_as::<_, Ticket>(
        "SELECT * FROM tickets WHERE id = $1 AND user_id = $2 FOR UPDATE",
    )
    .bind(id)
    .bind(user.id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::NotFound("ticket"))?;

    let next_status = match TicketStatus::parse(&ticket.status) {
        Some(TicketStatus::Closed) => TicketStatus::Open,
        Some(other) => other,
        None => TicketStatus::Open,
    };
    sqlx::query("UPDATE tickets SET status = $2, updated_at = NOW() WHERE id = $1")
        .bind(ticket.id)
        .bind(next_status.as_str())
        .execute(&mut *tx)
        .await?;
    let message = insert_message(&mut tx, ticket.id, user.id, r.body.trim(), false).await?;
    tx.commit().await?;
    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn close(
    State(s): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Ticket>> {
    let ticket = sqlx::query_as::<_, Ticket>(
        "UPDATE tickets SET status = 'closed', updated_at = NOW() \
         WHERE id = $1 AND user_id = $2 RETURNING *",
    )
    .bind(id)
    .bind(user.id)
    .fetch_optional(&s.db)
    .await?
    .ok_or(AppError::NotFound("ticket"))?;
    Ok(Json(ticket))
}
