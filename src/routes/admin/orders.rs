//! Admin order oversight: listing and gateway-payment confirmation.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AdminUser;
use crate::domain::order::{Order, OrderItem, OrderStatus};
use crate::error::{AppError, Result};
use crate::routes::{page_window, ListParams, Paginated};
use crate::AppState;

pub async fn list(
    State(s): State<AppState>,
    _admin: AdminUser,
    Query(p): Query<ListParams>,
) -> Result<Json<Paginated<Order>>> {
    let (limit, offset, page) = page_window(&p);
    let orders = sqlx::query_as::<_, Order>(
        "SELECT * FROM orders WHERE status <> 'open' \
           AND ($1::text IS NULL OR status = $1) \
         ORDER BY created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(p.status.as_deref())
    .bind(limit)
    .bind(offset)
    .fetch_all(&s.db)
    .await?;
    let (total,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM orders WHERE status <> 'open' \
           AND ($1::text IS NULL OR status = $1)",
    )
    .bind(p.status.as_deref())
    .fetch_one(&s.db)
    .await?;
    Ok(Json(Paginated {
        data: orders,
        total,
        page,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    pub status: String,
}

/// `processing -> completed` confirms an external gateway payment;
/// `processing -> cancelled` abandons it and restores stock.
pub async fn set_status(
    State(s): State<AppState>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(r): Json<SetStatusRequest>,
) -> Result<Json<Order>> {
    let next = OrderStatus::parse(&r.status)
        .ok_or_else(|| AppError::Validation(format!("unknown order status {}", r.status)))?;

    let mut tx = s.db.begin().await?;
    let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound("order"))?;
    let current = OrderStatus::parse(&order.status).ok_or_else(|| {
        AppError::Validation(format!("order has unknown status {}", order.status))
    })?;
    if !current.admin_can_set(next) {
        return Err(AppError::InvalidTransition {
            from: order.status.clone(),
            to: r.status.clone(),
        });
    }

    if next == OrderStatus::Cancelled {
        let items = sqlx::query_as::<_, OrderItem>(
            "SELECT * FROM order_items WHERE order_id = $1",
        )
        .bind(order.id)
        .fetch_all(&mut *tx)
        .await?;
        for item in &items {
            sqlx::query(
                "UPDATE products SET stock = stock + $2, updated_at = NOW() WHERE id = $1",
            )
            .bind(item.product_id)
            .bind(item.quantity)
            .execute(&mut *tx)
            .await?;
        }
    }

    let paid = next == OrderStatus::Completed;
    let order = sqlx::query_as::<_, Order>(
        "UPDATE orders SET status = $2, \
           paid_at = CASE WHEN $3 THEN NOW() ELSE paid_at END, updated_at = NOW() \
         WHERE id = $1 RETURNING *",
    )
    .bind(order.id)
    .bind(next.as_str())
    .bind(paid)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;

    tracing::info!(admin = %admin.0.id, order = %order.id, status = next.as_str(), "order status set");
    Ok(Json(order))
}
