//! Customer order history and cancellation.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::domain::content::KIND_CREDITS;
use crate::domain::order::{Order, OrderItem, OrderStatus};
use crate::domain::user::TransactionKind;
use crate::error::{AppError, Result};
use crate::events;
use crate::routes::credits::apply_delta;
use crate::routes::{page_window, ListParams, Paginated};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Placed orders only; the `open` order is the cart.
pub async fn list_orders(
    State(s): State<AppState>,
    user: CurrentUser,
    Query(p): Query<ListParams>,
) -> Result<Json<Paginated<Order>>> {
    let (limit, offset, page) = page_window(&p);
    let orders = sqlx::query_as::<_, Order>(
        "SELECT * FROM orders WHERE user_id = $1 AND status <> 'open' \
         ORDER BY created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(user.id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&s.db)
    .await?;
    let (total,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM orders WHERE user_id = $1 AND status <> 'open'",
    )
    .bind(user.id)
    .fetch_one(&s.db)
    .await?;
    Ok(Json(Paginated {
        data: orders,
        total,
        page,
    }))
}

pub async fn get_order(
    State(s): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderDetail>> {
    let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user.id)
        .fetch_optional(&s.db)
        .await?
        .ok_or(AppError::NotFound("order"))?;
    let items = sqlx::query_as::<_, OrderItem>(
        "SELECT * FROM order_items WHERE order_id = $1 ORDER BY name",
    )
    .bind(order.id)
    .fetch_all(&s.db)
    .await?;
    Ok(Json(OrderDetail { order, items }))
}

/// Cancel a placed order: restore stock, refund credits if the order was
/// paid from the balance, and mark it cancelled.
pub async fn cancel_order(
    State(s): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>> {
    let mut tx = s.db.begin().await?;

    let order = sqlx::query_as::<_, Order>(
        "SELECT * FROM orders WHERE id = $1 AND user_id = $2 FOR UPDATE",
    )
    .bind(id)
    .bind(user.id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::NotFound("order"))?;

    let status = OrderStatus::parse(&order.status).ok_or_else(|| {
        AppError::Validation(format!("order has unknown status {}", order.status))
    })?;
    if !status.cancellable() {
        return Err(AppError::InvalidTransition {
            from: order.status.clone(),
            to: "cancelled".into(),
        });
    }

    let items = sqlx::query_as::<_, OrderItem>(
        "SELECT * FROM order_items WHERE order_id = $1",
    )
    .bind(order.id)
    .fetch_all(&mut *tx)
    .await?;
    for item in &items {
        sqlx::query("UPDATE products SET stock = stock + $2, updated_at = NOW() WHERE id = $1")
            .bind(item.product_id)
            .bind(item.quantity)
            .execute(&mut *tx)
            .await?;
    }

    // only balance payments are refunded in credits; gateway payments are
    // settled outside the system
    let kind: Option<(String,)> = match order.payment_method_id {
        Some(method_id) => {
            sqlx::query_as("SELECT kind FROM payment_methods WHERE id = $1")
                .bind(method_id)
                .fetch_optional(&mut *tx)
                .await?
        }
        None => None,
    };
    let paid_with_credits = kind.map(|(k,)| k == KIND_CREDITS).unwrap_or(false);

    if paid_with_credits && order.paid_at.is_some() && order.total > 0 {
        let number = order.order_number.as_deref().unwrap_or("?");
        apply_delta(
            &mut tx,
            user.id,
            order.total,
            TransactionKind::OrderRefund,
            &format!("Refund for order {number}"),
        )
        .await?;
    }

    let order = sqlx::query_as::<_, Order>(
        "UPDATE orders SET status = 'cancelled', updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(order.id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    tracing::info!(order = %order.id, "order cancelled");
    events::publish(
        &s.nats,
        events::ORDER_CANCELLED,
        serde_json::json!({"order_id": order.id, "user_id": user.id, "total": order.total}),
    )
    .await;

    Ok(Json(order))
}
