//! Authenticated cart: the user's single `open` order. Every mutation
//! recomputes the denormalized order total in the same transaction.

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;
use validator::Validate;

use crate::auth::CurrentUser;
use crate::domain::catalog::Product;
use crate::domain::order::{Order, OrderItem};
use crate::error::{AppError, Result};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct CartView {
    pub order_id: Option<Uuid>,
    pub items: Vec<OrderItem>,
    pub total: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddItemRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 1000))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SetQuantityRequest {
    #[validate(range(min = 0, max = 1000))]
    pub quantity: i32,
}

/// Lock the user's open order, creating one if absent.
pub(crate) async fn ensure_open_order(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
) -> Result<Order> {
    let existing = sqlx::query_as::<_, Order>(
        "SELECT * FROM orders WHERE user_id = $1 AND status = 'open' FOR UPDATE",
    )
    .bind(user_id)
    .fetch_optional(&mut **tx)
    .await?;
    if let Some(order) = existing {
        return Ok(order);
    }
    // a concurrent first mutation can race this insert; the partial unique
    // index on open orders makes one side lose, which lands in the None arm
    let inserted = sqlx::query_as::<_, Order>(
        "INSERT INTO orders (id, user_id, status) VALUES ($1, $2, 'open') \
         ON CONFLICT (user_id) WHERE status = 'open' DO NOTHING RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(user_id)
    .fetch_optional(&mut **tx)
    .await?;
    match inserted {
        Some(order) => Ok(order),
        None => {
            let order = sqlx::query_as::<_, Order>(
                "SELECT * FROM orders WHERE user_id = $1 AND status = 'open' FOR UPDATE",
            )
            .bind(user_id)
            .fetch_one(&mut **tx)
            .await?;
            Ok(order)
        }
    }
}

pub(crate) async fn recompute_total(
    tx: &mut Transaction<'_, Postgres>,
    order_id: Uuid,
) -> Result<i64> {
    let total: i64 = sqlx::query_scalar(
        "UPDATE orders SET \
           total = COALESCE((SELECT SUM(line_total) FROM order_items WHERE order_id = $1), 0), \
           updated_at = NOW() \
         WHERE id = $1 RETURNING total",
    )
    .bind(order_id)
    .fetch_one(&mut **tx)
    .await?;
    Ok(total)
}

async fn load_view(db: &PgPool, user_id: Uuid) -> Result<CartView> {
    let order = sqlx::query_as::<_, Order>(
        "SELECT * FROM orders WHERE user_id = $1 AND status = 'open'",
    )
    .bind(user_id)
    .fetch_optional(db)
    .await?;
    let Some(order) = order else {
        return Ok(CartView {
            order_id: None,
            items: vec![],
            total: 0,
        });
    };
    let items = sqlx::query_as::<_, OrderItem>(
        "SELECT * FROM order_items WHERE order_id = $1 ORDER BY name",
    )
    .bind(order.id)
    .fetch_all(db)
    .await?;
    Ok(CartView {
        order_id: Some(order.id),
        items,
        total: order.total,
    })
}

pub async fn get_cart(State(s): State<AppState>, user: CurrentUser) -> Result<Json<CartView>> {
    Ok(Json(load_view(&s.db, user.id).await?))
}

pub async fn add_item(
    State(s): State<AppState>,
    user: CurrentUser,
    Json(r): Json<AddItemRequest>,
) -> Result<Json<CartView>> {
    r.validate()?;
    let mut tx = s.db.begin().await?;
    let order = ensure_open_order(&mut tx, user.id).await?;
    let product = sqlx::query_as::<_, Product>(
        "SELECT * FROM products WHERE id = $1 AND status = 'active'",
    )
    .bind(r.product_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::NotFound("product"))?;

    // price and name are snapshotted at add time; duplicates fold into quantity
    sqlx::query(
        "INSERT INTO order_items (id, order_id, product_id, name, unit_price, quantity, line_total) \
         VALUES ($1, $2, $3, $4, $5, $6, $5 * $6) \
         ON CONFLICT (order_id, product_id) DO UPDATE SET \
           quantity = order_items.quantity + EXCLUDED.quantity, \
           line_total = order_items.unit_price * (order_items.quantity + EXCLUDED.quantity)",
    )
    .bind(Uuid::now_v7())
    .bind(order.id)
    .bind(product.id)
    .bind(&product.name)
    .bind(product.price)
    .bind(r.quantity as i64)
    .execute(&mut *tx)
    .await?;

    recompute_total(&mut tx, order.id).await?;
    tx.commit().await?;
    Ok(Json(load_view(&s.db, user.id).await?))
}

pub async fn set_quantity(
    State(s): State<AppState>,
    user: CurrentUser,
    Path(product_id): Path<Uuid>,
    Json(r): Json<SetQuantityRequest>,
) -> Result<Json<CartView>> {
    r.validate()?;
    let mut tx = s.db.begin().await?;
    let order = ensure_open_order(&mut tx, user.id).await?;

    let affected = if r.quantity == 0 {
        sqlx::query("DELETE FROM order_items WHERE order_id = $1 AND product_id = $2")
            .bind(order.id)
            .bind(product_id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
    } else {
        sqlx::query(
            "UPDATE order_items SET quantity = $3, line_total = unit_price * $3 \
             WHERE order_id = $1 AND product_id = $2",
        )
        .bind(order.id)
        .bind(product_id)
        .bind(r.quantity as i64)
        .execute(&mut *tx)
        .await?
        .rows_affected()
    };
    if affected == 0 {
        return Err(AppError::NotFound("cart item"));
    }

    recompute_total(&mut tx, order.id).await?;
    tx.commit().await?;
    Ok(Json(load_view(&s.db, user.id).await?))
}

pub async fn remove_item(
    State(s): State<AppState>,
    user: CurrentUser,
    Path(product_id): Path<Uuid>,
) -> Result<Json<CartView>> {
    let mut tx = s.db.begin().await?;
    let order = ensure_open_order(&mut tx, user.id).await?;
    let affected =
        sqlx::query("DELETE FROM order_items WHERE order_id = $1 AND product_id = $2")
            .bind(order.id)
            .bind(product_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
    if affected == 0 {
        return Err(AppError::NotFound("cart item"));
    }
    recompute_total(&mut tx, order.id).await?;
    tx.commit().await?;
    Ok(Json(load_view(&s.db, user.id).await?))
}

pub async fn clear_cart(State(s): State<AppState>, user: CurrentUser) -> Result<Json<CartView>> {
    let mut tx = s.db.begin().await?;
    let order = ensure_open_order(&mut tx, user.id).await?;
    sqlx::query("DELETE FROM order_items WHERE order_id = $1")
        .bind(order.id)
        .execute(&mut *tx)
        .await?;
    recompute_total(&mut tx, order.id).await?;
    tx.commit().await?;
    Ok(Json(load_view(&s.db, user.id).await?))
}

/// Fold a guest cart into the user's open order, then drop it. Quantities
/// for products already in the cart are summed; prices of newly added lines
/// are re-snapshotted from the product. Missing or inactive products are
/// skipped. One transaction end to end.
pub(crate) async fn merge_guest_cart(db: &PgPool, user_id: Uuid, token: Uuid) -> Result<()> {
    let mut tx = db.begin().await?;

    let cart: Option<(Uuid,)> =
        sqlx::query_as("SELECT token FROM guest_carts WHERE token = $1 FOR UPDATE")
            .bind(token)
            .fetch_optional(&mut *tx)
            .await?;
    if cart.is_none() {
        // nothing to merge; expired or already consumed
        return Ok(());
    }

    let items: Vec<(Uuid, i32)> = sqlx::query_as(
        "SELECT product_id, quantity FROM guest_cart_items WHERE cart_token = $1",
    )
    .bind(token)
    .fetch_all(&mut *tx)
    .await?;

    if !items.is_empty() {
        let order = ensure_open_order(&mut tx, user_id).await?;
        for (product_id, quantity) in items {
            let product = sqlx::query_as::<_, Product>(
                "SELECT * FROM products WHERE id = $1 AND status = 'active'",
            )
            .bind(product_id)
            .fetch_optional(&mut *tx)
            .await?;
            let Some(product) = product else { continue };
            sqlx::query(
                "INSERT INTO order_items \
                   (id, order_id, product_id, name, unit_price, quantity, line_total) \
                 VALUES ($1, $2, $3, $4, $5, $6, $5 * $6) \
                 ON CONFLICT (order_id, product_id) DO UPDATE SET \
                   quantity = order_items.quantity + EXCLUDED.quantity, \
                   line_total = order_items.unit_price * (order_items.quantity + EXCLUDED.quantity)",
            )
            .bind(Uuid::now_v7())
            .bind(order.id)
            .bind(product.id)
            .bind(&product.name)
            .bind(product.price)
            .bind(quantity as i64)
            .execute(&mut *tx)
            .await?;
        }
        recompute_total(&mut tx, order.id).await?;
    }

    sqlx::query("DELETE FROM guest_carts WHERE token = $1")
        .bind(token)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    tracing::info!(user = %user_id, %token, "guest cart merged");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seed_user(pool: &PgPool) -> Uuid {
        let id = Uuid::now_v7();
        sqlx::query(
            "INSERT INTO users (id, email, password_hash, display_name, credits) \
             VALUES ($1, $2, 'x', 'Test', 0)",
        )
        .bind(id)
        .bind(format!("{id}@test.local"))
        .execute(pool)
        .await
        .unwrap();
        id
    }

    #[sqlx::test]
    async fn concurrent_first_mutations_share_one_open_order(pool: PgPool) {
        let user_id = seed_user(&pool).await;

        let open = |pool: PgPool| async move {
            let mut tx = pool.begin().await.unwrap();
            let order = ensure_open_order(&mut tx, user_id).await.unwrap();
            tx.commit().await.unwrap();
            order.id
        };
        let (a, b) = tokio::join!(open(pool.clone()), open(pool.clone()));
        assert_eq!(a, b);

        let (open_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM orders WHERE user_id = $1 AND status = 'open'",
        )
        .bind(user_id)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(open_count, 1);
    }

    #[sqlx::test]
    async fn open_order_reused_across_transactions(pool: PgPool) {
        let user_id = seed_user(&pool).await;

        let mut tx = pool.begin().await.unwrap();
        let first = ensure_open_order(&mut tx, user_id).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = pool.begin().await.unwrap();
        let second = ensure_open_order(&mut tx, user_id).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(first.id, second.id);
    }
}
