//! Anonymous guest carts, keyed by a server-issued UUID token that the
//! frontend keeps in a cookie. Merged into the user's cart at login.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;
use validator::Validate;

use crate::domain::cart::{GuestCart, GuestCartItem};
use crate::domain::catalog::Product;
use crate::error::{AppError, Result};
use crate::routes::cart::{AddItemRequest, SetQuantityRequest};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct GuestCartView {
    pub token: Uuid,
    pub items: Vec<GuestCartItem>,
    pub total: i64,
}

async fn lock_cart(tx: &mut Transaction<'_, Postgres>, token: Uuid) -> Result<GuestCart> {
    sqlx::query_as::<_, GuestCart>("SELECT * FROM guest_carts WHERE token = $1 FOR UPDATE")
        .bind(token)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(AppError::NotFound("guest cart"))
}

async fn recompute_total(tx: &mut Transaction<'_, Postgres>, token: Uuid) -> Result<i64> {
    let total: i64 = sqlx::query_scalar(
        "UPDATE guest_carts SET \
           total = COALESCE((SELECT SUM(line_total) FROM guest_cart_items WHERE cart_token = $1), 0), \
           updated_at = NOW() \
         WHERE token = $1 RETURNING total",
    )
    .bind(token)
    .fetch_one(&mut **tx)
    .await?;
    Ok(total)
}

async fn load_view(db: &PgPool, token: Uuid) -> Result<GuestCartView> {
    let cart = sqlx::query_as::<_, GuestCart>("SELECT * FROM guest_carts WHERE token = $1")
        .bind(token)
        .fetch_optional(db)
        .await?
        .ok_or(AppError::NotFound("guest cart"))?;
    let items = sqlx::query_as::<_, GuestCartItem>(
        "SELECT * FROM guest_cart_items WHERE cart_token = $1 ORDER BY name",
    )
    .bind(token)
    .fetch_all(db)
    .await?;
    Ok(GuestCartView {
        token: cart.token,
        items,
        total: cart.total,
    })
}

pub async fn create_cart(State(s): State<AppState>) -> Result<(StatusCode, Json<GuestCart>)> {
    // v4: the token is a bearer secret, not a sortable row id
    let cart = sqlx::query_as::<_, GuestCart>(
        "INSERT INTO guest_carts (token) VALUES ($1) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .fetch_one(&s.db)
    .await?;
    Ok((StatusCode::CREATED, Json(cart)))
}

pub async fn get_cart(
    State(s): State<AppState>,
    Path(token): Path<Uuid>,
) -> Result<Json<GuestCartView>> {
    Ok(Json(load_view(&s.db, token).await?))
}

pub async fn add_item(
    State(s): State<AppState>,
    Path(token): Path<Uuid>,
    Json(r): Json<AddItemRequest>,
) -> Result<Json<GuestCartView>> {
    r.validate()?;
    let mut tx = s.db.begin().await?;
    lock_cart(&mut tx, token).await?;
    let product = sqlx::query_as::<_, Product>(
        "SELECT * FROM products WHERE id = $1 AND status = 'active'",
    )
    .bind(r.product_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::NotFound("product"))?;

    sqlx::query(
        "INSERT INTO guest_cart_items \
           (id, cart_token, product_id, name, unit_price, quantity, line_total) \
         VALUES ($1, $2, $3, $4, $5, $6, $5 * $6) \
         ON CONFLICT (cart_token, product_id) DO UPDATE SET \
           quantity = guest_cart_items.quantity + EXCLUDED.quantity, \
           line_total = guest_cart_items.unit_price * (guest_cart_items.quantity + EXCLUDED.quantity)",
    )
    .bind(Uuid::now_v7())
    .bind(token)
    .bind(product.id)
    .bind(&product.name)
    .bind(product.price)
    .bind(r.quantity as i64)
    .execute(&mut *tx)
    .await?;

    recompute_total(&mut tx, token).await?;
    tx.commit().await?;
    Ok(Json(load_view(&s.db, token).await?))
}

pub async fn set_quantity(
    State(s): State<AppState>,
    Path((token, product_id)): Path<(Uuid, Uuid)>,
    Json(r): Json<SetQuantityRequest>,
) -> Result<Json<GuestCartView>> {
    r.validate()?;
    let mut tx = s.db.begin().await?;
    lock_cart(&mut tx, token).await?;

    let affected = if r.quantity == 0 {
        sqlx::query("DELETE FROM guest_cart_items WHERE cart_token = $1 AND product_id = $2")
            .bind(token)
            .bind(product_id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
    } else {
        sqlx::query(
            "UPDATE guest_cart_items SET quantity = $3, line_total = unit_price * $3 \
             WHERE cart_token = $1 AND product_id = $2",
        )
        .bind(token)
        .bind(product_id)
        .bind(r.quantity as i64)
        .execute(&mut *tx)
        .await?
        .rows_affected()
    };
    if affected == 0 {
        return Err(AppError::NotFound("cart item"));
    }

    recompute_total(&mut tx, token).await?;
    tx.commit().await?;
    Ok(Json(load_view(&s.db, token).await?))
}

pub async fn remove_item(
    State(s): State<AppState>,
    Path((token, product_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<GuestCartView>> {
    let mut tx = s.db.begin().await?;
    lock_cart(&mut tx, token).await?;
    let affected =
        sqlx::query("DELETE FROM guest_cart_items WHERE cart_token = $1 AND product_id = $2")
            .bind(token)
            .bind(product_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
    if affected == 0 {
        return Err(AppError::NotFound("cart item"));
    }
    recompute_total(&mut tx, token).await?;
    tx.commit().await?;
    Ok(Json(load_view(&s.db, token).await?))
}

/// Dropping the cart row cascades to its items.
pub async fn clear_cart(State(s): State<AppState>, Path(token): Path<Uuid>) -> Result<StatusCode> {
    let affected = sqlx::query("DELETE FROM guest_carts WHERE token = $1")
        .bind(token)
        .execute(&s.db)
        .await?
        .rows_affected();
    if affected == 0 {
        return Err(AppError::NotFound("guest cart"));
    }
    Ok(StatusCode::NO_CONTENT)
}
