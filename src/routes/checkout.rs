//! Checkout: stock validation, payment branch and the order status
//! transition, all in one database transaction.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::domain::content::{PaymentMethod, KIND_CREDITS};
use crate::domain::order::{Order, OrderItem, OrderStatus};
use crate::domain::user::TransactionKind;
use crate::error::{AppError, Result};
use crate::events;
use crate::routes::credits::apply_delta;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub payment_method_id: Uuid,
}

/// Subscribers must only see `completed` for paid orders; a gateway checkout
/// is merely placed until the payment is confirmed.
fn placement_subject(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Completed => events::ORDER_COMPLETED,
        _ => events::ORDER_PLACED,
    }
}

pub async fn checkout(
    State(s): State<AppState>,
    user: CurrentUser,
    Json(r): Json<CheckoutRequest>,
) -> Result<Json<Order>> {
    let mut tx = s.db.begin().await?;

    let order = sqlx::query_as::<_, Order>(
        "SELECT * FROM orders WHERE user_id = $1 AND status = 'open' FOR UPDATE",
    )
    .bind(user.id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::Validation("cart is empty".into()))?;

    let mut items = sqlx::query_as::<_, OrderItem>(
        "SELECT * FROM order_items WHERE order_id = $1",
    )
    .bind(order.id)
    .fetch_all(&mut *tx)
    .await?;
    if items.is_empty() {
        return Err(AppError::Validation("cart is empty".into()));
    }

    let method = sqlx::query_as::<_, PaymentMethod>(
        "SELECT * FROM payment_methods WHERE id = $1 AND active",
    )
    .bind(r.payment_method_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::NotFound("payment method"))?;

    // lock product rows in a stable order, validate, then decrement
    items.sort_by_key(|i| i.product_id);
    for item in &items {
        let row: Option<(i32, String, String)> = sqlx::query_as(
            "SELECT stock, name, status FROM products WHERE id = $1 FOR UPDATE",
        )
        .bind(item.product_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some((stock, name, status)) = row else {
            return Err(AppError::Conflict(format!(
                "product no longer available: {}",
                item.name
            )));
        };
        if status != "active" {
            return Err(AppError::Conflict(format!(
                "product no longer available: {name}"
            )));
        }
        if stock < item.quantity {
            return Err(AppError::InsufficientStock {
                name,
                requested: item.quantity,
                available: stock,
            });
        }
    }
    for item in &items {
        sqlx::query("UPDATE products SET stock = stock - $2, updated_at = NOW() WHERE id = $1")
            .bind(item.product_id)
            .bind(item.quantity)
            .execute(&mut *tx)
            .await?;
    }

    let order_number = format!("ORD-{:08}", rand::random::<u32>());

    let status = if method.kind == KIND_CREDITS {
        apply_delta(
            &mut tx,
            user.id,
            -order.total,
            TransactionKind::OrderPayment,
            &format!("Order {order_number}"),
        )
        .await?;
        OrderStatus::Completed
    } else {
        // external gateway placeholder: admin confirms the payment later
        OrderStatus::Processing
    };

    let paid = status == OrderStatus::Completed;
    let order = sqlx::query_as::<_, Order>(
        "UPDATE orders SET status = $2, order_number = $3, payment_method_id = $4, \
           paid_at = CASE WHEN $5 THEN NOW() ELSE NULL END, updated_at = NOW() \
         WHERE id = $1 RETURNING *",
    )
    .bind(order.id)
    .bind(status.as_str())
    .bind(&order_number)
    .bind(method.id)
    .bind(paid)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    tracing::info!(order = %order.id, %order_number, status = status.as_str(), "checkout");
    events::publish(
        &s.nats,
        placement_subject(status),
        serde_json::json!({
            "order_id": order.id,
            "order_number": order_number,
            "user_id": user.id,
            "total": order.total,
            "payment_kind": method.kind,
            "status": status.as_str(),
        }),
    )
    .await;

    Ok(Json(order))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::JwtKeys;
    use sqlx::PgPool;

    // the migration seeds the internal balance method under this id
    const CREDITS_METHOD: Uuid = Uuid::from_u128(1);

    fn state(pool: &PgPool) -> AppState {
        AppState {
            db: pool.clone(),
            nats: None,
            jwt: JwtKeys::new("test-secret-that-is-long-enough-0123"),
        }
    }

    async fn seed_user(pool: &PgPool, credits: i64) -> CurrentUser {
        let id = Uuid::now_v7();
        let email = format!("{id}@test.local");
        sqlx::query(
            "INSERT INTO users (id, email, password_hash, display_name, credits) \
             VALUES ($1, $2, 'x', 'Test', $3)",
        )
        .bind(id)
        .bind(&email)
        .bind(credits)
        .execute(pool)
        .await
        .unwrap();
        CurrentUser {
            id,
            email,
            role: "user".into(),
        }
    }

    async fn seed_product(pool: &PgPool, price: i64, stock: i32) -> Uuid {
        let id = Uuid::now_v7();
        sqlx::query(
            "INSERT INTO products (id, sku, name, price, stock) VALUES ($1, $2, 'Widget', $3, $4)",
        )
        .bind(id)
        .bind(format!("SKU-{id}"))
        .bind(price)
        .bind(stock)
        .execute(pool)
        .await
        .unwrap();
        id
    }

    async fn seed_cart(pool: &PgPool, user_id: Uuid, product_id: Uuid, price: i64, qty: i32) {
        let order_id = Uuid::now_v7();
        sqlx::query("INSERT INTO orders (id, user_id, status, total) VALUES ($1, $2, 'open', $3)")
            .bind(order_id)
            .bind(user_id)
            .bind(price * qty as i64)
            .execute(pool)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO order_items (id, order_id, product_id, name, unit_price, quantity, line_total) \
             VALUES ($1, $2, $3, 'Widget', $4, $5, $4 * $5)",
        )
        .bind(Uuid::now_v7())
        .bind(order_id)
        .bind(product_id)
        .bind(price)
        .bind(qty as i64)
        .execute(pool)
        .await
        .unwrap();
    }

    #[test]
    fn subject_follows_payment_outcome() {
        assert_eq!(
            placement_subject(OrderStatus::Completed),
            events::ORDER_COMPLETED
        );
        assert_eq!(
            placement_subject(OrderStatus::Processing),
            events::ORDER_PLACED
        );
    }

    #[sqlx::test]
    async fn credits_checkout_charges_and_completes(pool: PgPool) {
        let user = seed_user(&pool, 500).await;
        let user_id = user.id;
        let product = seed_product(&pool, 100, 5).await;
        seed_cart(&pool, user_id, product, 100, 3).await;

        let Json(order) = checkout(
            State(state(&pool)),
            user,
            Json(CheckoutRequest {
                payment_method_id: CREDITS_METHOD,
            }),
        )
        .await
        .unwrap();

        assert_eq!(order.status, "completed");
        assert!(order.paid_at.is_some());
        let (stock,): (i32,) = sqlx::query_as("SELECT stock FROM products WHERE id = $1")
            .bind(product)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(stock, 2);
        let (credits,): (i64,) = sqlx::query_as("SELECT credits FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(credits, 200);
        let (amount, balance_after): (i64, i64) = sqlx::query_as(
            "SELECT amount, balance_after FROM credit_transactions WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!((amount, balance_after), (-300, 200));
    }

    #[sqlx::test]
    async fn gateway_checkout_stays_processing_and_unpaid(pool: PgPool) {
        let gateway = Uuid::now_v7();
        sqlx::query(
            "INSERT INTO payment_methods (id, name, kind) VALUES ($1, 'Havale', 'gateway')",
        )
        .bind(gateway)
        .execute(&pool)
        .await
        .unwrap();

        let user = seed_user(&pool, 500).await;
        let user_id = user.id;
        let product = seed_product(&pool, 100, 5).await;
        seed_cart(&pool, user_id, product, 100, 3).await;

        let Json(order) = checkout(
            State(state(&pool)),
            user,
            Json(CheckoutRequest {
                payment_method_id: gateway,
            }),
        )
        .await
        .unwrap();

        assert_eq!(order.status, "processing");
        assert!(order.paid_at.is_none());
        let (credits,): (i64,) = sqlx::query_as("SELECT credits FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(credits, 500);
    }

    #[sqlx::test]
    async fn insufficient_stock_fails_atomically(pool: PgPool) {
        let user = seed_user(&pool, 1000).await;
        let user_id = user.id;
        let product = seed_product(&pool, 100, 2).await;
        seed_cart(&pool, user_id, product, 100, 3).await;

        let err = checkout(
            State(state(&pool)),
            user,
            Json(CheckoutRequest {
                payment_method_id: CREDITS_METHOD,
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            AppError::InsufficientStock {
                requested: 3,
                available: 2,
                ..
            }
        ));

        let (stock,): (i32,) = sqlx::query_as("SELECT stock FROM products WHERE id = $1")
            .bind(product)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(stock, 2);
        let (credits,): (i64,) = sqlx::query_as("SELECT credits FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(credits, 1000);
        let (status,): (String,) =
            sqlx::query_as("SELECT status FROM orders WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(status, "open");
    }
}
