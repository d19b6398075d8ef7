//! Credit balance, ledger history and package purchases.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::domain::content::{CreditPackage, CreditPurchase};
use crate::domain::user::{CreditTransaction, TransactionKind};
use crate::error::{AppError, Result};
use crate::routes::{page_window, ListParams, Paginated};
use crate::AppState;

/// Apply a signed credit delta to a user inside `tx`, appending the matching
/// ledger row. Locks the user row; fails without mutating anything when the
/// balance would go negative. Returns the balance after.
pub(crate) async fn apply_delta(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    delta: i64,
    kind: TransactionKind,
    note: &str,
) -> Result<i64> {
    let balance: Option<(i64,)> =
        sqlx::query_as("SELECT credits FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut **tx)
            .await?;
    let (balance,) = balance.ok_or(AppError::NotFound("user"))?;
    let after = balance + delta;
    if after < 0 {
        return Err(AppError::InsufficientCredits {
            needed: -delta,
            available: balance,
        });
    }
    sqlx::query("UPDATE users SET credits = $2, updated_at = NOW() WHERE id = $1")
        .bind(user_id)
        .bind(after)
        .execute(&mut **tx)
        .await?;
    sqlx::query(
        "INSERT INTO credit_transactions (id, user_id, amount, balance_after, kind, note) \
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(Uuid::now_v7())
    .bind(user_id)
    .bind(delta)
    .bind(after)
    .bind(kind.as_str())
    .bind(note)
    .execute(&mut **tx)
    .await?;
    Ok(after)
}

pub async fn balance(
    State(s): State<AppState>,
    user: CurrentUser,
) -> Result<Json<serde_json::Value>> {
    let (credits,): (i64,) = sqlx::query_as("SELECT credits FROM users WHERE id = $1")
        .bind(user.id)
        .fetch_optional(&s.db)
        .await?
        .ok_or(AppError::NotFound("user"))?;
    Ok(Json(serde_json::json!({"credits": credits})))
}

pub async fn transactions(
    State(s): State<AppState>,
    user: CurrentUser,
    Query(p): Query<ListParams>,
) -> Result<Json<Paginated<CreditTransaction>>> {
    let (limit, offset, page) = page_window(&p);
    let rows = sqlx::query_as::<_, CreditTransaction>(
        "SELECT * FROM credit_transactions WHERE user_id = $1 \
         ORDER BY created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(user.id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&s.db)
    .await?;
    let (total,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM credit_transactions WHERE user_id = $1")
            .bind(user.id)
            .fetch_one(&s.db)
            .await?;
    Ok(Json(Paginated {
        data: rows,
        total,
        page,
    }))
}

pub async fn list_packages(State(s): State<AppState>) -> Result<Json<Vec<CreditPackage>>> {
    let packages = sqlx::query_as::<_, CreditPackage>(
        "SELECT * FROM credit_packages WHERE active ORDER BY credits",
    )
    .fetch_all(&s.db)
    .await?;
    Ok(Json(packages))
}

#[derive(Debug, Deserialize)]
pub struct PurchaseRequest {
    pub package_id: Uuid,
}

/// Record a pending purchase intent for an external gateway. Credits are
/// granted when an admin confirms the payment arrived.
pub async fn purchase_package(
    State(s): State<AppState>,
    user: CurrentUser,
    Json(r): Json<PurchaseRequest>,
) -> Result<(StatusCode, Json<CreditPurchase>)> {
    let package = sqlx::query_as::<_, CreditPackage>(
        "SELECT * FROM credit_packages WHERE id = $1 AND active",
    )
    .bind(r.package_id)
    .fetch_optional(&s.db)
    .await?
    .ok_or(AppError::NotFound("credit package"))?;

    let purchase = sqlx::query_as::<_, CreditPurchase>(
        "INSERT INTO credit_purchases (id, user_id, package_id, credits, price_kurus, status) \
         VALUES ($1, $2, $3, $4, $5, 'pending') RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(user.id)
    .bind(package.id)
    .bind(package.credits)
    .bind(package.price_kurus)
    .fetch_one(&s.db)
    .await?;

    tracing::info!(user = %user.id, package = %package.id, "credit purchase intent created");
    Ok((StatusCode::CREATED, Json(purchase)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::PgPool;

    async fn seed_user(pool: &PgPool, credits: i64) -> Uuid {
        let id = Uuid::now_v7();
        sqlx::query(
            "INSERT INTO users (id, email, password_hash, display_name, credits) \
             VALUES ($1, $2, 'x', 'Test', $3)",
        )
        .bind(id)
        .bind(format!("{id}@test.local"))
        .bind(credits)
        .execute(pool)
        .await
        .unwrap();
        id
    }

    #[sqlx::test]
    async fn delta_writes_matching_ledger_row(pool: PgPool) {
        let user_id = seed_user(&pool, 100).await;

        let mut tx = pool.begin().await.unwrap();
        let after = apply_delta(&mut tx, user_id, -40, TransactionKind::OrderPayment, "test")
            .await
            .unwrap();
        tx.commit().await.unwrap();
        assert_eq!(after, 60);

        let (credits,): (i64,) = sqlx::query_as("SELECT credits FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(credits, 60);
        let (amount, balance_after, kind): (i64, i64, String) = sqlx::query_as(
            "SELECT amount, balance_after, kind FROM credit_transactions WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(amount, -40);
        assert_eq!(balance_after, 60);
        assert_eq!(kind, "order_payment");
    }

    #[sqlx::test]
    async fn overdraft_rejected_without_side_effects(pool: PgPool) {
        let user_id = seed_user(&pool, 30).await;

        let mut tx = pool.begin().await.unwrap();
        let err = apply_delta(&mut tx, user_id, -50, TransactionKind::OrderPayment, "test")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::InsufficientCredits {
                needed: 50,
                available: 30,
            }
        ));
        tx.rollback().await.unwrap();

        let (credits,): (i64,) = sqlx::query_as("SELECT credits FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(credits, 30);
        let (ledger_rows,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM credit_transactions WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(ledger_rows, 0);
    }
}
