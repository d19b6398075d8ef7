//! Registration, login and the current-user profile.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::auth::{password, CurrentUser};
use crate::domain::user::User;
use crate::error::{AppError, Result};
use crate::routes::cart::merge_guest_cart;
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    #[validate(length(min = 1, max = 100))]
    pub display_name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    pub password: String,
    /// Guest cart to merge into the user's cart on successful login.
    pub guest_cart_token: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .is_some_and(|d| d.kind() == sqlx::error::ErrorKind::UniqueViolation)
}

pub async fn register(
    State(s): State<AppState>,
    Json(r): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    r.validate()?;
    let email = r.email.trim().to_lowercase();
    let hash = password::hash(&r.password)?;

    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (id, email, password_hash, display_name, role, credits) \
         VALUES ($1, $2, $3, $4, 'user', 0) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(&email)
    .bind(&hash)
    .bind(r.display_name.trim())
    .fetch_one(&s.db)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict("email already registered".into())
        } else {
            e.into()
        }
    })?;

    let token = s.jwt.issue(user.id, &user.email, &user.role)?;
    tracing::info!(user = %user.id, "registered");
    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

pub async fn login(
    State(s): State<AppState>,
    Json(r): Json<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    r.validate()?;
    let email = r.email.trim().to_lowercase();

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(&email)
        .fetch_optional(&s.db)
        .await?;
    // verify against a constant-looking path whether or not the user exists
    let valid = user
        .as_ref()
        .map(|u| password::verify(&r.password, &u.password_hash))
        .unwrap_or(false);
    let user = match (user, valid) {
        (Some(u), true) => u,
        _ => return Err(AppError::Unauthorized),
    };

    if let Some(token) = r.guest_cart_token {
        if let Err(e) = merge_guest_cart(&s.db, user.id, token).await {
            // login still succeeds; the guest cart is abandoned
            tracing::warn!(user = %user.id, error = %e, "guest cart merge failed");
        }
    }

    let token = s.jwt.issue(user.id, &user.email, &user.role)?;
    Ok(Json(AuthResponse { token, user }))
}

pub async fn me(State(s): State<AppState>, current: CurrentUser) -> Result<Json<User>> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(current.id)
        .fetch_optional(&s.db)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("user"))
}
