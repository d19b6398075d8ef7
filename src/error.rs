//! Application error taxonomy.
//!
//! Every route handler returns `Result<_, AppError>`; the `IntoResponse`
//! impl maps each variant to a status code and a JSON `{"error": ...}` body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::domain::approval::IidError;
use crate::domain::coupon::CouponRejection;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("authentication required")]
    Unauthorized,

    #[error("insufficient permissions")]
    Forbidden,

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("insufficient credits: need {needed}, have {available}")]
    InsufficientCredits { needed: i64, available: i64 },

    #[error("insufficient stock for {name}: requested {requested}, available {available}")]
    InsufficientStock {
        name: String,
        requested: i32,
        available: i32,
    },

    #[error(transparent)]
    Coupon(#[from] CouponRejection),

    #[error(transparent)]
    Iid(#[from] IidError),

    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("database error")]
    Database(#[from] sqlx::Error),
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Validation(_) | Self::Iid(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Conflict(_) | Self::InvalidTransition { .. } => StatusCode::CONFLICT,
            Self::InsufficientCredits { .. } => StatusCode::PAYMENT_REQUIRED,
            Self::InsufficientStock { .. } => StatusCode::CONFLICT,
            Self::Coupon(_) => StatusCode::BAD_REQUEST,
            Self::Database(sqlx::Error::RowNotFound) => StatusCode::NOT_FOUND,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
            // don't leak internals
            return (
                status,
                Json(serde_json::json!({"error": "internal server error"})),
            )
                .into_response();
        }
        (status, Json(serde_json::json!({"error": self.to_string()}))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
