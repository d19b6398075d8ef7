//! Onay Store - credit-based store and approval-number issuance service.
//!
//! A JSON/REST backend for a storefront where purchases and Installation ID
//! (IID) confirmation requests are paid with an internal credit balance.
//! Credits arrive via coupon codes, admin grants or purchased packages;
//! every balance change is mirrored into an append-only ledger.

pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod routes;

pub use config::Config;
pub use error::{AppError, Result};

use auth::JwtKeys;

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub nats: Option<async_nats::Client>,
    pub jwt: JwtKeys,
}
