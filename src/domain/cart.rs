//! Guest carts: anonymous server-side carts keyed by a client-held UUID
//! token. Same item shape as order items so login can fold them into the
//! user's open order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct GuestCart {
    pub token: Uuid,
    pub total: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct GuestCartItem {
    pub id: Uuid,
    pub cart_token: Uuid,
    pub product_id: Uuid,
    pub name: String,
    pub unit_price: i64,
    pub quantity: i32,
    pub line_total: i64,
}
