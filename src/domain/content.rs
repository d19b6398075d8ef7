//! Admin-managed content: payment methods, credit packages, page blobs and
//! per-path SEO metadata. Stored and served verbatim.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PaymentMethod {
    pub id: Uuid,
    pub name: String,
    pub kind: String,
    pub active: bool,
    pub instructions: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Payment method kinds: internal credit balance or an external gateway
/// placeholder that leaves the order awaiting confirmation.
pub const KIND_CREDITS: &str = "credits";
pub const KIND_GATEWAY: &str = "gateway";

pub fn valid_kind(kind: &str) -> bool {
    kind == KIND_CREDITS || kind == KIND_GATEWAY
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CreditPackage {
    pub id: Uuid,
    pub name: String,
    pub credits: i64,
    pub price_kurus: i64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CreditPurchase {
    pub id: Uuid,
    pub user_id: Uuid,
    pub package_id: Uuid,
    pub credits: i64,
    pub price_kurus: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PageSeo {
    pub id: Uuid,
    pub path: String,
    pub title: String,
    pub description: String,
    pub keywords: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Page {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub body: String,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
