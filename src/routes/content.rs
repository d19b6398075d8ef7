//! Public content: payment methods, page blobs and per-path SEO metadata.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use crate::domain::content::{Page, PageSeo, PaymentMethod};
use crate::error::{AppError, Result};
use crate::AppState;

pub async fn list_payment_methods(
    State(s): State<AppState>,
) -> Result<Json<Vec<PaymentMethod>>> {
    let methods = sqlx::query_as::<_, PaymentMethod>(
        "SELECT * FROM payment_methods WHERE active ORDER BY name",
    )
    .fetch_all(&s.db)
    .await?;
    Ok(Json(methods))
}

pub async fn get_page(State(s): State<AppState>, Path(slug): Path<String>) -> Result<Json<Page>> {
    sqlx::query_as::<_, Page>("SELECT * FROM pages WHERE slug = $1 AND published")
        .bind(&slug)
        .fetch_optional(&s.db)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("page"))
}

#[derive(Debug, Deserialize)]
pub struct SeoQuery {
    pub path: String,
}

pub async fn get_seo(
    State(s): State<AppState>,
    Query(q): Query<SeoQuery>,
) -> Result<Json<PageSeo>> {
    sqlx::query_as::<_, PageSeo>("SELECT * FROM page_seo WHERE path = $1")
        .bind(&q.path)
        .fetch_optional(&s.db)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("seo entry"))
}
