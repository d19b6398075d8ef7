//! Public catalog: product listing/search, featured ordering, categories.

use axum::extract::{Path, Query, State};
use axum::Json;
use uuid::Uuid;

use crate::domain::catalog::{Category, Product};
use crate::error::{AppError, Result};
use crate::routes::{page_window, ListParams, Paginated};
use crate::AppState;

pub async fn list_products(
    State(s): State<AppState>,
    Query(p): Query<ListParams>,
) -> Result<Json<Paginated<Product>>> {
    let (limit, offset, page) = page_window(&p);
    let search = p.search.as_deref().map(str::trim).filter(|t| !t.is_empty());

    let products = sqlx::query_as::<_, Product>(
        "SELECT * FROM products WHERE status = 'active' \
           AND ($1::uuid IS NULL OR category_id = $1) \
           AND ($2::text IS NULL OR name ILIKE '%' || $2 || '%') \
         ORDER BY created_at DESC LIMIT $3 OFFSET $4",
    )
    .bind(p.category)
    .bind(search)
    .bind(limit)
    .bind(offset)
    .fetch_all(&s.db)
    .await?;

    let (total,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM products WHERE status = 'active' \
           AND ($1::uuid IS NULL OR category_id = $1) \
           AND ($2::text IS NULL OR name ILIKE '%' || $2 || '%')",
    )
    .bind(p.category)
    .bind(search)
    .fetch_one(&s.db)
    .await?;

    Ok(Json(Paginated {
        data: products,
        total,
        page,
    }))
}

pub async fn featured_products(State(s): State<AppState>) -> Result<Json<Vec<Product>>> {
    let products = sqlx::query_as::<_, Product>(
        "SELECT * FROM products WHERE status = 'active' AND featured_rank IS NOT NULL \
         ORDER BY featured_rank, name",
    )
    .fetch_all(&s.db)
    .await?;
    Ok(Json(products))
}

pub async fn get_product(
    State(s): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Product>> {
    sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1 AND status = 'active'")
        .bind(id)
        .fetch_optional(&s.db)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("product"))
}

pub async fn list_categories(State(s): State<AppState>) -> Result<Json<Vec<Category>>> {
    let categories = sqlx::query_as::<_, Category>(
        "SELECT * FROM categories ORDER BY display_order, name",
    )
    .fetch_all(&s.db)
    .await?;
    Ok(Json(categories))
}

pub async fn get_category(
    State(s): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Category>> {
    sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = $1")
        .bind(id)
        .fetch_optional(&s.db)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("category"))
}
