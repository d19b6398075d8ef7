//! Admin catalog management: products (incl. featured ordering) and
//! categories.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AdminUser;
use crate::domain::catalog::{self, Category, Product};
use crate::error::{AppError, Result};
use crate::routes::{page_window, ListParams, Paginated};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct ProductRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub description: Option<String>,
    #[validate(range(min = 0))]
    pub price: i64,
    #[validate(range(min = 0))]
    pub stock: i32,
    pub status: Option<String>,
    pub category_id: Option<Uuid>,
    pub delivery_note: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FeaturedRequest {
    /// `null` clears the product from the featured list.
    pub rank: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CategoryRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub description: Option<String>,
    pub parent_id: Option<Uuid>,
    pub display_order: Option<i32>,
}

fn check_status(status: &Option<String>) -> Result<&str> {
    match status.as_deref() {
        None => Ok(catalog::STATUS_ACTIVE),
        Some(s) if catalog::valid_status(s) => Ok(s),
        Some(s) => Err(AppError::Validation(format!("unknown product status {s}"))),
    }
}

/// Unlike the public listing, this includes hidden and deleted products.
pub async fn list_products(
    State(s): State<AppState>,
    _admin: AdminUser,
    Query(p): Query<ListParams>,
) -> Result<Json<Paginated<Product>>> {
    let (limit, offset, page) = page_window(&p);
    let search = p.search.as_deref().map(str::trim).filter(|t| !t.is_empty());
    let products = sqlx::query_as::<_, Product>(
        "SELECT * FROM products WHERE \
           ($1::uuid IS NULL OR category_id = $1) \
           AND ($2::text IS NULL OR name ILIKE '%' || $2 || '%') \
           AND ($3::text IS NULL OR status = $3) \
         ORDER BY created_at DESC LIMIT $4 OFFSET $5",
    )
    .bind(p.category)
    .bind(search)
    .bind(p.status.as_deref())
    .bind(limit)
    .bind(offset)
    .fetch_all(&s.db)
    .await?;
    let (total,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM products WHERE \
           ($1::uuid IS NULL OR category_id = $1) \
           AND ($2::text IS NULL OR name ILIKE '%' || $2 || '%') \
           AND ($3::text IS NULL OR status = $3)",
    )
    .bind(p.category)
    .bind(search)
    .bind(p.status.as_deref())
    .fetch_one(&s.db)
    .await?;
    Ok(Json(Paginated {
        data: products,
        total,
        page,
    }))
}

pub async fn create_product(
    State(s): State<AppState>,
    _admin: AdminUser,
    Json(r): Json<ProductRequest>,
) -> Result<(StatusCode, Json<Product>)> {
    r.validate()?;
    let status = check_status(&r.status)?;
    let sku = format!("SKU-{:08}", rand::random::<u32>());
    let product = sqlx::query_as::<_, Product>(
        "INSERT INTO products \
           (id, sku, name, description, price, stock, status, category_id, delivery_note, image_url) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(&sku)
    .bind(r.name.trim())
    .bind(&r.description)
    .bind(r.price)
    .bind(r.stock)
    .bind(status)
    .bind(r.category_id)
    .bind(&r.delivery_note)
    .bind(&r.image_url)
    .fetch_one(&s.db)
    .await?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn update_product(
    State(s): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(r): Json<ProductRequest>,
) -> Result<Json<Product>> {
    r.validate()?;
    let status = check_status(&r.status)?;
    sqlx::query_as::<_, Product>(
        "UPDATE products SET name = $2, description = $3, price = $4, stock = $5, \
           status = $6, category_id = $7, delivery_note = $8, image_url = $9, \
           updated_at = NOW() \
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(r.name.trim())
    .bind(&r.description)
    .bind(r.price)
    .bind(r.stock)
    .bind(status)
    .bind(r.category_id)
    .bind(&r.delivery_note)
    .bind(&r.image_url)
    .fetch_optional(&s.db)
    .await?
    .map(Json)
    .ok_or(AppError::NotFound("product"))
}

/// Soft delete: order items keep their FK, the product stops listing.
pub async fn delete_product(
    State(s): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    let affected = sqlx::query(
        "UPDATE products SET status = 'deleted', featured_rank = NULL, updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(id)
    .execute(&s.db)
    .await?
    .rows_affected();
    if affected == 0 {
        return Err(AppError::NotFound("product"));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_featured(
    State(s): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(r): Json<FeaturedRequest>,
) -> Result<Json<Product>> {
    sqlx::query_as::<_, Product>(
        "UPDATE products SET featured_rank = $2, updated_at = NOW() \
         WHERE id = $1 AND status <> 'deleted' RETURNING *",
    )
    .bind(id)
    .bind(r.rank)
    .fetch_optional(&s.db)
    .await?
    .map(Json)
    .ok_or(AppError::NotFound("product"))
}

pub async fn create_category(
    State(s): State<AppState>,
    _admin: AdminUser,
    Json(r): Json<CategoryRequest>,
) -> Result<(StatusCode, Json<Category>)> {
    r.validate()?;
    let slug = catalog::slugify(&r.name);
    let category = sqlx::query_as::<_, Category>(
        "INSERT INTO categories (id, name, slug, description, parent_id, display_order) \
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(r.name.trim())
    .bind(&slug)
    .bind(&r.description)
    .bind(r.parent_id)
    .bind(r.display_order.unwrap_or(0))
    .fetch_one(&s.db)
    .await?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn update_category(
    State(s): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(r): Json<CategoryRequest>,
) -> Result<Json<Category>> {
    r.validate()?;
    sqlx::query_as::<_, Category>(
        "UPDATE categories SET name = $2, description = $3, parent_id = $4, display_order = $5 \
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(r.name.trim())
    .bind(&r.description)
    .bind(r.parent_id)
    .bind(r.display_order.unwrap_or(0))
    .fetch_optional(&s.db)
    .await?
    .map(Json)
    .ok_or(AppError::NotFound("category"))
}

/// Products and child categories are detached, not deleted.
pub async fn delete_category(
    State(s): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    let mut tx = s.db.begin().await?;
    sqlx::query("UPDATE products SET category_id = NULL WHERE category_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("UPDATE categories SET parent_id = NULL WHERE parent_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    let affected = sqlx::query("DELETE FROM categories WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    if affected == 0 {
        return Err(AppError::NotFound("category"));
    }
    tx.commit().await?;
    Ok(StatusCode::NO_CONTENT)
}
