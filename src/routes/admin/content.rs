//! Admin content management: payment methods, credit packages, purchase
//! confirmation, SEO entries and page blobs.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AdminUser;
use crate::domain::catalog::slugify;
use crate::domain::content::{
    self, CreditPackage, CreditPurchase, Page, PageSeo, PaymentMethod,
};
use crate::domain::user::TransactionKind;
use crate::error::{AppError, Result};
use crate::routes::credits::apply_delta;
use crate::routes::{page_window, ListParams, Paginated};
use crate::AppState;

// ---- payment methods ----

#[derive(Debug, Deserialize, Validate)]
pub struct PaymentMethodRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub kind: String,
    pub active: Option<bool>,
    pub instructions: Option<String>,
}

pub async fn list_payment_methods(
    State(s): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<PaymentMethod>>> {
    let methods =
        sqlx::query_as::<_, PaymentMethod>("SELECT * FROM payment_methods ORDER BY name")
            .fetch_all(&s.db)
            .await?;
    Ok(Json(methods))
}

pub async fn create_payment_method(
    State(s): State<AppState>,
    _admin: AdminUser,
    Json(r): Json<PaymentMethodRequest>,
) -> Result<(StatusCode, Json<PaymentMethod>)> {
    r.validate()?;
    if !content::valid_kind(&r.kind) {
        return Err(AppError::Validation(format!(
            "unknown payment kind {}",
            r.kind
        )));
    }
    let method = sqlx::query_as::<_, PaymentMethod>(
        "INSERT INTO payment_methods (id, name, kind, active, instructions) \
         VALUES ($1, $2, $3, $4, $5) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(r.name.trim())
    .bind(&r.kind)
    .bind(r.active.unwrap_or(true))
    .bind(&r.instructions)
    .fetch_one(&s.db)
    .await?;
    Ok((StatusCode::CREATED, Json(method)))
}

pub async fn update_payment_method(
    State(s): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(r): Json<PaymentMethodRequest>,
) -> Result<Json<PaymentMethod>> {
    r.validate()?;
    if !content::valid_kind(&r.kind) {
        return Err(AppError::Validation(format!(
            "unknown payment kind {}",
            r.kind
        )));
    }
    sqlx::query_as::<_, PaymentMethod>(
        "UPDATE payment_methods SET name = $2, kind = $3, active = $4, instructions = $5 \
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(r.name.trim())
    .bind(&r.kind)
    .bind(r.active.unwrap_or(true))
    .bind(&r.instructions)
    .fetch_optional(&s.db)
    .await?
    .map(Json)
    .ok_or(AppError::NotFound("payment method"))
}

/// Orders reference payment methods, so deletion is a deactivation.
pub async fn delete_payment_method(
    State(s): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    let affected = sqlx::query("UPDATE payment_methods SET active = FALSE WHERE id = $1")
        .bind(id)
        .execute(&s.db)
        .await?
        .rows_affected();
    if affected == 0 {
        return Err(AppError::NotFound("payment method"));
    }
    Ok(StatusCode::NO_CONTENT)
}

// ---- credit packages ----

#[derive(Debug, Deserialize, Validate)]
pub struct PackageRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(range(min = 1))]
    pub credits: i64,
    #[validate(range(min = 0))]
    pub price_kurus: i64,
    pub active: Option<bool>,
}

pub async fn list_packages(
    State(s): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<CreditPackage>>> {
    let packages =
        sqlx::query_as::<_, CreditPackage>("SELECT * FROM credit_packages ORDER BY credits")
            .fetch_all(&s.db)
            .await?;
    Ok(Json(packages))
}

pub async fn create_package(
    State(s): State<AppState>,
    _admin: AdminUser,
    Json(r): Json<PackageRequest>,
) -> Result<(StatusCode, Json<CreditPackage>)> {
    r.validate()?;
    let package = sqlx::query_as::<_, CreditPackage>(
        "INSERT INTO credit_packages (id, name, credits, price_kurus, active) \
         VALUES ($1, $2, $3, $4, $5) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(r.name.trim())
    .bind(r.credits)
    .bind(r.price_kurus)
    .bind(r.active.unwrap_or(true))
    .fetch_one(&s.db)
    .await?;
    Ok((StatusCode::CREATED, Json(package)))
}

pub async fn update_package(
    State(s): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(r): Json<PackageRequest>,
) -> Result<Json<CreditPackage>> {
    r.validate()?;
    sqlx::query_as::<_, CreditPackage>(
        "UPDATE credit_packages SET name = $2, credits = $3, price_kurus = $4, active = $5 \
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(r.name.trim())
    .bind(r.credits)
    .bind(r.price_kurus)
    .bind(r.active.unwrap_or(true))
    .fetch_optional(&s.db)
    .await?
    .map(Json)
    .ok_or(AppError::NotFound("credit package"))
}

pub async fn delete_package(
    State(s): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    let affected = sqlx::query("UPDATE credit_packages SET active = FALSE WHERE id = $1")
        .bind(id)
        .execute(&s.db)
        .await?
        .rows_affected();
    if affected == 0 {
        return Err(AppError::NotFound("credit package"));
    }
    Ok(StatusCode::NO_CONTENT)
}

// ---- purchases ----

pub async fn list_purchases(
    State(s): State<AppState>,
    _admin: AdminUser,
    Query(p): Query<ListParams>,
) -> Result<Json<Paginated<CreditPurchase>>> {
    let (limit, offset, page) = page_window(&p);
    let rows = sqlx::query_as::<_, CreditPurchase>(
        "SELECT * FROM credit_purchases WHERE ($1::text IS NULL OR status = $1) \
         ORDER BY created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(p.status.as_deref())
    .bind(limit)
    .bind(offset)
    .fetch_all(&s.db)
    .await?;
    let (total,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM credit_purchases WHERE ($1::text IS NULL OR status = $1)",
    )
    .bind(p.status.as_deref())
    .fetch_one(&s.db)
    .await?;
    Ok(Json(Paginated {
        data: rows,
        total,
        page,
    }))
}

/// Confirm that a gateway payment arrived: grant the package credits and
/// mark the purchase completed, atomically.
pub async fn confirm_purchase(
    State(s): State<AppState>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<CreditPurchase>> {
    let mut tx = s.db.begin().await?;
    let purchase = sqlx::query_as::<_, CreditPurchase>(
        "SELECT * FROM credit_purchases WHERE id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::NotFound("purchase"))?;
    if purchase.status != "pending" {
        return Err(AppError::Conflict(format!(
            "purchase is already {}",
            purchase.status
        )));
    }

    apply_delta(
        &mut tx,
        purchase.user_id,
        purchase.credits,
        TransactionKind::Purchase,
        &format!("Credit package purchase ({} credits)", purchase.credits),
    )
    .await?;
    let purchase = sqlx::query_as::<_, CreditPurchase>(
        "UPDATE credit_purchases SET status = 'completed' WHERE id = $1 RETURNING *",
    )
    .bind(purchase.id)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;

    tracing::info!(admin = %admin.0.id, purchase = %purchase.id, "purchase confirmed");
    Ok(Json(purchase))
}

// ---- seo ----

#[derive(Debug, Deserialize, Validate)]
pub struct SeoRequest {
    #[validate(length(min = 1, max = 500))]
    pub path: String,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub description: Option<String>,
    pub keywords: Option<String>,
}

pub async fn list_seo(
    State(s): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<PageSeo>>> {
    let rows = sqlx::query_as::<_, PageSeo>("SELECT * FROM page_seo ORDER BY path")
        .fetch_all(&s.db)
        .await?;
    Ok(Json(rows))
}

pub async fn upsert_seo(
    State(s): State<AppState>,
    _admin: AdminUser,
    Json(r): Json<SeoRequest>,
) -> Result<Json<PageSeo>> {
    r.validate()?;
    let row = sqlx::query_as::<_, PageSeo>(
        "INSERT INTO page_seo (id, path, title, description, keywords, updated_at) \
         VALUES ($1, $2, $3, $4, $5, NOW()) \
         ON CONFLICT (path) DO UPDATE SET \
           title = EXCLUDED.title, description = EXCLUDED.description, \
           keywords = EXCLUDED.keywords, updated_at = NOW() \
         RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(r.path.trim())
    .bind(r.title.trim())
    .bind(r.description.as_deref().unwrap_or(""))
    .bind(r.keywords.as_deref().unwrap_or(""))
    .fetch_one(&s.db)
    .await?;
    Ok(Json(row))
}

pub async fn delete_seo(
    State(s): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    let affected = sqlx::query("DELETE FROM page_seo WHERE id = $1")
        .bind(id)
        .execute(&s.db)
        .await?
        .rows_affected();
    if affected == 0 {
        return Err(AppError::NotFound("seo entry"));
    }
    Ok(StatusCode::NO_CONTENT)
}

// ---- pages ----

/// All fields optional: updates patch only what they send. Creation still
/// requires a title.
#[derive(Debug, Deserialize, Validate)]
pub struct PageRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    pub slug: Option<String>,
    pub body: Option<String>,
    pub published: Option<bool>,
}

pub async fn list_pages(
    State(s): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<Page>>> {
    let pages = sqlx::query_as::<_, Page>("SELECT * FROM pages ORDER BY slug")
        .fetch_all(&s.db)
        .await?;
    Ok(Json(pages))
}

pub async fn create_page(
    State(s): State<AppState>,
    _admin: AdminUser,
    Json(r): Json<PageRequest>,
) -> Result<(StatusCode, Json<Page>)> {
    r.validate()?;
    let title = r
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Validation("title is required".into()))?;
    let slug = r
        .slug
        .as_deref()
        .map(slugify)
        .unwrap_or_else(|| slugify(title));
    let page = sqlx::query_as::<_, Page>(
        "INSERT INTO pages (id, slug, title, body, published) \
         VALUES ($1, $2, $3, $4, $5) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(&slug)
    .bind(title)
    .bind(r.body.as_deref().unwrap_or(""))
    .bind(r.published.unwrap_or(false))
    .fetch_one(&s.db)
    .await?;
    Ok((StatusCode::CREATED, Json(page)))
}

pub async fn update_page(
    State(s): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(r): Json<PageRequest>,
) -> Result<Json<Page>> {
    r.validate()?;
    let slug = r.slug.as_deref().map(slugify);
    let title = r.title.as_deref().map(str::trim);
    sqlx::query_as::<_, Page>(
        "UPDATE pages SET slug = COALESCE($2, slug), title = COALESCE($3, title), \
           body = COALESCE($4, body), published = COALESCE($5, published), \
           updated_at = NOW() \
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(slug)
    .bind(title)
    .bind(&r.body)
    .bind(r.published)
    .fetch_optional(&s.db)
    .await?
    .map(Json)
    .ok_or(AppError::NotFound("page"))
}

pub async fn delete_page(
    State(s): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    let affected = sqlx::query("DELETE FROM pages WHERE id = $1")
        .bind(id)
        .execute(&s.db)
        .await?
        .rows_affected();
    if affected == 0 {
        return Err(AppError::NotFound("page"));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{CurrentUser, JwtKeys};
    use sqlx::PgPool;

    fn admin() -> AdminUser {
        AdminUser(CurrentUser {
            id: Uuid::now_v7(),
            email: "admin@test.local".into(),
            role: "admin".into(),
        })
    }

    fn state(pool: &PgPool) -> AppState {
        AppState {
            db: pool.clone(),
            nats: None,
            jwt: JwtKeys::new("test-secret-that-is-long-enough-0123"),
        }
    }

    #[test]
    fn page_patch_fields_all_optional() {
        let r: PageRequest =
            serde_json::from_value(serde_json::json!({"published": true})).unwrap();
        r.validate().unwrap();
        assert_eq!(r.published, Some(true));
        assert!(r.title.is_none());
    }

    #[sqlx::test]
    async fn publish_toggle_keeps_title_and_slug(pool: PgPool) {
        let page_id = Uuid::now_v7();
        sqlx::query(
            "INSERT INTO pages (id, slug, title, body, published) \
             VALUES ($1, 'hakkimizda', 'Hakkımızda', 'icerik', FALSE)",
        )
        .bind(page_id)
        .execute(&pool)
        .await
        .unwrap();

        let patch: PageRequest =
            serde_json::from_value(serde_json::json!({"published": true})).unwrap();
        let Json(page) = update_page(State(state(&pool)), admin(), Path(page_id), Json(patch))
            .await
            .unwrap();

        assert!(page.published);
        assert_eq!(page.title, "Hakkımızda");
        assert_eq!(page.slug, "hakkimizda");
        assert_eq!(page.body, "icerik");
    }

    #[sqlx::test]
    async fn create_without_title_rejected(pool: PgPool) {
        let r: PageRequest =
            serde_json::from_value(serde_json::json!({"body": "icerik"})).unwrap();
        let err = create_page(State(state(&pool)), admin(), Json(r))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
