//! HTTP surface: public storefront, authenticated customer API and the
//! admin back-office, all under `/api/v1`.

pub mod admin;
pub mod approvals;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod content;
pub mod coupons;
pub mod credits;
pub mod guest_cart;
pub mod orders;
pub mod tickets;

use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub category: Option<Uuid>,
    pub search: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: u32,
}

/// Clamped (limit, offset, page) from query params.
pub(crate) fn page_window(p: &ListParams) -> (i64, i64, u32) {
    let page = p.page.unwrap_or(1).max(1);
    let per_page = p.per_page.unwrap_or(20).clamp(1, 100);
    (per_page as i64, ((page - 1) * per_page) as i64, page)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "healthy", "service": "onay-store"}))
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        // auth
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        // catalog
        .route("/products", get(catalog::list_products))
        .route("/products/featured", get(catalog::featured_products))
        .route("/products/:id", get(catalog::get_product))
        .route("/categories", get(catalog::list_categories))
        .route("/categories/:id", get(catalog::get_category))
        // content
        .route("/payment-methods", get(content::list_payment_methods))
        .route("/packages", get(credits::list_packages))
        .route("/pages/:slug", get(content::get_page))
        .route("/seo", get(content::get_seo))
        // authenticated cart
        .route("/cart", get(cart::get_cart).delete(cart::clear_cart))
        .route("/cart/items", post(cart::add_item))
        .route(
            "/cart/items/:product_id",
            put(cart::set_quantity).delete(cart::remove_item),
        )
        // guest cart
        .route("/guest-cart", post(guest_cart::create_cart))
        .route(
            "/guest-cart/:token",
            get(guest_cart::get_cart).delete(guest_cart::clear_cart),
        )
        .route("/guest-cart/:token/items", post(guest_cart::add_item))
        .route(
            "/guest-cart/:token/items/:product_id",
            put(guest_cart::set_quantity).delete(guest_cart::remove_item),
        )
        // checkout + orders
        .route("/checkout", post(checkout::checkout))
        .route("/orders", get(orders::list_orders))
        .route("/orders/:id", get(orders::get_order))
        .route("/orders/:id/cancel", post(orders::cancel_order))
        // credits
        .route("/credits", get(credits::balance))
        .route("/credits/transactions", get(credits::transactions))
        .route("/credits/purchase", post(credits::purchase_package))
        // coupons
        .route("/coupons/redeem", post(coupons::redeem))
        // approvals
        .route("/approvals", get(approvals::list_own).post(approvals::submit))
        // support desk
        .route("/tickets", get(tickets::list_own).post(tickets::create))
        .route("/tickets/:id", get(tickets::get_thread))
        .route("/tickets/:id/messages", post(tickets::reply))
        .route("/tickets/:id/close", post(tickets::close))
        .nest("/admin", admin::router());

    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_window_defaults_and_clamps() {
        let p = ListParams {
            page: None,
            per_page: None,
            category: None,
            search: None,
            status: None,
        };
        assert_eq!(page_window(&p), (20, 0, 1));

        let p = ListParams {
            page: Some(3),
            per_page: Some(500),
            category: None,
            search: None,
            status: None,
        };
        assert_eq!(page_window(&p), (100, 200, 3));

        let p = ListParams {
            page: Some(0),
            per_page: Some(0),
            category: None,
            search: None,
            status: None,
        };
        assert_eq!(page_window(&p), (1, 0, 1));
    }
}
