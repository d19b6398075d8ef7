//! Admin back-office. Every handler takes the `AdminUser` extractor, so a
//! non-admin token gets a 403 before any query runs.

pub mod approvals;
pub mod catalog;
pub mod content;
pub mod coupons;
pub mod orders;
pub mod tickets;
pub mod users;

use axum::routing::{delete, get, post, put};
use axum::Router;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        // catalog
        .route(
            "/products",
            get(catalog::list_products).post(catalog::create_product),
        )
        .route(
            "/products/:id",
            put(catalog::update_product).delete(catalog::delete_product),
        )
        .route("/products/:id/featured", put(catalog::set_featured))
        .route("/categories", post(catalog::create_category))
        .route(
            "/categories/:id",
            put(catalog::update_category).delete(catalog::delete_category),
        )
        // users + ledger
        .route("/users", get(users::list_users))
        .route("/users/:id/credits", post(users::adjust_credits))
        // coupons
        .route("/coupons", get(coupons::list).post(coupons::create))
        .route("/coupons/:id", put(coupons::update).delete(coupons::remove))
        .route("/coupons/:id/usages", get(coupons::usages))
        // orders
        .route("/orders", get(orders::list))
        .route("/orders/:id/status", put(orders::set_status))
        // approvals
        .route("/approvals", get(approvals::list))
        .route("/approvals/:id/status", put(approvals::set_status))
        // support desk
        .route("/tickets", get(tickets::list))
        .route("/tickets/:id/messages", post(tickets::reply))
        .route("/tickets/:id/status", put(tickets::set_status))
        // payment methods, credit packages, purchases
        .route(
            "/payment-methods",
            get(content::list_payment_methods).post(content::create_payment_method),
        )
        .route(
            "/payment-methods/:id",
            put(content::update_payment_method).delete(content::delete_payment_method),
        )
        .route(
            "/packages",
            get(content::list_packages).post(content::create_package),
        )
        .route(
            "/packages/:id",
            put(content::update_package).delete(content::delete_package),
        )
        .route("/purchases", get(content::list_purchases))
        .route("/purchases/:id/confirm", post(content::confirm_purchase))
        // seo + pages
        .route("/seo", get(content::list_seo).put(content::upsert_seo))
        .route("/seo/:id", delete(content::delete_seo))
        .route("/pages", get(content::list_pages).post(content::create_page))
        .route(
            "/pages/:id",
            put(content::update_page).delete(content::delete_page),
        )
}
