//! Domain model: row types and the pure business rules that gate mutations.

pub mod approval;
pub mod cart;
pub mod catalog;
pub mod content;
pub mod coupon;
pub mod order;
pub mod ticket;
pub mod user;
