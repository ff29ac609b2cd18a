// src/api/mod.rs
pub mod admin_handlers;
pub mod dxtrade_handlers;
pub mod routes;

pub use routes::{build_router, AppState};
