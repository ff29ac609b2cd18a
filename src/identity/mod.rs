// src/identity/mod.rs
pub mod client;
pub mod metadata;
pub mod session;

pub use client::{IdentityAdminClient, IdentityAuthClient, IdentityUser, TradingAccountRow};
pub use session::{Profile, Session, SessionStore};
