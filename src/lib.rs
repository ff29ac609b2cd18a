// src/lib.rs
pub mod api;
pub mod config;
pub mod dxtrade;
pub mod errors;
pub mod identity;
pub mod logging;
pub mod trading;
