// src/trading/mod.rs
pub mod analytics;
pub mod stream;
pub mod trade_mirror;
pub mod trading_data;
pub mod types;

pub use trade_mirror::TradeMirror;
pub use types::{AccountSnapshot, MirrorSnapshot, Side, Trade, TradeSignal, TradeStatus};
