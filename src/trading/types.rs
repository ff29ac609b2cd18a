// src/trading/types.rs - Account / trade data mirrored from the execution engine
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl std::str::FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "BUY" => Ok(Side::Buy),
            "SELL" => Ok(Side::Sell),
            other => Err(format!("unknown side '{}', expected BUY or SELL", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeStatus {
    #[default]
    Active,
    Closed,
}

/// An open position as pushed by the execution engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    /// Exchange-assigned ticket. Tickets arrive as strings or numbers.
    #[serde(deserialize_with = "ticket_id")]
    pub id: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(rename = "type")]
    pub side: Side,
    #[serde(default)]
    pub volume: f64,
    #[serde(default)]
    pub open_price: f64,
    #[serde(default)]
    pub current_price: f64,
    #[serde(default)]
    pub profit: f64,
    #[serde(rename = "sl", default)]
    pub stop_loss: f64,
    #[serde(rename = "tp", default)]
    pub take_profit: f64,
    #[serde(default)]
    pub status: TradeStatus,
}

/// Trade instruction submitted over the request/response channel. Never persisted locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeSignal {
    pub symbol: String,
    #[serde(rename = "type")]
    pub side: Side,
    pub entry: f64,
    #[serde(rename = "sl")]
    pub stop_loss: f64,
    #[serde(rename = "tp")]
    pub take_profit: f64,
    /// Partial take-profit level.
    #[serde(rename = "tp1", skip_serializing_if = "Option::is_none", default)]
    pub partial_take_profit: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub risk: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSnapshot {
    pub balance: f64,
    pub equity: f64,
    pub margin: f64,
    pub free_margin: f64,
    pub is_connected: bool,
}

/// Everything a subscriber of the mirror sees at one instant.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MirrorSnapshot {
    pub account: AccountSnapshot,
    pub daily_profit: f64,
    pub active_trades: Vec<Trade>,
    pub last_error: Option<String>,
}

fn ticket_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "trade id must be a string or number, got {}",
            other
        ))),
    }
}
