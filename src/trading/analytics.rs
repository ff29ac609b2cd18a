// src/trading/analytics.rs - Balance history reconstruction and chart downsampling
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;

pub const MAX_GROWTH_POINTS: usize = 50;
pub const RECENT_TRADES: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrowthPoint {
    /// Trade close/open time as received, or the reconstruction instant for the final point.
    pub time: Value,
    pub balance: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsReport {
    pub status: &'static str,
    pub analytics: Value,
    pub balance: Value,
    pub growth: Vec<GrowthPoint>,
    /// Latest trades, most recent first.
    pub history: Vec<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BalanceRefresh {
    pub status: &'static str,
    pub balance: f64,
    pub equity: f64,
    pub analytics: Value,
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

/// Number or numeric string.
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn first_truthy<'a>(trade: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| trade.get(*k))
        .find(|v| truthy(v))
}

/// `closedTime`, falling back to `openTime`.
pub fn trade_time(trade: &Value) -> Option<&Value> {
    first_truthy(trade, &["closedTime", "openTime"])
}

/// Sort key in epoch millis. Unknown or unparsable times sort first.
pub fn trade_timestamp_millis(trade: &Value) -> i64 {
    match trade_time(trade) {
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.timestamp_millis())
            .or_else(|_| s.trim().parse::<i64>())
            .unwrap_or(0),
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)).unwrap_or(0),
        _ => 0,
    }
}

/// Realised P&L from `pnl`, falling back to `realizedPnL`.
pub fn realized_pnl(trade: &Value) -> f64 {
    first_truthy(trade, &["pnl", "realizedPnL"])
        .and_then(as_number)
        .unwrap_or(0.0)
}

/// Oldest first. Stable, so trades sharing a timestamp keep their upstream order.
pub fn sort_history(mut history: Vec<Value>) -> Vec<Value> {
    history.sort_by_key(trade_timestamp_millis);
    history
}

/// Walk `sorted_history` backwards from the current balance, undoing each trade's P&L.
///
/// The final point is `(now, current_balance)`; each earlier point is the balance just
/// after the corresponding trade minus that trade's P&L, oldest first.
pub fn reconstruct_balance_history(
    current_balance: f64,
    sorted_history: &[Value],
    now: DateTime<Utc>,
) -> Vec<GrowthPoint> {
    let mut points = Vec::with_capacity(sorted_history.len() + 1);
    points.push(GrowthPoint {
        time: Value::String(now.to_rfc3339_opts(SecondsFormat::Millis, true)),
        balance: current_balance,
    });

    let mut running = current_balance;
    for trade in sorted_history.iter().rev() {
        running -= realized_pnl(trade);
        points.push(GrowthPoint {
            time: trade_time(trade).cloned().unwrap_or(Value::Null),
            balance: running,
        });
    }

    points.reverse();
    points
}

/// Uniform stride sampling down to roughly `max_points`, always keeping the final point.
pub fn downsample(points: Vec<GrowthPoint>, max_points: usize) -> Vec<GrowthPoint> {
    if max_points == 0 || points.len() <= max_points {
        return points;
    }

    let stride = points.len().div_ceil(max_points);
    let last = points.len() - 1;
    let keep_last = last % stride != 0;

    let mut sampled: Vec<GrowthPoint> = points
        .iter()
        .step_by(stride)
        .cloned()
        .collect();
    if keep_last {
        sampled.push(points[last].clone());
    }
    sampled
}

pub fn latest_trades(sorted_history: &[Value], count: usize) -> Vec<Value> {
    sorted_history.iter().rev().take(count).cloned().collect()
}

fn balance_field(data: &Value, field: &str) -> Option<f64> {
    data.get("balance").and_then(|b| b.get(field)).and_then(as_number)
}

/// Shape an account-data payload (`{balance, analytics, history}`) for charting.
pub fn build_report(data: &Value, now: DateTime<Utc>) -> AnalyticsReport {
    let history = data
        .get("history")
        .and_then(|h| h.as_array())
        .cloned()
        .unwrap_or_default();
    let sorted = sort_history(history);

    let current_balance = balance_field(data, "balance").unwrap_or(0.0);
    let growth = downsample(
        reconstruct_balance_history(current_balance, &sorted, now),
        MAX_GROWTH_POINTS,
    );

    AnalyticsReport {
        status: "success",
        analytics: data.get("analytics").cloned().unwrap_or(Value::Null),
        balance: data.get("balance").cloned().unwrap_or(Value::Null),
        growth,
        history: latest_trades(&sorted, RECENT_TRADES),
    }
}

pub fn build_balance_refresh(data: &Value) -> BalanceRefresh {
    BalanceRefresh {
        status: "success",
        balance: balance_field(data, "balance").unwrap_or(0.0),
        equity: balance_field(data, "equity").unwrap_or(0.0),
        analytics: data.get("analytics").cloned().unwrap_or(Value::Null),
    }
}
