// src/dxtrade/demo.rs - Canned payloads served only when DEMO_MODE is on
use serde_json::{json, Value};

pub const DEMO_SESSION_ID: &str = "mock_session";
const DEMO_MARGIN_USED: f64 = 2500.0;
const DEMO_DAILY_PNL: f64 = 1240.80;

pub fn demo_authenticate() -> Value {
    json!({
        "status": "success",
        "session_id": DEMO_SESSION_ID,
        "demo": true,
        "accounts": [
            { "id": "ECN_254822_10", "name": "ECN Account 10", "balance": 0, "type": "Live" },
            { "id": "ECN_254822_11", "name": "ECN Account 11", "balance": 0, "type": "Live" },
        ]
    })
}

pub fn demo_select_account(account_id: Option<&str>) -> Value {
    let balance = if account_id == Some("ECN_254822_11") {
        42904.52
    } else {
        35000.00
    };
    let equity = balance * 1.02;

    json!({
        "status": "success",
        "demo": true,
        "message": format!("Account {} selected", account_id.unwrap_or("unknown")),
        "account_id": account_id,
        "is_connected": true,
        "balance": balance,
        "equity": equity,
        "margin_used": DEMO_MARGIN_USED,
        "free_margin": balance - DEMO_MARGIN_USED,
        "unrealized_pnl": equity - balance,
        "realized_pnl": DEMO_DAILY_PNL,
        "currency": "USD",
        "analytics": {
            "total_trades": 47,
            "winning_trades": 28,
            "losing_trades": 19,
            "win_rate": 59.6,
            "total_pnl": 8452.30,
            "daily_pnl": DEMO_DAILY_PNL,
            "weekly_pnl": 3200.50,
            "max_drawdown": 4.2,
            "open_positions": 2,
            "pending_orders": 0
        }
    })
}
