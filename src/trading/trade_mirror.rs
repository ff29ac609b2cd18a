// src/trading/trade_mirror.rs - Best-effort local mirror of the remote trading account
//
// The execution engine is the ledger of record. This mirror only reflects what the
// streaming channel last pushed and submits new instructions over plain HTTP.
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::GatewayConfig;
use crate::errors::MirrorError;
use crate::trading::stream::{stream_url, OutboundFrame, SocketIoConnector, StreamConnector, TransportEvent};
use crate::trading::types::{AccountSnapshot, MirrorSnapshot, Trade, TradeSignal};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AccountFields {
    pub balance: Option<f64>,
    pub equity: Option<f64>,
    pub margin: Option<f64>,
    #[serde(alias = "freeMargin")]
    pub free_margin: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveProfitsUpdate {
    pub trades: Option<Vec<Trade>>,
    pub total_profit: Option<f64>,
    pub equity: Option<f64>,
}

#[derive(Deserialize)]
struct BalanceOnly {
    balance: Option<f64>,
}

#[derive(Deserialize)]
struct TradeExecutedPayload {
    result: Trade,
}

/// Server-pushed events the mirror understands.
#[derive(Debug, Clone, PartialEq)]
pub enum MirrorEvent {
    Account(AccountFields),
    ActiveProfits(ActiveProfitsUpdate),
    AccountUpdate { balance: Option<f64> },
    TradeExecuted(Trade),
}

impl MirrorEvent {
    /// `Ok(None)` for events the mirror does not track.
    pub fn parse(event: &str, data: Value) -> Result<Option<Self>, serde_json::Error> {
        let parsed = match event {
            "Account" => MirrorEvent::Account(serde_json::from_value(data)?),
            "activeProfitsUpdate" => MirrorEvent::ActiveProfits(serde_json::from_value(data)?),
            "accountUpdate" => {
                let body: BalanceOnly = serde_json::from_value(data)?;
                MirrorEvent::AccountUpdate { balance: body.balance }
            }
            "tradeExecuted" => {
                let body: TradeExecutedPayload = serde_json::from_value(data)?;
                MirrorEvent::TradeExecuted(body.result)
            }
            _ => return Ok(None),
        };
        Ok(Some(parsed))
    }
}

/// Mutable state behind the mirror. Last write wins; nothing is cleared on disconnect.
#[derive(Debug, Default)]
pub struct MirrorState {
    pub account: AccountSnapshot,
    pub daily_profit: f64,
    /// Keyed by ticket so an optimistic insert and the next full replacement cannot duplicate.
    pub active_trades: IndexMap<String, Trade>,
    pub last_error: Option<String>,
    connection: Option<Uuid>,
}

impl MirrorState {
    pub fn apply(&mut self, event: MirrorEvent) {
        match event {
            MirrorEvent::Account(fields) => {
                if let Some(balance) = fields.balance {
                    self.account.balance = balance;
                }
                if let Some(equity) = fields.equity {
                    self.account.equity = equity;
                }
                if let Some(margin) = fields.margin {
                    self.account.margin = margin;
                }
                if let Some(free_margin) = fields.free_margin {
                    self.account.free_margin = free_margin;
                }
            }
            MirrorEvent::ActiveProfits(update) => {
                if let Some(trades) = update.trades {
                    self.active_trades = trades.into_iter().map(|t| (t.id.clone(), t)).collect();
                }
                if let Some(total_profit) = update.total_profit {
                    self.daily_profit = total_profit;
                }
                if let Some(equity) = update.equity {
                    self.account.equity = equity;
                }
            }
            MirrorEvent::AccountUpdate { balance } => {
                if let Some(balance) = balance {
                    self.account.balance = balance;
                }
            }
            MirrorEvent::TradeExecuted(trade) => {
                self.active_trades.insert(trade.id.clone(), trade);
            }
        }
    }

    /// Apply one transport event. Returns whether anything observable changed.
    pub fn apply_transport(&mut self, event: TransportEvent) -> bool {
        match event {
            TransportEvent::Connected => {
                self.account.is_connected = true;
                self.last_error = None;
            }
            TransportEvent::Disconnected { .. } => {
                self.account.is_connected = false;
            }
            TransportEvent::ConnectError(reason) => {
                self.last_error = Some(format!("Failed to connect to trading engine: {}", reason));
            }
            TransportEvent::Message { event, data } => match MirrorEvent::parse(&event, data) {
                Ok(Some(parsed)) => self.apply(parsed),
                Ok(None) => {
                    debug!("❓ [MIRROR] Ignoring event '{}'", event);
                    return false;
                }
                Err(e) => {
                    warn!("⚠️  [MIRROR] Malformed '{}' payload: {}", event, e);
                    return false;
                }
            },
        }
        true
    }

    pub fn snapshot(&self) -> MirrorSnapshot {
        MirrorSnapshot {
            account: self.account.clone(),
            daily_profit: self.daily_profit,
            active_trades: self.active_trades.values().cloned().collect(),
            last_error: self.last_error.clone(),
        }
    }
}

struct ConnectionHandle {
    id: Uuid,
    outbound: mpsc::UnboundedSender<OutboundFrame>,
    driver: JoinHandle<()>,
}

/// Explicitly constructed, shareable mirror of one trading account.
pub struct TradeMirror {
    connector: Arc<dyn StreamConnector>,
    http: Client,
    execution_url: String,
    state: Arc<RwLock<MirrorState>>,
    updates: Arc<watch::Sender<MirrorSnapshot>>,
    handle: Mutex<Option<ConnectionHandle>>,
}

impl TradeMirror {
    pub fn new(connector: Arc<dyn StreamConnector>, execution_url: impl Into<String>) -> Self {
        let (updates, _) = watch::channel(MirrorSnapshot::default());
        Self {
            connector,
            http: Client::new(),
            execution_url: execution_url.into().trim_end_matches('/').to_string(),
            state: Arc::new(RwLock::new(MirrorState::default())),
            updates: Arc::new(updates),
            handle: Mutex::new(None),
        }
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(Arc::new(SocketIoConnector::new()), config.execution_url.clone())
    }

    /// Open the streaming channel. `Ok(false)` when a live connection already exists.
    ///
    /// The connection is driven by a spawned task, so this must be called from within a
    /// Tokio runtime; outside one it returns `MirrorError::NoRuntime`.
    pub fn connect(&self, endpoint: &str) -> Result<bool, MirrorError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| MirrorError::NoRuntime)?;
        let mut handle = self.handle.lock();
        if let Some(existing) = handle.as_ref() {
            if !existing.driver.is_finished() {
                debug!("🔁 [MIRROR] Already connected ({}), ignoring connect", existing.id);
                return Ok(false);
            }
        }

        let url = stream_url(endpoint)?;
        let channel = self.connector.open(&url);
        let id = Uuid::new_v4();
        self.state.write().connection = Some(id);

        let driver = runtime.spawn(drive(
            id,
            channel.events,
            Arc::clone(&self.state),
            Arc::clone(&self.updates),
        ));

        info!("📡 [MIRROR] Connecting to {} ({})", url, id);
        *handle = Some(ConnectionHandle {
            id,
            outbound: channel.outbound,
            driver,
        });
        Ok(true)
    }

    /// Tear the connection down. Returns `false` if there was nothing to disconnect.
    pub fn disconnect(&self) -> bool {
        let Some(handle) = self.handle.lock().take() else {
            return false;
        };

        let snapshot = {
            let mut state = self.state.write();
            state.connection = None;
            state.account.is_connected = false;
            state.snapshot()
        };
        drop(handle.outbound);
        handle.driver.abort();
        self.updates.send_replace(snapshot);

        info!("🔌 [MIRROR] Disconnected ({})", handle.id);
        true
    }

    /// Submit a signal over the request/response channel, single attempt.
    ///
    /// Success only means the engine accepted it; the resulting trade arrives later as a
    /// `tradeExecuted` push.
    pub async fn execute_signal(&self, signal: &TradeSignal) -> Result<(), MirrorError> {
        let url = format!("{}/api/execute-signal", self.execution_url);
        info!(
            "🎯 [MIRROR] Submitting {:?} {} @ {} (SL {} / TP {})",
            signal.side, signal.symbol, signal.entry, signal.stop_loss, signal.take_profit
        );

        let response = self.http.post(&url).json(signal).send().await.map_err(|e| {
            error!("❌ [MIRROR] Trade execution failed: {}", e);
            MirrorError::from(e)
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body: Value = response.json().await.unwrap_or(Value::Null);
            let message = ["message", "error"]
                .iter()
                .filter_map(|k| body.get(*k).and_then(|v| v.as_str()))
                .find(|m| !m.is_empty())
                .unwrap_or("Execution Failed")
                .to_string();
            error!("❌ [MIRROR] Trade execution rejected ({}): {}", status, message);
            return Err(MirrorError::Rejected(message));
        }

        Ok(())
    }

    /// Ask the engine to close a trade. Returns whether the instruction was actually sent;
    /// nothing is queued while disconnected.
    pub fn close_trade(&self, trade_id: &str) -> bool {
        let handle = self.handle.lock();
        let Some(handle) = handle.as_ref() else {
            debug!("🚫 [MIRROR] closeTrade {} dropped: no connection", trade_id);
            return false;
        };
        if !self.state.read().account.is_connected {
            debug!("🚫 [MIRROR] closeTrade {} dropped: not connected", trade_id);
            return false;
        }
        handle
            .outbound
            .send(OutboundFrame::new("closeTrade", json!(trade_id)))
            .is_ok()
    }

    pub fn subscribe(&self) -> watch::Receiver<MirrorSnapshot> {
        self.updates.subscribe()
    }

    pub fn snapshot(&self) -> MirrorSnapshot {
        self.state.read().snapshot()
    }

    pub fn is_connected(&self) -> bool {
        self.state.read().account.is_connected
    }

    pub fn has_connection_handle(&self) -> bool {
        self.handle.lock().is_some()
    }
}

impl Drop for TradeMirror {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.get_mut().take() {
            handle.driver.abort();
        }
    }
}

async fn drive(
    id: Uuid,
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
    state: Arc<RwLock<MirrorState>>,
    updates: Arc<watch::Sender<MirrorSnapshot>>,
) {
    while let Some(event) = events.recv().await {
        let snapshot = {
            let mut state = state.write();
            if state.connection != Some(id) {
                return;
            }
            if !state.apply_transport(event) {
                continue;
            }
            state.snapshot()
        };
        updates.send_replace(snapshot);
    }

    // transport gave up; keep the data, drop the connected flag
    let snapshot = {
        let mut state = state.write();
        if state.connection != Some(id) {
            return;
        }
        state.account.is_connected = false;
        state.snapshot()
    };
    updates.send_replace(snapshot);
    warn!("⛔ [MIRROR] Stream {} ended", id);
}
