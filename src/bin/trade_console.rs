// src/bin/trade_console.rs - Console driver for the session store and the trade mirror
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};
use tracing::{error, info, warn};

use verstige_gateway::config::GatewayConfig;
use verstige_gateway::identity::SessionStore;
use verstige_gateway::logging::init_console_logging;
use verstige_gateway::trading::stream::SocketIoConnector;
use verstige_gateway::trading::{MirrorSnapshot, Side, TradeMirror, TradeSignal};

#[derive(Parser, Debug)]
#[command(name = "trade-console")]
#[command(about = "Watch, trade and inspect a Verstige account from the terminal")]
struct Args {
    /// Execution engine URL (defaults to EXECUTION_URL)
    #[arg(long, global = true)]
    endpoint: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Connect and log every account snapshot
    Watch {
        /// Stop after this many seconds (default: run until interrupted)
        #[arg(long)]
        seconds: Option<u64>,
    },
    /// Submit a trade signal
    Execute {
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        side: Side,
        #[arg(long)]
        entry: f64,
        #[arg(long)]
        sl: f64,
        #[arg(long)]
        tp: f64,
        /// Partial take-profit level
        #[arg(long)]
        tp1: Option<f64>,
        #[arg(long)]
        risk: Option<f64>,
    },
    /// Close an open trade by id
    Close {
        trade_id: String,
        /// How long to wait for the stream to come up
        #[arg(long, default_value_t = 10)]
        wait_secs: u64,
    },
    /// Sign in and print the derived profile
    Whoami {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
}

fn log_snapshot(snapshot: &MirrorSnapshot) {
    let account = &snapshot.account;
    info!(
        "💰 connected={} balance={:.2} equity={:.2} margin={:.2} free={:.2} daily={:.2} trades={}",
        account.is_connected,
        account.balance,
        account.equity,
        account.margin,
        account.free_margin,
        snapshot.daily_profit,
        snapshot.active_trades.len()
    );
    for trade in &snapshot.active_trades {
        info!(
            "   #{} {:?} {} vol {} @ {} → {} (P&L {:.2})",
            trade.id, trade.side, trade.symbol, trade.volume, trade.open_price, trade.current_price, trade.profit
        );
    }
    if let Some(err) = &snapshot.last_error {
        warn!("⚠️  {}", err);
    }
}

async fn watch(mirror: &TradeMirror, endpoint: &str, seconds: Option<u64>) -> Result<(), Box<dyn std::error::Error>> {
    mirror.connect(endpoint)?;
    let mut updates = mirror.subscribe();
    let deadline = seconds.map(|s| Instant::now() + Duration::from_secs(s));

    loop {
        let changed = match deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline, updates.changed()).await {
                Ok(changed) => changed,
                Err(_) => break,
            },
            None => updates.changed().await,
        };
        if changed.is_err() {
            break;
        }
        let snapshot = updates.borrow_and_update().clone();
        log_snapshot(&snapshot);
    }

    mirror.disconnect();
    Ok(())
}

async fn wait_until_connected(mirror: &TradeMirror, wait: Duration) -> bool {
    let mut updates = mirror.subscribe();
    let result = timeout(wait, async {
        while !updates.borrow_and_update().account.is_connected {
            if updates.changed().await.is_err() {
                return false;
            }
        }
        true
    })
    .await;
    result.unwrap_or(false)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    init_console_logging();

    let args = Args::parse();
    let config = GatewayConfig::from_env();
    let endpoint = args
        .endpoint
        .clone()
        .unwrap_or_else(|| config.execution_url.clone());

    match args.command {
        Command::Watch { seconds } => {
            let mirror = TradeMirror::from_config(&config);
            watch(&mirror, &endpoint, seconds).await?;
        }
        Command::Execute {
            symbol,
            side,
            entry,
            sl,
            tp,
            tp1,
            risk,
        } => {
            // signals go to the same engine the stream would use
            let mirror = TradeMirror::new(Arc::new(SocketIoConnector::new()), endpoint.clone());
            let signal = TradeSignal {
                symbol,
                side,
                entry,
                stop_loss: sl,
                take_profit: tp,
                partial_take_profit: tp1,
                risk,
            };
            match mirror.execute_signal(&signal).await {
                Ok(()) => info!("✅ Signal accepted, the trade will appear on the stream"),
                Err(e) => {
                    error!("❌ {}", e);
                    std::process::exit(1);
                }
            }
        }
        Command::Close { trade_id, wait_secs } => {
            let mirror = TradeMirror::from_config(&config);
            mirror.connect(&endpoint)?;
            if !wait_until_connected(&mirror, Duration::from_secs(wait_secs)).await {
                error!("❌ Stream did not connect within {}s", wait_secs);
                std::process::exit(1);
            }
            if mirror.close_trade(&trade_id) {
                info!("📤 closeTrade sent for {}", trade_id);
                // let the frame flush before tearing the socket down
                sleep(Duration::from_millis(500)).await;
            } else {
                warn!("🚫 closeTrade for {} was not sent", trade_id);
            }
            mirror.disconnect();
        }
        Command::Whoami { email, password } => {
            let store = SessionStore::from_config(&config)?;
            let session = store.sign_in(&email, &password).await?;
            info!("👤 {} ({})", session.user.id, session.user.email.as_deref().unwrap_or("-"));
            if let Some(profile) = store.profile() {
                info!("{}", serde_json::to_string_pretty(&profile)?);
            }
            info!("🛡️  admin: {}", store.is_admin());
            store.sign_out().await;
        }
    }

    Ok(())
}
