//! Marketdesk — financial dashboard backend
//!
//! Usage:
//!   marketdesk serve --port 3001    — Launch the web server
//!   marketdesk eval-alerts          — Run one alert evaluation tick (cron entry)

mod error;

use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{delete, get, post},
    Router,
};
use clap::{Parser, Subcommand};
use engine::{
    evaluate_alerts, value_portfolio, CoinResolver, Lot, QuoteGateway, QuoteSource,
};
use error::ApiError;
use persistence::repository::{
    portfolio::NewLot, AlertRepository, PortfolioRepository, UserRepository, WatchlistRepository,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::{info, warn};

const APP_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "-", env!("GIT_HASH"));

const ASSET_TYPES: &[&str] = &["stock", "etf", "crypto", "commodity", "bond"];

#[derive(Parser)]
#[command(name = "marketdesk")]
#[command(about = "Financial dashboard backend: watchlists, portfolio, price alerts", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch the web server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        /// Port to listen on
        #[arg(short, long, default_value_t = 3001)]
        port: u16,
    },
    /// Run one alert evaluation tick and exit (invoke from cron)
    EvalAlerts,
}

#[derive(Clone)]
struct AppState {
    gateway: Arc<QuoteGateway>,
    db: Arc<persistence::Database>,
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug,engine=debug,marketdesk=debug")
    } else {
        EnvFilter::new("info,engine=info,marketdesk=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).compact())
        .with(filter)
        .init();
}

fn db_path() -> String {
    std::env::var("MARKETDESK_DB_PATH").unwrap_or_else(|_| "data/marketdesk.db".to_string())
}

fn build_gateway() -> QuoteGateway {
    let token = std::env::var("FINNHUB_API_KEY").unwrap_or_else(|_| {
        warn!("FINNHUB_API_KEY not set — equity quotes will fail upstream");
        String::new()
    });
    QuoteGateway::new(token, CoinResolver::default())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    dotenvy::dotenv().ok();

    match cli.command {
        Commands::Serve { host, port } => {
            cmd_serve(&host, port).await?;
        }
        Commands::EvalAlerts => {
            cmd_eval_alerts().await?;
        }
    }

    Ok(())
}

// ============================================================================
// Serve command — Axum web server
// ============================================================================

async fn cmd_serve(host: &str, port: u16) -> anyhow::Result<()> {
    info!("Marketdesk v{} starting...", APP_VERSION);

    let db_path = db_path();
    let db = persistence::Database::new(&db_path)
        .await
        .map_err(|e| anyhow::anyhow!("Database initialization failed: {}", e))?;
    info!("Database initialized: {}", db_path);

    let state = AppState {
        gateway: Arc::new(build_gateway()),
        db: Arc::new(db),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Static UI bundle next to the binary, falling back to ./dist
    let exe_path = std::env::current_exe().unwrap_or_default();
    let exe_dir = exe_path.parent().unwrap_or(std::path::Path::new("."));
    let dist_dir = exe_dir.join("dist");
    let static_dir = if dist_dir.exists() {
        dist_dir
    } else {
        std::path::PathBuf::from("dist")
    };

    let api_routes = Router::new()
        .route("/health", get(api_health))
        .route("/quote", get(api_quote))
        .route("/candles", get(api_candles))
        .route("/watchlists", get(api_list_watchlists).post(api_create_watchlist))
        .route("/watchlists/:id", get(api_get_watchlist).delete(api_delete_watchlist))
        .route("/watchlists/:id/items", post(api_add_watchlist_item))
        .route("/watchlists/:id/items/:item_id", delete(api_delete_watchlist_item))
        .route("/portfolio", post(api_create_portfolio))
        .route("/portfolio/:id/holdings", get(api_holdings))
        .route("/portfolio/:id/lots", post(api_add_lot))
        .route("/portfolio/:id/lots/:lot_id", delete(api_delete_lot))
        .route("/alerts", get(api_list_alerts).post(api_create_alert))
        .route("/alerts/:id", delete(api_delete_alert))
        .route("/jobs/alerts-eval", post(api_eval_alerts))
        .with_state(state);

    let app = Router::new()
        .nest("/api", api_routes)
        .fallback_service(ServeDir::new(&static_dir))
        .layer(cors);

    let addr: std::net::SocketAddr = format!("{}:{}", host, port).parse()?;
    println!("\n=== Marketdesk v{} ===", APP_VERSION);
    println!("Listening on http://{}", addr);
    println!("\nEndpoints:");
    println!("  GET    /api/health                        - Health check");
    println!("  GET    /api/quote?symbol=                 - Quote by symbol");
    println!("  GET    /api/candles?symbol=&tf=           - Candles by symbol");
    println!("  GET    /api/watchlists                    - List watchlists");
    println!("  POST   /api/watchlists                    - Create watchlist");
    println!("  GET    /api/watchlists/:id                - Watchlist with items");
    println!("  DELETE /api/watchlists/:id                - Delete watchlist");
    println!("  POST   /api/watchlists/:id/items          - Add item");
    println!("  DELETE /api/watchlists/:id/items/:item_id - Remove item");
    println!("  POST   /api/portfolio                     - Create portfolio");
    println!("  GET    /api/portfolio/:id/holdings        - Valued holdings");
    println!("  POST   /api/portfolio/:id/lots            - Add lot");
    println!("  DELETE /api/portfolio/:id/lots/:lot_id    - Delete lot");
    println!("  GET    /api/alerts                        - List alerts");
    println!("  POST   /api/alerts                        - Create alert");
    println!("  DELETE /api/alerts/:id                    - Delete alert");
    println!("  POST   /api/jobs/alerts-eval              - Evaluate alerts now");
    println!("\n  Database: {}", db_path);
    println!("\nPress Ctrl+C to stop\n");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// EvalAlerts command — one tick from the CLI
// ============================================================================

async fn cmd_eval_alerts() -> anyhow::Result<()> {
    let db_path = db_path();
    let db = persistence::Database::new(&db_path)
        .await
        .map_err(|e| anyhow::anyhow!("Database initialization failed: {}", e))?;

    let gateway = build_gateway();
    let user = UserRepository::new(db.pool()).get_or_create_demo().await?;

    let summary = evaluate_alerts(db.pool(), &gateway, user.id).await?;
    info!(
        checked = summary.checked,
        triggered = summary.triggered,
        "Alert evaluation complete"
    );
    println!(
        "Checked {} alerts, {} triggered",
        summary.checked, summary.triggered
    );
    Ok(())
}

// ============================================================================
// API Handlers — Quotes
// ============================================================================

/// GET /api/health
async fn api_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "marketdesk",
        "version": APP_VERSION,
    }))
}

/// GET /api/quote?symbol=SYM
async fn api_quote(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let symbol = params
        .get("symbol")
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::Validation("symbol required".into()))?;

    let quote = state.gateway.quote(symbol).await?;
    Ok(Json(serde_json::to_value(quote).unwrap_or_default()))
}

/// GET /api/candles?symbol=SYM&tf=1d
async fn api_candles(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let symbol = params
        .get("symbol")
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::Validation("symbol required".into()))?;
    let tf = params.get("tf").map(String::as_str).unwrap_or("1d");

    let series = state.gateway.candles(symbol, tf).await?;
    Ok(Json(serde_json::to_value(series).unwrap_or_default()))
}

// ============================================================================
// API Handlers — Watchlists
// ============================================================================

#[derive(Deserialize)]
struct CreateWatchlistPayload {
    name: String,
}

/// POST /api/watchlists
async fn api_create_watchlist(
    State(state): State<AppState>,
    Json(payload): Json<CreateWatchlistPayload>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let name = payload.name.trim();
    if name.is_empty() || name.len() > 255 {
        return Err(ApiError::Validation("name must be 1-255 characters".into()));
    }

    let user = UserRepository::new(state.db.pool())
        .get_or_create_demo()
        .await?;
    let id = WatchlistRepository::new(state.db.pool())
        .create(user.id, name)
        .await?;

    Ok(Json(serde_json::json!({ "id": id })))
}

/// GET /api/watchlists
async fn api_list_watchlists(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = UserRepository::new(state.db.pool())
        .get_or_create_demo()
        .await?;
    let watchlists = WatchlistRepository::new(state.db.pool())
        .list_for_user(user.id)
        .await?;

    let body: Vec<serde_json::Value> = watchlists
        .iter()
        .map(|w| serde_json::json!({ "id": w.id, "name": w.name }))
        .collect();
    Ok(Json(serde_json::json!(body)))
}

/// GET /api/watchlists/:id
async fn api_get_watchlist(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let repo = WatchlistRepository::new(state.db.pool());
    let watchlist = repo
        .get(id)
        .await?
        .ok_or(ApiError::NotFound { entity: "watchlist" })?;
    let items = repo.get_items(id).await?;

    Ok(Json(serde_json::json!({
        "id": watchlist.id,
        "name": watchlist.name,
        "items": items.iter().map(|item| serde_json::json!({
            "id": item.id,
            "symbol": item.symbol,
            "assetType": item.asset_type,
        })).collect::<Vec<_>>(),
    })))
}

/// DELETE /api/watchlists/:id
async fn api_delete_watchlist(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let deleted = WatchlistRepository::new(state.db.pool()).delete(id).await?;
    if !deleted {
        return Err(ApiError::NotFound { entity: "watchlist" });
    }
    Ok(Json(serde_json::json!({ "success": true })))
}

#[derive(Deserialize)]
struct AddItemPayload {
    symbol: String,
    #[serde(rename = "assetType")]
    asset_type: String,
}

/// POST /api/watchlists/:id/items
async fn api_add_watchlist_item(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<AddItemPayload>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let symbol = payload.symbol.trim();
    if symbol.is_empty() || symbol.len() > 20 {
        return Err(ApiError::Validation("symbol must be 1-20 characters".into()));
    }
    if !ASSET_TYPES.contains(&payload.asset_type.as_str()) {
        return Err(ApiError::Validation(format!(
            "assetType must be one of {}",
            ASSET_TYPES.join(", ")
        )));
    }

    let repo = WatchlistRepository::new(state.db.pool());
    repo.get(id)
        .await?
        .ok_or(ApiError::NotFound { entity: "watchlist" })?;

    let item = repo.add_item(id, symbol, &payload.asset_type).await?;
    Ok(Json(serde_json::json!({
        "id": item.id,
        "symbol": item.symbol,
        "assetType": item.asset_type,
    })))
}

/// DELETE /api/watchlists/:id/items/:item_id
async fn api_delete_watchlist_item(
    State(state): State<AppState>,
    Path((_id, item_id)): Path<(i64, i64)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let repo = WatchlistRepository::new(state.db.pool());
    repo.get_item(item_id)
        .await?
        .ok_or(ApiError::NotFound { entity: "item" })?;
    repo.delete_item(item_id).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

// ============================================================================
// API Handlers — Portfolio
// ============================================================================

/// POST /api/portfolio
async fn api_create_portfolio(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = UserRepository::new(state.db.pool())
        .get_or_create_demo()
        .await?;
    let id = PortfolioRepository::new(state.db.pool())
        .create(user.id, "My Portfolio")
        .await?;
    Ok(Json(serde_json::json!({ "id": id })))
}

/// GET /api/portfolio/:id/holdings
async fn api_holdings(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let repo = PortfolioRepository::new(state.db.pool());
    repo.get(id)
        .await?
        .ok_or(ApiError::NotFound { entity: "portfolio" })?;

    let lots: Vec<Lot> = repo
        .get_lots(id)
        .await?
        .iter()
        .map(Lot::from_record)
        .collect();

    let source: &dyn QuoteSource = state.gateway.as_ref();
    let valuation = value_portfolio(source, &lots).await;
    Ok(Json(serde_json::to_value(valuation).unwrap_or_default()))
}

#[derive(Deserialize)]
struct AddLotPayload {
    symbol: String,
    qty: Decimal,
    #[serde(rename = "costBasis")]
    cost_basis: Decimal,
    #[serde(default)]
    fee: Option<Decimal>,
    #[serde(rename = "tradeDate")]
    trade_date: String,
}

/// POST /api/portfolio/:id/lots
async fn api_add_lot(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<AddLotPayload>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let symbol = payload.symbol.trim();
    if symbol.is_empty() || symbol.len() > 20 {
        return Err(ApiError::Validation("symbol must be 1-20 characters".into()));
    }
    if payload.qty <= Decimal::ZERO {
        return Err(ApiError::Validation("qty must be positive".into()));
    }
    if payload.cost_basis < Decimal::ZERO {
        return Err(ApiError::Validation("costBasis must be non-negative".into()));
    }
    let fee = payload.fee.unwrap_or(Decimal::ZERO);
    if fee < Decimal::ZERO {
        return Err(ApiError::Validation("fee must be non-negative".into()));
    }
    if chrono::DateTime::parse_from_rfc3339(&payload.trade_date).is_err() {
        return Err(ApiError::Validation(
            "tradeDate must be an RFC 3339 datetime".into(),
        ));
    }

    let repo = PortfolioRepository::new(state.db.pool());
    repo.get(id)
        .await?
        .ok_or(ApiError::NotFound { entity: "portfolio" })?;

    let lot = repo
        .add_lot(
            id,
            &NewLot {
                symbol: symbol.to_string(),
                qty: payload.qty.to_string(),
                cost_basis: payload.cost_basis.to_string(),
                fee: fee.to_string(),
                trade_date: payload.trade_date.clone(),
            },
        )
        .await?;

    Ok(Json(serde_json::json!({
        "id": lot.id,
        "symbol": lot.symbol,
        "qty": lot.qty,
        "costBasis": lot.cost_basis,
        "fee": lot.fee,
        "tradeDate": lot.trade_date,
    })))
}

/// DELETE /api/portfolio/:id/lots/:lot_id
async fn api_delete_lot(
    State(state): State<AppState>,
    Path((_id, lot_id)): Path<(i64, i64)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let repo = PortfolioRepository::new(state.db.pool());
    repo.get_lot(lot_id)
        .await?
        .ok_or(ApiError::NotFound { entity: "lot" })?;
    repo.delete_lot(lot_id).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

// ============================================================================
// API Handlers — Alerts
// ============================================================================

#[derive(Deserialize)]
struct CreateAlertPayload {
    symbol: String,
    value: Decimal,
}

/// POST /api/alerts
async fn api_create_alert(
    State(state): State<AppState>,
    Json(payload): Json<CreateAlertPayload>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let symbol = payload.symbol.trim();
    if symbol.is_empty() || symbol.len() > 20 {
        return Err(ApiError::Validation("symbol must be 1-20 characters".into()));
    }
    if payload.value <= Decimal::ZERO {
        return Err(ApiError::Validation("value must be positive".into()));
    }

    let user = UserRepository::new(state.db.pool())
        .get_or_create_demo()
        .await?;
    let alert = AlertRepository::new(state.db.pool())
        .create(user.id, symbol, &payload.value.to_string())
        .await?;

    Ok(Json(serde_json::json!({
        "id": alert.id,
        "symbol": alert.symbol,
        "value": alert.value,
    })))
}

/// GET /api/alerts — active alerts with their 5 most recent trigger events
async fn api_list_alerts(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = UserRepository::new(state.db.pool())
        .get_or_create_demo()
        .await?;
    let repo = AlertRepository::new(state.db.pool());
    let alerts = repo.list_active(user.id).await?;

    let mut body = Vec::with_capacity(alerts.len());
    for alert in &alerts {
        let events = repo.recent_events(alert.id, 5).await?;
        body.push(serde_json::json!({
            "id": alert.id,
            "symbol": alert.symbol,
            "value": alert.value,
            "lastSeenPrice": alert.last_seen_price,
            "recentEvents": events.iter().map(|e| serde_json::json!({
                "id": e.id,
                "price": e.price,
                "triggeredAt": e.triggered_at,
            })).collect::<Vec<_>>(),
        }));
    }

    Ok(Json(serde_json::json!(body)))
}

/// DELETE /api/alerts/:id
async fn api_delete_alert(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let repo = AlertRepository::new(state.db.pool());
    repo.get(id)
        .await?
        .ok_or(ApiError::NotFound { entity: "alert" })?;
    repo.delete(id).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

// ============================================================================
// API Handlers — Jobs
// ============================================================================

/// POST /api/jobs/alerts-eval — on-demand evaluation tick
async fn api_eval_alerts(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = UserRepository::new(state.db.pool())
        .get_or_create_demo()
        .await?;

    let source: &dyn QuoteSource = state.gateway.as_ref();
    let summary = evaluate_alerts(state.db.pool(), source, user.id).await?;

    Ok(Json(serde_json::json!({
        "checked": summary.checked,
        "triggered": summary.triggered,
    })))
}
